//! Card template composition
//!
//! The card template is plain HTML with a handful of literal markers. They
//! are replaced by exact string substitution rather than a template engine so
//! the composed bytes, and therefore the cache fingerprints, stay stable.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::{Error, Result};

/// Base template file name inside the partials directory
pub const TEMPLATE_FILE: &str = "social-card.html";
/// Partial embedded at [`SITE_LOGO_MARKER`]
pub const SITE_LOGO_PARTIAL: &str = "site-logo.html";
/// Partial embedded at [`PARTNER_LOGO_MARKER`]
pub const PARTNER_LOGO_PARTIAL: &str = "partner-logo.html";

pub const SITE_LOGO_MARKER: &str = r#"{% include "partials/site-logo.html" %}"#;
pub const PARTNER_LOGO_MARKER: &str = r#"{% include "partials/partner-logo.html" %}"#;
pub const TITLE_MARKER: &str = "{{ title }}";
pub const DESCRIPTION_MARKER: &str = "{{ description }}";
pub const IF_DESCRIPTION_MARKER: &str = "{% if description %}";
pub const ENDIF_MARKER: &str = "{% endif %}";

static ANNOTATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{#.*?#\}").expect("annotation pattern is valid"));

static DESCRIPTION_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\{% if description %\}.*?\{% endif %\}").expect("description pattern is valid")
});

/// Bundled card template, compiled into the binary
pub const EMBEDDED_TEMPLATE: &str = include_str!("../partials/social-card.html");
/// Bundled site logo partial
pub const EMBEDDED_SITE_LOGO: &str = include_str!("../partials/site-logo.html");
/// Bundled partner logo partial
pub const EMBEDDED_PARTNER_LOGO: &str = include_str!("../partials/partner-logo.html");

/// Get the bundled file by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    match name {
        TEMPLATE_FILE => Some(EMBEDDED_TEMPLATE),
        SITE_LOGO_PARTIAL => Some(EMBEDDED_SITE_LOGO),
        PARTNER_LOGO_PARTIAL => Some(EMBEDDED_PARTNER_LOGO),
        _ => None,
    }
}

/// The card template and its partials, either bundled or read from a directory.
#[derive(Debug, Clone, Default)]
pub struct Templates {
    dir: Option<PathBuf>,
}

impl Templates {
    /// Read templates from `dir` on every render.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    /// Use the templates compiled into the crate.
    pub fn embedded() -> Self {
        Self { dir: None }
    }

    /// Override directory, `None` for the bundled templates.
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Read the base card template.
    pub fn load_template(&self) -> Result<String> {
        self.load(TEMPLATE_FILE)
    }

    /// Read a partial and strip its `{# ... #}` annotations.
    pub fn load_partial(&self, name: &str) -> Result<String> {
        let content = self.load(name)?;
        Ok(strip_annotations(&content))
    }

    /// Compose the card HTML for `title` and `description`.
    ///
    /// An empty description drops the whole `{% if description %}` block.
    pub fn render(&self, title: &str, description: &str) -> Result<String> {
        let template = self.load_template()?;
        let site_logo = self.load_partial(SITE_LOGO_PARTIAL)?;
        let partner_logo = self.load_partial(PARTNER_LOGO_PARTIAL)?;

        let html = template
            .replace(SITE_LOGO_MARKER, &site_logo)
            .replace(PARTNER_LOGO_MARKER, &partner_logo)
            .replace(TITLE_MARKER, title);

        Ok(apply_description(&html, description))
    }

    fn load(&self, name: &str) -> Result<String> {
        match &self.dir {
            Some(dir) => read_file(&dir.join(name)),
            None => get_embedded(name).map(str::to_string).ok_or_else(|| Error::Template {
                path: PathBuf::from(name),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a bundled template"),
            }),
        }
    }
}

/// Compose the card HTML using the bundled templates.
pub fn render_template(title: &str, description: &str) -> Result<String> {
    Templates::embedded().render(title, description)
}

/// Remove every `{# ... #}` block, including ones spanning several lines.
pub fn strip_annotations(content: &str) -> String {
    ANNOTATION_RE.replace_all(content, "").into_owned()
}

fn apply_description(html: &str, description: &str) -> String {
    if description.is_empty() {
        return DESCRIPTION_BLOCK_RE.replace_all(html, "").into_owned();
    }
    html.replace(IF_DESCRIPTION_MARKER, "")
        .replace(ENDIF_MARKER, "")
        .replace(DESCRIPTION_MARKER, description)
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| Error::Template {
        path: path.to_path_buf(),
        source,
    })
}
