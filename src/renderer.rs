//! Cached card rendering
//!
//! [`CardRenderer`] composes card HTML, looks its fingerprint up in the
//! [`CardCache`] and only drives the browser on a miss. The browser session
//! is launched on the first miss and reused until [`CardRenderer::close`].

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use tempfile::TempPath;

use crate::cache::CardCache;
use crate::fingerprint::content_hash;
use crate::template::Templates;
use crate::{Engine, Error, RendererConfig, Result};

/// Cards produced over a renderer's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Cards rendered through the browser
    pub generated: usize,
    /// Cards copied from the cache
    pub cached: usize,
}

impl RenderStats {
    pub fn total(&self) -> usize {
        self.generated + self.cached
    }
}

/// Renders social cards, reusing one browser session across calls.
pub struct CardRenderer<E: Engine> {
    config: RendererConfig,
    templates: Templates,
    cache: CardCache,
    session: Option<E>,
    stats: RenderStats,
    closed: bool,
}

/// A renderer backed by headless Chrome.
#[cfg(feature = "cdp")]
pub type ChromeCardRenderer = CardRenderer<crate::cdp::CdpEngine>;

impl<E: Engine> CardRenderer<E> {
    /// Create a renderer. No browser is launched until a card misses the cache.
    pub fn new(config: RendererConfig) -> Result<Self> {
        config.engine.validate()?;
        Ok(Self {
            templates: match &config.partials_dir {
                Some(dir) => Templates::new(dir),
                None => Templates::embedded(),
            },
            cache: CardCache::new(&config.cache_dir),
            config,
            session: None,
            stats: RenderStats::default(),
            closed: false,
        })
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn cache(&self) -> &CardCache {
        &self.cache
    }

    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    /// Whether a browser session is currently running.
    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Produce the card for `title` and `description`.
    ///
    /// Writes the PNG to `output_path`, or to a fresh temporary `.png` file
    /// in the scratch directory when none is given; that file is removed
    /// again if the card cannot be produced. Returns the output path and
    /// `true` when the card was rendered by the browser, `false` when it came
    /// from the cache.
    pub fn generate(
        &mut self,
        title: &str,
        description: &str,
        output_path: Option<&Path>,
    ) -> Result<(PathBuf, bool)> {
        self.closed = false;

        let html = self.templates.render(title, description)?;
        let fingerprint = content_hash(&html);

        let (output_path, allocated) = match output_path {
            Some(p) => (p.to_path_buf(), false),
            None => (self.allocate_output_path()?, true),
        };

        let produced = self.produce(&html, &fingerprint, &output_path, title);
        if produced.is_err() && allocated {
            if let Err(e) = fs::remove_file(&output_path) {
                warn!("Failed to remove output file {}: {}", output_path.display(), e);
            }
        }
        Ok((output_path, produced?))
    }

    fn produce(
        &mut self,
        html: &str,
        fingerprint: &str,
        output_path: &Path,
        title: &str,
    ) -> Result<bool> {
        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                Error::io(format!("Failed to create output directory {}", parent.display()), e)
            })?;
        }

        if self.cache.lookup(fingerprint).is_some() {
            self.cache.restore(fingerprint, output_path)?;
            self.stats.cached += 1;
            return Ok(false);
        }

        debug!("card cache miss {} for {:?}", fingerprint, title);
        self.cache.ensure_dir()?;

        let scratch = self.write_scratch_html(html)?;
        let rendered = self.screenshot_file(&scratch, output_path);
        let scratch_display = scratch.display().to_string();
        if let Err(e) = scratch.close() {
            warn!("Failed to remove scratch file {}: {}", scratch_display, e);
        }
        rendered?;

        self.cache.store(fingerprint, output_path)?;
        self.stats.generated += 1;
        Ok(true)
    }

    /// Log the session summary and shut the browser down.
    ///
    /// Safe to call on a renderer that never launched a browser, and safe to
    /// call twice.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if self.stats.total() > 0 {
            info!(
                "Social cards: {} generated, {} cached",
                self.stats.generated, self.stats.cached
            );
        }
        if let Some(mut session) = self.session.take() {
            session.close()?;
        }
        Ok(())
    }

    fn session(&mut self) -> Result<&mut E> {
        if self.session.is_none() {
            debug!(
                "launching browser session ({}x{})",
                self.config.engine.viewport.width, self.config.engine.viewport.height
            );
            self.session = Some(E::new(&self.config.engine)?);
        }
        self.session
            .as_mut()
            .ok_or_else(|| Error::Other("browser session unavailable".into()))
    }

    fn scratch_file(&self, suffix: &str) -> std::io::Result<tempfile::NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("ogcard-").suffix(suffix);
        match &self.config.scratch_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
    }

    fn allocate_output_path(&self) -> Result<PathBuf> {
        self.scratch_file(".png")
            .map_err(|e| Error::io("Failed to allocate output file", e))?
            .into_temp_path()
            .keep()
            .map_err(|e| Error::io("Failed to keep output file", e.error))
    }

    fn write_scratch_html(&self, html: &str) -> Result<TempPath> {
        let mut file = self
            .scratch_file(".html")
            .map_err(|e| Error::io("Failed to create scratch HTML file", e))?;
        file.write_all(html.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| Error::io("Failed to write scratch HTML file", e))?;
        Ok(file.into_temp_path())
    }

    fn screenshot_file(&mut self, html_path: &Path, output_path: &Path) -> Result<()> {
        let url = file_url(html_path)?;
        let session = self.session()?;
        session.load_url(&url)?;
        session.wait_for_network_idle()?;
        session.screenshot_to(output_path)
    }
}

impl<E: Engine> Drop for CardRenderer<E> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to close card renderer: {}", e);
        }
    }
}

/// Render one card with a renderer of engine type `E`, closing it afterwards.
pub fn generate_card_with<E: Engine>(
    config: RendererConfig,
    title: &str,
    description: &str,
    output_path: Option<&Path>,
) -> Result<PathBuf> {
    let mut renderer = CardRenderer::<E>::new(config)?;
    let generated = renderer.generate(title, description, output_path);
    let closed = renderer.close();
    let (path, _) = generated?;
    closed?;
    Ok(path)
}

/// Render one card with headless Chrome and the default configuration.
#[cfg(feature = "cdp")]
pub fn generate_card(title: &str, description: &str, output_path: Option<&Path>) -> Result<PathBuf> {
    generate_card_with::<crate::cdp::CdpEngine>(
        RendererConfig::default(),
        title,
        description,
        output_path,
    )
}

fn file_url(path: &Path) -> Result<String> {
    let absolute = std::path::absolute(path)
        .map_err(|e| Error::io(format!("Failed to resolve {}", path.display()), e))?;
    url::Url::from_file_path(&absolute)
        .map(String::from)
        .map_err(|_| Error::LoadError(format!("Not a valid file path: {}", absolute.display())))
}
