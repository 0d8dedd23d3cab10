//! ogcard
//!
//! Social preview cards (Open Graph images) for documentation sites. A card is
//! an HTML template composed from a base template and two partials, rendered
//! to a 1200×630 PNG in a headless browser. Rendered cards are cached on disk
//! under a fingerprint of the composed HTML so unchanged pages never hit the
//! browser again.
//!
//! # Features
//!
//! - **CDP Backend** (default): renders through headless Chrome
//! - **Engine seam**: the browser sits behind the [`Engine`] trait
//! - **Persistent cache**: cards survive across build runs
//!
//! # Example
//!
//! ```no_run
//! use ogcard::{ChromeCardRenderer, RendererConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut renderer = ChromeCardRenderer::new(RendererConfig::default())?;
//! let (path, fresh) = renderer.generate("Welcome", "Intro page", None)?;
//! println!("{} (fresh: {})", path.display(), fresh);
//! renderer.close()?;
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

pub mod error;
pub use error::{Error, Result};

pub mod cache;
pub mod fingerprint;
pub mod renderer;
pub mod template;

#[cfg(feature = "cdp")]
pub mod cdp;

pub use cache::{CacheEntry, CardCache};
pub use fingerprint::content_hash;
pub use renderer::{generate_card_with, CardRenderer, RenderStats};
pub use template::{render_template, Templates};

#[cfg(feature = "cdp")]
pub use renderer::{generate_card, ChromeCardRenderer};

/// Card width in pixels (standard Open Graph size)
pub const CARD_WIDTH: u32 = 1200;
/// Card height in pixels (standard Open Graph size)
pub const CARD_HEIGHT: u32 = 630;

/// Default cache directory, relative to the working directory.
pub const DEFAULT_CACHE_DIR: &str = ".cache/social-cards";

/// Viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: CARD_WIDTH,
            height: CARD_HEIGHT,
        }
    }
}

/// Configuration for the browser engine
///
/// The defaults match a standard Open Graph card and give slow pages thirty
/// seconds to settle.
///
/// # Examples
///
/// ```
/// let cfg = ogcard::EngineConfig::default();
/// assert_eq!(cfg.viewport.width, 1200);
/// assert_eq!(cfg.viewport.height, 630);
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Viewport dimensions
    pub viewport: Viewport,
    /// Upper bound for a page to reach network idle, in milliseconds
    pub timeout_ms: u64,
    /// How long the page must stay quiet to count as network idle
    pub network_idle_ms: u64,
    /// Whether to run Chrome with its sandbox enabled
    pub sandbox: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            timeout_ms: 30000,
            network_idle_ms: 500,
            sandbox: true,
        }
    }
}

impl EngineConfig {
    /// Reject configurations no engine can honour.
    pub fn validate(&self) -> Result<()> {
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(Error::ConfigError(format!(
                "viewport must be non-empty, got {}x{}",
                self.viewport.width, self.viewport.height
            )));
        }
        if self.timeout_ms == 0 {
            return Err(Error::ConfigError("timeout_ms must be positive".into()));
        }
        if self.network_idle_ms >= self.timeout_ms {
            return Err(Error::ConfigError(format!(
                "network_idle_ms ({}) must be shorter than timeout_ms ({})",
                self.network_idle_ms, self.timeout_ms
            )));
        }
        Ok(())
    }
}

/// Configuration for a [`CardRenderer`]
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Persistent cache directory for rendered cards
    pub cache_dir: PathBuf,
    /// Directory overriding the bundled `social-card.html` and its partials
    pub partials_dir: Option<PathBuf>,
    /// Where scratch HTML files and unnamed output cards are written; the
    /// system temp dir when `None`
    pub scratch_dir: Option<PathBuf>,
    /// Browser engine settings
    pub engine: EngineConfig,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            partials_dir: None,
            scratch_dir: None,
            engine: EngineConfig::default(),
        }
    }
}

impl RendererConfig {
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    pub fn with_partials_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.partials_dir = Some(dir.into());
        self
    }

    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }
}

/// Browser automation capability used to turn card HTML into a PNG
///
/// An engine owns one browser and one page. It is created lazily by the
/// renderer on the first cache miss and torn down by [`Engine::close`].
pub trait Engine {
    /// Launch a browser and open a page sized to `config.viewport`
    fn new(config: &EngineConfig) -> Result<Self>
    where
        Self: Sized;

    /// Navigate the page to `url`
    fn load_url(&mut self, url: &str) -> Result<()>;

    /// Block until the page reports no further network activity
    fn wait_for_network_idle(&mut self) -> Result<()>;

    /// Capture the current viewport as PNG bytes
    fn render_png(&self) -> Result<Vec<u8>>;

    /// Capture the current viewport and write it to `path`
    fn screenshot_to(&self, path: &Path) -> Result<()> {
        let png = self.render_png()?;
        std::fs::write(path, png)
            .map_err(|e| Error::io(format!("Failed to write screenshot {}", path.display()), e))
    }

    /// Close the page, then the browser. Calling it again is a no-op.
    fn close(&mut self) -> Result<()>;
}
