//! Chrome DevTools Protocol engine implementation

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptions};
use log::{debug, warn};

use crate::{Engine, EngineConfig, Error, Result};

/// How often the page is polled while waiting for network idle
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Chrome exits when it sees no commands for this long. Cards may be
/// requested sporadically during a long site build, so keep it generous.
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(600);

/// Reports -1 while the document, its fonts or its subresources are still
/// loading, otherwise the number of finished resource requests.
const NETWORK_STATE_SCRIPT: &str = r#"(function() {
    if (document.readyState !== 'complete') { return -1; }
    if (document.fonts && document.fonts.status !== 'loaded') { return -1; }
    return performance.getEntriesByType('resource').length;
})()"#;

/// CDP-based card engine (uses the `headless_chrome` crate)
///
/// Launches one headless Chrome instance with its window sized to the card
/// viewport and drives a single tab.
pub struct CdpEngine {
    browser: Option<Browser>,
    tab: Option<Arc<Tab>>,
    config: EngineConfig,
}

impl CdpEngine {
    fn tab(&self) -> Result<&Arc<Tab>> {
        self.tab
            .as_ref()
            .ok_or_else(|| Error::Other("browser page is closed".into()))
    }

    fn network_state(tab: &Tab) -> Result<Option<i64>> {
        let result = tab
            .evaluate(NETWORK_STATE_SCRIPT, false)
            .map_err(|e| Error::LoadError(format!("Failed to poll page state: {}", e)))?;
        Ok(result.value.and_then(|v| v.as_i64()).filter(|n| *n >= 0))
    }
}

impl Engine for CdpEngine {
    fn new(config: &EngineConfig) -> Result<Self>
    where
        Self: Sized,
    {
        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(config.sandbox)
            .window_size(Some((config.viewport.width, config.viewport.height)))
            .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
            .build()
            .map_err(|e| Error::InitializationError(format!("Failed to build launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| Error::InitializationError(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| Error::InitializationError(format!("Failed to create tab: {}", e)))?;
        tab.set_default_timeout(Duration::from_millis(config.timeout_ms));

        debug!(
            "chrome launched with a {}x{} window",
            config.viewport.width, config.viewport.height
        );

        Ok(Self {
            browser: Some(browser),
            tab: Some(tab),
            config: config.clone(),
        })
    }

    fn load_url(&mut self, url: &str) -> Result<()> {
        let tab = self.tab()?;
        tab.navigate_to(url)
            .map_err(|e| Error::LoadError(format!("Navigation failed: {}", e)))?;
        tab.wait_until_navigated()
            .map_err(|e| Error::LoadError(format!("Wait for navigation failed: {}", e)))?;
        Ok(())
    }

    fn wait_for_network_idle(&mut self) -> Result<()> {
        let tab = self.tab()?;
        let timeout = Duration::from_millis(self.config.timeout_ms);
        let idle = Duration::from_millis(self.config.network_idle_ms);

        let started = Instant::now();
        let mut quiet_since = started;
        let mut last = None;
        loop {
            let state = Self::network_state(tab)?;
            let now = Instant::now();
            match state {
                Some(count) if last == Some(count) => {
                    if now.duration_since(quiet_since) >= idle {
                        return Ok(());
                    }
                }
                _ => quiet_since = now,
            }
            last = state;

            if now.duration_since(started) >= timeout {
                return Err(Error::Timeout(self.config.timeout_ms));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn render_png(&self) -> Result<Vec<u8>> {
        self.tab()?
            .capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, None, true)
            .map_err(|e| Error::RenderError(format!("Screenshot failed: {}", e)))
    }

    fn close(&mut self) -> Result<()> {
        if let Some(tab) = self.tab.take() {
            if let Err(e) = tab.close(false) {
                warn!("Failed to close tab: {}", e);
            }
        }
        // Dropping the browser terminates the Chrome process and its transport.
        if let Some(browser) = self.browser.take() {
            drop(browser);
        }
        Ok(())
    }
}
