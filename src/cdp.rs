//! Chrome DevTools Protocol surface implementation

use crate::surface::Surface;
use crate::{Error, RenderConfig, Result, Viewport};
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::types::Bounds;
use headless_chrome::{Browser, LaunchOptions};
use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;

// Computed style is empty until the stylesheet has been applied to <body>.
const READY_PROBE: &str = r#"(function() {
    if (!document.body) return false;
    const styles = window.getComputedStyle(document.body);
    return styles.backgroundColor !== '' && styles.fontFamily !== '';
})()"#;

/// Surface backed by a private headless Chrome process (uses the `headless_chrome` crate)
///
/// Every instance launches its own browser with a single tab; nothing is
/// shared between captures. Closing drops the browser, which terminates the
/// child process.
pub struct CdpSurface {
    browser: Option<Browser>,
    tab: Option<Arc<Tab>>,
    viewport: Viewport,
}

impl CdpSurface {
    /// Launch a browser sized to one chunk of the configured geometry.
    pub fn open(config: &RenderConfig) -> Result<Self> {
        let viewport = config.viewport();

        let mut builder = LaunchOptions::default_builder();
        builder
            .headless(true)
            .sandbox(config.sandbox)
            .window_size(Some((viewport.width, viewport.height)))
            .idle_browser_timeout(Duration::from_millis(config.ready_timeout_ms.max(30_000)));
        if let Some(path) = &config.chrome_path {
            builder.path(Some(path.clone()));
        }
        let launch_options = builder
            .build()
            .map_err(|e| Error::Render(format!("Failed to build launch options: {}", e)))?;

        info!("Launching browser ({}x{})", viewport.width, viewport.height);
        let browser = Browser::new(launch_options)
            .map_err(|e| Error::Render(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| Error::Render(format!("Failed to create tab: {}", e)))?;
        tab.set_default_timeout(Duration::from_millis(config.ready_timeout_ms));

        Ok(Self {
            browser: Some(browser),
            tab: Some(tab),
            viewport,
        })
    }

    fn tab(&self) -> Result<&Arc<Tab>> {
        self.tab
            .as_ref()
            .ok_or_else(|| Error::Render("surface already closed".into()))
    }

    fn evaluate(&self, expression: &str) -> Result<Option<serde_json::Value>> {
        let remote = self
            .tab()?
            .evaluate(expression, false)
            .map_err(|e| Error::Render(format!("Evaluation failed: {}", e)))?;
        Ok(remote.value)
    }

    fn resize(&self, width: u32, height: u32) -> Result<()> {
        self.tab()?
            .set_bounds(Bounds::Normal {
                left: None,
                top: None,
                width: Some(width as f64),
                height: Some(height as f64),
            })
            .map_err(|e| Error::Capture(format!("Failed to resize frame: {}", e)))?;
        Ok(())
    }
}

impl Surface for CdpSurface {
    fn load_html(&mut self, html: &str, width: u32) -> Result<()> {
        self.resize(width, self.viewport.height)
            .map_err(|e| Error::Render(e.to_string()))?;

        let tab = self.tab()?;
        let tree = tab
            .call_method(Page::GetFrameTree(None))
            .map_err(|e| Error::Render(format!("Failed to read frame tree: {}", e)))?;

        tab.call_method(Page::SetDocumentContent {
            frame_id: tree.frame_tree.frame.id,
            html: html.to_string(),
        })
        .map_err(|e| Error::Render(format!("Failed to load document: {}", e)))?;

        debug!("Loaded document ({} bytes)", html.len());
        Ok(())
    }

    fn is_ready(&mut self) -> Result<bool> {
        Ok(matches!(self.evaluate(READY_PROBE)?, Some(serde_json::Value::Bool(true))))
    }

    fn element_height(&mut self, selector: &str) -> Result<u32> {
        let quoted = serde_json::to_string(selector)
            .map_err(|e| Error::Render(format!("Bad selector {}: {}", selector, e)))?;
        let expression = format!(
            "(function() {{ const el = document.querySelector({}); return el ? Math.ceil(el.getBoundingClientRect().height) : 0; }})()",
            quoted
        );

        let height = self
            .evaluate(&expression)?
            .and_then(|v| v.as_f64())
            .ok_or_else(|| Error::Render(format!("No height returned for {}", selector)))?;

        Ok(height.max(0.0) as u32)
    }

    fn capture_png(&mut self, width: u32, height: u32) -> Result<Vec<u8>> {
        self.resize(width, height)?;

        let clip = Page::Viewport {
            x: 0.0,
            y: 0.0,
            width: width as f64,
            height: height as f64,
            scale: 1.0,
        };

        self.tab()?
            .capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, Some(clip), true)
            .map_err(|e| Error::Capture(format!("Screenshot failed: {}", e)))
    }

    fn close(&mut self) -> Result<()> {
        // Dropping the browser terminates the child process.
        drop(self.tab.take());
        if self.browser.take().is_some() {
            info!("Closing browser");
        }
        Ok(())
    }
}
