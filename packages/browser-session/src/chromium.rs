//! Chromium backend over the DevTools protocol.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{Result, SessionError};
use crate::{RenderSession, RenderingEngine};

/// How often `wait_for_element` re-queries the DOM.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Launch options for a Chromium session.
#[derive(Debug, Clone)]
pub struct ChromiumConfig {
    pub headless: bool,
    /// Explicit browser binary; auto-detected when `None`
    pub executable: Option<PathBuf>,
    pub window_size: (u32, u32),
    /// Per-command DevTools timeout
    pub request_timeout: Duration,
}

impl Default for ChromiumConfig {
    fn default() -> Self {
        Self {
            headless: true,
            executable: None,
            window_size: (1280, 1024),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ChromiumConfig {
    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn with_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = Some(path.into());
        self
    }

    fn to_browser_config(&self) -> Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-dev-shm-usage")
            .window_size(self.window_size.0, self.window_size.1)
            .request_timeout(self.request_timeout);

        if !self.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }

        builder.build().map_err(SessionError::Launch)
    }
}

/// Launches one Chromium process per session.
#[derive(Debug, Clone, Default)]
pub struct ChromiumEngine {
    config: ChromiumConfig,
}

impl ChromiumEngine {
    pub fn new(config: ChromiumConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl RenderingEngine for ChromiumEngine {
    type Session = ChromiumSession;

    async fn open_session(&self) -> Result<ChromiumSession> {
        let config = self.config.to_browser_config()?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| SessionError::Launch(e.to_string()))?;

        // The handler drives the websocket; nothing works unless it is polled.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "browser handler event failed");
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                return Err(SessionError::Launch(e.to_string()));
            }
        };

        debug!(headless = self.config.headless, "chromium session opened");

        Ok(ChromiumSession {
            browser: Some(browser),
            page,
            handler_task,
        })
    }
}

/// One browser process with a single tab.
pub struct ChromiumSession {
    browser: Option<Browser>,
    page: Page,
    handler_task: JoinHandle<()>,
}

impl ChromiumSession {
    fn ensure_open(&self) -> Result<()> {
        if self.browser.is_none() {
            return Err(SessionError::Closed);
        }
        Ok(())
    }
}

fn protocol(err: CdpError) -> SessionError {
    SessionError::Protocol(Box::new(err))
}

/// Element calls fail with a node lookup error once the DOM has been replaced.
fn element_error(err: CdpError) -> SessionError {
    let message = err.to_string();
    if message.contains("node") || message.contains("Node") {
        SessionError::StaleElement(message)
    } else {
        protocol(err)
    }
}

#[async_trait]
impl RenderSession for ChromiumSession {
    type Element = Element;

    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.ensure_open()?;
        self.page
            .goto(url)
            .await
            .map_err(|e| SessionError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn wait_for_element(&mut self, selector: &str, timeout: Duration) -> Result<()> {
        self.ensure_open()?;
        let page = &self.page;
        let poll = async {
            loop {
                match page.find_elements(selector).await {
                    Ok(found) if !found.is_empty() => return,
                    Ok(_) => {}
                    Err(e) => debug!(selector, error = %e, "element lookup failed while waiting"),
                }
                tokio::time::sleep(WAIT_POLL_INTERVAL).await;
            }
        };

        tokio::time::timeout(timeout, poll)
            .await
            .map_err(|_| SessionError::Timeout {
                selector: selector.to_string(),
                timeout,
            })
    }

    async fn find_elements(&mut self, selector: &str) -> Result<Vec<Element>> {
        self.ensure_open()?;
        self.page.find_elements(selector).await.map_err(protocol)
    }

    async fn read_attribute(&mut self, element: &Element, name: &str) -> Result<Option<String>> {
        element.attribute(name).await.map_err(element_error)
    }

    async fn read_text(&mut self, element: &Element) -> Result<String> {
        let text = element.inner_text().await.map_err(element_error)?;
        Ok(text.unwrap_or_default())
    }

    async fn outer_html(&mut self, element: &Element) -> Result<String> {
        let html = element.outer_html().await.map_err(element_error)?;
        html.ok_or_else(|| SessionError::StaleElement("element has no markup".to_string()))
    }

    async fn click(&mut self, element: &Element) -> Result<()> {
        element.click().await.map_err(element_error)?;
        Ok(())
    }

    async fn close(mut self) -> Result<()> {
        let Some(mut browser) = self.browser.take() else {
            return Err(SessionError::Closed);
        };

        let closed = browser.close().await.map_err(protocol);
        if let Err(e) = browser.wait().await {
            warn!(error = %e, "failed waiting for browser process to exit");
        }
        self.handler_task.abort();
        closed.map(|_| ())
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        if self.browser.is_some() {
            warn!("chromium session dropped without close; aborting handler");
        }
        self.handler_task.abort();
    }
}
