//! Headless browser session contract.
//!
//! The scraper drives a JavaScript-rendered listings site, so it needs a real
//! browser. This crate describes the small surface it uses as a pair of
//! traits and ships two implementations:
//!
//! - [`chromium`] - Chrome/Chromium over the DevTools protocol
//! - [`testing`] - an in-process engine that serves fixed HTML pages
//!
//! # Example
//!
//! ```rust,ignore
//! use browser_session::{ChromiumConfig, ChromiumEngine, RenderSession, RenderingEngine};
//!
//! let engine = ChromiumEngine::new(ChromiumConfig::default());
//! let mut session = engine.open_session().await?;
//! session.navigate("https://example.com/").await?;
//! let cards = session.find_elements(".card").await?;
//! session.close().await?;
//! ```

pub mod chromium;
pub mod error;
pub mod testing;

pub use chromium::{ChromiumConfig, ChromiumEngine, ChromiumSession};
pub use error::{Result, SessionError};

use std::time::Duration;

use async_trait::async_trait;

/// Acquires rendering sessions.
#[async_trait]
pub trait RenderingEngine: Send + Sync {
    type Session: RenderSession;

    /// Start a fresh browser session.
    async fn open_session(&self) -> Result<Self::Session>;
}

/// A live, controllable browser tab.
///
/// Elements are opaque handles tied to the document that produced them;
/// after a navigation or click they may become stale.
#[async_trait]
pub trait RenderSession: Send + Sized {
    type Element: Send + Sync;

    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Block until at least one element matches `selector`, or fail with
    /// [`SessionError::Timeout`].
    async fn wait_for_element(&mut self, selector: &str, timeout: Duration) -> Result<()>;

    /// All elements matching a CSS selector, in document order.
    async fn find_elements(&mut self, selector: &str) -> Result<Vec<Self::Element>>;

    async fn read_attribute(&mut self, element: &Self::Element, name: &str)
        -> Result<Option<String>>;

    async fn read_text(&mut self, element: &Self::Element) -> Result<String>;

    /// Serialized markup of the element and its subtree.
    async fn outer_html(&mut self, element: &Self::Element) -> Result<String>;

    async fn click(&mut self, element: &Self::Element) -> Result<()>;

    /// Tear the session down, releasing the browser.
    async fn close(self) -> Result<()>;
}
