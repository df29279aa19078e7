//! In-process rendering engine for tests.
//!
//! [`FixtureEngine`] serves a fixed list of HTML documents as if they were the
//! successive result pages of a client-rendered site. Clicking a `<button>`
//! whose text equals the configured next label moves to the following
//! document; elements taken from an earlier document then report as stale.
//!
//! Failure knobs cover the paths a real browser exercises: launch and
//! navigation failures, lookup errors for a given selector, and stale cards
//! (any element carrying a `data-fixture-stale` attribute).

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};

use crate::error::{Result, SessionError};
use crate::{RenderSession, RenderingEngine};

/// Marker attribute that makes an element fail every read.
pub const STALE_MARKER: &str = "data-fixture-stale";

#[derive(Default)]
struct Shared {
    pages: Vec<String>,
    next_label: String,
    fail_launch: bool,
    fail_navigation: bool,
    failing_selectors: HashSet<String>,
    opened: AtomicUsize,
    closed: AtomicUsize,
    clicks: AtomicUsize,
    furthest_page: AtomicUsize,
    visited: Mutex<Vec<String>>,
}

/// A rendering engine backed by in-memory HTML pages.
#[derive(Clone)]
pub struct FixtureEngine {
    shared: Arc<Shared>,
}

impl Default for FixtureEngine {
    fn default() -> Self {
        Self::new(Vec::<String>::new())
    }
}

impl FixtureEngine {
    /// Create an engine serving `pages` in order, starting at the first.
    pub fn new<I, S>(pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            shared: Arc::new(Shared {
                pages: pages.into_iter().map(Into::into).collect(),
                next_label: "Next".to_string(),
                ..Default::default()
            }),
        }
    }

    fn configure(mut self, apply: impl FnOnce(&mut Shared)) -> Self {
        let shared = Arc::get_mut(&mut self.shared)
            .expect("configure FixtureEngine before cloning it or opening sessions");
        apply(shared);
        self
    }

    /// Text of the button that advances to the next page.
    pub fn with_next_label(self, label: impl Into<String>) -> Self {
        let label = label.into();
        self.configure(|s| s.next_label = label)
    }

    /// Make `open_session` fail.
    pub fn failing_launch(self) -> Self {
        self.configure(|s| s.fail_launch = true)
    }

    /// Make `navigate` fail.
    pub fn failing_navigation(self) -> Self {
        self.configure(|s| s.fail_navigation = true)
    }

    /// Make `find_elements` fail for exactly this selector string.
    pub fn failing_lookup(self, selector: impl Into<String>) -> Self {
        let selector = selector.into();
        self.configure(|s| {
            s.failing_selectors.insert(selector);
        })
    }

    pub fn sessions_opened(&self) -> usize {
        self.shared.opened.load(Ordering::SeqCst)
    }

    pub fn sessions_closed(&self) -> usize {
        self.shared.closed.load(Ordering::SeqCst)
    }

    pub fn clicks(&self) -> usize {
        self.shared.clicks.load(Ordering::SeqCst)
    }

    /// One-based number of the deepest page any session reached.
    pub fn furthest_page(&self) -> usize {
        self.shared.furthest_page.load(Ordering::SeqCst)
    }

    pub fn visited(&self) -> Vec<String> {
        self.shared
            .visited
            .lock()
            .map(|v| v.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RenderingEngine for FixtureEngine {
    type Session = FixtureSession;

    async fn open_session(&self) -> Result<FixtureSession> {
        if self.shared.fail_launch {
            return Err(SessionError::Launch("fixture launch failure".to_string()));
        }
        self.shared.opened.fetch_add(1, Ordering::SeqCst);
        Ok(FixtureSession {
            shared: Arc::clone(&self.shared),
            current: None,
        })
    }
}

/// Snapshot of an element taken from one fixture page.
#[derive(Debug, Clone)]
pub struct FixtureElement {
    page: usize,
    tag: String,
    text: String,
    html: String,
    attributes: Vec<(String, String)>,
}

impl FixtureElement {
    fn is_stale_marked(&self) -> bool {
        self.attributes.iter().any(|(name, _)| name == STALE_MARKER)
    }
}

pub struct FixtureSession {
    shared: Arc<Shared>,
    /// Index of the page being shown; `None` before the first navigation
    current: Option<usize>,
}

impl FixtureSession {
    fn current_page(&self) -> Result<usize> {
        self.current
            .ok_or_else(|| SessionError::Navigation {
                url: "about:blank".to_string(),
                reason: "no page loaded".to_string(),
            })
    }

    fn select(&self, selector: &str) -> Result<Vec<FixtureElement>> {
        let page = self.current_page()?;
        let parsed = Selector::parse(selector).map_err(|e| SessionError::InvalidSelector {
            selector: selector.to_string(),
            reason: format!("{e:?}"),
        })?;

        let document = Html::parse_document(&self.shared.pages[page]);
        let elements = document
            .select(&parsed)
            .map(|el| FixtureElement {
                page,
                tag: el.value().name().to_string(),
                text: el.text().collect::<String>(),
                html: el.html(),
                attributes: el
                    .value()
                    .attrs()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            })
            .collect();
        Ok(elements)
    }

    fn live<'e>(&self, element: &'e FixtureElement) -> Result<&'e FixtureElement> {
        if Some(element.page) != self.current || element.is_stale_marked() {
            return Err(SessionError::StaleElement(format!(
                "<{}> from page {}",
                element.tag,
                element.page + 1
            )));
        }
        Ok(element)
    }

    fn show(&mut self, page: usize) {
        self.current = Some(page);
        self.shared.furthest_page.fetch_max(page + 1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RenderSession for FixtureSession {
    type Element = FixtureElement;

    async fn navigate(&mut self, url: &str) -> Result<()> {
        if let Ok(mut visited) = self.shared.visited.lock() {
            visited.push(url.to_string());
        }
        if self.shared.fail_navigation || self.shared.pages.is_empty() {
            return Err(SessionError::Navigation {
                url: url.to_string(),
                reason: "fixture navigation failure".to_string(),
            });
        }
        self.show(0);
        Ok(())
    }

    async fn wait_for_element(&mut self, selector: &str, timeout: Duration) -> Result<()> {
        if self.select(selector)?.is_empty() {
            return Err(SessionError::Timeout {
                selector: selector.to_string(),
                timeout,
            });
        }
        Ok(())
    }

    async fn find_elements(&mut self, selector: &str) -> Result<Vec<FixtureElement>> {
        if self.shared.failing_selectors.contains(selector) {
            return Err(SessionError::Protocol(Box::new(std::io::Error::other(
                format!("fixture lookup failure for `{selector}`"),
            ))));
        }
        self.select(selector)
    }

    async fn read_attribute(
        &mut self,
        element: &FixtureElement,
        name: &str,
    ) -> Result<Option<String>> {
        let element = self.live(element)?;
        Ok(element
            .attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone()))
    }

    async fn read_text(&mut self, element: &FixtureElement) -> Result<String> {
        Ok(self.live(element)?.text.clone())
    }

    async fn outer_html(&mut self, element: &FixtureElement) -> Result<String> {
        Ok(self.live(element)?.html.clone())
    }

    async fn click(&mut self, element: &FixtureElement) -> Result<()> {
        let element = self.live(element)?;
        self.shared.clicks.fetch_add(1, Ordering::SeqCst);

        let advances = element.tag == "button" && element.text.trim() == self.shared.next_label;
        let page = element.page;
        if advances && page + 1 < self.shared.pages.len() {
            self.show(page + 1);
        }
        Ok(())
    }

    async fn close(self) -> Result<()> {
        self.shared.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE_ONE: &str = r#"<html><body>
        <div class="card">one</div>
        <div class="card">two</div>
        <button>Next</button>
    </body></html>"#;

    const PAGE_TWO: &str = r#"<html><body>
        <div class="card" data-fixture-stale="1">three</div>
        <button disabled>Next</button>
    </body></html>"#;

    #[tokio::test]
    async fn test_click_next_advances_and_stales_old_elements() {
        let engine = FixtureEngine::new([PAGE_ONE, PAGE_TWO]);
        let mut session = engine.open_session().await.unwrap();
        session.navigate("https://fixture.test/").await.unwrap();

        let cards = session.find_elements(".card").await.unwrap();
        assert_eq!(cards.len(), 2);
        assert_eq!(session.read_text(&cards[0]).await.unwrap(), "one");

        let next = session.find_elements("button").await.unwrap();
        session.click(&next[0]).await.unwrap();
        assert_eq!(engine.furthest_page(), 2);

        let err = session.read_text(&cards[0]).await.unwrap_err();
        assert!(matches!(err, SessionError::StaleElement(_)));

        session.close().await.unwrap();
        assert_eq!(engine.sessions_opened(), 1);
        assert_eq!(engine.sessions_closed(), 1);
    }

    #[test]
    #[should_panic(expected = "configure FixtureEngine before cloning")]
    fn test_configuring_a_shared_engine_panics() {
        let engine = FixtureEngine::new([PAGE_ONE]);
        let _handle = engine.clone();
        let _ = engine.failing_lookup("button");
    }

    #[tokio::test]
    async fn test_stale_marker_fails_reads() {
        let engine = FixtureEngine::new([PAGE_TWO]);
        let mut session = engine.open_session().await.unwrap();
        session.navigate("https://fixture.test/").await.unwrap();

        let cards = session.find_elements(".card").await.unwrap();
        assert!(session.outer_html(&cards[0]).await.is_err());

        let button = session.find_elements("button").await.unwrap();
        let disabled = session.read_attribute(&button[0], "disabled").await.unwrap();
        assert_eq!(disabled, Some(String::new()));
    }

    #[tokio::test]
    async fn test_wait_times_out_without_match() {
        let engine = FixtureEngine::new([PAGE_ONE]);
        let mut session = engine.open_session().await.unwrap();
        session.navigate("https://fixture.test/").await.unwrap();

        let err = session
            .wait_for_element(".missing", Duration::from_secs(15))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Timeout { .. }));
        assert!(session
            .wait_for_element(".card", Duration::from_secs(15))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_failure_knobs() {
        let engine = FixtureEngine::new([PAGE_ONE]).failing_lookup("button");
        let mut session = engine.open_session().await.unwrap();
        session.navigate("https://fixture.test/").await.unwrap();
        assert!(session.find_elements("button").await.is_err());
        assert!(session.find_elements(".card").await.is_ok());

        assert!(FixtureEngine::new([PAGE_ONE])
            .failing_launch()
            .open_session()
            .await
            .is_err());

        let engine = FixtureEngine::new([PAGE_ONE]).failing_navigation();
        let mut session = engine.open_session().await.unwrap();
        assert!(session.navigate("https://fixture.test/").await.is_err());
        assert_eq!(engine.visited(), vec!["https://fixture.test/".to_string()]);
    }
}
