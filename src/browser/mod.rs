//! Browser session abstraction for page-driving collection.
//!
//! Defines the `BrowserSession` capability the collection engine needs from
//! a browser (currently Chromium via chromiumoxide), so range resolution,
//! normalization, and merging stay unit-testable without a real browser.

pub mod chromium;

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

/// Positional reference to a DOM element.
///
/// A handle is a path of `(selector, index)` hops from the page root and is
/// re-resolved on every access. Indices follow DOM order at query time;
/// a handle that no longer resolves surfaces as an error the caller treats
/// as transient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle {
    pub(crate) path: Vec<(String, usize)>,
}

impl ElementHandle {
    /// Handle to the `index`-th page-level match of `selector`.
    pub fn root(selector: &str, index: usize) -> Self {
        Self {
            path: vec![(selector.to_string(), index)],
        }
    }

    /// Handle to the `index`-th match of `selector` inside this element.
    pub fn child(&self, selector: &str, index: usize) -> Self {
        let mut path = self.path.clone();
        path.push((selector.to_string(), index));
        Self { path }
    }

    /// Position among the siblings matched by the final selector hop.
    pub fn index(&self) -> usize {
        self.path.last().map(|(_, i)| *i).unwrap_or(0)
    }

    /// The `(selector, index)` hops from the page root to this element.
    pub fn path(&self) -> &[(String, usize)] {
        &self.path
    }
}

/// A single browser page driven by the collection engine.
///
/// Every wait takes an explicit timeout; an unbounded wait is a defect.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Navigate to a URL, waiting up to `timeout_ms` for the load.
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> Result<()>;

    /// Wait until at least one element matches `selector`.
    ///
    /// Returns `false` when the timeout elapses with no match — absence is
    /// an answer, not an error.
    async fn wait_for_selector(&mut self, selector: &str, timeout_ms: u64) -> Result<bool>;

    /// All current page-level matches of `selector`, in DOM order.
    async fn query_all(&mut self, selector: &str) -> Result<Vec<ElementHandle>>;

    /// All matches of `selector` inside `root`, in DOM order.
    async fn query_within(
        &mut self,
        root: &ElementHandle,
        selector: &str,
    ) -> Result<Vec<ElementHandle>>;

    /// Visible text of an element.
    async fn element_text(&mut self, handle: &ElementHandle) -> Result<String>;

    /// Attribute value of an element, `None` when the attribute is absent.
    async fn element_attribute(
        &mut self,
        handle: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>>;

    /// Scroll the page down one viewport.
    async fn scroll(&mut self) -> Result<()>;

    /// Save a screenshot of the current page (diagnostics on failure).
    async fn screenshot(&mut self, path: &Path) -> Result<()>;

    /// Close the page and release browser resources.
    async fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

/// Creates fresh browser sessions, one per independent page flow.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    /// Open a new page.
    async fn new_session(&self) -> Result<Box<dyn BrowserSession>>;
}


#[cfg(test)]
mod tests {
    use super::testing::{FakeElement, FakePage, FakeSession};
    use super::*;

    #[tokio::test]
    async fn test_fake_session_query_and_read() {
        let page = FakePage::default()
            .with_list(".row", vec![FakeElement::text("a"), FakeElement::text("b")])
            .with_list(".row[1] .cell", vec![FakeElement::text("inner")]);
        let mut session = FakeSession::new()
            .with_page("http://example.test/", page)
            .at("http://example.test/");

        let rows = session.query_all(".row").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(session.element_text(&rows[0]).await.unwrap(), "a");

        let cells = session.query_within(&rows[1], ".cell").await.unwrap();
        assert_eq!(cells.len(), 1);
        assert_eq!(session.element_text(&cells[0]).await.unwrap(), "inner");
    }

    #[tokio::test]
    async fn test_fake_session_visibility_grows_with_scroll() {
        let page = FakePage::default()
            .with_list(
                ".item",
                vec![
                    FakeElement::text("1"),
                    FakeElement::text("2"),
                    FakeElement::text("3"),
                ],
            )
            .with_visibility(".item", 1, 1);
        let mut session = FakeSession::new()
            .with_page("http://example.test/", page)
            .at("http://example.test/");

        assert_eq!(session.query_all(".item").await.unwrap().len(), 1);
        session.scroll().await.unwrap();
        assert_eq!(session.query_all(".item").await.unwrap().len(), 2);
        session.scroll().await.unwrap();
        session.scroll().await.unwrap();
        // capped at the scripted total
        assert_eq!(session.query_all(".item").await.unwrap().len(), 3);
    }
}
