//! Infinite-scroll collection over a listing page.
//!
//! Drives two sessions: one holding the scrolling listing, one navigating to
//! each item's detail page. Items are processed strictly beyond the
//! previously-seen count, so nothing is extracted twice, and every scroll —
//! including one that reveals nothing — consumes budget, so a page that
//! stops producing content cannot loop forever.

use super::PageExtractor;
use crate::browser::{BrowserSession, ElementHandle};
use crate::record::{RawRecord, Subject};
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Navigation budget for each detail page.
pub const DETAIL_NAV_TIMEOUT_MS: u64 = 15_000;

/// Scroll-driven collector for paginated/infinite-scroll listings.
pub struct ScrollCollector {
    /// Selector matching one listing item.
    pub item_selector: String,
    /// Selector for the detail link inside an item.
    pub link_selector: String,
    /// Attribute carrying the detail URL.
    pub link_attribute: String,
    /// Stop once this many records have been collected.
    pub min_items: usize,
    /// Stop after this many scrolls regardless of yield.
    pub max_scrolls: usize,
    /// Wait budget for the initial listing render.
    pub wait_timeout_ms: u64,
    /// Where to drop a diagnostic screenshot when the listing never renders.
    pub screenshot_path: Option<PathBuf>,
}

impl ScrollCollector {
    /// Build a collector from a catalog profile.
    pub fn from_profile(
        profile: &crate::profile::CatalogProfile,
        min_items: usize,
        max_scrolls: usize,
    ) -> Self {
        Self {
            item_selector: profile.item_selector.clone(),
            link_selector: profile.link_selector.clone(),
            link_attribute: profile.link_attribute.clone(),
            min_items,
            max_scrolls,
            wait_timeout_ms: super::FIELD_WAIT_TIMEOUT_MS,
            screenshot_path: None,
        }
    }

    /// Drop a screenshot at `path` if the listing never renders.
    pub fn with_screenshot_path(mut self, path: PathBuf) -> Self {
        self.screenshot_path = Some(path);
        self
    }

    /// Collect item records until `min_items` is reached or the scroll
    /// budget runs out.
    ///
    /// Per-item failures are logged and skipped; a listing that never
    /// renders returns an empty sequence — the caller decides whether an
    /// empty result is fatal.
    pub async fn collect(
        &self,
        listing: &mut dyn BrowserSession,
        detail: &mut dyn BrowserSession,
        extractor: &PageExtractor,
        subject: &Subject,
    ) -> Vec<RawRecord> {
        match listing
            .wait_for_selector(&self.item_selector, self.wait_timeout_ms)
            .await
        {
            Ok(true) => {}
            Ok(false) | Err(_) => {
                tracing::warn!(
                    selector = %self.item_selector,
                    "listing never rendered, returning no items"
                );
                if let Some(path) = &self.screenshot_path {
                    if let Err(e) = listing.screenshot(path).await {
                        tracing::debug!("diagnostic screenshot failed: {e:#}");
                    }
                }
                return Vec::new();
            }
        }

        let mut collected: Vec<RawRecord> = Vec::new();
        let mut seen = 0usize;
        let mut scrolls = 0usize;

        loop {
            let items = match listing.query_all(&self.item_selector).await {
                Ok(items) => items,
                Err(e) => {
                    tracing::warn!("item query failed, stopping collection: {e:#}");
                    break;
                }
            };

            for item in items.iter().skip(seen) {
                // processed exactly once, success or not
                seen += 1;
                match self
                    .extract_item(listing, detail, extractor, subject, item)
                    .await
                {
                    Ok(record) => collected.push(record),
                    Err(e) => tracing::warn!("item #{seen} skipped: {e:#}"),
                }
                if collected.len() >= self.min_items {
                    break;
                }
            }
            tracing::debug!(
                collected = collected.len(),
                scrolls,
                "scroll pass complete"
            );

            if collected.len() >= self.min_items {
                break;
            }
            if scrolls >= self.max_scrolls {
                break;
            }
            if let Err(e) = listing.scroll().await {
                tracing::warn!("scroll failed, stopping collection: {e:#}");
                break;
            }
            scrolls += 1;
        }

        collected
    }

    async fn extract_item(
        &self,
        listing: &mut dyn BrowserSession,
        detail: &mut dyn BrowserSession,
        extractor: &PageExtractor,
        subject: &Subject,
        item: &ElementHandle,
    ) -> Result<RawRecord> {
        let links = listing.query_within(item, &self.link_selector).await?;
        let link = links.first().context("item has no detail link")?;
        let href = listing
            .element_attribute(link, &self.link_attribute)
            .await?
            .filter(|h| !h.is_empty())
            .context("detail link has no target")?;

        detail.navigate(&href, DETAIL_NAV_TIMEOUT_MS).await?;
        Ok(extractor.extract(detail, subject).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::testing::{FakeElement, FakePage, FakeSession};
    use crate::profile::{FieldKind, FieldSpec};

    const LISTING: &str = "http://charts.test/us/tv-shows";

    fn title_field() -> FieldSpec {
        FieldSpec {
            name: "title".into(),
            selector: "h1.title".into(),
            kind: FieldKind::Text,
            attribute: None,
        }
    }

    fn collector(min_items: usize, max_scrolls: usize) -> ScrollCollector {
        ScrollCollector {
            item_selector: ".item".into(),
            link_selector: "a".into(),
            link_attribute: "href".into(),
            min_items,
            max_scrolls,
            wait_timeout_ms: 10,
            screenshot_path: None,
        }
    }

    /// Listing with `total` items, `initial` visible, `per_scroll` revealed
    /// per scroll; detail pages d0..dN each carrying one title.
    fn sessions(total: usize, initial: usize, per_scroll: usize) -> (FakeSession, FakeSession) {
        let mut page = FakePage::default().with_visibility(".item", initial, per_scroll);
        let mut items = Vec::new();
        let mut detail = FakeSession::new();
        for i in 0..total {
            items.push(FakeElement::text(""));
            page = page.with_list(
                &format!(".item[{i}] a"),
                vec![FakeElement::text("").with_attr("href", &format!("http://d.test/{i}"))],
            );
            detail = detail.with_page(
                &format!("http://d.test/{i}"),
                FakePage::default()
                    .with_list("h1.title", vec![FakeElement::text(&format!("Title {i}"))]),
            );
        }
        page = page.with_list(".item", items);
        let listing = FakeSession::new().with_page(LISTING, page).at(LISTING);
        (listing, detail)
    }

    #[tokio::test]
    async fn test_stops_when_min_items_reached() {
        let (mut listing, mut detail) = sessions(6, 2, 2);
        let extractor = PageExtractor::new(vec![title_field()]).with_wait_timeout(10);
        let subject = Subject::new("tv-shows", "catalog");

        let records = collector(4, 10)
            .collect(&mut listing, &mut detail, &extractor, &subject)
            .await;

        assert_eq!(records.len(), 4);
        assert_eq!(records[0].first("title"), Some("Title 0"));
        assert_eq!(records[3].first("title"), Some("Title 3"));
        // reaching min_items stops further scrolling
        assert_eq!(listing.scroll_count, 1);
    }

    #[tokio::test]
    async fn test_scroll_budget_bounds_a_drying_page() {
        // 3 items total: 2 visible up front, 1 more on the first scroll,
        // nothing new afterwards
        let (mut listing, mut detail) = sessions(3, 2, 1);
        let extractor = PageExtractor::new(vec![title_field()]).with_wait_timeout(10);
        let subject = Subject::new("tv-shows", "catalog");

        let records = collector(5, 2)
            .collect(&mut listing, &mut detail, &extractor, &subject)
            .await;

        // budget exhausted with fewer than min_items — partial result, no loop
        assert_eq!(records.len(), 3);
        assert_eq!(listing.scroll_count, 2);
    }

    #[tokio::test]
    async fn test_no_item_extracted_twice() {
        let (mut listing, mut detail) = sessions(5, 1, 2);
        let extractor = PageExtractor::new(vec![title_field()]).with_wait_timeout(10);
        let subject = Subject::new("tv-shows", "catalog");

        let records = collector(5, 10)
            .collect(&mut listing, &mut detail, &extractor, &subject)
            .await;

        let mut titles: Vec<&str> = records.iter().filter_map(|r| r.first("title")).collect();
        let before = titles.len();
        titles.dedup();
        assert_eq!(titles.len(), before);
        assert_eq!(before, 5);
    }

    #[tokio::test]
    async fn test_bad_item_is_skipped_not_fatal() {
        let (mut listing, mut detail) = sessions(3, 3, 0);
        // break item #1's detail link
        if let Some(page) = listing.pages.get_mut(LISTING) {
            page.lists.insert(".item[1] a".into(), Vec::new());
        }
        let extractor = PageExtractor::new(vec![title_field()]).with_wait_timeout(10);
        let subject = Subject::new("tv-shows", "catalog");

        let records = collector(3, 0)
            .collect(&mut listing, &mut detail, &extractor, &subject)
            .await;

        let titles: Vec<&str> = records.iter().filter_map(|r| r.first("title")).collect();
        assert_eq!(titles, vec!["Title 0", "Title 2"]);
    }

    #[tokio::test]
    async fn test_unrendered_listing_returns_empty_with_screenshot() {
        let mut listing = FakeSession::new()
            .with_page(LISTING, FakePage::default())
            .at(LISTING);
        let mut detail = FakeSession::new();
        let extractor = PageExtractor::new(vec![title_field()]).with_wait_timeout(10);
        let subject = Subject::new("tv-shows", "catalog");

        let records = collector(5, 3)
            .with_screenshot_path(PathBuf::from("/tmp/listing_error.png"))
            .collect(&mut listing, &mut detail, &extractor, &subject)
            .await;

        assert!(records.is_empty());
        assert_eq!(listing.screenshots.len(), 1);
        assert_eq!(listing.scroll_count, 0);
    }
}
