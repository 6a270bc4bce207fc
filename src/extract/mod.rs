//! Field→selector extraction against a live browser session.

pub mod normalize;
pub mod scroll;

use crate::browser::{BrowserSession, ElementHandle};
use crate::profile::FieldSpec;
use crate::record::{RawRecord, Subject};
use anyhow::Result;

/// Default bounded wait for a field's selector to appear.
pub const FIELD_WAIT_TIMEOUT_MS: u64 = 5_000;

/// Stateless extractor applying a declarative field map to a page.
///
/// A field whose selector matches nothing within the wait budget yields an
/// empty value list, never an error — missing data is an answer.
pub struct PageExtractor {
    fields: Vec<FieldSpec>,
    wait_timeout_ms: u64,
}

impl PageExtractor {
    /// Create an extractor for the given field map.
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self {
            fields,
            wait_timeout_ms: FIELD_WAIT_TIMEOUT_MS,
        }
    }

    /// Override the per-field wait budget.
    pub fn with_wait_timeout(mut self, timeout_ms: u64) -> Self {
        self.wait_timeout_ms = timeout_ms;
        self
    }

    /// The field map this extractor applies.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Extract one record from the current page.
    pub async fn extract(
        &self,
        session: &mut dyn BrowserSession,
        subject: &Subject,
    ) -> RawRecord {
        let mut record = RawRecord::new(subject.clone());
        for field in &self.fields {
            let mut values = Vec::new();
            match session
                .wait_for_selector(&field.selector, self.wait_timeout_ms)
                .await
            {
                Ok(true) => match session.query_all(&field.selector).await {
                    Ok(handles) => {
                        for handle in &handles {
                            match self.read(session, handle, field).await {
                                Ok(value) => values.push(value),
                                Err(e) => {
                                    tracing::warn!(field = %field.name, "element read failed: {e:#}")
                                }
                            }
                        }
                    }
                    Err(e) => tracing::warn!(field = %field.name, "query failed: {e:#}"),
                },
                Ok(false) => {
                    tracing::debug!(selector = %field.selector, "no element found for selector")
                }
                Err(e) => tracing::warn!(field = %field.name, "wait failed: {e:#}"),
            }
            record.fields.insert(field.name.clone(), values);
        }
        record
    }

    /// Extract one record scoped to an element (e.g. a chart table row).
    ///
    /// No per-field wait here: the caller has already waited for the
    /// enclosing container to render.
    pub async fn extract_within(
        &self,
        session: &mut dyn BrowserSession,
        root: &ElementHandle,
        subject: &Subject,
    ) -> RawRecord {
        let mut record = RawRecord::new(subject.clone());
        for field in &self.fields {
            let mut values = Vec::new();
            match session.query_within(root, &field.selector).await {
                Ok(handles) => {
                    for handle in &handles {
                        match self.read(session, handle, field).await {
                            Ok(value) => values.push(value),
                            Err(e) => {
                                tracing::warn!(field = %field.name, "element read failed: {e:#}")
                            }
                        }
                    }
                }
                Err(e) => tracing::warn!(field = %field.name, "query failed: {e:#}"),
            }
            record.fields.insert(field.name.clone(), values);
        }
        record
    }

    async fn read(
        &self,
        session: &mut dyn BrowserSession,
        handle: &ElementHandle,
        field: &FieldSpec,
    ) -> Result<String> {
        match &field.attribute {
            Some(attr) => Ok(session
                .element_attribute(handle, attr)
                .await?
                .unwrap_or_default()),
            None => session.element_text(handle).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::testing::{FakeElement, FakePage, FakeSession};
    use crate::profile::FieldKind;

    fn field(name: &str, selector: &str) -> FieldSpec {
        FieldSpec {
            name: name.to_string(),
            selector: selector.to_string(),
            kind: FieldKind::Text,
            attribute: None,
        }
    }

    #[tokio::test]
    async fn test_extract_collects_all_matches_in_order() {
        let page = FakePage::default()
            .with_list(".title", vec![FakeElement::text("Dark")])
            .with_list(
                ".platform",
                vec![FakeElement::text("Netflix"), FakeElement::text("Max")],
            );
        let mut session = FakeSession::new()
            .with_page("http://t/", page)
            .at("http://t/");

        let extractor =
            PageExtractor::new(vec![field("title", ".title"), field("platforms", ".platform")]);
        let subject = Subject::new("tv-shows", "chart");
        let record = extractor.extract(&mut session, &subject).await;

        assert_eq!(record.fields["title"], vec!["Dark"]);
        assert_eq!(record.fields["platforms"], vec!["Netflix", "Max"]);
    }

    #[tokio::test]
    async fn test_missing_selector_yields_empty_not_error() {
        let page = FakePage::default().with_list(".title", vec![FakeElement::text("Dark")]);
        let mut session = FakeSession::new()
            .with_page("http://t/", page)
            .at("http://t/");

        let extractor = PageExtractor::new(vec![
            field("title", ".title"),
            field("year", ".release-year"),
        ])
        .with_wait_timeout(10);
        let subject = Subject::new("tv-shows", "chart");
        let record = extractor.extract(&mut session, &subject).await;

        assert_eq!(record.fields["title"], vec!["Dark"]);
        assert!(record.fields["year"].is_empty());
    }

    #[tokio::test]
    async fn test_extract_within_scopes_to_row() {
        let page = FakePage::default()
            .with_list(".row", vec![FakeElement::text(""), FakeElement::text("")])
            .with_list(".row[0] .title", vec![FakeElement::text("First")])
            .with_list(".row[1] .title", vec![FakeElement::text("Second")]);
        let mut session = FakeSession::new()
            .with_page("http://t/", page)
            .at("http://t/");

        let extractor = PageExtractor::new(vec![field("title", ".title")]);
        let subject = Subject::new("movies", "chart");
        let rows = session.query_all(".row").await.unwrap();

        let first = extractor
            .extract_within(&mut session, &rows[0], &subject)
            .await;
        let second = extractor
            .extract_within(&mut session, &rows[1], &subject)
            .await;

        assert_eq!(first.fields["title"], vec!["First"]);
        assert_eq!(second.fields["title"], vec!["Second"]);
    }

    #[tokio::test]
    async fn test_attribute_extraction() {
        let page = FakePage::default().with_list(
            ".offer img",
            vec![FakeElement::text("").with_attr("title", "Netflix")],
        );
        let mut session = FakeSession::new()
            .with_page("http://t/", page)
            .at("http://t/");

        let extractor = PageExtractor::new(vec![FieldSpec {
            name: "platforms".into(),
            selector: ".offer img".into(),
            kind: FieldKind::List,
            attribute: Some("title".into()),
        }]);
        let subject = Subject::new("movies", "chart");
        let record = extractor.extract(&mut session, &subject).await;

        assert_eq!(record.fields["platforms"], vec!["Netflix"]);
    }
}
