//! Google News RSS search — HTTP fetch and XML parse of headline items.
//!
//! Not a browser flow: the RSS endpoint serves plain XML, so a plain HTTP
//! client is enough. Used by the `headlines` command for ad-hoc topic
//! listings alongside the browser-driven volume counts.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Serialize;
use std::time::Duration as StdDuration;

/// RSS search endpoint.
const FEED_URL: &str = "https://news.google.com/rss/search";

/// One parsed feed item.
#[derive(Debug, Clone, Serialize)]
pub struct NewsHeadline {
    pub title: String,
    pub link: String,
    pub published: Option<DateTime<Utc>>,
    pub source: Option<String>,
    pub description: Option<String>,
}

/// Client for the news RSS search feed.
#[derive(Clone)]
pub struct FeedClient {
    client: reqwest::Client,
    lang_param: String,
}

impl FeedClient {
    /// Create a client with language and country preferences.
    pub fn new(language: &str, country: &str, timeout_ms: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(StdDuration::from_millis(timeout_ms))
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(concat!("chartwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        let lang_param = if language == "pt-BR" && country == "BR" {
            "hl=pt-BR&gl=BR&ceid=BR%3Apt-419".to_string()
        } else {
            format!("hl={language}&gl={country}&ceid={country}:en")
        };

        Self { client, lang_param }
    }

    /// Fetch headlines for a topic, newest first.
    pub async fn search(
        &self,
        topic: &str,
        max_results: Option<usize>,
    ) -> Result<Vec<NewsHeadline>> {
        let query = format!("'{}'", encode_topic(topic));
        self.fetch(&query, max_results).await
    }

    /// Fetch headlines for a topic published on one calendar day.
    pub async fn search_on(
        &self,
        topic: &str,
        date: NaiveDate,
        max_results: Option<usize>,
    ) -> Result<Vec<NewsHeadline>> {
        let next = date + Duration::days(1);
        let query = format!(
            "'{}'+after:{}+before:{}",
            encode_topic(topic),
            date.format("%Y-%m-%d"),
            next.format("%Y-%m-%d"),
        );
        self.fetch(&query, max_results).await
    }

    async fn fetch(&self, query: &str, max_results: Option<usize>) -> Result<Vec<NewsHeadline>> {
        let url = format!("{FEED_URL}?q={query}&{}", self.lang_param);
        tracing::debug!(%url, "fetching news feed");
        let body = self
            .client
            .get(&url)
            .send()
            .await
            .context("feed request failed")?
            .error_for_status()
            .context("feed request rejected")?
            .text()
            .await
            .context("failed to read feed body")?;
        parse_feed(&body, max_results)
    }
}

/// Parse an RSS feed into headline records, newest first.
pub fn parse_feed(xml: &str, max_results: Option<usize>) -> Result<Vec<NewsHeadline>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut headlines = Vec::new();
    let mut in_item = false;
    let mut current_tag: Option<String> = None;
    let mut item = PartialItem::default();

    loop {
        match reader.read_event().context("malformed feed XML")? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                if name == "item" {
                    in_item = true;
                    item = PartialItem::default();
                } else if in_item {
                    current_tag = Some(name);
                }
            }
            Event::Text(t) if in_item => {
                let text = t.unescape().context("malformed feed text")?.into_owned();
                item.push(current_tag.as_deref(), &text);
            }
            Event::CData(t) if in_item => {
                let text = String::from_utf8_lossy(&t.into_inner()).into_owned();
                item.push(current_tag.as_deref(), &text);
            }
            Event::End(e) => {
                let name = e.name();
                if name.as_ref() == b"item" {
                    in_item = false;
                    if let Some(headline) = item.take() {
                        headlines.push(headline);
                        if max_results.is_some_and(|max| headlines.len() >= max) {
                            break;
                        }
                    }
                } else {
                    current_tag = None;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    // newest first
    headlines.sort_by(|a, b| b.published.cmp(&a.published));
    Ok(headlines)
}

#[derive(Default)]
struct PartialItem {
    title: Option<String>,
    link: Option<String>,
    pub_date: Option<String>,
    source: Option<String>,
    description: Option<String>,
}

impl PartialItem {
    fn push(&mut self, tag: Option<&str>, text: &str) {
        let slot = match tag {
            Some("title") => &mut self.title,
            Some("link") => &mut self.link,
            Some("pubDate") => &mut self.pub_date,
            Some("source") => &mut self.source,
            Some("description") => &mut self.description,
            _ => return,
        };
        match slot {
            Some(existing) => existing.push_str(text),
            None => *slot = Some(text.to_string()),
        }
    }

    fn take(&mut self) -> Option<NewsHeadline> {
        let title = self.title.take()?;
        let published = self
            .pub_date
            .take()
            .and_then(|s| DateTime::parse_from_rfc2822(&s).ok())
            .map(|dt| dt.with_timezone(&Utc));
        Some(NewsHeadline {
            title,
            link: self.link.take().unwrap_or_default(),
            published,
            source: self.source.take(),
            description: self.description.take(),
        })
    }
}

fn encode_topic(topic: &str) -> String {
    topic.replace(' ', "%20")
}
