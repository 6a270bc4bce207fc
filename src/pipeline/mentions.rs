//! News-volume collection — the incremental backfill pipeline.
//!
//! Subjects are the titles already present in the charts store. The
//! resolver computes the date range still missing from the mentions store,
//! then each subject is measured one day at a time by driving the browser
//! to a date-bounded news search and reading the result counter.

use super::{RunContext, RunError, RunResult, RunSummary};
use crate::browser::{BrowserSession, SessionFactory};
use crate::profile::{MentionsProfile, Profiles};
use crate::progress::{ProgressEventKind, RunStage};
use crate::record::{CollectionEntry, Payload, PayloadKind, Subject};
use crate::resolver::{self, DateRange};
use crate::store::CollectionStore;
use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use regex::Regex;
use std::time::{Duration, Instant};
use url::Url;

/// Options for the mentions backfill run.
#[derive(Debug, Clone)]
pub struct MentionsOptions {
    /// Earliest date the first load should cover. Defaults to the earliest
    /// chart date in the store.
    pub requested_earliest: Option<NaiveDate>,
    pub nav_timeout_ms: u64,
    /// Wait budget for the result counter to render.
    pub wait_timeout_ms: u64,
    /// Pause between day queries, to stay polite.
    pub throttle_ms: u64,
}

impl Default for MentionsOptions {
    fn default() -> Self {
        Self {
            requested_earliest: None,
            nav_timeout_ms: 30_000,
            wait_timeout_ms: 20_000,
            throttle_ms: 1_000,
        }
    }
}

/// Bring the mentions store up to date for every charted subject.
pub async fn run(
    ctx: &mut RunContext,
    store: &mut CollectionStore,
    factory: &dyn SessionFactory,
    profiles: &Profiles,
    options: &MentionsOptions,
) -> RunResult<RunSummary> {
    let today = chrono::Local::now().date_naive();
    run_with_today(ctx, store, factory, profiles, options, today).await
}

/// Testable entry point with an explicit `today`.
pub async fn run_with_today(
    ctx: &mut RunContext,
    store: &mut CollectionStore,
    factory: &dyn SessionFactory,
    profiles: &Profiles,
    options: &MentionsOptions,
    today: NaiveDate,
) -> RunResult<RunSummary> {
    ctx.enter(RunStage::ResolvingRange);

    let latest = store
        .latest_date(Some(PayloadKind::Mentions), None)
        .map_err(RunError::StateRead)?;
    let subjects = store
        .distinct_subjects(PayloadKind::Rank)
        .map_err(RunError::StateRead)?;
    let earliest = match options.requested_earliest {
        Some(date) => date,
        None => store
            .earliest_date(Some(PayloadKind::Rank))
            .map_err(RunError::StateRead)?
            .unwrap_or(today),
    };

    let Some(range) = resolver::resolve(latest, earliest, today) else {
        ctx.enter(RunStage::NoWorkNeeded);
        tracing::info!(run_id = %ctx.run_id, "mention counts are already up to date");
        return Ok(ctx.finish());
    };
    if subjects.is_empty() {
        ctx.enter(RunStage::NoWorkNeeded);
        tracing::info!(run_id = %ctx.run_id, "no charted subjects to measure");
        return Ok(ctx.finish());
    }

    ctx.emit(ProgressEventKind::RangeResolved {
        start: range.start,
        end: range.end,
        days: range.num_days(),
    });
    tracing::info!(
        run_id = %ctx.run_id,
        start = %range.start,
        end = %range.end,
        subjects = subjects.len(),
        "backfilling mention counts"
    );

    ctx.enter(RunStage::Collecting);
    let mut measured: Vec<(Subject, Vec<(NaiveDate, Option<String>)>)> = Vec::new();
    for subject in subjects {
        if ctx.interrupted() {
            tracing::warn!("interrupted — stopping before {subject}");
            break;
        }
        ctx.summary.subjects_attempted += 1;
        ctx.emit(ProgressEventKind::SubjectStarted {
            subject: subject.to_string(),
        });
        match collect_subject(factory, &profiles.mentions, options, &subject, &range).await {
            Ok(days) => {
                ctx.summary.subjects_succeeded += 1;
                ctx.emit(ProgressEventKind::SubjectCompleted {
                    subject: subject.to_string(),
                    records: days.len() as u32,
                });
                measured.push((subject, days));
            }
            Err(e) => {
                ctx.summary.subjects_skipped += 1;
                tracing::warn!("mention collection failed for {subject}: {e:#}");
                ctx.emit(ProgressEventKind::SubjectSkipped {
                    subject: subject.to_string(),
                    reason: format!("{e:#}"),
                });
            }
        }
    }

    ctx.enter(RunStage::Normalizing);
    let mut entries = Vec::new();
    for (subject, days) in measured {
        for (date, counter_text) in days {
            // unreadable counters record a zero measurement, not an error
            let count = counter_text
                .as_deref()
                .and_then(parse_result_count)
                .unwrap_or(0);
            entries.push(CollectionEntry::new(
                subject.clone(),
                date,
                Payload::Mentions { count },
            ));
        }
    }

    ctx.enter(RunStage::Merging);
    let started = Instant::now();
    let merged = store.merge(&entries).map_err(RunError::Merge)?;
    ctx.summary.entries_merged += merged as u32;
    ctx.emit(ProgressEventKind::MergeCompleted {
        entries: merged as u32,
        elapsed_ms: started.elapsed().as_millis() as u64,
    });
    Ok(ctx.finish())
}

/// Measure one subject across the whole range on a fresh session.
///
/// A day whose counter cannot be read yields `None` for that day and the
/// subject continues; only a session that cannot be driven at all fails
/// the subject.
async fn collect_subject(
    factory: &dyn SessionFactory,
    profile: &MentionsProfile,
    options: &MentionsOptions,
    subject: &Subject,
    range: &DateRange,
) -> Result<Vec<(NaiveDate, Option<String>)>> {
    let mut session = factory.new_session().await?;
    let mut days = Vec::new();
    for date in range.days() {
        match fetch_counter_text(session.as_mut(), profile, options, subject, date).await {
            Ok(text) => days.push((date, Some(text))),
            Err(e) => {
                tracing::warn!(%subject, %date, "day query failed: {e:#}");
                days.push((date, None));
            }
        }
        tokio::time::sleep(Duration::from_millis(options.throttle_ms)).await;
    }
    session.close().await.ok();
    Ok(days)
}

async fn fetch_counter_text(
    session: &mut dyn BrowserSession,
    profile: &MentionsProfile,
    options: &MentionsOptions,
    subject: &Subject,
    date: NaiveDate,
) -> Result<String> {
    let url = search_url(profile, subject, date)?;
    session.navigate(url.as_str(), options.nav_timeout_ms).await?;
    if !session
        .wait_for_selector(&profile.count_selector, options.wait_timeout_ms)
        .await?
    {
        bail!("result counter never rendered: {}", profile.count_selector);
    }
    let counters = session.query_all(&profile.count_selector).await?;
    let first = counters.first().context("result counter disappeared")?;
    session.element_text(first).await
}

/// Build the dated news-search URL for one subject and day.
///
/// `sbd:0` keeps duplicate results countable; the `cdr` bounds pin the
/// search to exactly one calendar day.
fn search_url(profile: &MentionsProfile, subject: &Subject, date: NaiveDate) -> Result<Url> {
    let day = date.format("%m/%d/%Y").to_string();
    let tbs = format!("cdr:1,cd_min:{day},cd_max:{day},sbd:0");
    Url::parse_with_params(
        &profile.search_url,
        &[
            ("q", subject.name.as_str()),
            ("tbm", "nws"),
            ("tbs", tbs.as_str()),
        ],
    )
    .with_context(|| format!("invalid search url: {}", profile.search_url))
}

/// Pull the first number out of a result-counter text.
///
/// Handles localized separators ("About 1,234 results",
/// "Cerca de 1.234 resultados"). `None` when no digits are present.
pub fn parse_result_count(text: &str) -> Option<u64> {
    let re = Regex::new(r"\d[\d.,\u{00a0}]*").ok()?;
    let matched = re.find(text)?.as_str();
    let digits: String = matched.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> MentionsProfile {
        MentionsProfile {
            search_url: "https://www.google.com/search".to_string(),
            count_selector: "#result-stats".to_string(),
        }
    }

    #[test]
    fn test_parse_result_count_localized() {
        assert_eq!(parse_result_count("About 1,234 results"), Some(1234));
        assert_eq!(parse_result_count("Cerca de 1.234 resultados"), Some(1234));
        assert_eq!(parse_result_count("7 results"), Some(7));
        assert_eq!(parse_result_count("About 12,345,678 results (0.42s)"), Some(12_345_678));
    }

    #[test]
    fn test_parse_result_count_no_digits() {
        assert_eq!(parse_result_count("No results found"), None);
        assert_eq!(parse_result_count(""), None);
    }

    #[test]
    fn test_search_url_pins_one_day() {
        let subject = Subject::new("Dark", "tv-shows");
        let date = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        let url = search_url(&profile(), &subject, date).unwrap();

        assert_eq!(url.host_str(), Some("www.google.com"));
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert!(pairs.contains(&("q".to_string(), "Dark".to_string())));
        assert!(pairs.contains(&("tbm".to_string(), "nws".to_string())));
        assert!(pairs.iter().any(|(k, v)| k == "tbs"
            && v.contains("cd_min:01/03/2024")
            && v.contains("cd_max:01/03/2024")));
    }

    #[test]
    fn test_search_url_encodes_topic() {
        let subject = Subject::new("Money Heist", "tv-shows");
        let date = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        let url = search_url(&profile(), &subject, date).unwrap();
        assert!(url.as_str().contains("q=Money+Heist") || url.as_str().contains("q=Money%20Heist"));
    }
}
