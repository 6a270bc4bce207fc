//! Chart collection — daily top-chart rows and the catalog sweep.
//!
//! Both runs snapshot rankings under today's calendar date: re-running the
//! same day overwrites the same (subject, date) keys in the store instead
//! of duplicating them.

use super::{RunContext, RunError, RunResult, RunSummary};
use crate::browser::SessionFactory;
use crate::extract::normalize::Normalizer;
use crate::extract::scroll::ScrollCollector;
use crate::extract::PageExtractor;
use crate::profile::Profiles;
use crate::progress::{ProgressEventKind, RunStage};
use crate::record::{CollectionEntry, NormalizedRecord, Payload, RawRecord, Subject};
use crate::store::CollectionStore;
use anyhow::{bail, Result};
use chrono::NaiveDate;
use std::path::PathBuf;
use std::time::Instant;

/// Content kinds collected per run.
pub const CHART_KINDS: [&str; 2] = ["tv-shows", "movies"];

/// Subject kind tag for page-level chart subjects.
const CHART_PAGE_KIND: &str = "chart";

/// Options for the daily top-chart run.
#[derive(Debug, Clone)]
pub struct ChartsOptions {
    pub country: String,
    /// Ranking frequency ("daily", "weekly", "monthly").
    pub freq: String,
    /// Rows read from the top of each chart.
    pub max_titles: usize,
    pub nav_timeout_ms: u64,
    pub wait_timeout_ms: u64,
    /// Where diagnostic screenshots land when a chart never renders.
    pub screenshot_dir: Option<PathBuf>,
}

impl Default for ChartsOptions {
    fn default() -> Self {
        Self {
            country: "us".to_string(),
            freq: "daily".to_string(),
            max_titles: 20,
            nav_timeout_ms: 30_000,
            wait_timeout_ms: 60_000,
            screenshot_dir: None,
        }
    }
}

/// Options for the catalog sweep.
#[derive(Debug, Clone)]
pub struct CatalogOptions {
    pub country: String,
    /// Stop once this many titles have been collected per kind.
    pub min_titles: usize,
    /// Scroll budget per listing.
    pub max_scrolls: usize,
    pub nav_timeout_ms: u64,
    pub screenshot_dir: Option<PathBuf>,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            country: "us".to_string(),
            min_titles: 50,
            max_scrolls: 20,
            nav_timeout_ms: 30_000,
            screenshot_dir: None,
        }
    }
}

/// Collect today's top charts for every content kind and merge them.
pub async fn run(
    ctx: &mut RunContext,
    store: &mut CollectionStore,
    factory: &dyn SessionFactory,
    profiles: &Profiles,
    options: &ChartsOptions,
) -> RunResult<RunSummary> {
    let today = chrono::Local::now().date_naive();
    tracing::info!(run_id = %ctx.run_id, %today, "collecting streaming charts");

    ctx.enter(RunStage::Collecting);
    let mut batches: Vec<(&str, Vec<RawRecord>)> = Vec::new();
    for kind in CHART_KINDS {
        if ctx.interrupted() {
            tracing::warn!("interrupted — stopping before {kind}");
            break;
        }
        ctx.summary.subjects_attempted += 1;
        ctx.emit(ProgressEventKind::SubjectStarted {
            subject: kind.to_string(),
        });
        match collect_chart(factory, profiles, options, kind).await {
            Ok(records) => {
                ctx.summary.subjects_succeeded += 1;
                ctx.emit(ProgressEventKind::SubjectCompleted {
                    subject: kind.to_string(),
                    records: records.len() as u32,
                });
                batches.push((kind, records));
            }
            Err(e) => {
                ctx.summary.subjects_skipped += 1;
                tracing::warn!("chart collection failed for {kind}: {e:#}");
                ctx.emit(ProgressEventKind::SubjectSkipped {
                    subject: kind.to_string(),
                    reason: format!("{e:#}"),
                });
            }
        }
    }

    let entries = normalize_batches(ctx, profiles, &profiles.charts.fields, batches, today);
    merge(ctx, store, &entries)?;
    Ok(ctx.finish())
}

/// Sweep the scrolling catalog listings and merge detail-page snapshots.
pub async fn run_catalog(
    ctx: &mut RunContext,
    store: &mut CollectionStore,
    factory: &dyn SessionFactory,
    profiles: &Profiles,
    options: &CatalogOptions,
) -> RunResult<RunSummary> {
    let today = chrono::Local::now().date_naive();
    tracing::info!(run_id = %ctx.run_id, %today, "sweeping catalog listings");

    ctx.enter(RunStage::Collecting);
    let mut batches: Vec<(&str, Vec<RawRecord>)> = Vec::new();
    for kind in CHART_KINDS {
        if ctx.interrupted() {
            tracing::warn!("interrupted — stopping before {kind}");
            break;
        }
        ctx.summary.subjects_attempted += 1;
        ctx.emit(ProgressEventKind::SubjectStarted {
            subject: kind.to_string(),
        });
        match collect_catalog(factory, profiles, options, kind).await {
            Ok(records) if !records.is_empty() => {
                ctx.summary.subjects_succeeded += 1;
                ctx.emit(ProgressEventKind::SubjectCompleted {
                    subject: kind.to_string(),
                    records: records.len() as u32,
                });
                batches.push((kind, records));
            }
            Ok(_) => {
                // listing never produced items — treated as a skip
                ctx.summary.subjects_skipped += 1;
                ctx.emit(ProgressEventKind::SubjectSkipped {
                    subject: kind.to_string(),
                    reason: "listing yielded no items".to_string(),
                });
            }
            Err(e) => {
                ctx.summary.subjects_skipped += 1;
                tracing::warn!("catalog collection failed for {kind}: {e:#}");
                ctx.emit(ProgressEventKind::SubjectSkipped {
                    subject: kind.to_string(),
                    reason: format!("{e:#}"),
                });
            }
        }
    }

    let entries = normalize_batches(ctx, profiles, &profiles.catalog.fields, batches, today);
    merge(ctx, store, &entries)?;
    Ok(ctx.finish())
}

/// Read the top rows of one chart page.
async fn collect_chart(
    factory: &dyn SessionFactory,
    profiles: &Profiles,
    options: &ChartsOptions,
    kind: &str,
) -> Result<Vec<RawRecord>> {
    let mut session = factory.new_session().await?;
    let url = profiles
        .charts
        .url_for(&options.country, kind, &options.freq);
    tracing::info!(%url, "loading chart");
    session.navigate(&url, options.nav_timeout_ms).await?;

    let rows_selector = &profiles.charts.row_selector;
    if !session
        .wait_for_selector(rows_selector, options.wait_timeout_ms)
        .await?
    {
        if let Some(dir) = &options.screenshot_dir {
            let shot = dir.join(format!("chart_{kind}_error.png"));
            if let Err(e) = session.screenshot(&shot).await {
                tracing::debug!("diagnostic screenshot failed: {e:#}");
            }
        }
        bail!("chart rows never rendered: {rows_selector}");
    }

    let rows = session.query_all(rows_selector).await?;
    let extractor = PageExtractor::new(profiles.charts.fields.clone());
    let page_subject = Subject::new(kind, CHART_PAGE_KIND);

    let mut records = Vec::new();
    for row in rows.iter().take(options.max_titles) {
        records.push(
            extractor
                .extract_within(session.as_mut(), row, &page_subject)
                .await,
        );
    }
    tracing::info!(kind, rows = records.len(), "chart rows extracted");
    session.close().await.ok();
    Ok(records)
}

/// Scroll one catalog listing, visiting each title's detail page.
async fn collect_catalog(
    factory: &dyn SessionFactory,
    profiles: &Profiles,
    options: &CatalogOptions,
    kind: &str,
) -> Result<Vec<RawRecord>> {
    let mut listing = factory.new_session().await?;
    let mut detail = factory.new_session().await?;
    let url = profiles.catalog.url_for(&options.country, kind);
    tracing::info!(%url, "loading catalog listing");
    listing.navigate(&url, options.nav_timeout_ms).await?;

    let mut collector =
        ScrollCollector::from_profile(&profiles.catalog, options.min_titles, options.max_scrolls);
    if let Some(dir) = &options.screenshot_dir {
        collector = collector.with_screenshot_path(dir.join(format!("catalog_{kind}_error.png")));
    }

    let extractor = PageExtractor::new(profiles.catalog.fields.clone());
    let page_subject = Subject::new(kind, CHART_PAGE_KIND);
    let records = collector
        .collect(listing.as_mut(), detail.as_mut(), &extractor, &page_subject)
        .await;

    listing.close().await.ok();
    detail.close().await.ok();
    Ok(records)
}

/// Normalize per-kind batches and tag them with the collection date.
fn normalize_batches(
    ctx: &mut RunContext,
    profiles: &Profiles,
    fields: &[crate::profile::FieldSpec],
    batches: Vec<(&str, Vec<RawRecord>)>,
    date: NaiveDate,
) -> Vec<CollectionEntry> {
    ctx.enter(RunStage::Normalizing);
    let normalizer = Normalizer::new(fields.to_vec(), profiles.key_field.clone());

    let mut entries = Vec::new();
    for (kind, raws) in batches {
        let (records, dropped) = normalizer.normalize_batch(&raws);
        ctx.summary.records_dropped += dropped as u32;
        for record in records {
            entries.push(entry_from_record(&profiles.key_field, kind, &record, date));
        }
    }
    entries
}

/// Turn one normalized chart record into a dated rank entry.
fn entry_from_record(
    key_field: &str,
    kind: &str,
    record: &NormalizedRecord,
    date: NaiveDate,
) -> CollectionEntry {
    // normalizer guarantees a usable key
    let title = record.text(key_field).unwrap_or_default().to_string();
    CollectionEntry::new(
        Subject::new(title, kind),
        date,
        Payload::Rank {
            rank: record.number("rank").map(|n| n as i64),
            rank_change: record.number("rank_change").map(|n| n as i64).unwrap_or(0),
            top_rank: record.number("top_rank").map(|n| n as i64),
            platforms: record.text("platforms").unwrap_or_default().to_string(),
        },
    )
}

fn merge(
    ctx: &mut RunContext,
    store: &mut CollectionStore,
    entries: &[CollectionEntry],
) -> RunResult<()> {
    ctx.enter(RunStage::Merging);
    let started = Instant::now();
    let merged = store.merge(entries).map_err(RunError::Merge)?;
    ctx.summary.entries_merged += merged as u32;
    ctx.emit(ProgressEventKind::MergeCompleted {
        entries: merged as u32,
        elapsed_ms: started.elapsed().as_millis() as u64,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FieldValue;
    use std::collections::BTreeMap;

    #[test]
    fn test_entry_from_record_maps_payload_fields() {
        let mut values = BTreeMap::new();
        values.insert("title".to_string(), FieldValue::Text("Dark".into()));
        values.insert("rank".to_string(), FieldValue::Number(3.0));
        values.insert("rank_change".to_string(), FieldValue::Null);
        values.insert("top_rank".to_string(), FieldValue::Number(1.0));
        values.insert("platforms".to_string(), FieldValue::Text("Netflix".into()));
        let record = NormalizedRecord {
            subject: Subject::new("tv-shows", "chart"),
            values,
        };

        let date = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        let entry = entry_from_record("title", "tv-shows", &record, date);

        assert_eq!(entry.subject, Subject::new("Dark", "tv-shows"));
        assert_eq!(entry.date, date);
        assert_eq!(
            entry.payload,
            Payload::Rank {
                rank: Some(3),
                rank_change: 0,
                top_rank: Some(1),
                platforms: "Netflix".into(),
            }
        );
    }
}
