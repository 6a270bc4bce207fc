//! The `collect` command — run the collection pipelines.

use crate::browser::chromium::ChromiumBrowser;
use crate::cli::output::{self, Styled};
use crate::pipeline::charts::{CatalogOptions, ChartsOptions};
use crate::pipeline::mentions::MentionsOptions;
use crate::pipeline::{charts, mentions, RunContext, RunSummary};
use crate::profile::Profiles;
use crate::progress::{self, ProgressEventKind};
use crate::store::CollectionStore;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Which pipelines a `collect` invocation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Source {
    /// Daily top-chart rows.
    Charts,
    /// Scrolling catalog sweep with detail pages.
    Catalog,
    /// Incremental news-volume backfill.
    Mentions,
    /// Charts, then mentions.
    All,
}

/// Parameters assembled by `main` from the CLI flags.
#[derive(Debug, Clone)]
pub struct CollectParams {
    pub source: Source,
    pub data_dir: Option<PathBuf>,
    pub profile: Option<PathBuf>,
    pub country: String,
    pub freq: String,
    pub max_titles: usize,
    pub min_titles: usize,
    pub max_scrolls: usize,
    pub earliest: Option<NaiveDate>,
    pub headed: bool,
    pub nav_timeout_ms: u64,
    pub throttle_ms: u64,
}

#[derive(Serialize)]
struct CollectReport {
    source: String,
    runs: Vec<NamedSummary>,
}

#[derive(Serialize)]
struct NamedSummary {
    pipeline: String,
    #[serde(flatten)]
    summary: RunSummary,
}

/// Run the requested pipelines against the store.
pub async fn run(params: CollectParams) -> Result<()> {
    let s = Styled::new();
    let data_dir = params
        .data_dir
        .clone()
        .unwrap_or_else(crate::cli::default_data_dir);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data dir: {}", data_dir.display()))?;

    let profiles = match &params.profile {
        Some(path) => Profiles::load(path)?,
        None => Profiles::builtin()?,
    };
    let mut store = CollectionStore::open_in(&data_dir)?;

    // Finish the current subject, then stop — never interrupt a merge.
    let interrupt = Arc::new(AtomicBool::new(false));
    {
        let interrupt = Arc::clone(&interrupt);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received — finishing current subject");
                interrupt.store(true, Ordering::Relaxed);
            }
        });
    }

    let browser = ChromiumBrowser::launch(!params.headed)
        .await
        .context("run 'chartwatch doctor' to diagnose the browser setup")?;

    let (tx, rx) = progress::channel();
    let printer = (!output::is_quiet() && !output::is_json()).then(|| spawn_printer(rx));

    let mut runs: Vec<NamedSummary> = Vec::new();
    if matches!(params.source, Source::Charts | Source::All) {
        let options = ChartsOptions {
            country: params.country.clone(),
            freq: params.freq.clone(),
            max_titles: params.max_titles,
            nav_timeout_ms: params.nav_timeout_ms,
            screenshot_dir: Some(data_dir.clone()),
            ..ChartsOptions::default()
        };
        let mut ctx =
            RunContext::new(Some(tx.clone())).with_interrupt(Arc::clone(&interrupt));
        let summary = charts::run(&mut ctx, &mut store, &browser, &profiles, &options).await?;
        runs.push(NamedSummary {
            pipeline: "charts".to_string(),
            summary,
        });
    }
    if params.source == Source::Catalog {
        let options = CatalogOptions {
            country: params.country.clone(),
            min_titles: params.min_titles,
            max_scrolls: params.max_scrolls,
            nav_timeout_ms: params.nav_timeout_ms,
            screenshot_dir: Some(data_dir.clone()),
        };
        let mut ctx =
            RunContext::new(Some(tx.clone())).with_interrupt(Arc::clone(&interrupt));
        let summary =
            charts::run_catalog(&mut ctx, &mut store, &browser, &profiles, &options).await?;
        runs.push(NamedSummary {
            pipeline: "catalog".to_string(),
            summary,
        });
    }
    if matches!(params.source, Source::Mentions | Source::All) && !interrupt.load(Ordering::Relaxed)
    {
        let options = MentionsOptions {
            requested_earliest: params.earliest,
            nav_timeout_ms: params.nav_timeout_ms,
            throttle_ms: params.throttle_ms,
            ..MentionsOptions::default()
        };
        let mut ctx =
            RunContext::new(Some(tx.clone())).with_interrupt(Arc::clone(&interrupt));
        let summary = mentions::run(&mut ctx, &mut store, &browser, &profiles, &options).await?;
        runs.push(NamedSummary {
            pipeline: "mentions".to_string(),
            summary,
        });
    }

    drop(tx);
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    if output::is_json() {
        output::print_json(&CollectReport {
            source: format!("{:?}", params.source).to_lowercase(),
            runs,
        });
    } else if !output::is_quiet() {
        for run in &runs {
            let sum = &run.summary;
            println!(
                "  {} {}: {}/{} subjects, {} entries merged, {} skipped, {} dropped",
                s.ok_sym(),
                run.pipeline,
                sum.subjects_succeeded,
                sum.subjects_attempted,
                sum.entries_merged,
                sum.subjects_skipped,
                sum.records_dropped,
            );
        }
    }
    Ok(())
}

/// Print subject-level progress lines while the pipelines run.
fn spawn_printer(mut rx: progress::ProgressReceiver) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let s = Styled::new();
        while let Ok(event) = rx.recv().await {
            match event.event {
                ProgressEventKind::RangeResolved { start, end, days } => {
                    println!("  Range {start} … {end} ({days} days)");
                }
                ProgressEventKind::SubjectStarted { subject } => {
                    println!("  {} {subject}", s.dim("→"));
                }
                ProgressEventKind::SubjectCompleted { subject, records } => {
                    println!("  {} {subject} ({records} records)", s.ok_sym());
                }
                ProgressEventKind::SubjectSkipped { subject, reason } => {
                    println!("  {} {subject} skipped: {reason}", s.warn_sym());
                }
                ProgressEventKind::MergeCompleted { entries, elapsed_ms } => {
                    println!("  Merged {entries} entries in {elapsed_ms}ms");
                }
                ProgressEventKind::StageChanged { stage } => {
                    if stage == crate::progress::RunStage::NoWorkNeeded {
                        println!("  Nothing to do — store is already current.");
                    }
                }
                ProgressEventKind::Warning { message } => {
                    println!("  {} {message}", s.warn_sym());
                }
                ProgressEventKind::RunCompleted { .. } => {}
            }
        }
    })
}
