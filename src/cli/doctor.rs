//! The `doctor` command — check the environment and diagnose issues.

use crate::browser::chromium::find_chromium;
use crate::cli::output::{self, Styled};
use crate::store::CollectionStore;
use anyhow::Result;
use std::path::PathBuf;

/// Run environment checks and print a report.
pub async fn run(data_dir: Option<PathBuf>) -> Result<()> {
    let s = Styled::new();
    let data_dir = data_dir.unwrap_or_else(crate::cli::default_data_dir);
    let mut problems = 0u32;

    // Chromium binary
    match find_chromium() {
        Some(path) => println!("  {} Chromium found: {}", s.ok_sym(), path.display()),
        None => {
            problems += 1;
            println!("  {} Chromium not found", s.err_sym());
            println!("    Install Chrome/Chromium or set CHARTWATCH_CHROMIUM_PATH.");
        }
    }

    // Data directory writable
    match std::fs::create_dir_all(&data_dir)
        .and_then(|_| std::fs::write(data_dir.join(".doctor_probe"), b"ok"))
    {
        Ok(()) => {
            let _ = std::fs::remove_file(data_dir.join(".doctor_probe"));
            println!("  {} Data dir writable: {}", s.ok_sym(), data_dir.display());
        }
        Err(e) => {
            problems += 1;
            println!("  {} Data dir not writable: {e}", s.err_sym());
        }
    }

    // Store opens
    match CollectionStore::open_in(&data_dir) {
        Ok(store) => match store.summary() {
            Ok(summary) => println!(
                "  {} Store OK ({} rank, {} mention entries)",
                s.ok_sym(),
                summary.rank_entries,
                summary.mention_entries,
            ),
            Err(e) => {
                problems += 1;
                println!("  {} Store unreadable: {e:#}", s.err_sym());
            }
        },
        Err(e) => {
            problems += 1;
            println!("  {} Store failed to open: {e:#}", s.err_sym());
        }
    }

    if output::is_json() {
        output::print_json(&serde_json::json!({ "problems": problems }));
    } else if problems == 0 {
        println!("\n  All checks passed.");
    } else {
        println!("\n  {problems} problem(s) found.");
    }
    Ok(())
}
