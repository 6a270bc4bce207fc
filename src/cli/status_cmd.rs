//! The `status` command — summarize what the store holds.

use crate::cli::output::{self, Styled};
use crate::store::{CollectionStore, STORE_FILENAME};
use anyhow::Result;
use std::path::PathBuf;

/// Print entry counts and latest dates per payload family.
pub fn run(data_dir: Option<PathBuf>) -> Result<()> {
    let s = Styled::new();
    let data_dir = data_dir.unwrap_or_else(crate::cli::default_data_dir);
    let store_path = data_dir.join(STORE_FILENAME);

    if !store_path.exists() {
        if output::is_json() {
            output::print_json(&serde_json::json!({ "exists": false }));
        } else {
            println!("  No collections yet ({}).", s.dim(&store_path.display().to_string()));
            println!("  Run 'chartwatch collect' to start.");
        }
        return Ok(());
    }

    let store = CollectionStore::open(&store_path)?;
    let summary = store.summary()?;

    if output::is_json() {
        output::print_json(&summary);
        return Ok(());
    }

    println!("  Store: {}", store_path.display());
    println!(
        "  {} rank entries: {} (latest {})",
        s.ok_sym(),
        summary.rank_entries,
        summary
            .rank_latest
            .map(|d| d.to_string())
            .unwrap_or_else(|| "—".to_string()),
    );
    println!(
        "  {} mention entries: {} (latest {})",
        s.ok_sym(),
        summary.mention_entries,
        summary
            .mentions_latest
            .map(|d| d.to_string())
            .unwrap_or_else(|| "—".to_string()),
    );
    println!("  {} subjects tracked: {}", s.ok_sym(), summary.subjects);
    Ok(())
}
