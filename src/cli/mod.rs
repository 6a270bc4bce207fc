//! CLI subcommand implementations for the chartwatch binary.

pub mod collect_cmd;
pub mod doctor;
pub mod headlines_cmd;
pub mod output;
pub mod status_cmd;

use std::path::PathBuf;

/// Default data directory (~/.chartwatch).
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(".chartwatch")
}
