// Copyright 2026 Chartwatch Contributors
// SPDX-License-Identifier: Apache-2.0

#![allow(dead_code, unused_imports)]

use anyhow::Result;
use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

mod browser;
mod cli;
mod extract;
mod feed;
mod pipeline;
mod profile;
mod progress;
mod record;
mod resolver;
mod store;

use cli::collect_cmd::{self, CollectParams, Source};

#[derive(Parser)]
#[command(
    name = "chartwatch",
    about = "Chartwatch — incremental collector for streaming charts and news volume",
    version,
    after_help = "Run 'chartwatch <command> --help' for details on each command."
)]
struct Cli {
    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the collection pipelines and merge results into the store
    Collect {
        /// Which pipelines to run
        #[arg(value_enum, default_value = "all")]
        source: Source,
        /// Data directory (default ~/.chartwatch)
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Selector profile JSON overriding the built-in set
        #[arg(long)]
        profile: Option<PathBuf>,
        /// Country code for chart and catalog pages
        #[arg(long, default_value = "us")]
        country: String,
        /// Chart ranking frequency (daily, weekly, monthly)
        #[arg(long, default_value = "daily")]
        freq: String,
        /// Rows read from the top of each chart
        #[arg(long, default_value = "20")]
        max_titles: usize,
        /// Titles collected per catalog listing before stopping
        #[arg(long, default_value = "50")]
        min_titles: usize,
        /// Scroll budget per catalog listing
        #[arg(long, default_value = "20")]
        max_scrolls: usize,
        /// Earliest date the first mentions load should cover (YYYY-MM-DD)
        #[arg(long)]
        earliest: Option<NaiveDate>,
        /// Show the browser window instead of running headless
        #[arg(long)]
        headed: bool,
        /// Per-navigation timeout in milliseconds
        #[arg(long, default_value = "30000")]
        nav_timeout: u64,
        /// Pause between dated news queries in milliseconds
        #[arg(long, default_value = "1000")]
        throttle_ms: u64,
    },
    /// Show what the collection store holds
    Status {
        /// Data directory (default ~/.chartwatch)
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// List news headlines for a topic from the RSS feed
    Headlines {
        /// Topic to search for
        topic: String,
        /// Feed language (e.g. "en-US", "pt-BR")
        #[arg(long, default_value = "en-US")]
        language: String,
        /// Feed country (e.g. "US", "BR")
        #[arg(long, default_value = "US")]
        country: String,
        /// Only headlines published on this date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Maximum number of headlines
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Check environment and diagnose issues
    Doctor {
        /// Data directory (default ~/.chartwatch)
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global flags via environment variables so all modules can check them
    if cli.json {
        std::env::set_var("CHARTWATCH_JSON", "1");
    }
    if cli.quiet {
        std::env::set_var("CHARTWATCH_QUIET", "1");
    }
    if cli.verbose {
        std::env::set_var("CHARTWATCH_VERBOSE", "1");
    }
    if cli.no_color {
        std::env::set_var("CHARTWATCH_NO_COLOR", "1");
    }

    // Initialize tracing
    let default_level = if cli.verbose {
        "chartwatch=debug"
    } else {
        "chartwatch=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(default_level.parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Collect {
            source,
            data_dir,
            profile,
            country,
            freq,
            max_titles,
            min_titles,
            max_scrolls,
            earliest,
            headed,
            nav_timeout,
            throttle_ms,
        } => {
            collect_cmd::run(CollectParams {
                source,
                data_dir,
                profile,
                country,
                freq,
                max_titles,
                min_titles,
                max_scrolls,
                earliest,
                headed,
                nav_timeout_ms: nav_timeout,
                throttle_ms,
            })
            .await
        }
        Commands::Status { data_dir } => cli::status_cmd::run(data_dir),
        Commands::Headlines {
            topic,
            language,
            country,
            date,
            limit,
        } => cli::headlines_cmd::run(&topic, &language, &country, date, limit).await,
        Commands::Doctor { data_dir } => cli::doctor::run(data_dir).await,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "chartwatch", &mut std::io::stdout());
            Ok(())
        }
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        if !cli::output::is_quiet() && !cli::output::is_json() {
            eprintln!("  Error: {e:#}");
        }
        if cli::output::is_json() {
            cli::output::print_json(&serde_json::json!({
                "error": true,
                "message": format!("{e:#}"),
            }));
        }
        std::process::exit(1);
    }

    result
}
