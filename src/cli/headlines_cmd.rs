//! The `headlines` command — ad-hoc RSS listing for a topic.

use crate::cli::output::{self, Styled};
use crate::feed::FeedClient;
use anyhow::Result;
use chrono::NaiveDate;

/// Fetch and print headlines for a topic, optionally for one day.
pub async fn run(
    topic: &str,
    language: &str,
    country: &str,
    date: Option<NaiveDate>,
    limit: Option<usize>,
) -> Result<()> {
    let s = Styled::new();
    let client = FeedClient::new(language, country, 15_000);
    let headlines = match date {
        Some(day) => client.search_on(topic, day, limit).await?,
        None => client.search(topic, limit).await?,
    };

    if output::is_json() {
        output::print_json(&headlines);
        return Ok(());
    }

    if headlines.is_empty() {
        println!("  No headlines found for '{topic}'.");
        return Ok(());
    }

    println!("  {} headlines for '{topic}':\n", headlines.len());
    for headline in &headlines {
        let when = headline
            .published
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "          —    ".to_string());
        let source = headline.source.as_deref().unwrap_or("unknown");
        println!("    {}  {}", s.dim(&when), headline.title);
        println!("      {}", s.dim(&format!("{source} — {}", headline.link)));
    }
    Ok(())
}
