//! Declarative collection profiles — URL templates and field→selector maps.
//!
//! Selectors are collaborator-supplied configuration, not engine logic. A
//! built-in profile set is embedded at compile time; `--profile` swaps in a
//! JSON file with the same shape when a site changes its markup.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Built-in profile set, embedded so the binary works with no config files.
const DEFAULT_PROFILES_JSON: &str = include_str!("profiles.json");

/// How a raw field is typed during normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Parse-or-null numeric coercion.
    Numeric,
    /// Trimmed text, first match wins.
    #[default]
    Text,
    /// All matches joined with the fixed delimiter.
    List,
}

/// One extracted field: where it comes from and how it is typed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub selector: String,
    #[serde(default)]
    pub kind: FieldKind,
    /// Attribute to read instead of the element text.
    #[serde(default)]
    pub attribute: Option<String>,
}

/// Daily top-chart page: a ranked table read row by row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartsProfile {
    /// URL template with `{country}` and `{freq}` placeholders.
    pub chart_url: String,
    /// Query-string suffix selecting the TV chart.
    pub shows_suffix: String,
    pub row_selector: String,
    pub fields: Vec<FieldSpec>,
}

impl ChartsProfile {
    /// Chart URL for a country, content kind, and ranking frequency.
    pub fn url_for(&self, country: &str, kind: &str, freq: &str) -> String {
        let mut url = self
            .chart_url
            .replace("{country}", country)
            .replace("{freq}", freq);
        if kind == "tv-shows" {
            url.push_str(&self.shows_suffix);
        }
        url
    }
}

/// Infinite-scroll catalog listing with per-title detail pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogProfile {
    /// URL template with `{country}` and `{kind}` placeholders.
    pub listing_url: String,
    pub item_selector: String,
    pub link_selector: String,
    pub link_attribute: String,
    /// Fields extracted from each detail page.
    pub fields: Vec<FieldSpec>,
}

impl CatalogProfile {
    /// Listing URL for a country and content kind.
    pub fn url_for(&self, country: &str, kind: &str) -> String {
        self.listing_url
            .replace("{country}", country)
            .replace("{kind}", kind)
    }
}

/// Dated news search whose result counter is the measurement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MentionsProfile {
    /// Search endpoint the dated queries are built against.
    pub search_url: String,
    pub count_selector: String,
}

/// Complete profile set for one collection target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profiles {
    /// Name of the natural-key field in chart and catalog records.
    #[serde(default = "default_key_field")]
    pub key_field: String,
    pub charts: ChartsProfile,
    pub catalog: CatalogProfile,
    pub mentions: MentionsProfile,
}

fn default_key_field() -> String {
    "title".to_string()
}

impl Profiles {
    /// The embedded default profile set.
    pub fn builtin() -> Result<Self> {
        serde_json::from_str(DEFAULT_PROFILES_JSON).context("built-in profile JSON is invalid")
    }

    /// Load a profile set from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read profile file: {}", path.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("invalid profile JSON: {}", path.display()))
    }
}
