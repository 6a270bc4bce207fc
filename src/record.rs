//! Core record types flowing through the collection pipeline.
//!
//! Lifecycle: `RawRecord` → (normalize) → `NormalizedRecord` → (pipeline,
//! tagged with a calendar date) → `CollectionEntry` → merged into the store.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A tracked title or topic, identified by its natural key (name, kind).
///
/// Immutable once created. The kind is a content-type tag ("movies",
/// "tv-shows") or a topic qualifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Subject {
    /// Human-meaningful name (chart title or news topic).
    pub name: String,
    /// Content-type tag or topic qualifier.
    pub kind: String,
}

impl Subject {
    /// Create a subject from its natural key parts.
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
        }
    }

    /// The natural key used for deduplication and store addressing.
    pub fn natural_key(&self) -> (&str, &str) {
        (&self.name, &self.kind)
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.kind)
    }
}

/// Raw extraction output: field name → ordered raw string values.
///
/// A selector may match multiple DOM nodes, so every field carries a list.
/// Never mutated after extraction completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRecord {
    /// The subject this record was collected for.
    pub subject: Subject,
    /// Field name → raw values, in DOM order.
    pub fields: BTreeMap<String, Vec<String>>,
    /// Wall-clock extraction time (distinct from the collection date).
    pub collected_at: DateTime<Utc>,
}

impl RawRecord {
    /// Create an empty record owned by the given subject.
    pub fn new(subject: Subject) -> Self {
        Self {
            subject,
            fields: BTreeMap::new(),
            collected_at: Utc::now(),
        }
    }

    /// First raw value of a field, if any.
    pub fn first(&self, field: &str) -> Option<&str> {
        self.fields
            .get(field)
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}

/// A typed field value after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum FieldValue {
    /// Trimmed text (list fields are joined into one text value).
    Text(String),
    /// Coerced numeric value.
    Number(f64),
    /// Missing or unparseable.
    Null,
}

impl FieldValue {
    /// Numeric view, `None` for text and null.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Text view, `None` for numbers and null.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Whether the value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// Typed projection of a `RawRecord`.
///
/// Invariant: the natural-key field is non-empty — records that fail this
/// are dropped by the normalizer and never reach the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedRecord {
    /// The collection subject the raw record was extracted under.
    pub subject: Subject,
    /// Field name → typed value.
    pub values: BTreeMap<String, FieldValue>,
}

impl NormalizedRecord {
    /// Numeric value of a field, `None` when null or non-numeric.
    pub fn number(&self, field: &str) -> Option<f64> {
        self.values.get(field).and_then(FieldValue::as_f64)
    }

    /// Text value of a field, `None` when null or numeric.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.values.get(field).and_then(FieldValue::as_str)
    }
}

/// Rank-or-count payload of a collection entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "payload")]
pub enum Payload {
    /// A chart position snapshot.
    Rank {
        /// Current chart position.
        rank: Option<i64>,
        /// Positions moved since the previous chart (0 when absent).
        rank_change: i64,
        /// Best position ever reached.
        top_rank: Option<i64>,
        /// Offering platforms, comma-joined.
        platforms: String,
    },
    /// A news-volume measurement.
    Mentions {
        /// Number of articles found for the subject on the entry date.
        count: u64,
    },
}

/// Discriminant for filtering stored entries by payload family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PayloadKind {
    Rank,
    Mentions,
}

impl Payload {
    /// Which payload family this value belongs to.
    pub fn kind(&self) -> PayloadKind {
        match self {
            Self::Rank { .. } => PayloadKind::Rank,
            Self::Mentions { .. } => PayloadKind::Mentions,
        }
    }
}

impl PayloadKind {
    /// Stable string form used in the store schema.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rank => "rank",
            Self::Mentions => "mentions",
        }
    }

    /// Parse the stable string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "rank" => Some(Self::Rank),
            "mentions" => Some(Self::Mentions),
            _ => None,
        }
    }
}

impl std::fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized record tagged with its collection date and payload.
///
/// The date is the calendar date the measurement applies to, not the
/// extraction wall-clock time. The store keys entries by (subject, date)
/// within each payload family; re-collecting overwrites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionEntry {
    pub subject: Subject,
    pub date: NaiveDate,
    #[serde(flatten)]
    pub payload: Payload,
    pub collected_at: DateTime<Utc>,
}

impl CollectionEntry {
    /// Create an entry stamped with the current wall-clock time.
    pub fn new(subject: Subject, date: NaiveDate, payload: Payload) -> Self {
        Self {
            subject,
            date,
            payload,
            collected_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_natural_key_equality() {
        let a = Subject::new("Dark", "tv-shows");
        let b = Subject::new("Dark", "tv-shows");
        let c = Subject::new("Dark", "movies");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.natural_key(), ("Dark", "tv-shows"));
    }

    #[test]
    fn test_field_value_views() {
        assert_eq!(FieldValue::Number(3.0).as_f64(), Some(3.0));
        assert_eq!(FieldValue::Number(3.0).as_str(), None);
        assert_eq!(FieldValue::Text("x".into()).as_str(), Some("x"));
        assert!(FieldValue::Null.is_null());
    }

    #[test]
    fn test_payload_kind_roundtrip() {
        assert_eq!(PayloadKind::parse("rank"), Some(PayloadKind::Rank));
        assert_eq!(PayloadKind::parse("mentions"), Some(PayloadKind::Mentions));
        assert_eq!(PayloadKind::parse("other"), None);
        assert_eq!(PayloadKind::Rank.as_str(), "rank");
    }

    #[test]
    fn test_entry_serialization() {
        let entry = CollectionEntry::new(
            Subject::new("Dark", "tv-shows"),
            NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(),
            Payload::Rank {
                rank: Some(3),
                rank_change: -1,
                top_rank: Some(1),
                platforms: "Netflix".into(),
            },
        );
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"Rank\""));
        assert!(json.contains("2024-01-10"));
    }
}
