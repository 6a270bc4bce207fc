//! Raw-to-typed record normalization.
//!
//! Numeric coercion is parse-or-null — a malformed value becomes `Null`,
//! never an error. Records whose natural key is empty after trimming are
//! dropped; everything the normalizer emits has a usable key.

use crate::profile::{FieldKind, FieldSpec};
use crate::record::{FieldValue, NormalizedRecord, RawRecord, Subject};
use std::collections::BTreeMap;

/// Delimiter joining multi-valued list fields.
pub const LIST_JOIN_DELIMITER: &str = ",";

/// Field holding a title's alternate name, defaulted from the key field.
const ORIGINAL_TITLE_FIELD: &str = "original_title";

/// Converts raw extraction output into typed records.
pub struct Normalizer {
    fields: Vec<FieldSpec>,
    key_field: String,
}

impl Normalizer {
    /// Create a normalizer for the given field map and natural-key field.
    pub fn new(fields: Vec<FieldSpec>, key_field: impl Into<String>) -> Self {
        Self {
            fields,
            key_field: key_field.into(),
        }
    }

    /// Normalize one record. `None` means the record was dropped for a
    /// missing natural key.
    pub fn normalize(&self, raw: &RawRecord) -> Option<NormalizedRecord> {
        let mut values = BTreeMap::new();
        for field in &self.fields {
            let raw_values: &[String] = raw
                .fields
                .get(&field.name)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            let value = match field.kind {
                FieldKind::Numeric => coerce_number(raw_values.first()),
                FieldKind::Text => coerce_text(raw_values.first()),
                FieldKind::List => FieldValue::Text(join_list(raw_values)),
            };
            values.insert(field.name.clone(), value);
        }

        // An alternate name always has a usable value: fall back to the key
        // field when the page carries no original title.
        if values
            .get(ORIGINAL_TITLE_FIELD)
            .is_some_and(|v| v.as_str().map(str::is_empty).unwrap_or(true))
        {
            if let Some(key_value) = values.get(&self.key_field).cloned() {
                values.insert(ORIGINAL_TITLE_FIELD.to_string(), key_value);
            }
        }

        let key_is_usable = values
            .get(&self.key_field)
            .and_then(FieldValue::as_str)
            .map(|s| !s.is_empty())
            .unwrap_or(false);
        if !key_is_usable {
            return None;
        }

        Some(NormalizedRecord {
            subject: raw.subject.clone(),
            values,
        })
    }

    /// Normalize a batch, deduplicating by natural key (last write wins).
    ///
    /// Returns the surviving records in first-seen order and the number of
    /// records dropped for a missing natural key.
    pub fn normalize_batch(&self, raws: &[RawRecord]) -> (Vec<NormalizedRecord>, usize) {
        let mut records: Vec<NormalizedRecord> = Vec::new();
        let mut index_by_key: BTreeMap<(Subject, String), usize> = BTreeMap::new();
        let mut dropped = 0usize;

        for raw in raws {
            let Some(record) = self.normalize(raw) else {
                dropped += 1;
                continue;
            };
            let key = (
                record.subject.clone(),
                record
                    .text(&self.key_field)
                    .unwrap_or_default()
                    .to_string(),
            );
            match index_by_key.get(&key) {
                Some(&i) => records[i] = record,
                None => {
                    index_by_key.insert(key, records.len());
                    records.push(record);
                }
            }
        }

        (records, dropped)
    }
}

fn coerce_number(raw: Option<&String>) -> FieldValue {
    raw.map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
        .map(FieldValue::Number)
        .unwrap_or(FieldValue::Null)
}

fn coerce_text(raw: Option<&String>) -> FieldValue {
    match raw.map(|s| s.trim()).filter(|s| !s.is_empty()) {
        Some(s) => FieldValue::Text(s.to_string()),
        None => FieldValue::Null,
    }
}

fn join_list(raw: &[String]) -> String {
    raw.iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(LIST_JOIN_DELIMITER)
}
