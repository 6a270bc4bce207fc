//! Durable (subject, date)-keyed collection store backed by SQLite.
//!
//! Merging is the only mutation: `INSERT OR REPLACE` inside one transaction,
//! so re-merging overlapping entries is idempotent and a crash mid-merge
//! rolls back without touching previously committed rows.

use crate::record::{CollectionEntry, Payload, PayloadKind, Subject};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Connection;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Store filename inside the data directory.
pub const STORE_FILENAME: &str = "collections.db";

/// Date column format. Lexicographic order equals date order, so SQL
/// `MAX(date)` and `ORDER BY date` work on the text form directly.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Append/merge-only store of dated collection entries.
pub struct CollectionStore {
    db: Connection,
}

/// Aggregate view of the store for the status command.
#[derive(Debug, Clone, Serialize)]
pub struct StoreSummary {
    pub rank_entries: u64,
    pub mention_entries: u64,
    pub rank_latest: Option<NaiveDate>,
    pub mentions_latest: Option<NaiveDate>,
    pub subjects: u64,
}

impl CollectionStore {
    /// Open or create a store at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create store dir: {}", parent.display()))?;
        }
        let db = Connection::open(path)
            .with_context(|| format!("failed to open store: {}", path.display()))?;

        db.execute_batch(
            "CREATE TABLE IF NOT EXISTS entries (
                name TEXT NOT NULL,
                kind TEXT NOT NULL,
                date TEXT NOT NULL,
                payload TEXT NOT NULL,
                rank INTEGER,
                rank_change INTEGER,
                top_rank INTEGER,
                platforms TEXT,
                mention_count INTEGER,
                collected_at TEXT NOT NULL,
                PRIMARY KEY (name, kind, date, payload)
            );
            CREATE INDEX IF NOT EXISTS idx_entries_payload_date
                ON entries (payload, date);",
        )
        .context("failed to create entries table")?;

        Ok(Self { db })
    }

    /// Open the store inside a data directory.
    pub fn open_in(data_dir: &Path) -> Result<Self> {
        Self::open(&data_dir.join(STORE_FILENAME))
    }

    /// Default store path under the user's home directory.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".chartwatch")
            .join(STORE_FILENAME)
    }

    /// Merge entries into the store.
    ///
    /// Each entry overwrites any existing entry with the same
    /// (subject, date) key in its payload family; new keys append. Safe to
    /// call repeatedly with overlapping input. Returns the number of
    /// entries written.
    pub fn merge(&mut self, entries: &[CollectionEntry]) -> Result<usize> {
        let tx = self.db.transaction().context("failed to begin merge")?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR REPLACE INTO entries
                     (name, kind, date, payload, rank, rank_change, top_rank,
                      platforms, mention_count, collected_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                )
                .context("failed to prepare merge statement")?;
            for entry in entries {
                let date = entry.date.format(DATE_FORMAT).to_string();
                let collected_at = entry.collected_at.to_rfc3339();
                match &entry.payload {
                    Payload::Rank {
                        rank,
                        rank_change,
                        top_rank,
                        platforms,
                    } => stmt.execute(rusqlite::params![
                        entry.subject.name,
                        entry.subject.kind,
                        date,
                        PayloadKind::Rank.as_str(),
                        rank,
                        rank_change,
                        top_rank,
                        platforms,
                        Option::<i64>::None,
                        collected_at,
                    ])?,
                    Payload::Mentions { count } => stmt.execute(rusqlite::params![
                        entry.subject.name,
                        entry.subject.kind,
                        date,
                        PayloadKind::Mentions.as_str(),
                        Option::<i64>::None,
                        Option::<i64>::None,
                        Option::<i64>::None,
                        Option::<String>::None,
                        *count as i64,
                        collected_at,
                    ])?,
                };
            }
        }
        tx.commit().context("failed to commit merge")?;
        Ok(entries.len())
    }

    /// Load entries ordered by date ascending, then subject.
    pub fn load(
        &self,
        payload: Option<PayloadKind>,
        subjects: Option<&[Subject]>,
    ) -> Result<Vec<CollectionEntry>> {
        let mut sql = String::from(
            "SELECT name, kind, date, payload, rank, rank_change, top_rank,
                    platforms, mention_count, collected_at
             FROM entries",
        );
        if payload.is_some() {
            sql.push_str(" WHERE payload = ?1");
        }
        sql.push_str(" ORDER BY date ASC, kind ASC, name ASC");

        let mut stmt = self.db.prepare(&sql)?;
        let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<CollectionEntry> {
            row_to_entry(row)
        };
        let rows = match payload {
            Some(kind) => stmt.query_map(rusqlite::params![kind.as_str()], map_row)?,
            None => stmt.query_map([], map_row)?,
        };

        let mut entries = Vec::new();
        for row in rows {
            let entry = row.context("failed to read store row")?;
            if let Some(filter) = subjects {
                if !filter.contains(&entry.subject) {
                    continue;
                }
            }
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Latest date present, `None` for an empty (filtered) store.
    pub fn latest_date(
        &self,
        payload: Option<PayloadKind>,
        subjects: Option<&[Subject]>,
    ) -> Result<Option<NaiveDate>> {
        if subjects.is_some() {
            return Ok(self
                .load(payload, subjects)?
                .into_iter()
                .map(|e| e.date)
                .max());
        }
        self.date_bound("MAX", payload)
    }

    /// Earliest date present, `None` for an empty (filtered) store.
    pub fn earliest_date(&self, payload: Option<PayloadKind>) -> Result<Option<NaiveDate>> {
        self.date_bound("MIN", payload)
    }

    fn date_bound(&self, agg: &str, payload: Option<PayloadKind>) -> Result<Option<NaiveDate>> {
        let sql = match payload {
            Some(_) => format!("SELECT {agg}(date) FROM entries WHERE payload = ?1"),
            None => format!("SELECT {agg}(date) FROM entries"),
        };
        let mut stmt = self.db.prepare(&sql)?;
        let text: Option<String> = match payload {
            Some(kind) => stmt.query_row(rusqlite::params![kind.as_str()], |row| row.get(0))?,
            None => stmt.query_row([], |row| row.get(0))?,
        };
        text.map(|s| {
            NaiveDate::parse_from_str(&s, DATE_FORMAT)
                .with_context(|| format!("corrupt date in store: {s}"))
        })
        .transpose()
    }

    /// Distinct subjects with entries in a payload family, ordered by
    /// (kind, name).
    pub fn distinct_subjects(&self, payload: PayloadKind) -> Result<Vec<Subject>> {
        let mut stmt = self.db.prepare(
            "SELECT DISTINCT name, kind FROM entries WHERE payload = ?1
             ORDER BY kind ASC, name ASC",
        )?;
        let rows = stmt.query_map(rusqlite::params![payload.as_str()], |row| {
            Ok(Subject {
                name: row.get(0)?,
                kind: row.get(1)?,
            })
        })?;
        let mut subjects = Vec::new();
        for row in rows {
            subjects.push(row.context("failed to read subject row")?);
        }
        Ok(subjects)
    }

    /// Aggregate counts and latest dates for the status command.
    pub fn summary(&self) -> Result<StoreSummary> {
        let count = |kind: PayloadKind| -> Result<u64> {
            let n: i64 = self.db.query_row(
                "SELECT COUNT(*) FROM entries WHERE payload = ?1",
                rusqlite::params![kind.as_str()],
                |row| row.get(0),
            )?;
            Ok(n as u64)
        };
        let subjects: i64 = self.db.query_row(
            "SELECT COUNT(*) FROM (SELECT DISTINCT name, kind FROM entries)",
            [],
            |row| row.get(0),
        )?;
        Ok(StoreSummary {
            rank_entries: count(PayloadKind::Rank)?,
            mention_entries: count(PayloadKind::Mentions)?,
            rank_latest: self.latest_date(Some(PayloadKind::Rank), None)?,
            mentions_latest: self.latest_date(Some(PayloadKind::Mentions), None)?,
            subjects: subjects as u64,
        })
    }
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<CollectionEntry> {
    let name: String = row.get(0)?;
    let kind: String = row.get(1)?;
    let date_text: String = row.get(2)?;
    let payload_text: String = row.get(3)?;
    let collected_text: String = row.get(9)?;

    let date = NaiveDate::parse_from_str(&date_text, DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let collected_at = DateTime::parse_from_rfc3339(&collected_text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(9, rusqlite::types::Type::Text, Box::new(e))
        })?;

    let payload = match PayloadKind::parse(&payload_text) {
        Some(PayloadKind::Rank) => Payload::Rank {
            rank: row.get(4)?,
            rank_change: row.get::<_, Option<i64>>(5)?.unwrap_or(0),
            top_rank: row.get(6)?,
            platforms: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
        },
        Some(PayloadKind::Mentions) => Payload::Mentions {
            count: row.get::<_, Option<i64>>(8)?.unwrap_or(0) as u64,
        },
        None => {
            return Err(rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                format!("unknown payload kind: {payload_text}").into(),
            ))
        }
    };

    Ok(CollectionEntry {
        subject: Subject { name, kind },
        date,
        payload,
        collected_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn rank_entry(name: &str, kind: &str, d: NaiveDate, rank: i64) -> CollectionEntry {
        CollectionEntry::new(
            Subject::new(name, kind),
            d,
            Payload::Rank {
                rank: Some(rank),
                rank_change: 0,
                top_rank: None,
                platforms: String::new(),
            },
        )
    }

    fn mentions_entry(name: &str, kind: &str, d: NaiveDate, count: u64) -> CollectionEntry {
        CollectionEntry::new(Subject::new(name, kind), d, Payload::Mentions { count })
    }

    fn open_temp() -> (TempDir, CollectionStore) {
        let dir = TempDir::new().unwrap();
        let store = CollectionStore::open_in(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn test_merge_is_idempotent() {
        let (_dir, mut store) = open_temp();
        let entries = vec![
            rank_entry("Dark", "tv-shows", date(2024, 1, 1), 3),
            rank_entry("Heat", "movies", date(2024, 1, 1), 7),
        ];
        store.merge(&entries).unwrap();
        store.merge(&entries).unwrap();

        assert_eq!(store.load(None, None).unwrap().len(), 2);
    }

    #[test]
    fn test_remerge_overwrites_same_key() {
        let (_dir, mut store) = open_temp();
        store
            .merge(&[rank_entry("Dark", "tv-shows", date(2024, 1, 1), 3)])
            .unwrap();
        store
            .merge(&[rank_entry("Dark", "tv-shows", date(2024, 1, 1), 5)])
            .unwrap();

        let entries = store.load(Some(PayloadKind::Rank), None).unwrap();
        assert_eq!(entries.len(), 1);
        match &entries[0].payload {
            Payload::Rank { rank, .. } => assert_eq!(*rank, Some(5)),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn test_load_orders_by_date_then_subject() {
        let (_dir, mut store) = open_temp();
        store
            .merge(&[
                rank_entry("Zeta", "movies", date(2024, 1, 2), 1),
                rank_entry("Alpha", "movies", date(2024, 1, 2), 2),
                rank_entry("Mid", "movies", date(2024, 1, 1), 3),
            ])
            .unwrap();

        let names: Vec<String> = store
            .load(None, None)
            .unwrap()
            .into_iter()
            .map(|e| e.subject.name)
            .collect();
        assert_eq!(names, vec!["Mid", "Alpha", "Zeta"]);
    }

    #[test]
    fn test_latest_date_respects_payload_filter() {
        let (_dir, mut store) = open_temp();
        store
            .merge(&[
                rank_entry("Dark", "tv-shows", date(2024, 1, 10), 1),
                mentions_entry("Dark", "tv-shows", date(2024, 1, 5), 42),
            ])
            .unwrap();

        assert_eq!(
            store.latest_date(Some(PayloadKind::Rank), None).unwrap(),
            Some(date(2024, 1, 10))
        );
        assert_eq!(
            store
                .latest_date(Some(PayloadKind::Mentions), None)
                .unwrap(),
            Some(date(2024, 1, 5))
        );
        assert_eq!(
            store.earliest_date(Some(PayloadKind::Rank)).unwrap(),
            Some(date(2024, 1, 10))
        );
    }

    #[test]
    fn test_latest_date_with_subject_filter() {
        let (_dir, mut store) = open_temp();
        store
            .merge(&[
                mentions_entry("Dark", "tv-shows", date(2024, 1, 5), 1),
                mentions_entry("Heat", "movies", date(2024, 1, 9), 2),
            ])
            .unwrap();

        let filter = [Subject::new("Dark", "tv-shows")];
        assert_eq!(
            store
                .latest_date(Some(PayloadKind::Mentions), Some(&filter))
                .unwrap(),
            Some(date(2024, 1, 5))
        );
    }

    #[test]
    fn test_empty_store_has_no_dates() {
        let (_dir, store) = open_temp();
        assert_eq!(store.latest_date(None, None).unwrap(), None);
        assert_eq!(store.earliest_date(None).unwrap(), None);
        assert!(store.load(None, None).unwrap().is_empty());
    }

    #[test]
    fn test_distinct_subjects() {
        let (_dir, mut store) = open_temp();
        store
            .merge(&[
                rank_entry("Dark", "tv-shows", date(2024, 1, 1), 1),
                rank_entry("Dark", "tv-shows", date(2024, 1, 2), 2),
                rank_entry("Heat", "movies", date(2024, 1, 1), 3),
                mentions_entry("Ignored", "topic", date(2024, 1, 1), 9),
            ])
            .unwrap();

        let subjects = store.distinct_subjects(PayloadKind::Rank).unwrap();
        assert_eq!(
            subjects,
            vec![
                Subject::new("Heat", "movies"),
                Subject::new("Dark", "tv-shows"),
            ]
        );
    }

    #[test]
    fn test_mentions_roundtrip_and_summary() {
        let (_dir, mut store) = open_temp();
        store
            .merge(&[
                mentions_entry("Dark", "tv-shows", date(2024, 1, 5), 123),
                rank_entry("Dark", "tv-shows", date(2024, 1, 6), 2),
            ])
            .unwrap();

        let loaded = store.load(Some(PayloadKind::Mentions), None).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].payload, Payload::Mentions { count: 123 });

        let summary = store.summary().unwrap();
        assert_eq!(summary.rank_entries, 1);
        assert_eq!(summary.mention_entries, 1);
        assert_eq!(summary.subjects, 1);
        assert_eq!(summary.rank_latest, Some(date(2024, 1, 6)));
    }

    #[test]
    fn test_store_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = CollectionStore::open_in(dir.path()).unwrap();
            store
                .merge(&[rank_entry("Dark", "tv-shows", date(2024, 1, 1), 3)])
                .unwrap();
        }
        let store = CollectionStore::open_in(dir.path()).unwrap();
        assert_eq!(store.load(None, None).unwrap().len(), 1);
    }
}
