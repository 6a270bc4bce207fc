// Copyright 2026 Chartwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Progress event types and broadcast channel for run telemetry.
//!
//! Pipelines emit `ProgressEvent`s while running, which flow through a
//! `tokio::sync::broadcast` channel to all subscribers (CLI printer, logs).
//! When no subscriber exists, events are silently dropped.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A progress event emitted during a collection run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// The run ID this event belongs to.
    pub run_id: String,
    /// Monotonically increasing sequence number.
    pub seq: u64,
    /// The kind of progress event.
    pub event: ProgressEventKind,
}

/// The specific kind of progress event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProgressEventKind {
    /// The run moved to a new stage.
    StageChanged { stage: RunStage },
    /// The incremental resolver produced a fetch range.
    RangeResolved {
        start: NaiveDate,
        end: NaiveDate,
        days: u32,
    },
    /// Collection of one subject started.
    SubjectStarted { subject: String },
    /// Collection of one subject finished.
    SubjectCompleted { subject: String, records: u32 },
    /// A subject was skipped after a collection failure.
    SubjectSkipped { subject: String, reason: String },
    /// Entries were committed to the store.
    MergeCompleted { entries: u32, elapsed_ms: u64 },
    /// The run finished.
    RunCompleted {
        attempted: u32,
        succeeded: u32,
        skipped: u32,
        merged: u32,
        elapsed_ms: u64,
    },
    /// A non-fatal warning occurred.
    Warning { message: String },
}

/// Stages of a collection run.
///
/// `Idle → ResolvingRange → {NoWorkNeeded | Collecting → Normalizing →
/// Merging → Idle}`. Only `Merging` touches durable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunStage {
    Idle,
    ResolvingRange,
    /// Terminal: the store already covers every requested date.
    NoWorkNeeded,
    Collecting,
    Normalizing,
    Merging,
}

impl std::fmt::Display for RunStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::ResolvingRange => write!(f, "Resolving Range"),
            Self::NoWorkNeeded => write!(f, "No Work Needed"),
            Self::Collecting => write!(f, "Collecting"),
            Self::Normalizing => write!(f, "Normalizing"),
            Self::Merging => write!(f, "Merging"),
        }
    }
}

/// Sender handle for emitting progress events.
///
/// Backed by a `tokio::sync::broadcast` channel so multiple listeners can
/// subscribe independently. When no listeners exist, `send()` returns an
/// error which we silently ignore (zero cost when nobody's watching).
pub type ProgressSender = tokio::sync::broadcast::Sender<ProgressEvent>;

/// Receiver handle for consuming progress events.
pub type ProgressReceiver = tokio::sync::broadcast::Receiver<ProgressEvent>;

/// Create a new progress broadcast channel with a bounded buffer.
///
/// 256 events covers a typical run (a handful of stage events plus one
/// event per subject).
pub fn channel() -> (ProgressSender, ProgressReceiver) {
    tokio::sync::broadcast::channel(256)
}

/// Convenience helper: emit a progress event, silently ignoring send errors
/// (which occur when no receivers are listening).
pub fn emit(
    tx: &Option<ProgressSender>,
    run_id: &str,
    seq: &mut u64,
    event: ProgressEventKind,
) {
    if let Some(ref sender) = tx {
        *seq += 1;
        let _ = sender.send(ProgressEvent {
            run_id: run_id.to_string(),
            seq: *seq,
            event,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_event_serialization() {
        let event = ProgressEvent {
            run_id: "run-1".to_string(),
            seq: 1,
            event: ProgressEventKind::StageChanged {
                stage: RunStage::Collecting,
            },
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("StageChanged"));
        assert!(json.contains("Collecting"));

        // Roundtrip
        let parsed: ProgressEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.run_id, "run-1");
        assert_eq!(parsed.seq, 1);
    }

    #[test]
    fn test_range_resolved_serialization() {
        let event = ProgressEvent {
            run_id: "run-7".to_string(),
            seq: 2,
            event: ProgressEventKind::RangeResolved {
                start: NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
                end: NaiveDate::from_ymd_opt(2024, 1, 19).unwrap(),
                days: 17,
            },
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("2024-01-03"));
        assert!(json.contains("RangeResolved"));
    }

    #[test]
    fn test_channel_no_receivers() {
        let (tx, rx) = channel();
        drop(rx); // No receivers
                  // Should not panic
        emit(
            &Some(tx),
            "run",
            &mut 0,
            ProgressEventKind::Warning {
                message: "test".to_string(),
            },
        );
    }

    #[test]
    fn test_emit_none_sender() {
        // Should be a no-op
        emit(
            &None,
            "run",
            &mut 0,
            ProgressEventKind::Warning {
                message: "test".to_string(),
            },
        );
    }

    #[test]
    fn test_run_stage_display() {
        assert_eq!(RunStage::ResolvingRange.to_string(), "Resolving Range");
        assert_eq!(RunStage::NoWorkNeeded.to_string(), "No Work Needed");
        assert_eq!(RunStage::Merging.to_string(), "Merging");
    }
}
