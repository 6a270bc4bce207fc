//! Run orchestration — state machine, run context, and the fatal error
//! taxonomy.
//!
//! A run carries an explicit `RunContext` (run id, progress sink, summary
//! accumulator, interrupt flag) instead of process-wide mutable state.
//! Per-subject collection failures are recoverable and end up in the
//! summary; only state-read and merge failures abort a run.

pub mod charts;
pub mod mentions;

use crate::progress::{self, ProgressEventKind, ProgressSender, RunStage};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Fatal run failures. Everything else is recovered locally.
#[derive(thiserror::Error, Debug)]
pub enum RunError {
    /// The store could not be read while resolving what to collect.
    /// No merge is attempted.
    #[error("failed to read collection state: {0}")]
    StateRead(#[source] anyhow::Error),

    /// The merge into the durable store failed. The transaction rolls
    /// back, so previously committed entries are untouched.
    #[error("failed to merge entries into the store: {0}")]
    Merge(#[source] anyhow::Error),
}

/// Convenience result type for pipeline runs.
pub type RunResult<T> = Result<T, RunError>;

/// What a run did, for operators and exit-code policy.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RunSummary {
    pub subjects_attempted: u32,
    pub subjects_succeeded: u32,
    pub subjects_skipped: u32,
    pub entries_merged: u32,
    /// Records dropped for a missing natural key.
    pub records_dropped: u32,
}

/// Per-run context threaded through a pipeline.
pub struct RunContext {
    /// Unique id for correlating events and logs.
    pub run_id: String,
    /// Accumulated outcome counters.
    pub summary: RunSummary,
    progress: Option<ProgressSender>,
    seq: u64,
    stage: RunStage,
    interrupt: Arc<AtomicBool>,
    started: Instant,
}

impl RunContext {
    /// Create a context, optionally wired to a progress channel.
    pub fn new(progress: Option<ProgressSender>) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            summary: RunSummary::default(),
            progress,
            seq: 0,
            stage: RunStage::Idle,
            interrupt: Arc::new(AtomicBool::new(false)),
            started: Instant::now(),
        }
    }

    /// Share an external interrupt flag (e.g. set from a ctrl-c handler).
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = flag;
        self
    }

    /// Current stage.
    pub fn stage(&self) -> RunStage {
        self.stage
    }

    /// Whether the run was asked to stop. Checked between subjects so a
    /// merge is never left half-applied.
    pub fn interrupted(&self) -> bool {
        self.interrupt.load(Ordering::Relaxed)
    }

    /// Transition to a new stage.
    pub fn enter(&mut self, stage: RunStage) {
        tracing::debug!(run_id = %self.run_id, from = %self.stage, to = %stage, "stage change");
        self.stage = stage;
        self.emit(ProgressEventKind::StageChanged { stage });
    }

    /// Emit a progress event for this run.
    pub fn emit(&mut self, event: ProgressEventKind) {
        progress::emit(&self.progress, &self.run_id, &mut self.seq, event);
    }

    /// Close out the run: emit the final summary and return to `Idle`.
    pub fn finish(&mut self) -> RunSummary {
        let summary = self.summary;
        self.emit(ProgressEventKind::RunCompleted {
            attempted: summary.subjects_attempted,
            succeeded: summary.subjects_succeeded,
            skipped: summary.subjects_skipped,
            merged: summary.entries_merged,
            elapsed_ms: self.started.elapsed().as_millis() as u64,
        });
        self.stage = RunStage::Idle;
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_transitions_emit_events() {
        let (tx, mut rx) = progress::channel();
        let mut ctx = RunContext::new(Some(tx));
        assert_eq!(ctx.stage(), RunStage::Idle);

        ctx.enter(RunStage::ResolvingRange);
        ctx.enter(RunStage::Collecting);
        ctx.summary.subjects_attempted = 2;
        ctx.summary.subjects_succeeded = 2;
        let summary = ctx.finish();

        assert_eq!(ctx.stage(), RunStage::Idle);
        assert_eq!(summary.subjects_attempted, 2);

        let first = rx.try_recv().unwrap();
        assert_eq!(first.seq, 1);
        assert!(matches!(
            first.event,
            ProgressEventKind::StageChanged {
                stage: RunStage::ResolvingRange
            }
        ));
        let _ = rx.try_recv().unwrap();
        let last = rx.try_recv().unwrap();
        assert!(matches!(
            last.event,
            ProgressEventKind::RunCompleted { succeeded: 2, .. }
        ));
    }

    #[test]
    fn test_interrupt_flag_is_shared() {
        let flag = Arc::new(AtomicBool::new(false));
        let ctx = RunContext::new(None).with_interrupt(Arc::clone(&flag));
        assert!(!ctx.interrupted());
        flag.store(true, Ordering::Relaxed);
        assert!(ctx.interrupted());
    }

    #[test]
    fn test_run_ids_are_unique() {
        let a = RunContext::new(None);
        let b = RunContext::new(None);
        assert_ne!(a.run_id, b.run_id);
    }
}
