//! TDD workflow state machine
//!
//! Tracks the phase of each task through the red/green/refactor cycle and
//! decides whether a commit is permitted right now. The phase record is
//! persisted per task by [`StateStore`], which serializes writers with an
//! advisory file lock and replaces the record atomically.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use policy_gate_types::{Phase, StateCheck};

mod store;

pub use store::StateStore;

#[derive(Debug, Error)]
pub enum StateError {
    /// Commit attempted from a phase that forbids it. Checked before any
    /// gate runs; maps to exit code 2.
    #[error("commits are not permitted while the task is in the {phase} phase")]
    IllegalCommitState { phase: Phase },

    #[error("cannot move from {from} to {to}")]
    IllegalTransition { from: Phase, to: Phase },

    /// Stopped to Red additionally requires a fresh coverage check.
    #[error("cannot start a red phase before a coverage check has run")]
    CoverageCheckRequired,

    #[error("could not acquire the state lock at {path} within {waited_ms} ms")]
    LockTimeout { path: String, waited_ms: u64 },

    #[error("state file {path} is unreadable: {reason}")]
    Corrupted { path: String, reason: String },

    #[error("state I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Persisted workflow record for one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub task_id: String,
    pub phase: Phase,
    /// When the current phase was entered
    pub entered_at: DateTime<Utc>,
    /// Last successful coverage check while stopped; consumed by the
    /// transition into Red
    pub coverage_checked_at: Option<DateTime<Utc>>,
}

impl WorkflowState {
    /// Fresh record for a task that has never been started.
    #[must_use]
    pub fn new(task_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            task_id: task_id.to_string(),
            phase: Phase::Stopped,
            entered_at: now,
            coverage_checked_at: None,
        }
    }

    /// Commit-permission check for the current phase.
    #[must_use]
    pub fn commit_check(&self) -> StateCheck {
        if self.phase.permits_commit() {
            StateCheck::pass(self.phase)
        } else {
            StateCheck::fail(
                self.phase,
                StateError::IllegalCommitState { phase: self.phase }.to_string(),
            )
        }
    }

    /// Apply a phase transition, enforcing the legal cycle.
    ///
    /// Legal moves: Stopped to Red (with a recorded coverage check), Red to
    /// Green, Green to Refactoring and back, and Green or Refactoring to
    /// Stopped when the task is done. Everything else is rejected.
    pub fn advance(&mut self, to: Phase, now: DateTime<Utc>) -> Result<(), StateError> {
        let legal = matches!(
            (self.phase, to),
            (Phase::Stopped, Phase::Red)
                | (Phase::Red, Phase::Green)
                | (Phase::Green, Phase::Refactoring)
                | (Phase::Refactoring, Phase::Green)
                | (Phase::Green, Phase::Stopped)
                | (Phase::Refactoring, Phase::Stopped)
        );
        if !legal {
            return Err(StateError::IllegalTransition {
                from: self.phase,
                to,
            });
        }
        if self.phase == Phase::Stopped && to == Phase::Red && self.coverage_checked_at.is_none() {
            return Err(StateError::CoverageCheckRequired);
        }
        self.enter(to, now);
        Ok(())
    }

    /// Force the task back to Stopped from any phase.
    pub fn abandon(&mut self, now: DateTime<Utc>) {
        self.enter(Phase::Stopped, now);
    }

    /// Record a successful coverage check while stopped.
    ///
    /// Has no effect in other phases; mid-cycle checks do not refresh the
    /// precondition for the next Red.
    pub fn record_coverage_check(&mut self, now: DateTime<Utc>) {
        if self.phase == Phase::Stopped {
            self.coverage_checked_at = Some(now);
        }
    }

    fn enter(&mut self, phase: Phase, now: DateTime<Utc>) {
        self.phase = phase;
        self.entered_at = now;
        // The check is consumed on leaving Stopped and must be redone
        // before the next cycle starts.
        self.coverage_checked_at = None;
    }
}
