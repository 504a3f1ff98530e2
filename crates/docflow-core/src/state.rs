//! State machines for Document, Job, and ExecutionRecord (spec §4.4).

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("illegal transition from {from:?} to {to:?}")]
pub struct IllegalTransition<S: std::fmt::Debug> {
    pub from: S,
    pub to: S,
}

/// Document lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentState {
    Pending,
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl DocumentState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether `self -> target` is one of the transitions spec §4.4 allows.
    pub fn can_transition_to(self, target: DocumentState) -> bool {
        use DocumentState::*;
        matches!(
            (self, target),
            (Pending, Queued)
                | (Pending, Processing)
                | (Pending, Completed)
                | (Pending, Failed)
                | (Pending, Cancelled)
                | (Queued, Processing)
                | (Queued, Cancelled)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Processing, Cancelled)
        )
    }

    /// Apply a transition, returning the new state or rejecting an illegal
    /// move. Re-entry into a terminal state is a no-op rather than an error.
    pub fn transition_to(self, target: DocumentState) -> Result<DocumentState, IllegalTransition<DocumentState>> {
        if self.is_terminal() && target == self {
            return Ok(self);
        }
        if self.can_transition_to(target) {
            Ok(target)
        } else {
            Err(IllegalTransition { from: self, to: target })
        }
    }
}

/// Job lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn can_transition_to(self, target: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, target),
            (Pending, Running)
                | (Pending, Cancelled)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
        )
    }

    pub fn transition_to(self, target: JobState) -> Result<JobState, IllegalTransition<JobState>> {
        if self.is_terminal() && target == self {
            return Ok(self);
        }
        if self.can_transition_to(target) {
            Ok(target)
        } else {
            Err(IllegalTransition { from: self, to: target })
        }
    }
}

/// Per-step execution record state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    Pending,
    Running,
    Completed,
    Failed,
    /// The pipeline step had no `id` (slug) and was never dispatched to a
    /// handler (spec §4.6 step 1: "emit a skip record and advance").
    Skipped,
}

impl ExecutionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }

    pub fn can_transition_to(self, target: ExecutionState) -> bool {
        use ExecutionState::*;
        matches!(
            (self, target),
            (Pending, Running) | (Running, Completed) | (Running, Failed) | (Pending, Skipped)
        )
    }

    pub fn transition_to(self, target: ExecutionState) -> Result<ExecutionState, IllegalTransition<ExecutionState>> {
        if self.is_terminal() && target == self {
            return Ok(self);
        }
        if self.can_transition_to(target) {
            Ok(target)
        } else {
            Err(IllegalTransition { from: self, to: target })
        }
    }
}
