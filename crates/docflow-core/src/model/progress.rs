//! PipelineProgress entity — tenant scope (spec §3, §4.5, §4.8 ProgressTracker).
//!
//! One row per job, updated after every step so observers (webhooks, UI
//! subscribers) can poll or subscribe to a percentage without replaying the
//! full `ExecutionRecord` history.

use serde::{Deserialize, Serialize};

use crate::id::{JobId, PipelineProgressId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineProgress {
    pub id: PipelineProgressId,
    pub job_id: JobId,
    pub total_stages: usize,
    pub completed_stages: usize,
    pub current_stage: Option<String>,
    pub status: ProgressStatus,
}

impl PipelineProgress {
    pub fn new(job_id: JobId, total_stages: usize) -> Self {
        Self {
            id: PipelineProgressId::new(),
            job_id,
            total_stages,
            completed_stages: 0,
            current_stage: None,
            status: ProgressStatus::Running,
        }
    }

    /// Percentage derived from `completed_stages / total_stages` (spec §3
    /// invariant: "percentage derived"). An empty pipeline is 100% complete.
    pub fn percentage(&self) -> u8 {
        if self.total_stages == 0 {
            return 100;
        }
        ((self.completed_stages as f64 / self.total_stages as f64) * 100.0).round() as u8
    }

    pub fn advance(&mut self, stage_name: impl Into<String>) {
        self.completed_stages = (self.completed_stages + 1).min(self.total_stages);
        self.current_stage = Some(stage_name.into());
    }

    pub fn finish(&mut self, status: ProgressStatus) {
        self.status = status;
    }
}
