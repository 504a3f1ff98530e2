//! Job entity — tenant scope (spec §3, §4.4, §4.5).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ErrorLogEntry;
use crate::id::{CampaignId, DocumentId, JobId};
use crate::model::pipeline::PipelineSnapshot;
use crate::state::{IllegalTransition, JobState};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub uuid: Uuid,
    pub campaign_id: CampaignId,
    pub document_id: DocumentId,
    /// Deep copy of `Campaign.pipeline` taken at creation time. Never
    /// mutated by later campaign edits (spec §3 "Pipeline snapshot").
    pub pipeline: PipelineSnapshot,
    pub current_processor_index: usize,
    pub queue_name: String,
    pub attempts: u32,
    pub max_attempts: u32,
    pub error_log: Vec<ErrorLogEntry>,
    pub state: JobState,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("current_processor_index {index} exceeds pipeline length {len}")]
    IndexOutOfBounds { index: usize, len: usize },
    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition<JobState>),
}

impl Job {
    pub fn new(campaign_id: CampaignId, document_id: DocumentId, pipeline: PipelineSnapshot) -> Self {
        Self {
            id: JobId::new(),
            uuid: Uuid::new_v4(),
            campaign_id,
            document_id,
            pipeline,
            current_processor_index: 0,
            queue_name: "default".to_string(),
            attempts: 0,
            max_attempts: 3,
            error_log: Vec::new(),
            state: JobState::Pending,
            created_at: chrono::Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn start(&mut self) -> Result<(), JobError> {
        let next = self.state.transition_to(JobState::Running)?;
        self.state = next;
        self.started_at = Some(chrono::Utc::now());
        Ok(())
    }

    pub fn complete(&mut self) -> Result<(), JobError> {
        let next = self.state.transition_to(JobState::Completed)?;
        self.state = next;
        self.finished_at = Some(chrono::Utc::now());
        Ok(())
    }

    /// Enter the failed state. Per spec §4.4 "Entering failed increments
    /// attempts and appends to error_log" — whole-job attempts, distinct
    /// from per-step Activity retries (spec §4.5 "Retries").
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), JobError> {
        let next = self.state.transition_to(JobState::Failed)?;
        self.state = next;
        self.attempts += 1;
        self.error_log.push(ErrorLogEntry::new(self.attempts, message));
        self.finished_at = Some(chrono::Utc::now());
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), JobError> {
        let next = self.state.transition_to(JobState::Cancelled)?;
        self.state = next;
        self.finished_at = Some(chrono::Utc::now());
        Ok(())
    }

    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }

    pub fn advance(&mut self) -> Result<(), JobError> {
        let next = self.current_processor_index + 1;
        if next > self.pipeline.len() {
            return Err(JobError::IndexOutOfBounds {
                index: next,
                len: self.pipeline.len(),
            });
        }
        self.current_processor_index = next;
        Ok(())
    }

    /// True once every step has been dispatched (spec §8 boundary:
    /// `current_processor_index == len(pipeline.processors)`).
    pub fn at_pipeline_end(&self) -> bool {
        self.current_processor_index >= self.pipeline.len()
    }
}
