//! ExecutionRecord entity — tenant scope (spec §3, §4.4, §4.7).
//!
//! The per-step audit and state carrier within a job: one row per
//! `(job, processor step)`, created when the step starts and moved through
//! `pending -> running -> {completed|failed}` by the `ActivityRunner`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::id::{ExecutionRecordId, JobId, ProcessorId};
use crate::state::{ExecutionState, IllegalTransition};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: ExecutionRecordId,
    pub job_id: JobId,
    pub processor_id: ProcessorId,
    /// Index of this step within the job's pipeline snapshot.
    pub step_index: usize,
    /// Processor slug, duplicated from the pipeline step for convenience —
    /// this is what `previous_outputs` in the Activity payload is keyed by.
    pub slug: String,
    pub input: HashMap<String, serde_json::Value>,
    pub output: HashMap<String, serde_json::Value>,
    pub config: serde_json::Value,
    pub duration_ms: Option<u64>,
    pub error: Option<String>,
    pub tokens_used: Option<u64>,
    pub cost_credits: Option<f64>,
    pub state: ExecutionState,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutionRecordError {
    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition<ExecutionState>),
}

impl ExecutionRecord {
    pub fn new(
        job_id: JobId,
        processor_id: ProcessorId,
        step_index: usize,
        slug: impl Into<String>,
        config: serde_json::Value,
    ) -> Self {
        Self {
            id: ExecutionRecordId::new(),
            job_id,
            processor_id,
            step_index,
            slug: slug.into(),
            input: HashMap::new(),
            output: HashMap::new(),
            config,
            duration_ms: None,
            error: None,
            tokens_used: None,
            cost_credits: None,
            state: ExecutionState::Pending,
            created_at: chrono::Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn start(&mut self) -> Result<(), ExecutionRecordError> {
        self.state = self.state.transition_to(ExecutionState::Running)?;
        self.started_at = Some(chrono::Utc::now());
        Ok(())
    }

    pub fn complete(
        &mut self,
        output: HashMap<String, serde_json::Value>,
        tokens_used: Option<u64>,
        cost_credits: Option<f64>,
    ) -> Result<(), ExecutionRecordError> {
        self.state = self.state.transition_to(ExecutionState::Completed)?;
        self.output = output;
        self.tokens_used = tokens_used;
        self.cost_credits = cost_credits;
        let finished_at = chrono::Utc::now();
        if let Some(started_at) = self.started_at {
            self.duration_ms = Some((finished_at - started_at).num_milliseconds().max(0) as u64);
        }
        self.finished_at = Some(finished_at);
        Ok(())
    }

    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), ExecutionRecordError> {
        self.state = self.state.transition_to(ExecutionState::Failed)?;
        self.error = Some(error.into());
        let finished_at = chrono::Utc::now();
        if let Some(started_at) = self.started_at {
            self.duration_ms = Some((finished_at - started_at).num_milliseconds().max(0) as u64);
        }
        self.finished_at = Some(finished_at);
        Ok(())
    }

    /// Marks a pipeline step with no processor id as skipped rather than
    /// dispatched (spec §4.6 step 1). Never runs, so it moves straight from
    /// `pending` to the terminal `skipped` state.
    pub fn skip(&mut self) -> Result<(), ExecutionRecordError> {
        self.state = self.state.transition_to(ExecutionState::Skipped)?;
        self.finished_at = Some(chrono::Utc::now());
        Ok(())
    }
}
