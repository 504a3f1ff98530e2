//! Durable workflow state (spec §4.6 "Durability contract").
//!
//! Persists exactly what the spec calls out: "the last completed step
//! index, the return value of each Activity, and any in-flight signal
//! waiters." All three live in one [`WorkflowRunState`] record, saved
//! after every boundary the engine crosses, so a crashed or redeployed
//! worker rehydrates from here instead of losing the job.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use docflow_core::id::JobId;
use tokio::sync::RwLock;

/// What the workflow is parked on, if anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuspendedWait {
    /// The external transaction id / signal name.
    pub signal_name: String,
    /// Pipeline step index the suspension happened at.
    pub step_index: usize,
}

#[derive(Debug, Clone)]
pub struct WorkflowRunState {
    pub job_id: JobId,
    /// Index of the last step whose Activity result was durably recorded.
    pub last_completed_step: Option<usize>,
    /// Every completed step's output, keyed by processor slug — the
    /// `previous_outputs_map` the spec's per-step Activity payload carries.
    pub previous_outputs: HashMap<String, HashMap<String, serde_json::Value>>,
    pub suspended_on: Option<SuspendedWait>,
    /// Set by an external `cancel(job)` call; consulted at the next
    /// suspension point (spec §4.6 "Cancellation").
    pub cancel_requested: bool,
}

impl WorkflowRunState {
    pub fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            last_completed_step: None,
            previous_outputs: HashMap::new(),
            suspended_on: None,
            cancel_requested: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkflowStoreError {
    #[error("workflow store backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn load(&self, job_id: JobId) -> Result<Option<WorkflowRunState>, WorkflowStoreError>;
    async fn save(&self, state: WorkflowRunState) -> Result<(), WorkflowStoreError>;
    async fn request_cancel(&self, job_id: JobId) -> Result<(), WorkflowStoreError>;
}

/// In-memory `WorkflowStore`, used by tests and the CLI's `--in-memory`
/// mode. A real deployment backs this with the same durable storage the
/// rest of the tenant database uses, so a worker crash never loses the
/// record.
#[derive(Default)]
pub struct InMemoryWorkflowStore {
    states: RwLock<HashMap<JobId, WorkflowRunState>>,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn load(&self, job_id: JobId) -> Result<Option<WorkflowRunState>, WorkflowStoreError> {
        Ok(self.states.read().await.get(&job_id).cloned())
    }

    async fn save(&self, state: WorkflowRunState) -> Result<(), WorkflowStoreError> {
        self.states.write().await.insert(state.job_id, state);
        Ok(())
    }

    async fn request_cancel(&self, job_id: JobId) -> Result<(), WorkflowStoreError> {
        let mut states = self.states.write().await;
        let state = states.entry(job_id).or_insert_with(|| WorkflowRunState::new(job_id));
        state.cancel_requested = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_run_state() {
        let store = InMemoryWorkflowStore::new();
        let job_id = JobId::new();
        let mut state = WorkflowRunState::new(job_id);
        state.last_completed_step = Some(1);
        state.previous_outputs.insert("ocr".into(), HashMap::new());
        store.save(state).await.unwrap();

        let loaded = store.load(job_id).await.unwrap().unwrap();
        assert_eq!(loaded.last_completed_step, Some(1));
        assert!(loaded.previous_outputs.contains_key("ocr"));
    }

    #[tokio::test]
    async fn cancel_request_persists_even_before_the_workflow_has_run() {
        let store = InMemoryWorkflowStore::new();
        let job_id = JobId::new();
        store.request_cancel(job_id).await.unwrap();
        assert!(store.load(job_id).await.unwrap().unwrap().cancel_requested);
    }
}
