//! Durable per-step loop driving one job's pipeline to completion (spec
//! §4.6).
//!
//! Unlike a YAML-graph walker, pipelines here are declared linear (spec
//! §3 `PipelineSnapshot`), so the engine advances `current_processor_index`
//! by one each step instead of following named transitions.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use docflow_core::error::PipelineError;
use docflow_core::model::{Document, Job};
use docflow_core::state::{DocumentState, IllegalTransition, JobState};
use docflow_core::store::{TenantStore, TenantStoreError};
use tracing::{info, warn};

use crate::activity::{ActivityRunner, StepOutcome};
use crate::job_manager::{JobManager, JobManagerError};
use crate::retry::RetryPolicy;
use crate::signal::{SignalBox, SignalPayload};
use crate::store::{SuspendedWait, WorkflowRunState, WorkflowStore, WorkflowStoreError};

#[derive(Debug, thiserror::Error)]
pub enum WorkflowEngineError {
    #[error(transparent)]
    JobManager(#[from] JobManagerError),
    #[error(transparent)]
    WorkflowStore(#[from] WorkflowStoreError),
    #[error(transparent)]
    DocumentTransition(#[from] IllegalTransition<DocumentState>),
    #[error(transparent)]
    Job(#[from] docflow_core::model::JobError),
    #[error(transparent)]
    Store(#[from] TenantStoreError),
}

/// Drives a single job's pipeline end to end. One `WorkflowEngine::run`
/// call is "one logical workflow" in the spec's scheduling model — many run
/// concurrently across a worker pool, each against its own `(job, document)`
/// pair.
pub struct WorkflowEngine {
    job_manager: Arc<JobManager>,
    activity_runner: Arc<ActivityRunner>,
    workflow_store: Arc<dyn WorkflowStore>,
    signals: Arc<SignalBox>,
    tenant_store: Arc<dyn TenantStore>,
}

impl WorkflowEngine {
    pub fn new(
        job_manager: Arc<JobManager>,
        activity_runner: Arc<ActivityRunner>,
        workflow_store: Arc<dyn WorkflowStore>,
        signals: Arc<SignalBox>,
        tenant_store: Arc<dyn TenantStore>,
    ) -> Self {
        Self {
            job_manager,
            activity_runner,
            workflow_store,
            signals,
            tenant_store,
        }
    }

    /// Run (or resume) `job` to a terminal state. Safe to call again after a
    /// crash: `WorkflowRunState` rehydrates `last_completed_step` and
    /// `suspended_on`, so already-completed steps are never re-invoked
    /// (spec §4.6 "Durability contract").
    pub async fn run(&self, job: &mut Job, document: &mut Document) -> Result<(), WorkflowEngineError> {
        let mut run_state = self
            .workflow_store
            .load(job.id)
            .await?
            .unwrap_or_else(|| WorkflowRunState::new(job.id));

        if job.state == JobState::Pending {
            job.start()?;
            document.transition_to(DocumentState::Processing)?;
            self.tenant_store.put_job(job.clone()).await?;
            self.tenant_store.put_document(document.clone()).await?;
        }

        let start_index = run_state.last_completed_step.map(|i| i + 1).unwrap_or(0);

        for step_index in start_index..job.pipeline.len() {
            if run_state.cancel_requested {
                info!(tenant_id = %self.tenant_store.tenant_id(), job_id = %job.id, step_index, "cancellation observed, stopping");
                self.job_manager.cancel(job, document).await?;
                return Ok(());
            }

            let slug = job.pipeline.step(step_index).and_then(|s| s.id.clone());

            let output = match self.resume_or_dispatch(job, document, step_index, &mut run_state).await {
                Ok(output) => output,
                Err(StepResolution::Cancelled) => {
                    self.job_manager.cancel(job, document).await?;
                    return Ok(());
                }
                Err(StepResolution::Failed(err)) => {
                    self.job_manager.fail(job, document, err.to_string()).await?;
                    return Ok(());
                }
            };

            if let (Some(slug), Some(output)) = (slug, output) {
                run_state.previous_outputs.insert(slug, output);
            }
            run_state.last_completed_step = Some(step_index);
            run_state.suspended_on = None;
            self.workflow_store.save(run_state.clone()).await?;

            let stage_name = job
                .pipeline
                .step(step_index)
                .and_then(|s| s.id.as_deref())
                .unwrap_or("skipped")
                .to_string();
            self.job_manager.advance(job, &stage_name).await?;
        }

        self.job_manager.complete(job, document).await?;
        Ok(())
    }

    /// Resolve one pipeline index: if the run was suspended here, wait on
    /// the signal instead of re-dispatching; otherwise dispatch through
    /// `ActivityRunner` with retries per the step's policy.
    async fn resume_or_dispatch(
        &self,
        job: &Job,
        document: &mut Document,
        step_index: usize,
        run_state: &mut WorkflowRunState,
    ) -> Result<Option<HashMap<String, serde_json::Value>>, StepResolution> {
        if let Some(wait) = run_state.suspended_on.clone() {
            if wait.step_index == step_index {
                let signal = self.signals.wait(job.id, &wait.signal_name).await;
                return Ok(Some(Self::merge_signal_into_output(run_state, job, step_index, signal)));
            }
        }

        let category = job
            .pipeline
            .step(step_index)
            .map(|s| s.kind.as_str())
            .unwrap_or("default");
        let policy = RetryPolicy::for_category(category);

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let outcome = tokio::time::timeout(
                policy.timeout,
                self.activity_runner.run_step(job, document, step_index, &run_state.previous_outputs),
            )
            .await;

            let result = match outcome {
                Ok(result) => result,
                Err(_) => Err(PipelineError::Transient(format!(
                    "step {step_index} exceeded {:?} timeout",
                    policy.timeout
                ))),
            };

            match result {
                Ok(StepOutcome::Skipped) => return Ok(None),
                Ok(StepOutcome::Completed { output, awaiting_callback }) => {
                    if let Some(transaction_id) = awaiting_callback {
                        run_state.suspended_on = Some(SuspendedWait {
                            signal_name: transaction_id.clone(),
                            step_index,
                        });
                        if let Some(slug) = job.pipeline.step(step_index).and_then(|s| s.id.clone()) {
                            run_state.previous_outputs.insert(slug, output);
                        }
                        if let Err(err) = self.workflow_store.save(run_state.clone()).await {
                            return Err(StepResolution::Failed(err.into()));
                        }
                        let signal = self.signals.wait(job.id, &transaction_id).await;
                        return Ok(Some(Self::merge_signal_into_output(run_state, job, step_index, signal)));
                    }
                    return Ok(Some(output));
                }
                Err(err) if err.is_retryable() && attempt < policy.max_attempts => {
                    warn!(
                        tenant_id = %self.tenant_store.tenant_id(),
                        job_id = %job.id,
                        step_index,
                        attempt,
                        max_attempts = policy.max_attempts,
                        error = %err,
                        "retrying step"
                    );
                    continue;
                }
                Err(err) => return Err(StepResolution::from_pipeline_error(err)),
            }
        }
    }

    /// Folds a delivered signal's status/payload into the suspended step's
    /// already-recorded output, keyed the same way as any other completed
    /// step (spec §4.6 step 6: "resume when the signal arrives").
    fn merge_signal_into_output(
        run_state: &WorkflowRunState,
        job: &Job,
        step_index: usize,
        signal: SignalPayload,
    ) -> HashMap<String, serde_json::Value> {
        let slug = job.pipeline.step(step_index).and_then(|s| s.id.as_deref()).unwrap_or_default();
        let mut output = run_state.previous_outputs.get(slug).cloned().unwrap_or_default();
        output.insert("callback_status".to_string(), serde_json::json!(signal.status));
        output.insert("callback_payload".to_string(), signal.payload);
        output
    }
}

/// Internal classification of a non-retryable stop for `resume_or_dispatch`.
/// `Cancelled` is split out so a `cancel()` observed mid-dispatch (the error
/// taxonomy's own `PipelineError::Cancelled`) routes through
/// `JobManager::cancel` rather than `JobManager::fail`.
enum StepResolution {
    Cancelled,
    Failed(PipelineError),
}

impl StepResolution {
    fn from_pipeline_error(err: PipelineError) -> Self {
        match err {
            PipelineError::Cancelled => StepResolution::Cancelled,
            other => StepResolution::Failed(other),
        }
    }
}

impl From<WorkflowStoreError> for StepResolution {
    fn from(err: WorkflowStoreError) -> Self {
        StepResolution::Failed(PipelineError::Store(err.to_string()))
    }
}
