//! Job lifecycle orchestration (spec §4.5).

use std::sync::Arc;

use docflow_core::model::{Auditable, AuditLog, Campaign, Document, Job, ProgressStatus};
use docflow_core::state::{DocumentState, IllegalTransition};
use docflow_core::store::{TenantStore, TenantStoreError};
use tracing::info;

use crate::event_bus::{EngineEvent, EventBus};
use crate::progress::ProgressTracker;

#[derive(Debug, thiserror::Error)]
pub enum JobManagerError {
    #[error(transparent)]
    Job(#[from] docflow_core::model::JobError),
    #[error(transparent)]
    DocumentTransition(#[from] IllegalTransition<DocumentState>),
    #[error(transparent)]
    Store(#[from] TenantStoreError),
}

/// Creates jobs from `(document, campaign)` pairs and drives the three
/// terminal transitions. `JobManager` never invokes a processor itself —
/// that is `WorkflowEngine`/`ActivityRunner`'s job — it only owns the job
/// and document bookkeeping around execution.
pub struct JobManager {
    store: Arc<dyn TenantStore>,
    events: Arc<dyn EventBus>,
}

impl JobManager {
    pub fn new(store: Arc<dyn TenantStore>, events: Arc<dyn EventBus>) -> Self {
        Self { store, events }
    }

    /// Appends one audit log entry for `job` (spec §3 AuditLog: "written at
    /// every state transition the domain cares about"). Append-only and
    /// best-effort: a failure here must never fail the transition it is
    /// recording, only be logged.
    async fn record_audit(&self, job: &Job, event: &str) {
        let entry = AuditLog::new(self.store.tenant_id(), Auditable::Job { id: job.id }, event);
        if let Err(err) = self.store.append_audit_log(entry).await {
            tracing::warn!(tenant_id = %self.store.tenant_id(), job_id = %job.id, error = %err, "failed to append audit log entry");
        }
    }

    /// Copies `campaign.pipeline` into `job.pipeline`, creates the
    /// `PipelineProgress` row, emits `JobCreated`, and queues the document
    /// (spec §4.5 `create`).
    pub async fn create(&self, document: &mut Document, campaign: &Campaign) -> Result<Job, JobManagerError> {
        let job = Job::new(campaign.id, document.id, campaign.pipeline.clone());
        self.store.put_job(job.clone()).await?;
        ProgressTracker::start(self.store.as_ref(), job.id, job.pipeline.len()).await?;

        document.transition_to(DocumentState::Queued)?;
        self.store.put_document(document.clone()).await?;

        info!(tenant_id = %self.store.tenant_id(), job_id = %job.id, document_id = %document.id, "job created");
        self.record_audit(&job, "job.created").await;
        self.events.publish(EngineEvent::JobCreated {
            job_id: job.id,
            document_id: document.id,
            campaign_id: campaign.id,
        });

        Ok(job)
    }

    /// Increments `current_processor_index` and advances progress (spec
    /// §4.5 `advance`). The engine calls this after each successfully
    /// dispatched step.
    pub async fn advance(&self, job: &mut Job, stage_name: &str) -> Result<(), JobManagerError> {
        job.advance()?;
        self.store.put_job(job.clone()).await?;
        ProgressTracker::advance(self.store.as_ref(), job.id, stage_name).await?;
        Ok(())
    }

    /// Terminal success: cascades `Document` to `completed`, finishes
    /// progress, emits `DocumentProcessingCompleted` for webhook delivery.
    /// Assumes the engine already moved `document` into `processing` when
    /// dispatch began — `completed`/`failed` are only reachable from there.
    pub async fn complete(&self, job: &mut Job, document: &mut Document) -> Result<(), JobManagerError> {
        if job.state.is_terminal() {
            return Ok(());
        }
        job.complete()?;
        document.transition_to(DocumentState::Completed)?;
        self.store.put_job(job.clone()).await?;
        self.store.put_document(document.clone()).await?;
        ProgressTracker::finish(self.store.as_ref(), job.id, ProgressStatus::Completed).await?;

        info!(tenant_id = %self.store.tenant_id(), job_id = %job.id, "job completed");
        self.record_audit(job, "job.completed").await;
        self.events.publish(EngineEvent::DocumentProcessingCompleted {
            job_id: job.id,
            document_id: document.id,
            campaign_id: job.campaign_id,
        });
        Ok(())
    }

    /// Terminal failure: increments `job.attempts`, appends to
    /// `error_log`, cascades `Document` to `failed`, emits
    /// `DocumentProcessingFailed` (spec §4.5 `fail`, §7 "User-visible
    /// behavior"). The error message must already be scrubbed of
    /// credential material by the caller — this method logs and persists
    /// it verbatim.
    pub async fn fail(
        &self,
        job: &mut Job,
        document: &mut Document,
        error: impl Into<String>,
    ) -> Result<(), JobManagerError> {
        if job.state.is_terminal() {
            return Ok(());
        }
        let error = error.into();
        job.fail(error.clone())?;
        document.transition_to(DocumentState::Failed)?;
        self.store.put_job(job.clone()).await?;
        self.store.put_document(document.clone()).await?;
        ProgressTracker::finish(self.store.as_ref(), job.id, ProgressStatus::Failed).await?;

        tracing::warn!(tenant_id = %self.store.tenant_id(), job_id = %job.id, %error, "job failed");
        self.record_audit(job, "job.failed").await;
        self.events.publish(EngineEvent::DocumentProcessingFailed {
            job_id: job.id,
            document_id: document.id,
            campaign_id: job.campaign_id,
            error,
        });
        Ok(())
    }

    /// Cooperative cancellation: the job/document reach `cancelled` at the
    /// workflow's next boundary, not immediately (spec §4.6 "Cancellation").
    pub async fn cancel(&self, job: &mut Job, document: &mut Document) -> Result<(), JobManagerError> {
        if job.state.is_terminal() {
            return Ok(());
        }
        job.cancel()?;
        document.transition_to(DocumentState::Cancelled)?;
        self.store.put_job(job.clone()).await?;
        self.store.put_document(document.clone()).await?;
        ProgressTracker::finish(self.store.as_ref(), job.id, ProgressStatus::Cancelled).await?;
        info!(tenant_id = %self.store.tenant_id(), job_id = %job.id, "job cancelled");
        self.record_audit(job, "job.cancelled").await;
        Ok(())
    }
}
