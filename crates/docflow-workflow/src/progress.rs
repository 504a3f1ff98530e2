//! Real-time percentage tracking (spec §2 component 8, §3 `PipelineProgress`).

use docflow_core::id::JobId;
use docflow_core::model::{PipelineProgress, ProgressStatus};
use docflow_core::store::{TenantStore, TenantStoreError};

/// Thin wrapper over `TenantStore`'s `PipelineProgress` row: the engine
/// never manipulates the entity's fields directly, so "percentage derived"
/// (spec §3 invariant) and "completed_stages ≤ total_stages" stay owned by
/// [`PipelineProgress`] itself.
pub struct ProgressTracker;

impl ProgressTracker {
    /// One row per job, created alongside it (spec §4.5 `JobManager::create`).
    pub async fn start(store: &dyn TenantStore, job_id: JobId, total_stages: usize) -> Result<(), TenantStoreError> {
        store.put_progress(PipelineProgress::new(job_id, total_stages)).await
    }

    /// Called after each step dispatch (spec §4.5 `advance`).
    pub async fn advance(store: &dyn TenantStore, job_id: JobId, stage_name: &str) -> Result<(), TenantStoreError> {
        if let Some(mut progress) = store.get_progress(job_id).await? {
            progress.advance(stage_name);
            store.put_progress(progress).await?;
        }
        Ok(())
    }

    pub async fn finish(store: &dyn TenantStore, job_id: JobId, status: ProgressStatus) -> Result<(), TenantStoreError> {
        if let Some(mut progress) = store.get_progress(job_id).await? {
            progress.finish(status);
            store.put_progress(progress).await?;
        }
        Ok(())
    }
}
