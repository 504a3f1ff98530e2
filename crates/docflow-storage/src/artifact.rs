//! Execution artifacts: files a processor produces, keyed by
//! `(execution_id, collection_name)` (spec §4.8).

use std::sync::Arc;

use docflow_core::id::{DocumentId, ExecutionRecordId};
use docflow_core::store::{TenantStore, TenantStoreError};

use crate::blob::{BlobStore, BlobStoreError};

#[derive(Debug, thiserror::Error)]
pub enum ArtifactStoreError {
    #[error(transparent)]
    Blob(#[from] BlobStoreError),
    #[error(transparent)]
    Store(#[from] TenantStoreError),
    #[error("document {0} has no job to attach an artifact to")]
    NoJobForDocument(DocumentId),
    #[error("document {0} has no completed '{1}' execution to attach an artifact to")]
    NoMatchingExecution(DocumentId, String),
}

/// Adapts a plain `BlobStore` to the execution/collection keying scheme and
/// the "find the latest matching execution for this document" lookup
/// (spec §4.8 "When a caller references only a document...").
pub struct ArtifactStore {
    blobs: Arc<dyn BlobStore>,
    tenant_store: Arc<dyn TenantStore>,
}

impl ArtifactStore {
    pub fn new(blobs: Arc<dyn BlobStore>, tenant_store: Arc<dyn TenantStore>) -> Self {
        Self { blobs, tenant_store }
    }

    fn key(execution_id: ExecutionRecordId, collection_name: &str, filename: &str) -> String {
        format!("executions/{execution_id}/{collection_name}/{filename}")
    }

    pub async fn put(
        &self,
        execution_id: ExecutionRecordId,
        collection_name: &str,
        filename: &str,
        content: &[u8],
    ) -> Result<String, ArtifactStoreError> {
        let key = Self::key(execution_id, collection_name, filename);
        self.blobs.put(&key, content).await?;
        Ok(key)
    }

    pub async fn get(&self, key: &str) -> Result<Vec<u8>, ArtifactStoreError> {
        Ok(self.blobs.get(key).await?)
    }

    /// Store an artifact under the most recent `completed` execution of
    /// `processor_category` on `document`'s latest job, without the caller
    /// having to know the execution id.
    pub async fn put_for_document(
        &self,
        document_id: DocumentId,
        processor_category: &str,
        collection_name: &str,
        filename: &str,
        content: &[u8],
    ) -> Result<String, ArtifactStoreError> {
        let job = self
            .tenant_store
            .latest_job_for_document(document_id)
            .await?
            .ok_or(ArtifactStoreError::NoJobForDocument(document_id))?;

        let records = self.tenant_store.execution_records_for_job(job.id).await?;
        let mut matching: Vec<_> = Vec::new();
        for record in records {
            if record.state != docflow_core::state::ExecutionState::Completed {
                continue;
            }
            if let Some(processor) = self.tenant_store.get_processor(record.processor_id).await? {
                if processor.category == processor_category {
                    matching.push(record);
                }
            }
        }
        let execution = matching
            .into_iter()
            .max_by_key(|r| r.finished_at)
            .ok_or_else(|| ArtifactStoreError::NoMatchingExecution(document_id, processor_category.to_string()))?;

        self.put(execution.id, collection_name, filename, content).await
    }
}
