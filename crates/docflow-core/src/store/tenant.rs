//! Per-tenant database (spec §3, §5 "Isolation").
//!
//! One `TenantStore` instance is provisioned per tenant and never shared; a
//! caller obtains a handle only through `docflow_tenant::TenantContext`,
//! which is what makes "no query made under a different tenant's context
//! can read it" (spec §8) true by construction rather than by convention.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::id::{CampaignId, CredentialId, DocumentId, ExecutionRecordId, JobId, ProcessorId, TenantId};
use crate::model::{
    AuditLog, Campaign, Credential, CredentialScope, Document, ExecutionRecord, Job,
    PipelineProgress, ProcessorCatalogEntry, UsageEvent,
};

#[derive(Debug, thiserror::Error)]
pub enum TenantStoreError {
    #[error("campaign not found: {0}")]
    CampaignNotFound(String),
    #[error("processor not found: {0}")]
    ProcessorNotFound(String),
    #[error("document not found: {0}")]
    DocumentNotFound(String),
    #[error("job not found: {0}")]
    JobNotFound(String),
    #[error("execution record not found: {0}")]
    ExecutionRecordNotFound(String),
}

#[async_trait]
pub trait TenantStore: Send + Sync {
    fn tenant_id(&self) -> TenantId;

    async fn get_campaign(&self, id: CampaignId) -> Result<Option<Campaign>, TenantStoreError>;
    async fn get_campaign_by_slug(&self, slug: &str) -> Result<Option<Campaign>, TenantStoreError>;
    async fn put_campaign(&self, campaign: Campaign) -> Result<(), TenantStoreError>;

    async fn get_processor(&self, id: ProcessorId) -> Result<Option<ProcessorCatalogEntry>, TenantStoreError>;
    async fn get_processor_by_slug(&self, slug: &str) -> Result<Option<ProcessorCatalogEntry>, TenantStoreError>;
    async fn put_processor(&self, processor: ProcessorCatalogEntry) -> Result<(), TenantStoreError>;

    async fn get_document(&self, id: DocumentId) -> Result<Option<Document>, TenantStoreError>;
    async fn put_document(&self, document: Document) -> Result<(), TenantStoreError>;

    async fn get_job(&self, id: JobId) -> Result<Option<Job>, TenantStoreError>;
    async fn put_job(&self, job: Job) -> Result<(), TenantStoreError>;
    /// The most recent job created against a document, if any (spec §3
    /// "A Document may have many Jobs over its lifetime").
    async fn latest_job_for_document(&self, document_id: DocumentId) -> Result<Option<Job>, TenantStoreError>;

    async fn get_execution_record(&self, id: ExecutionRecordId) -> Result<Option<ExecutionRecord>, TenantStoreError>;
    async fn put_execution_record(&self, record: ExecutionRecord) -> Result<(), TenantStoreError>;
    async fn execution_records_for_job(&self, job_id: JobId) -> Result<Vec<ExecutionRecord>, TenantStoreError>;

    async fn get_progress(&self, job_id: JobId) -> Result<Option<PipelineProgress>, TenantStoreError>;
    async fn put_progress(&self, progress: PipelineProgress) -> Result<(), TenantStoreError>;

    async fn find_credential(
        &self,
        scope_type: CredentialScope,
        scope_id: Option<uuid::Uuid>,
        key: &str,
    ) -> Result<Option<Credential>, TenantStoreError>;
    async fn put_credential(&self, credential: Credential) -> Result<(), TenantStoreError>;
    async fn touch_credential(&self, id: CredentialId) -> Result<(), TenantStoreError>;

    async fn append_audit_log(&self, entry: AuditLog) -> Result<(), TenantStoreError>;
    async fn append_usage_event(&self, event: UsageEvent) -> Result<(), TenantStoreError>;
}

/// In-memory `TenantStore`, one instance per tenant. Used by tests and the
/// CLI's `--in-memory` mode.
pub struct InMemoryTenantStore {
    tenant_id: TenantId,
    campaigns: RwLock<HashMap<CampaignId, Campaign>>,
    processors: RwLock<HashMap<ProcessorId, ProcessorCatalogEntry>>,
    documents: RwLock<HashMap<DocumentId, Document>>,
    jobs: RwLock<HashMap<JobId, Job>>,
    execution_records: RwLock<HashMap<ExecutionRecordId, ExecutionRecord>>,
    progress: RwLock<HashMap<JobId, PipelineProgress>>,
    credentials: RwLock<HashMap<CredentialId, Credential>>,
    audit_logs: RwLock<Vec<AuditLog>>,
    usage_events: RwLock<Vec<UsageEvent>>,
}

impl InMemoryTenantStore {
    pub fn new(tenant_id: TenantId) -> Arc<Self> {
        Arc::new(Self {
            tenant_id,
            campaigns: RwLock::new(HashMap::new()),
            processors: RwLock::new(HashMap::new()),
            documents: RwLock::new(HashMap::new()),
            jobs: RwLock::new(HashMap::new()),
            execution_records: RwLock::new(HashMap::new()),
            progress: RwLock::new(HashMap::new()),
            credentials: RwLock::new(HashMap::new()),
            audit_logs: RwLock::new(Vec::new()),
            usage_events: RwLock::new(Vec::new()),
        })
    }

    pub async fn audit_log_count(&self) -> usize {
        self.audit_logs.read().await.len()
    }

    pub async fn usage_events(&self) -> Vec<UsageEvent> {
        self.usage_events.read().await.clone()
    }
}

#[async_trait]
impl TenantStore for InMemoryTenantStore {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    async fn get_campaign(&self, id: CampaignId) -> Result<Option<Campaign>, TenantStoreError> {
        Ok(self.campaigns.read().await.get(&id).cloned())
    }

    async fn get_campaign_by_slug(&self, slug: &str) -> Result<Option<Campaign>, TenantStoreError> {
        Ok(self.campaigns.read().await.values().find(|c| c.slug == slug).cloned())
    }

    async fn put_campaign(&self, campaign: Campaign) -> Result<(), TenantStoreError> {
        self.campaigns.write().await.insert(campaign.id, campaign);
        Ok(())
    }

    async fn get_processor(&self, id: ProcessorId) -> Result<Option<ProcessorCatalogEntry>, TenantStoreError> {
        Ok(self.processors.read().await.get(&id).cloned())
    }

    async fn get_processor_by_slug(&self, slug: &str) -> Result<Option<ProcessorCatalogEntry>, TenantStoreError> {
        Ok(self.processors.read().await.values().find(|p| p.slug == slug).cloned())
    }

    async fn put_processor(&self, processor: ProcessorCatalogEntry) -> Result<(), TenantStoreError> {
        self.processors.write().await.insert(processor.id, processor);
        Ok(())
    }

    async fn get_document(&self, id: DocumentId) -> Result<Option<Document>, TenantStoreError> {
        Ok(self.documents.read().await.get(&id).cloned())
    }

    async fn put_document(&self, document: Document) -> Result<(), TenantStoreError> {
        self.documents.write().await.insert(document.id, document);
        Ok(())
    }

    async fn get_job(&self, id: JobId) -> Result<Option<Job>, TenantStoreError> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn put_job(&self, job: Job) -> Result<(), TenantStoreError> {
        self.jobs.write().await.insert(job.id, job);
        Ok(())
    }

    async fn latest_job_for_document(&self, document_id: DocumentId) -> Result<Option<Job>, TenantStoreError> {
        Ok(self
            .jobs
            .read()
            .await
            .values()
            .filter(|j| j.document_id == document_id)
            .max_by_key(|j| j.created_at)
            .cloned())
    }

    async fn get_execution_record(&self, id: ExecutionRecordId) -> Result<Option<ExecutionRecord>, TenantStoreError> {
        Ok(self.execution_records.read().await.get(&id).cloned())
    }

    async fn put_execution_record(&self, record: ExecutionRecord) -> Result<(), TenantStoreError> {
        self.execution_records.write().await.insert(record.id, record);
        Ok(())
    }

    async fn execution_records_for_job(&self, job_id: JobId) -> Result<Vec<ExecutionRecord>, TenantStoreError> {
        let mut records: Vec<_> = self
            .execution_records
            .read()
            .await
            .values()
            .filter(|r| r.job_id == job_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.step_index);
        Ok(records)
    }

    async fn get_progress(&self, job_id: JobId) -> Result<Option<PipelineProgress>, TenantStoreError> {
        Ok(self.progress.read().await.get(&job_id).cloned())
    }

    async fn put_progress(&self, progress: PipelineProgress) -> Result<(), TenantStoreError> {
        self.progress.write().await.insert(progress.job_id, progress);
        Ok(())
    }

    async fn find_credential(
        &self,
        scope_type: CredentialScope,
        scope_id: Option<uuid::Uuid>,
        key: &str,
    ) -> Result<Option<Credential>, TenantStoreError> {
        Ok(self
            .credentials
            .read()
            .await
            .values()
            .find(|c| c.scope_type == scope_type && c.scope_id == scope_id && c.key == key)
            .cloned())
    }

    async fn put_credential(&self, credential: Credential) -> Result<(), TenantStoreError> {
        self.credentials.write().await.insert(credential.id, credential);
        Ok(())
    }

    async fn touch_credential(&self, id: CredentialId) -> Result<(), TenantStoreError> {
        if let Some(cred) = self.credentials.write().await.get_mut(&id) {
            cred.touch_last_used();
        }
        Ok(())
    }

    async fn append_audit_log(&self, entry: AuditLog) -> Result<(), TenantStoreError> {
        self.audit_logs.write().await.push(entry);
        Ok(())
    }

    async fn append_usage_event(&self, event: UsageEvent) -> Result<(), TenantStoreError> {
        self.usage_events.write().await.push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Document;

    #[tokio::test]
    async fn latest_job_for_document_picks_most_recent() {
        let store = InMemoryTenantStore::new(TenantId::new());
        let doc_id = DocumentId::new();
        let campaign_id = CampaignId::new();

        let first = Job::new(campaign_id, doc_id, crate::model::PipelineSnapshot::default());
        store.put_job(first.clone()).await.unwrap();

        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = Job::new(campaign_id, doc_id, crate::model::PipelineSnapshot::default());
        store.put_job(second.clone()).await.unwrap();

        let latest = store.latest_job_for_document(doc_id).await.unwrap().unwrap();
        assert_eq!(latest.id, second.id);
    }

    #[tokio::test]
    async fn documents_scoped_to_one_store_instance() {
        let store_a = InMemoryTenantStore::new(TenantId::new());
        let store_b = InMemoryTenantStore::new(TenantId::new());

        let doc = Document::new(CampaignId::new(), "f.png", "image/png", 10, "p", "local", "h");
        store_a.put_document(doc.clone()).await.unwrap();

        assert!(store_a.get_document(doc.id).await.unwrap().is_some());
        assert!(store_b.get_document(doc.id).await.unwrap().is_none());
    }
}
