//! KycCallbackMapping entity — central scope (spec §3, §4.9 CallbackRegistry).
//!
//! Lives in the shared central database (not a tenant database) so an
//! unauthenticated public callback, which arrives with no tenant context at
//! all, can be routed to the correct tenant's workflow.

use serde::{Deserialize, Serialize};

use crate::id::{CampaignId, DocumentId, ExecutionRecordId, JobId, TenantId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackStatus {
    Pending,
    Received,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KycCallbackMapping {
    /// Externally issued identifier; globally unique (spec §3 invariant).
    pub transaction_id: String,
    pub tenant_id: TenantId,
    pub document_id: DocumentId,
    pub execution_id: ExecutionRecordId,
    pub job_id: JobId,
    pub campaign_id: CampaignId,
    /// Workflow being suspended, addressed by the job's id (one workflow
    /// drives one job — spec §4.6 "Scheduling model").
    pub workflow_id: JobId,
    pub status: CallbackStatus,
    pub metadata: serde_json::Value,
    pub callback_payload: Option<serde_json::Value>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub callback_received_at: Option<chrono::DateTime<chrono::Utc>>,
    pub fetch_completed_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Active-fetch attempts made by `CallbackListener` while no callback
    /// has arrived (spec §4.9 fallback poll). Separate from job/execution
    /// retry counters — this one belongs to the mapping, not the step.
    pub fetch_attempts: u32,
}

impl KycCallbackMapping {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transaction_id: impl Into<String>,
        tenant_id: TenantId,
        document_id: DocumentId,
        execution_id: ExecutionRecordId,
        job_id: JobId,
        campaign_id: CampaignId,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            tenant_id,
            document_id,
            execution_id,
            job_id,
            campaign_id,
            workflow_id: job_id,
            status: CallbackStatus::Pending,
            metadata,
            callback_payload: None,
            created_at: chrono::Utc::now(),
            callback_received_at: None,
            fetch_completed_at: None,
            fetch_attempts: 0,
        }
    }

    /// Record an inbound callback; one terminal status per mapping (spec §3
    /// invariant). Re-delivery of an already-received callback is a no-op.
    pub fn record_callback(&mut self, status: CallbackStatus, payload: serde_json::Value) {
        if self.status != CallbackStatus::Pending {
            return;
        }
        self.status = status;
        self.callback_payload = Some(payload);
        self.callback_received_at = Some(chrono::Utc::now());
    }

    pub fn record_fetch_completed(&mut self) {
        self.fetch_completed_at = Some(chrono::Utc::now());
    }

    pub fn record_fetch_attempt(&mut self) {
        self.fetch_attempts += 1;
    }

    pub fn is_pending(&self) -> bool {
        self.status == CallbackStatus::Pending
    }
}
