//! AuditLog entity — tenant scope (spec §3, §7, DESIGN NOTES §9).
//!
//! DESIGN NOTES §9 ("Polymorphic entities via single-table inheritance")
//! resolves the source's `auditable_type` + `auditable_id` free-form tag pair
//! into a closed variant over the handful of entities this engine actually
//! audits, rather than open polymorphism.

use serde::{Deserialize, Serialize};

use crate::id::{AuditLogId, CampaignId, DocumentId, ExecutionRecordId, JobId, TenantId};

/// The closed set of entities an audit log entry can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entity_type", rename_all = "snake_case")]
pub enum Auditable {
    Campaign { id: CampaignId },
    Document { id: DocumentId },
    Job { id: JobId },
    ExecutionRecord { id: ExecutionRecordId },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: AuditLogId,
    pub tenant_id: TenantId,
    pub user_id: Option<String>,
    pub auditable: Auditable,
    pub event: String,
    pub old_values: Option<serde_json::Value>,
    pub new_values: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub tags: Vec<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl AuditLog {
    pub fn new(tenant_id: TenantId, auditable: Auditable, event: impl Into<String>) -> Self {
        Self {
            id: AuditLogId::new(),
            tenant_id,
            user_id: None,
            auditable,
            event: event.into(),
            old_values: None,
            new_values: None,
            ip_address: None,
            user_agent: None,
            tags: Vec::new(),
            created_at: chrono::Utc::now(),
        }
    }

    pub fn with_values(mut self, old: Option<serde_json::Value>, new: Option<serde_json::Value>) -> Self {
        self.old_values = old;
        self.new_values = new;
        self
    }
}
