//! UsageEvent entity — tenant scope (spec §3).
//!
//! Append-only; emitted at processor completion and other metered actions
//! for downstream billing (billing itself is out of scope, spec §1).

use serde::{Deserialize, Serialize};

use crate::id::{CampaignId, DocumentId, JobId, UsageEventId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageEvent {
    pub id: UsageEventId,
    pub campaign_id: CampaignId,
    pub document_id: DocumentId,
    pub job_id: JobId,
    pub event_type: String,
    pub units: f64,
    pub cost_credits: f64,
    pub metadata: serde_json::Value,
    pub recorded_at: chrono::DateTime<chrono::Utc>,
}

impl UsageEvent {
    pub fn new(
        campaign_id: CampaignId,
        document_id: DocumentId,
        job_id: JobId,
        event_type: impl Into<String>,
        units: f64,
        cost_credits: f64,
    ) -> Self {
        Self {
            id: UsageEventId::new(),
            campaign_id,
            document_id,
            job_id,
            event_type: event_type.into(),
            units,
            cost_credits,
            metadata: serde_json::Value::Null,
            recorded_at: chrono::Utc::now(),
        }
    }
}
