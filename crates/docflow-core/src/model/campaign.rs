//! Campaign entity — tenant scope (spec §3).

use serde::{Deserialize, Serialize};

use crate::id::{CampaignId, TenantId};
use crate::model::pipeline::PipelineSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Active,
    Paused,
    Archived,
}

/// A named, versioned pipeline configuration owned by a tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub tenant_id: TenantId,
    pub slug: String,
    pub status: CampaignStatus,
    pub pipeline: PipelineSnapshot,
    pub checklist_template: serde_json::Value,
    pub allowed_mime_types: Vec<String>,
    pub max_file_size_bytes: u64,
    pub max_concurrency: u32,
    pub retention_days: u32,
    /// AES-256-GCM ciphertext, scope=campaign credentials.
    pub encrypted_credentials: Vec<u8>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub published_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, thiserror::Error)]
pub enum CampaignError {
    #[error("cannot activate campaign {slug}: pipeline has no processors")]
    EmptyPipelineOnActivate { slug: String },
    #[error("mime type {0} not in campaign's allowed list")]
    MimeNotAllowed(String),
    #[error("file size {actual} exceeds campaign max {max}")]
    FileTooLarge { actual: u64, max: u64 },
}

impl Campaign {
    pub fn new(tenant_id: TenantId, slug: impl Into<String>) -> Self {
        Self {
            id: CampaignId::new(),
            tenant_id,
            slug: slug.into(),
            status: CampaignStatus::Draft,
            pipeline: PipelineSnapshot::default(),
            checklist_template: serde_json::Value::Null,
            allowed_mime_types: Vec::new(),
            max_file_size_bytes: 25 * 1024 * 1024,
            max_concurrency: 10,
            retention_days: 365,
            encrypted_credentials: Vec::new(),
            created_at: chrono::Utc::now(),
            published_at: None,
        }
    }

    /// Transition draft -> active. Invariant: `pipeline.processors` must be
    /// nonempty for status=active (spec §3 Invariants).
    pub fn publish(&mut self) -> Result<(), CampaignError> {
        if self.pipeline.is_empty() {
            return Err(CampaignError::EmptyPipelineOnActivate {
                slug: self.slug.clone(),
            });
        }
        self.status = CampaignStatus::Active;
        self.published_at = Some(chrono::Utc::now());
        Ok(())
    }

    pub fn pause(&mut self) {
        self.status = CampaignStatus::Paused;
    }

    pub fn archive(&mut self) {
        self.status = CampaignStatus::Archived;
    }

    pub fn validate_upload(&self, mime: &str, size_bytes: u64) -> Result<(), CampaignError> {
        if !self.allowed_mime_types.is_empty() && !self.allowed_mime_types.iter().any(|m| m == mime) {
            return Err(CampaignError::MimeNotAllowed(mime.to_string()));
        }
        if size_bytes > self.max_file_size_bytes {
            return Err(CampaignError::FileTooLarge {
                actual: size_bytes,
                max: self.max_file_size_bytes,
            });
        }
        Ok(())
    }
}
