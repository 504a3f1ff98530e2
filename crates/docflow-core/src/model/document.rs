//! Document entity — tenant scope (spec §3, §4.4).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::id::{CampaignId, DocumentId};
use crate::state::{DocumentState, IllegalTransition};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    /// Public-facing identifier, distinct from the internal sortable id —
    /// deliberately a plain v4 UUID so it carries no creation-time
    /// information to external callers.
    pub public_uuid: Uuid,
    pub campaign_id: CampaignId,
    pub user_id: Option<String>,
    pub filename: String,
    pub mime: String,
    pub size_bytes: u64,
    pub storage_path: String,
    pub disk: String,
    pub content_hash: String,
    pub state: DocumentState,
    pub metadata: HashMap<String, serde_json::Value>,
    pub retry_count: u32,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub processed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub failed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Document {
    pub fn new(
        campaign_id: CampaignId,
        filename: impl Into<String>,
        mime: impl Into<String>,
        size_bytes: u64,
        storage_path: impl Into<String>,
        disk: impl Into<String>,
        content_hash: impl Into<String>,
    ) -> Self {
        Self {
            id: DocumentId::new(),
            public_uuid: Uuid::new_v4(),
            campaign_id,
            user_id: None,
            filename: filename.into(),
            mime: mime.into(),
            size_bytes,
            storage_path: storage_path.into(),
            disk: disk.into(),
            content_hash: content_hash.into(),
            state: DocumentState::Pending,
            metadata: HashMap::new(),
            retry_count: 0,
            created_at: chrono::Utc::now(),
            processed_at: None,
            failed_at: None,
        }
    }

    /// Apply a state transition, setting `processed_at`/`failed_at` on
    /// entry into the corresponding terminal state (spec §4.4).
    pub fn transition_to(&mut self, target: DocumentState) -> Result<(), IllegalTransition<DocumentState>> {
        let next = self.state.transition_to(target)?;
        self.state = next;
        match next {
            DocumentState::Completed => self.processed_at = Some(chrono::Utc::now()),
            DocumentState::Failed => self.failed_at = Some(chrono::Utc::now()),
            _ => {}
        }
        Ok(())
    }

    pub fn merge_metadata(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.metadata.insert(key.into(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completing_sets_processed_at() {
        let mut d = Document::new(
            CampaignId::new(),
            "receipt.png",
            "image/png",
            1024,
            "abc",
            "local",
            "hash",
        );
        d.transition_to(DocumentState::Queued).unwrap();
        d.transition_to(DocumentState::Processing).unwrap();
        d.transition_to(DocumentState::Completed).unwrap();
        assert!(d.processed_at.is_some());
        assert!(d.failed_at.is_none());
    }

    #[test]
    fn failing_sets_failed_at() {
        let mut d = Document::new(
            CampaignId::new(),
            "receipt.png",
            "image/png",
            1024,
            "abc",
            "local",
            "hash",
        );
        d.transition_to(DocumentState::Processing).unwrap();
        d.transition_to(DocumentState::Failed).unwrap();
        assert!(d.failed_at.is_some());
    }
}
