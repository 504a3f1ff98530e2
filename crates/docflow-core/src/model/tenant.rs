//! Tenant entity — central scope (spec §3).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::id::TenantId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    Active,
    Suspended,
}

/// A top-level customer with its own tenant database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub slug: String,
    pub status: TenantStatus,
    /// AES-256-GCM ciphertext produced by `docflow-vault`; never decrypted
    /// outside of a `CredentialVault::resolve` call.
    pub encrypted_credentials: Vec<u8>,
    pub settings: HashMap<String, serde_json::Value>,
    pub deleted_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Tenant {
    pub fn new(slug: impl Into<String>) -> Self {
        Self {
            id: TenantId::new(),
            slug: slug.into(),
            status: TenantStatus::Active,
            encrypted_credentials: Vec::new(),
            settings: HashMap::new(),
            deleted_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, TenantStatus::Active) && self.deleted_at.is_none()
    }

    pub fn soft_delete(&mut self) {
        self.deleted_at = Some(chrono::Utc::now());
    }
}
