//! Credential entity — tenant scope (spec §3, §4.2 CredentialVault).

use serde::{Deserialize, Serialize};

use crate::id::{CredentialId, TenantId};

/// One of the four scopes `CredentialVault::resolve` consults, in
/// most-specific-first order (spec §4.2 "Algorithm").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialScope {
    Processor,
    Campaign,
    Tenant,
    System,
}

impl CredentialScope {
    /// Resolution order, most specific first — the order `resolve` walks.
    pub const RESOLUTION_ORDER: [CredentialScope; 4] = [
        CredentialScope::Processor,
        CredentialScope::Campaign,
        CredentialScope::Tenant,
        CredentialScope::System,
    ];
}

/// A single encrypted secret, unique per `(scope_type, scope_id, key)`.
/// `scope_id` is `None` for `CredentialScope::System` (spec §3: "scope_id
/// null" for system scope).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub id: CredentialId,
    pub tenant_id: TenantId,
    pub scope_type: CredentialScope,
    pub scope_id: Option<uuid::Uuid>,
    pub key: String,
    /// AES-256-GCM ciphertext; only `docflow_vault::CredentialCipher`
    /// decrypts this, and only in memory (spec §4.2 "Side effects").
    pub encrypted_value: Vec<u8>,
    pub provider: Option<String>,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
    pub last_used_at: Option<chrono::DateTime<chrono::Utc>>,
    pub is_active: bool,
}

impl Credential {
    pub fn new(
        tenant_id: TenantId,
        scope_type: CredentialScope,
        scope_id: Option<uuid::Uuid>,
        key: impl Into<String>,
        encrypted_value: Vec<u8>,
    ) -> Self {
        Self {
            id: CredentialId::new(),
            tenant_id,
            scope_type,
            scope_id,
            key: key.into(),
            encrypted_value,
            provider: None,
            expires_at: None,
            last_used_at: None,
            is_active: true,
        }
    }

    /// `is_active=true AND (expires_at is null OR expires_at>now)`
    /// (spec §4.2 "the first **active** match").
    pub fn is_usable(&self) -> bool {
        self.is_active
            && self
                .expires_at
                .map(|exp| exp > chrono::Utc::now())
                .unwrap_or(true)
    }

    pub fn touch_last_used(&mut self) {
        self.last_used_at = Some(chrono::Utc::now());
    }
}
