//! Hierarchical credential resolution (spec §4.2).

use std::sync::Arc;

use docflow_core::id::{CampaignId, ProcessorId, TenantId};
use docflow_core::model::CredentialScope;
use docflow_core::store::TenantStore;
use zeroize::Zeroizing;

use crate::cipher::{CipherError, CredentialCipher};

#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error(transparent)]
    Cipher(#[from] CipherError),
    #[error("store error: {0}")]
    Store(String),
}

/// The optional scope ids a caller may supply to [`CredentialVault::resolve`].
/// Any of the three may be absent (e.g. a processor invoked outside a
/// campaign context), in which case that scope is simply skipped in the
/// walk — the algorithm never fails on a missing scope id, only on no match
/// at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveScope {
    pub processor_id: Option<ProcessorId>,
    pub campaign_id: Option<CampaignId>,
    pub tenant_id: Option<TenantId>,
}

pub struct CredentialVault {
    store: Arc<dyn TenantStore>,
    cipher: Arc<CredentialCipher>,
}

impl CredentialVault {
    pub fn new(store: Arc<dyn TenantStore>, cipher: Arc<CredentialCipher>) -> Self {
        Self { store, cipher }
    }

    /// Consult scopes most-specific first — processor, campaign, tenant,
    /// system — returning the first active match (spec §4.2 "Algorithm").
    /// Decrypts only the value that is returned; `last_used_at` is updated
    /// on the matched row (fire-and-forget is fine per spec, so failures
    /// touching it are logged, not propagated).
    pub async fn resolve(
        &self,
        key: &str,
        scope: ResolveScope,
    ) -> Result<Option<Zeroizing<String>>, VaultError> {
        let candidates: [(CredentialScope, Option<uuid::Uuid>); 4] = [
            (CredentialScope::Processor, scope.processor_id.map(Into::into)),
            (CredentialScope::Campaign, scope.campaign_id.map(Into::into)),
            (CredentialScope::Tenant, scope.tenant_id.map(Into::into)),
            (CredentialScope::System, None),
        ];

        for (scope_type, scope_id) in candidates {
            // System scope is always consulted (scope_id is always None for
            // it); the other three are skipped entirely when the caller
            // didn't supply an id for them, rather than matching scope_id=None.
            if scope_type != CredentialScope::System && scope_id.is_none() {
                continue;
            }

            let found = self
                .store
                .find_credential(scope_type, scope_id, key)
                .await
                .map_err(|e| VaultError::Store(e.to_string()))?;

            let Some(credential) = found else { continue };
            if !credential.is_usable() {
                continue;
            }

            let plaintext = self.cipher.decrypt(&credential.encrypted_value)?;
            if let Err(err) = self.store.touch_credential(credential.id).await {
                tracing::warn!(
                    tenant_id = %self.store.tenant_id(),
                    credential_id = %credential.id,
                    error = %err,
                    "failed to record credential last_used_at"
                );
            }
            return Ok(Some(plaintext));
        }

        Ok(None)
    }
}
