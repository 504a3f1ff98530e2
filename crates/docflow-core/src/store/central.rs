//! Central database: tenants and callback mappings (spec §3, §6).

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::id::TenantId;
use crate::model::{KycCallbackMapping, Tenant};

#[derive(Debug, thiserror::Error)]
pub enum CentralStoreError {
    #[error("tenant not found: {0}")]
    TenantNotFound(String),
    #[error("tenant slug already in use: {0}")]
    DuplicateSlug(String),
    #[error("callback mapping not found for transaction {0}")]
    MappingNotFound(String),
}

/// The single logical database shared across all tenants. Owns the tenant
/// catalog (provisioning/suspension) and `KycCallbackMapping` rows so an
/// unauthenticated callback can be routed before any tenant context exists.
#[async_trait]
pub trait CentralStore: Send + Sync {
    async fn get_tenant(&self, id: TenantId) -> Result<Option<Tenant>, CentralStoreError>;
    async fn get_tenant_by_slug(&self, slug: &str) -> Result<Option<Tenant>, CentralStoreError>;
    async fn put_tenant(&self, tenant: Tenant) -> Result<(), CentralStoreError>;

    /// Insert a mapping, idempotent on `transaction_id` (spec §8 round-trip
    /// law: "register(tx) then register(tx) leaves exactly one row").
    async fn register_mapping(&self, mapping: KycCallbackMapping) -> Result<(), CentralStoreError>;
    async fn get_mapping(&self, transaction_id: &str) -> Result<Option<KycCallbackMapping>, CentralStoreError>;
    async fn put_mapping(&self, mapping: KycCallbackMapping) -> Result<(), CentralStoreError>;

    /// Mappings still awaiting a callback, for `CallbackListener`'s sweep
    /// (spec §4.9 fallback poll). Unordered; the listener applies its own
    /// age/attempt filtering.
    async fn list_pending_mappings(&self) -> Result<Vec<KycCallbackMapping>, CentralStoreError>;
}

#[derive(Default)]
pub struct InMemoryCentralStore {
    tenants: RwLock<HashMap<TenantId, Tenant>>,
    mappings: RwLock<HashMap<String, KycCallbackMapping>>,
}

impl InMemoryCentralStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl CentralStore for InMemoryCentralStore {
    async fn get_tenant(&self, id: TenantId) -> Result<Option<Tenant>, CentralStoreError> {
        Ok(self.tenants.read().await.get(&id).cloned())
    }

    async fn get_tenant_by_slug(&self, slug: &str) -> Result<Option<Tenant>, CentralStoreError> {
        Ok(self
            .tenants
            .read()
            .await
            .values()
            .find(|t| t.slug == slug)
            .cloned())
    }

    async fn put_tenant(&self, tenant: Tenant) -> Result<(), CentralStoreError> {
        let mut tenants = self.tenants.write().await;
        if let Some(existing) = tenants.values().find(|t| t.slug == tenant.slug && t.id != tenant.id) {
            return Err(CentralStoreError::DuplicateSlug(existing.slug.clone()));
        }
        tenants.insert(tenant.id, tenant);
        Ok(())
    }

    async fn register_mapping(&self, mapping: KycCallbackMapping) -> Result<(), CentralStoreError> {
        let mut mappings = self.mappings.write().await;
        mappings.entry(mapping.transaction_id.clone()).or_insert(mapping);
        Ok(())
    }

    async fn get_mapping(&self, transaction_id: &str) -> Result<Option<KycCallbackMapping>, CentralStoreError> {
        Ok(self.mappings.read().await.get(transaction_id).cloned())
    }

    async fn put_mapping(&self, mapping: KycCallbackMapping) -> Result<(), CentralStoreError> {
        self.mappings
            .write()
            .await
            .insert(mapping.transaction_id.clone(), mapping);
        Ok(())
    }

    async fn list_pending_mappings(&self) -> Result<Vec<KycCallbackMapping>, CentralStoreError> {
        Ok(self
            .mappings
            .read()
            .await
            .values()
            .filter(|m| m.is_pending())
            .cloned()
            .collect())
    }
}
