//! Late-binding from a configured processor slug to an executable handler
//! (spec §4.3).

use std::collections::HashMap;
use std::sync::Arc;

use docflow_core::store::{TenantStore, TenantStoreError};
use tokio::sync::RwLock;

use crate::handler::ProcessorHandler;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Neither a statically registered slug nor a resolvable catalog entry
    /// — non-retryable per spec §4.3 "fails with ProcessorNotRegistered".
    #[error("processor not registered: {0}")]
    NotRegistered(String),
    /// The catalog row points at a `handler_key` with no static
    /// registration — non-retryable `ConfigurationError` (DESIGN NOTES §9).
    #[error("handler key '{0}' has no registered implementation")]
    UnknownHandlerKey(String),
    #[error(transparent)]
    Store(#[from] TenantStoreError),
}

/// Maps a processor's stable slug to a handler. `register` is the static
/// boot-time path; `get` additionally resolves dynamically against a
/// tenant's processor catalog when the slug was never statically
/// registered under that exact name (DESIGN NOTES §9: catalog rows can only
/// point at a handler that *is* registered, never invent one).
#[derive(Default)]
pub struct ProcessorRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn ProcessorHandler>>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, slug: impl Into<String>, handler: Arc<dyn ProcessorHandler>) {
        self.handlers.write().await.insert(slug.into(), handler);
    }

    pub async fn has(&self, slug: &str) -> bool {
        self.handlers.read().await.contains_key(slug)
    }

    /// Resolve `slug` to a handler. First checks the in-memory map
    /// (static registration); if absent, looks the slug up in the
    /// tenant's processor catalog and resolves its `handler_key` against
    /// the same map (spec §4.3 "Resolution policy").
    pub async fn get(
        &self,
        slug: &str,
        store: &dyn TenantStore,
    ) -> Result<Arc<dyn ProcessorHandler>, RegistryError> {
        if let Some(handler) = self.handlers.read().await.get(slug) {
            return Ok(handler.clone());
        }

        let entry = store
            .get_processor_by_slug(slug)
            .await?
            .ok_or_else(|| RegistryError::NotRegistered(slug.to_string()))?;

        self.handlers
            .read()
            .await
            .get(&entry.handler_key)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownHandlerKey(entry.handler_key.clone()))
    }
}
