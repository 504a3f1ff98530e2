//! Processor catalog entry — tenant scope (spec §3, §4.3).
//!
//! This is the persisted row; the executable code it points at (the
//! "handler") lives in the `docflow-registry` crate's in-memory registry,
//! keyed by `handler_key`.

use serde::{Deserialize, Serialize};

use crate::id::{ProcessorId, TenantId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorCatalogEntry {
    pub id: ProcessorId,
    pub tenant_id: TenantId,
    pub slug: String,
    /// String key that must resolve to a statically registered handler
    /// (DESIGN NOTES §9: "registry of slug -> constructor, populated at
    /// boot"). An unresolvable key is a non-retryable `ConfigurationError`.
    pub handler_key: String,
    pub category: String,
    pub config_schema: serde_json::Value,
    pub output_schema: serde_json::Value,
    pub dependency_slugs: Vec<String>,
    pub is_active: bool,
    pub version: u32,
}

impl ProcessorCatalogEntry {
    pub fn new(
        tenant_id: TenantId,
        slug: impl Into<String>,
        handler_key: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            id: ProcessorId::new(),
            tenant_id,
            slug: slug.into(),
            handler_key: handler_key.into(),
            category: category.into(),
            config_schema: serde_json::Value::Null,
            output_schema: serde_json::Value::Null,
            dependency_slugs: Vec::new(),
            is_active: true,
            version: 1,
        }
    }
}
