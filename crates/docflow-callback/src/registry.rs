//! Central (tenant-agnostic) routing for unauthenticated inbound callbacks
//! (spec §4.9 CallbackRegistry).
//!
//! A callback arrives addressed only by the transaction id an upstream
//! processor handed back when it suspended a step. `CallbackRegistry` is
//! the one place that knows how to turn that bare id into `(tenant,
//! workflow)` and wake the right `WorkflowEngine::run` call via the shared
//! `SignalBox` — the same box the engine itself waits on.

use std::sync::Arc;

use docflow_core::model::CallbackStatus;
use docflow_core::store::CentralStore;
use docflow_workflow::{SignalBox, SignalPayload};

#[derive(Debug, thiserror::Error)]
pub enum CallbackRegistryError {
    #[error("no callback mapping registered for transaction {0}")]
    UnknownTransaction(String),
    #[error(transparent)]
    Store(#[from] docflow_core::store::CentralStoreError),
}

/// Routes an inbound callback to the workflow suspended on it.
pub struct CallbackRegistry {
    central_store: Arc<dyn CentralStore>,
    signals: Arc<SignalBox>,
}

impl CallbackRegistry {
    pub fn new(central_store: Arc<dyn CentralStore>, signals: Arc<SignalBox>) -> Self {
        Self { central_store, signals }
    }

    /// Handle one inbound callback. `result_status` is the upstream's
    /// business-level verdict (e.g. `"approved"`, `"rejected"`) and is
    /// forwarded verbatim in the `SignalPayload` for the suspended step to
    /// interpret — it is distinct from `CallbackStatus`, which only tracks
    /// this mapping's own lifecycle (spec §3 invariant: one terminal
    /// `CallbackStatus` per mapping).
    ///
    /// Re-delivery of an already-terminal mapping is a no-op: the mapping
    /// itself is idempotent (`KycCallbackMapping::record_callback`), and
    /// delivering twice here would double-wake a `SignalBox` slot that the
    /// workflow has already consumed and moved past.
    pub async fn handle_callback(
        &self,
        transaction_id: &str,
        result_status: impl Into<String>,
        payload: serde_json::Value,
    ) -> Result<(), CallbackRegistryError> {
        let mut mapping = self
            .central_store
            .get_mapping(transaction_id)
            .await?
            .ok_or_else(|| CallbackRegistryError::UnknownTransaction(transaction_id.to_string()))?;

        if !mapping.is_pending() {
            return Ok(());
        }

        let status = result_status.into();
        mapping.record_callback(CallbackStatus::Received, payload.clone());
        self.central_store.put_mapping(mapping.clone()).await?;

        self.signals
            .deliver(mapping.workflow_id, transaction_id, SignalPayload { status, payload })
            .await;

        Ok(())
    }
}
