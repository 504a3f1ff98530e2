//! Fallback-poll listener: generalizes the teacher's task-result queue
//! listener (pop one, process, ack or requeue-with-retry, DLQ after N
//! retries) to pending callback mappings instead of task-result rows
//! (spec §4.9 "fallback poll").
//!
//! A callback is push-based and may simply never arrive (the upstream
//! provider drops it, or the tenant's public endpoint is briefly
//! unreachable). `CallbackListener` periodically asks a `StatusFetcher`
//! to actively check on every mapping still `Pending`; a mapping that
//! keeps failing to resolve after `max_attempts` sweeps is expired, and
//! the workflow waiting on it is woken with a failure signal rather than
//! left suspended forever.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use docflow_core::model::{CallbackStatus, KycCallbackMapping};
use docflow_core::store::CentralStore;
use docflow_workflow::{SignalBox, SignalPayload};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Maximum fetch attempts before a pending mapping is expired.
const MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("{0}")]
    Transient(String),
}

/// Pluggable lookup against whatever the upstream processor's status API
/// is. Returns `Ok(None)` when the upstream still has no verdict — that
/// is not an error, just "ask again later".
#[async_trait]
pub trait StatusFetcher: Send + Sync {
    async fn fetch(&self, mapping: &KycCallbackMapping) -> Result<Option<SignalPayload>, FetchError>;
}

/// A fetcher that never resolves anything; used where no upstream status
/// API exists and the only path to resolution is the real callback
/// (spec Non-goals: this crate does not assume every processor exposes a
/// polling endpoint).
pub struct NullStatusFetcher;

#[async_trait]
impl StatusFetcher for NullStatusFetcher {
    async fn fetch(&self, _mapping: &KycCallbackMapping) -> Result<Option<SignalPayload>, FetchError> {
        Ok(None)
    }
}

pub struct CallbackListener {
    central_store: Arc<dyn CentralStore>,
    signals: Arc<SignalBox>,
    fetcher: Arc<dyn StatusFetcher>,
    poll_interval: Duration,
}

impl CallbackListener {
    pub fn new(
        central_store: Arc<dyn CentralStore>,
        signals: Arc<SignalBox>,
        fetcher: Arc<dyn StatusFetcher>,
        poll_interval: Duration,
    ) -> Self {
        Self { central_store, signals, fetcher, poll_interval }
    }

    /// Run the sweep loop until `shutdown` fires.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("callback listener started");

        loop {
            if *shutdown.borrow() {
                info!("callback listener shutting down");
                break;
            }

            match self.sweep_once().await {
                Ok(processed) if processed > 0 => continue,
                Ok(_) => {
                    tokio::select! {
                        _ = tokio::time::sleep(self.poll_interval) => {}
                        _ = shutdown.changed() => {
                            if *shutdown.borrow() {
                                info!("callback listener shutting down");
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    error!(error = %e, "error sweeping pending callback mappings");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    /// Visit every mapping still `Pending` once. Returns how many made
    /// progress (resolved or expired) this sweep.
    async fn sweep_once(&self) -> Result<usize, docflow_core::store::CentralStoreError> {
        let pending = self.central_store.list_pending_mappings().await?;
        let mut processed = 0;

        for mapping in pending {
            if self.process_one(mapping).await {
                processed += 1;
            }
        }

        Ok(processed)
    }

    async fn process_one(&self, mut mapping: KycCallbackMapping) -> bool {
        match self.fetcher.fetch(&mapping).await {
            Ok(Some(payload)) => {
                debug!(transaction_id = %mapping.transaction_id, "active fetch resolved pending callback");
                mapping.record_callback(CallbackStatus::Received, payload.payload.clone());
                mapping.record_fetch_completed();
                if let Err(e) = self.central_store.put_mapping(mapping.clone()).await {
                    error!(transaction_id = %mapping.transaction_id, error = %e, "failed to persist resolved mapping");
                    return false;
                }
                self.signals.deliver(mapping.workflow_id, &mapping.transaction_id, payload).await;
                true
            }
            Ok(None) => false,
            Err(e) if mapping.fetch_attempts + 1 < MAX_ATTEMPTS => {
                warn!(
                    transaction_id = %mapping.transaction_id,
                    attempt = mapping.fetch_attempts + 1,
                    error = %e,
                    "active fetch failed, will retry"
                );
                mapping.record_fetch_attempt();
                let _ = self.central_store.put_mapping(mapping).await;
                false
            }
            Err(e) => {
                error!(
                    transaction_id = %mapping.transaction_id,
                    error = %e,
                    "expiring callback mapping after {} failed fetch attempts",
                    mapping.fetch_attempts + 1
                );
                mapping.record_fetch_attempt();
                mapping.status = CallbackStatus::Expired;
                let _ = self.central_store.put_mapping(mapping.clone()).await;
                self.signals
                    .deliver(
                        mapping.workflow_id,
                        &mapping.transaction_id,
                        SignalPayload { status: "expired".to_string(), payload: serde_json::json!({}) },
                    )
                    .await;
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docflow_core::id::{CampaignId, DocumentId, ExecutionRecordId, JobId, TenantId};
    use docflow_core::store::InMemoryCentralStore;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn mapping(transaction_id: &str, job_id: JobId) -> KycCallbackMapping {
        KycCallbackMapping::new(
            transaction_id,
            TenantId::new(),
            DocumentId::new(),
            ExecutionRecordId::new(),
            job_id,
            CampaignId::new(),
            serde_json::json!({}),
        )
    }

    struct AlwaysResolves;

    #[async_trait]
    impl StatusFetcher for AlwaysResolves {
        async fn fetch(&self, _mapping: &KycCallbackMapping) -> Result<Option<SignalPayload>, FetchError> {
            Ok(Some(SignalPayload { status: "approved".to_string(), payload: serde_json::json!({"via": "fetch"}) }))
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl StatusFetcher for AlwaysFails {
        async fn fetch(&self, _mapping: &KycCallbackMapping) -> Result<Option<SignalPayload>, FetchError> {
            Err(FetchError::Transient("upstream unreachable".to_string()))
        }
    }

    struct FailsNTimes(AtomicU32, u32);

    #[async_trait]
    impl StatusFetcher for FailsNTimes {
        async fn fetch(&self, _mapping: &KycCallbackMapping) -> Result<Option<SignalPayload>, FetchError> {
            if self.0.fetch_add(1, Ordering::SeqCst) < self.1 {
                Err(FetchError::Transient("not ready".to_string()))
            } else {
                Ok(Some(SignalPayload { status: "approved".to_string(), payload: serde_json::json!({}) }))
            }
        }
    }

    #[tokio::test]
    async fn resolved_fetch_delivers_signal_and_marks_received() {
        let store = InMemoryCentralStore::new();
        let signals = Arc::new(SignalBox::new());
        let job_id = JobId::new();
        store.put_mapping(mapping("T-1", job_id)).await.unwrap();

        let listener = CallbackListener::new(store.clone(), signals.clone(), Arc::new(AlwaysResolves), Duration::from_millis(10));
        let processed = listener.sweep_once().await.unwrap();
        assert_eq!(processed, 1);

        let stored = store.get_mapping("T-1").await.unwrap().unwrap();
        assert_eq!(stored.status, CallbackStatus::Received);
        assert!(stored.fetch_completed_at.is_some());

        let received = tokio::time::timeout(Duration::from_millis(50), signals.wait(job_id, "T-1"))
            .await
            .expect("signal should already be buffered");
        assert_eq!(received.status, "approved");
    }

    #[tokio::test]
    async fn transient_failure_keeps_mapping_pending_and_increments_attempts() {
        let store = InMemoryCentralStore::new();
        let signals = Arc::new(SignalBox::new());
        store.put_mapping(mapping("T-2", JobId::new())).await.unwrap();

        let listener = CallbackListener::new(store.clone(), signals, Arc::new(AlwaysFails), Duration::from_millis(10));
        listener.sweep_once().await.unwrap();

        let stored = store.get_mapping("T-2").await.unwrap().unwrap();
        assert_eq!(stored.status, CallbackStatus::Pending);
        assert_eq!(stored.fetch_attempts, 1);
    }

    #[tokio::test]
    async fn exhausted_retries_expire_mapping_and_wake_workflow_with_failure() {
        let store = InMemoryCentralStore::new();
        let signals = Arc::new(SignalBox::new());
        let job_id = JobId::new();
        store.put_mapping(mapping("T-3", job_id)).await.unwrap();

        let listener = CallbackListener::new(store.clone(), signals.clone(), Arc::new(AlwaysFails), Duration::from_millis(10));
        for _ in 0..MAX_ATTEMPTS {
            listener.sweep_once().await.unwrap();
        }

        let stored = store.get_mapping("T-3").await.unwrap().unwrap();
        assert_eq!(stored.status, CallbackStatus::Expired);

        let received = tokio::time::timeout(Duration::from_millis(50), signals.wait(job_id, "T-3"))
            .await
            .expect("expiry must deliver a signal so the workflow does not hang forever");
        assert_eq!(received.status, "expired");
    }

    #[tokio::test]
    async fn recovers_after_transient_failures_within_budget() {
        let store = InMemoryCentralStore::new();
        let signals = Arc::new(SignalBox::new());
        let job_id = JobId::new();
        store.put_mapping(mapping("T-4", job_id)).await.unwrap();

        let fetcher = Arc::new(FailsNTimes(AtomicU32::new(0), 2));
        let listener = CallbackListener::new(store.clone(), signals, fetcher, Duration::from_millis(10));
        listener.sweep_once().await.unwrap();
        listener.sweep_once().await.unwrap();
        listener.sweep_once().await.unwrap();

        let stored = store.get_mapping("T-4").await.unwrap().unwrap();
        assert_eq!(stored.status, CallbackStatus::Received);
    }
}
