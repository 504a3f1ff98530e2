//! Event stream consumed by observers: webhooks, UI subscribers (spec §2
//! component 8 "ProgressTracker & EventBus", §6 "Webhook outputs").

use docflow_core::id::{CampaignId, DocumentId, ExecutionRecordId, JobId};

/// Every lifecycle event the engine emits. Delivery to an actual webhook
/// endpoint is out of scope (spec §1); this is the extension point a
/// deployment's delivery subsystem subscribes to.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    JobCreated {
        job_id: JobId,
        document_id: DocumentId,
        campaign_id: CampaignId,
    },
    ExecutionCompleted {
        job_id: JobId,
        execution_id: ExecutionRecordId,
        slug: String,
    },
    ExecutionFailed {
        job_id: JobId,
        execution_id: ExecutionRecordId,
        slug: String,
        error: String,
    },
    /// `DocumentProcessingCompleted` (spec §6 "Webhook outputs").
    DocumentProcessingCompleted {
        job_id: JobId,
        document_id: DocumentId,
        campaign_id: CampaignId,
    },
    /// `DocumentProcessingFailed` (spec §6 "Webhook outputs").
    DocumentProcessingFailed {
        job_id: JobId,
        document_id: DocumentId,
        campaign_id: CampaignId,
        error: String,
    },
}

/// Fan-out sink for [`EngineEvent`]s. `publish` never fails: observers are
/// best-effort, and a slow or absent subscriber must never block pipeline
/// execution.
pub trait EventBus: Send + Sync {
    fn publish(&self, event: EngineEvent);
}

/// Broadcast-channel backed implementation. Lagging subscribers drop the
/// oldest events rather than backpressuring the publisher — this mirrors
/// `tokio::sync::broadcast`'s own semantics and is appropriate for a
/// best-effort progress/event stream.
pub struct BroadcastEventBus {
    tx: tokio::sync::broadcast::Sender<EngineEvent>,
}

impl BroadcastEventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = tokio::sync::broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastEventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventBus for BroadcastEventBus {
    fn publish(&self, event: EngineEvent) {
        // No subscribers is a normal state (e.g. in tests); `send` only
        // errors when the channel has zero receivers, which we don't care
        // about here.
        let _ = self.tx.send(event);
    }
}

/// Discards every event. Useful when a caller wants the engine's event
/// plumbing wired up without standing up a real subscriber.
#[derive(Default)]
pub struct NullEventBus;

impl EventBus for NullEventBus {
    fn publish(&self, _event: EngineEvent) {}
}
