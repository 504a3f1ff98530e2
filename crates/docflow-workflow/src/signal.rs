//! Named, single-delivery rendezvous used to resume a suspended workflow
//! (spec §4.6 "Signals").
//!
//! A signal is addressed by `(workflow_id, signal_name)` — in this engine
//! `workflow_id` is a job's id (spec §4.6 "Scheduling model": one workflow
//! drives one job) and `signal_name` is the external transaction id a
//! processor handed back. Delivery may race the workflow registering its
//! wait: DESIGN NOTES §9 resolves that open question in favor of a bounded
//! buffer keyed on the transaction id, so a callback that arrives before
//! the workflow suspends is not lost.

use std::collections::HashMap;

use docflow_core::id::JobId;
use tokio::sync::{oneshot, Mutex};

/// What a signal carries: the external status plus the raw callback
/// payload (spec §4.9 "Delivery to workflow").
#[derive(Debug, Clone)]
pub struct SignalPayload {
    pub status: String,
    pub payload: serde_json::Value,
}

enum Slot {
    /// A signal arrived with nobody waiting yet.
    Buffered(SignalPayload),
    /// A workflow is parked waiting for this exact signal.
    Waiting(oneshot::Sender<SignalPayload>),
}

#[derive(Default)]
pub struct SignalBox {
    slots: Mutex<HashMap<(JobId, String), Slot>>,
}

impl SignalBox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Suspend until `signal_name` is delivered for `workflow_id`. If the
    /// signal already arrived (buffered), returns immediately without
    /// ever registering a waiter — this is what makes "callback before
    /// suspend" and "callback after suspend" the same code path from the
    /// caller's point of view.
    pub async fn wait(&self, workflow_id: JobId, signal_name: &str) -> SignalPayload {
        let rx = {
            let mut slots = self.slots.lock().await;
            match slots.remove(&(workflow_id, signal_name.to_string())) {
                Some(Slot::Buffered(payload)) => return payload,
                _ => {
                    let (tx, rx) = oneshot::channel();
                    slots.insert((workflow_id, signal_name.to_string()), Slot::Waiting(tx));
                    rx
                }
            }
        };
        // The sender side is only ever dropped after a value is sent
        // (`deliver` always either buffers or sends), so this never
        // observes a closed channel.
        rx.await.expect("signal sender dropped without delivering")
    }

    /// Deliver a signal. If a waiter is already parked, wakes it directly;
    /// otherwise buffers the payload for the next `wait` call on this key
    /// (spec §4.9 "buffers until the waiter arrives").
    pub async fn deliver(&self, workflow_id: JobId, signal_name: &str, payload: SignalPayload) {
        let mut slots = self.slots.lock().await;
        match slots.remove(&(workflow_id, signal_name.to_string())) {
            Some(Slot::Waiting(tx)) => {
                // Ignore a failed send: the waiter gave up (e.g. the
                // workflow task was dropped), which is not this box's
                // problem to report.
                let _ = tx.send(payload);
            }
            _ => {
                slots.insert((workflow_id, signal_name.to_string()), Slot::Buffered(payload));
            }
        }
    }
}
