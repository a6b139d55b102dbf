//! In-process event bus channel contract: `DispatchTask` / `CompleteTask`.
//!
//! The event bus itself is treated as an external collaborator — only its
//! channel contract matters; this module is the in-process stand-in used
//! by [`crate::dispatcher::DispatcherBridge`] and its tests. The active-flag-guarded channel-wrapper shape is grounded on
//! `execution/streaming.rs::ExecutionStreamHandler`, which pairs an
//! `mpsc::Sender` with an `Arc<AtomicBool>` so publishers can stop sending
//! once a consumer has gone away.

use crate::registry::TaskMetadata;
use serde_json::Map;
use tokio::sync::broadcast;

/// Payload published by the Dispatcher Bridge for an external task runtime
/// to pick up.
#[derive(Debug, Clone)]
pub struct DispatchTask {
    pub metadata: TaskMetadata,
    pub params: Map<String, serde_json::Value>,
}

/// Payload the external task runtime publishes back on completion.
#[derive(Debug, Clone)]
pub struct CompleteTask {
    pub metadata: TaskMetadata,
}

/// A minimal in-process bus: one broadcast channel per direction. Any
/// number of dispatchers may publish; any number of external-runtime
/// simulators in tests may subscribe and reply.
#[derive(Clone)]
pub struct EventBus {
    dispatch_tx: broadcast::Sender<DispatchTask>,
    complete_tx: broadcast::Sender<CompleteTask>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (dispatch_tx, _) = broadcast::channel(capacity);
        let (complete_tx, _) = broadcast::channel(capacity);
        Self {
            dispatch_tx,
            complete_tx,
        }
    }

    pub fn publish_dispatch(&self, task: DispatchTask) {
        // No active subscribers is not an error: the external runtime may
        // not have connected yet, same as a send on a channel nobody reads.
        let _ = self.dispatch_tx.send(task);
    }

    pub fn subscribe_dispatch(&self) -> broadcast::Receiver<DispatchTask> {
        self.dispatch_tx.subscribe()
    }

    pub fn publish_complete(&self, task: CompleteTask) {
        let _ = self.complete_tx.send(task);
    }

    pub fn subscribe_complete(&self) -> broadcast::Receiver<CompleteTask> {
        self.complete_tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dispatch_is_observed_by_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe_dispatch();

        bus.publish_dispatch(DispatchTask {
            metadata: TaskMetadata::new("ingest", "Ingest"),
            params: Map::new(),
        });

        let received = rx.recv().await.unwrap();
        assert_eq!(received.metadata.internal_name, "ingest");
    }

    #[tokio::test]
    async fn complete_is_matched_by_internal_name() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe_complete();

        bus.publish_complete(CompleteTask {
            metadata: TaskMetadata::new("ingest", "Ingest"),
        });

        let received = rx.recv().await.unwrap();
        assert_eq!(received.metadata.internal_name, "ingest");
    }
}
