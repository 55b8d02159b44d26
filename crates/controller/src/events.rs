// This file is part of Opflow.
//
// Opflow is free software: you can redistribute it and/or modify it under the
// terms of the GNU Lesser General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version.
//
// Opflow is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with Opflow.
// If not, see https://www.gnu.org/licenses/.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use opflow_types::{OperationError, OperationId, UserOperationMetadata, UserOperationStatus};
use opflow_utils::emit::EVENT_CHANNEL_CAPACITY;
use tokio::sync::{broadcast, oneshot};

use crate::{transaction_metadata, TerminalOutcome, UserOperationEvent};

/// Publish surface for lifecycle notifications.
///
/// Global subscribers get every event on a broadcast channel; callers
/// tracking one specific operation register for its terminal outcome in an
/// id-keyed registry instead of filtering the global stream. Cheap to clone.
#[derive(Clone, Debug)]
pub(crate) struct EventHub {
    inner: Arc<HubInner>,
}

#[derive(Debug)]
struct HubInner {
    event_sender: broadcast::Sender<UserOperationEvent>,
    terminal: Mutex<HashMap<OperationId, Vec<oneshot::Sender<TerminalOutcome>>>>,
}

impl EventHub {
    pub(crate) fn new() -> Self {
        let (event_sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(HubInner {
                event_sender,
                terminal: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<UserOperationEvent> {
        self.inner.event_sender.subscribe()
    }

    /// Register for the terminal outcome of one operation.
    ///
    /// The returned receiver fires exactly once. Callers that may be
    /// subscribing after the fact should check the store and use
    /// `fire_terminal` to flush an already terminal operation.
    pub(crate) fn register_terminal(&self, id: OperationId) -> oneshot::Receiver<TerminalOutcome> {
        let (sender, receiver) = oneshot::channel();
        self.inner
            .terminal
            .lock()
            .expect("event hub lock poisoned")
            .entry(id)
            .or_default()
            .push(sender);
        receiver
    }

    /// Emit `transaction-updated` if the operation is transaction shaped.
    pub(crate) fn emit_transaction_updated(&self, metadata: &UserOperationMetadata) {
        if let Some(transaction) = transaction_metadata(metadata) {
            let _ = self
                .inner
                .event_sender
                .send(UserOperationEvent::TransactionUpdated { transaction });
        }
    }

    /// Emit the global confirmed event and fire per-id subscribers.
    pub(crate) fn emit_confirmed(&self, metadata: &UserOperationMetadata) {
        if let Some(transaction_hash) = metadata.transaction_hash {
            let _ = self.inner.event_sender.send(UserOperationEvent::Confirmed {
                id: metadata.id,
                transaction_hash,
            });
        }
        self.fire_terminal(metadata);
    }

    /// Emit the global failed event and fire per-id subscribers.
    pub(crate) fn emit_failed(&self, metadata: &UserOperationMetadata, error: &OperationError) {
        let _ = self.inner.event_sender.send(UserOperationEvent::Failed {
            id: metadata.id,
            error: error.clone(),
        });
        self.fire_terminal(metadata);
    }

    /// Deliver the terminal outcome to everything registered for this id.
    ///
    /// Draining the registry entry makes a second delivery for the same
    /// operation a no-op.
    pub(crate) fn fire_terminal(&self, metadata: &UserOperationMetadata) {
        let outcome = match metadata.status {
            UserOperationStatus::Confirmed => TerminalOutcome::Confirmed {
                metadata: metadata.clone(),
            },
            UserOperationStatus::Failed => {
                let error = metadata
                    .error
                    .clone()
                    .expect("failed operation must carry an error");
                TerminalOutcome::Failed {
                    metadata: metadata.clone(),
                    error,
                }
            }
            _ => return,
        };
        let senders = self
            .inner
            .terminal
            .lock()
            .expect("event hub lock poisoned")
            .remove(&metadata.id)
            .unwrap_or_default();
        for sender in senders {
            let _ = sender.send(outcome.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use opflow_types::ErrorKind;

    use super::*;

    fn failed_metadata() -> UserOperationMetadata {
        let mut metadata = UserOperationMetadata::new(
            OperationId::random(),
            1,
            "net1".into(),
            "dapp.example".to_string(),
            true,
        );
        metadata.status = UserOperationStatus::Failed;
        metadata.error = Some(OperationError::new(ErrorKind::Submission, "boom"));
        metadata
    }

    #[tokio::test]
    async fn test_terminal_subscribers_fire_once() {
        let hub = EventHub::new();
        let metadata = failed_metadata();
        let first = hub.register_terminal(metadata.id);
        let second = hub.register_terminal(metadata.id);

        let error = metadata.error.clone().unwrap();
        hub.emit_failed(&metadata, &error);
        // a retried emission finds nothing left to deliver
        hub.emit_failed(&metadata, &error);

        assert!(matches!(
            first.await.unwrap(),
            TerminalOutcome::Failed { .. }
        ));
        assert!(matches!(
            second.await.unwrap(),
            TerminalOutcome::Failed { .. }
        ));
    }

    #[tokio::test]
    async fn test_non_terminal_metadata_does_not_fire() {
        let hub = EventHub::new();
        let metadata = UserOperationMetadata::new(
            OperationId::random(),
            1,
            "net1".into(),
            "dapp.example".to_string(),
            true,
        );
        let mut receiver = hub.register_terminal(metadata.id);

        hub.fire_terminal(&metadata);

        assert!(receiver.try_recv().is_err());
    }
}
