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

use std::sync::{Arc, RwLock};

use opflow_types::{
    OperationId, UserOperationControllerState, UserOperationMetadata, UserOperationStatus,
};
use opflow_utils::emit::EVENT_CHANNEL_CAPACITY;
use tokio::sync::broadcast;
use tracing::warn;

/// The patch describing a single committed store mutation.
#[derive(Clone, Debug)]
pub struct StoreUpdate {
    /// Id of the mutated operation
    pub id: OperationId,
    /// The operation's full metadata after the mutation
    pub metadata: UserOperationMetadata,
}

/// The authoritative map of operation id to metadata.
///
/// All mutations are committed atomically under one write lock and then
/// published as a single `StoreUpdate` patch; a concurrent reader can never
/// observe a half-applied mutation. Entries are never deleted, only marked
/// terminal. Cheap to clone; clones share the same underlying state.
#[derive(Clone, Debug)]
pub struct UserOperationStore {
    inner: Arc<StoreInner>,
}

#[derive(Debug)]
struct StoreInner {
    state: RwLock<UserOperationControllerState>,
    update_sender: broadcast::Sender<StoreUpdate>,
}

impl UserOperationStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::with_state(UserOperationControllerState::default())
    }

    /// Create a store seeded with previously persisted state.
    pub fn with_state(state: UserOperationControllerState) -> Self {
        let (update_sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(StoreInner {
                state: RwLock::new(state),
                update_sender,
            }),
        }
    }

    /// Insert a newly created operation.
    ///
    /// Ids are generated fresh at creation; a duplicate insert is a bug in
    /// the caller and is dropped rather than clobbering the existing entry.
    pub fn insert(&self, metadata: UserOperationMetadata) {
        let id = metadata.id;
        {
            let mut state = self.inner.state.write().expect("store lock poisoned");
            if state.user_operations.contains_key(&id) {
                warn!(%id, "Dropping insert for already tracked user operation");
                return;
            }
            state.user_operations.insert(id, metadata.clone());
        }
        let _ = self.inner.update_sender.send(StoreUpdate { id, metadata });
    }

    /// Apply a mutation to one operation and publish the committed patch.
    ///
    /// The mutation is validated against the store invariants (monotonic
    /// status, write-once hashes, immutable identity fields, payload frozen
    /// after signing, error set iff failed) and dropped wholesale if it
    /// violates any of them. Returns the committed metadata, or `None` if the
    /// operation is unknown or the mutation was rejected.
    pub fn update(
        &self,
        id: OperationId,
        f: impl FnOnce(&mut UserOperationMetadata),
    ) -> Option<UserOperationMetadata> {
        let committed = {
            let mut state = self.inner.state.write().expect("store lock poisoned");
            let Some(current) = state.user_operations.get_mut(&id) else {
                warn!(%id, "Dropping update for unknown user operation");
                return None;
            };
            let mut next = current.clone();
            f(&mut next);
            if let Err(reason) = validate_mutation(current, &next) {
                warn!(%id, reason, "Dropping illegal user operation mutation");
                return None;
            }
            *current = next.clone();
            next
        };
        let _ = self.inner.update_sender.send(StoreUpdate {
            id,
            metadata: committed.clone(),
        });
        Some(committed)
    }

    /// Get one operation's metadata by id.
    pub fn get(&self, id: OperationId) -> Option<UserOperationMetadata> {
        self.inner
            .state
            .read()
            .expect("store lock poisoned")
            .user_operations
            .get(&id)
            .cloned()
    }

    /// Snapshot of the full persisted state.
    pub fn state(&self) -> UserOperationControllerState {
        self.inner.state.read().expect("store lock poisoned").clone()
    }

    /// All operations matching a predicate.
    pub fn list(
        &self,
        predicate: impl Fn(&UserOperationMetadata) -> bool,
    ) -> Vec<UserOperationMetadata> {
        self.inner
            .state
            .read()
            .expect("store lock poisoned")
            .user_operations
            .values()
            .filter(|metadata| predicate(metadata))
            .cloned()
            .collect()
    }

    /// Subscribe to the stream of committed patches.
    pub fn subscribe_updates(&self) -> broadcast::Receiver<StoreUpdate> {
        self.inner.update_sender.subscribe()
    }
}

impl Default for UserOperationStore {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_mutation(
    old: &UserOperationMetadata,
    new: &UserOperationMetadata,
) -> Result<(), &'static str> {
    if new.id != old.id
        || new.chain_id != old.chain_id
        || new.network_client_id != old.network_client_id
        || new.origin != old.origin
        || new.time != old.time
        || new.require_approval != old.require_approval
    {
        return Err("identity field changed");
    }
    if new.status != old.status && !old.status.can_transition_to(new.status) {
        return Err("status regression");
    }
    if old.user_operation_hash.is_some() && new.user_operation_hash != old.user_operation_hash {
        return Err("user operation hash overwritten");
    }
    if old.transaction_hash.is_some() && new.transaction_hash != old.transaction_hash {
        return Err("transaction hash overwritten");
    }
    if old.user_operation.is_signed() && new.user_operation != old.user_operation {
        return Err("payload mutated after signing");
    }
    if (new.status == UserOperationStatus::Failed) != new.error.is_some() {
        return Err("error must be set exactly when failed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use alloy_primitives::B256;
    use opflow_types::{ErrorKind, OperationError};

    use super::*;

    fn test_metadata() -> UserOperationMetadata {
        UserOperationMetadata::new(
            OperationId::random(),
            1,
            "net1".into(),
            "dapp.example".to_string(),
            true,
        )
    }

    #[test]
    fn test_insert_and_get() {
        let store = UserOperationStore::new();
        let metadata = test_metadata();
        let id = metadata.id;

        store.insert(metadata.clone());

        assert_eq!(store.get(id), Some(metadata));
        assert_eq!(store.state().user_operations.len(), 1);
    }

    #[test]
    fn test_duplicate_insert_is_dropped() {
        let store = UserOperationStore::new();
        let metadata = test_metadata();
        let id = metadata.id;
        store.insert(metadata.clone());

        let mut duplicate = metadata;
        duplicate.origin = "other.example".to_string();
        store.insert(duplicate);

        assert_eq!(store.get(id).unwrap().origin, "dapp.example");
    }

    #[tokio::test]
    async fn test_update_publishes_single_patch() {
        let store = UserOperationStore::new();
        let metadata = test_metadata();
        let id = metadata.id;
        store.insert(metadata);

        let mut updates = store.subscribe_updates();

        store
            .update(id, |m| m.status = UserOperationStatus::Approved)
            .unwrap();

        let patch = updates.recv().await.unwrap();
        assert_eq!(patch.id, id);
        assert_eq!(patch.metadata.status, UserOperationStatus::Approved);
        assert!(updates.try_recv().is_err());
    }

    #[test]
    fn test_status_regression_is_rejected() {
        let store = UserOperationStore::new();
        let metadata = test_metadata();
        let id = metadata.id;
        store.insert(metadata);
        store
            .update(id, |m| m.status = UserOperationStatus::Approved)
            .unwrap();

        let rejected = store.update(id, |m| m.status = UserOperationStatus::Unapproved);

        assert!(rejected.is_none());
        assert_eq!(
            store.get(id).unwrap().status,
            UserOperationStatus::Approved
        );
    }

    #[test]
    fn test_hash_overwrite_is_rejected() {
        let store = UserOperationStore::new();
        let metadata = test_metadata();
        let id = metadata.id;
        store.insert(metadata);
        store
            .update(id, |m| m.user_operation_hash = Some(B256::repeat_byte(1)))
            .unwrap();

        let rejected = store.update(id, |m| m.user_operation_hash = Some(B256::repeat_byte(2)));

        assert!(rejected.is_none());
        assert_eq!(
            store.get(id).unwrap().user_operation_hash,
            Some(B256::repeat_byte(1))
        );
    }

    #[test]
    fn test_error_requires_failed_status() {
        let store = UserOperationStore::new();
        let metadata = test_metadata();
        let id = metadata.id;
        store.insert(metadata);

        let rejected = store.update(id, |m| {
            m.error = Some(OperationError::new(ErrorKind::Submission, "boom"))
        });
        assert!(rejected.is_none());

        let committed = store.update(id, |m| {
            m.status = UserOperationStatus::Failed;
            m.error = Some(OperationError::new(ErrorKind::Submission, "boom"));
        });
        assert!(committed.is_some());
    }

    #[test]
    fn test_terminal_entries_stay_queryable() {
        let store = UserOperationStore::new();
        let metadata = test_metadata();
        let id = metadata.id;
        store.insert(metadata);
        store.update(id, |m| {
            m.status = UserOperationStatus::Failed;
            m.error = Some(OperationError::new(ErrorKind::RejectedByUser, "rejected"));
        });

        assert_eq!(
            store.get(id).unwrap().status,
            UserOperationStatus::Failed
        );
        assert_eq!(store.list(|m| m.status == UserOperationStatus::Failed).len(), 1);
    }
}
