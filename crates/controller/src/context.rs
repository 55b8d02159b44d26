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

use metrics::Counter;
use metrics_derive::Metrics;
use opflow_provider::{NetworkClient, NetworkClientRegistry, UserOperationReceipt};
use opflow_types::{
    NetworkClientId, OperationError, OperationId, UserOperationMetadata, UserOperationStatus,
};
use tracing::{info, warn};

use crate::{controller::Settings, events::EventHub, LifecycleError, UserOperationStore};

/// State shared between the orchestrator and the receipt tracker.
///
/// Owns the single commit-and-emit path: every terminal transition goes
/// through `confirm_user_operation`/`fail_user_operation`, where the store
/// commit and the event emission happen together. The store's transition
/// guard makes a second terminal commit for the same operation a no-op, so
/// terminal events cannot double-fire.
pub(crate) struct LifecycleContext<R> {
    pub(crate) store: UserOperationStore,
    pub(crate) hub: EventHub,
    pub(crate) registry: R,
    pub(crate) settings: Settings,
    pub(crate) metrics: ControllerMetrics,
}

impl<R: NetworkClientRegistry> LifecycleContext<R> {
    pub(crate) fn new(registry: R, settings: Settings, store: UserOperationStore) -> Self {
        Self {
            store,
            hub: EventHub::new(),
            registry,
            settings,
            metrics: ControllerMetrics::default(),
        }
    }

    pub(crate) fn network_client(
        &self,
        id: &NetworkClientId,
    ) -> Result<NetworkClient, LifecycleError> {
        self.registry
            .get(id)
            .ok_or_else(|| LifecycleError::UnknownNetworkClient(id.clone()))
    }

    /// Insert a freshly created entry and notify observers.
    pub(crate) fn insert_metadata(&self, metadata: UserOperationMetadata) {
        self.store.insert(metadata.clone());
        self.hub.emit_transaction_updated(&metadata);
        self.metrics.ops_added.increment(1);
    }

    /// Commit a non-terminal mutation and notify observers.
    pub(crate) fn update_metadata(
        &self,
        id: OperationId,
        f: impl FnOnce(&mut UserOperationMetadata),
    ) -> Option<UserOperationMetadata> {
        let committed = self.store.update(id, f)?;
        self.hub.emit_transaction_updated(&committed);
        Some(committed)
    }

    /// Transition an operation to confirmed from its receipt.
    pub(crate) fn confirm_user_operation(&self, id: OperationId, receipt: &UserOperationReceipt) {
        let committed = self.store.update(id, |metadata| {
            metadata.status = UserOperationStatus::Confirmed;
            metadata.transaction_hash = Some(receipt.receipt.transaction_hash);
            metadata.actual_gas_cost = Some(receipt.actual_gas_cost);
            metadata.actual_gas_used = Some(receipt.actual_gas_used);
        });
        if let Some(metadata) = committed {
            info!(%id, transaction_hash = ?metadata.transaction_hash, "User operation confirmed");
            self.hub.emit_transaction_updated(&metadata);
            self.hub.emit_confirmed(&metadata);
            self.metrics.ops_confirmed.increment(1);
        }
    }

    /// Transition an operation to failed with the given error.
    pub(crate) fn fail_user_operation(&self, id: OperationId, error: OperationError) {
        let committed = self.store.update(id, |metadata| {
            metadata.status = UserOperationStatus::Failed;
            metadata.error = Some(error.clone());
        });
        if let Some(metadata) = committed {
            warn!(%id, %error, "User operation failed");
            self.hub.emit_transaction_updated(&metadata);
            self.hub.emit_failed(&metadata, &error);
            self.metrics.ops_failed.increment(1);
        }
    }
}

#[derive(Metrics)]
#[metrics(scope = "opflow_controller")]
pub(crate) struct ControllerMetrics {
    #[metric(describe = "the number of user operations added.")]
    pub(crate) ops_added: Counter,
    #[metric(describe = "the number of user operations confirmed on chain.")]
    pub(crate) ops_confirmed: Counter,
    #[metric(describe = "the number of user operations that failed.")]
    pub(crate) ops_failed: Counter,
}
