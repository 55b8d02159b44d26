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

use std::{sync::Arc, time::Duration};

use alloy_primitives::{address, Address, Bytes, B256, U256};
use opflow_provider::{GasFeeEstimator, NetworkClient, NetworkClientRegistry};
use opflow_types::{
    ApprovalDescriptor, ApprovalGate, ApprovalOutcome, ErrorKind, GasFees, NetworkClientId,
    OperationError, OperationId, PreparedCallRequest, SmartContractAccount, TransactionParams,
    UserOperation, UserOperationControllerState, UserOperationMetadata, UserOperationRequest,
    UserOperationStatus,
};
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info};

use crate::{
    context::LifecycleContext, PendingUserOperationTracker, PollingToken, StoreUpdate,
    TerminalOutcome, UserOperationEvent, UserOperationStore,
};

/// Address of the canonical v0.6 entry point contract.
pub const ENTRY_POINT_0_6: Address = address!("5FF137D4b0FDCD49DcA30c7CF57E578a026d2789");

// 64 bytes of 0xff plus a v byte. Enough shape for bundler gas estimation to
// pass signature length checks before the real signature exists.
const DUMMY_SIGNATURE: [u8; 65] = {
    let mut signature = [0xff; 65];
    signature[64] = 0x1c;
    signature
};

/// Controller configuration, supplied at construction.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Interval between receipt poll cycles
    pub interval: Duration,
    /// Percentage added on top of bundler gas limit estimates
    pub gas_limit_buffer_percent: u32,
    /// Entry point contract operations are submitted through
    pub entry_point: Address,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            gas_limit_buffer_percent: 100,
            entry_point: ENTRY_POINT_0_6,
        }
    }
}

/// Errors returned synchronously from the controller surface.
///
/// Pipeline-stage failures are not errors of the `add*` calls themselves;
/// they land on the operation's metadata and fire failure events.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// The requested network client is not configured
    #[error("unknown network client: {0}")]
    UnknownNetworkClient(NetworkClientId),
}

/// Options for adding a user operation.
#[derive(Clone)]
pub struct AddUserOperationOptions {
    /// Network client the operation targets
    pub network_client_id: NetworkClientId,
    /// The requesting caller
    pub origin: String,
    /// Whether to consult the approval gate (defaults to true)
    pub require_approval: bool,
    /// Capability provider for the sending account
    pub smart_contract_account: Arc<dyn SmartContractAccount>,
}

impl AddUserOperationOptions {
    /// Options with approval required.
    pub fn new(
        network_client_id: NetworkClientId,
        origin: impl Into<String>,
        smart_contract_account: Arc<dyn SmartContractAccount>,
    ) -> Self {
        Self {
            network_client_id,
            origin: origin.into(),
            require_approval: true,
            smart_contract_account,
        }
    }

    /// Skip the approval gate for this operation.
    pub fn without_approval(mut self) -> Self {
        self.require_approval = false;
        self
    }
}

/// Handle returned synchronously from `add_user_operation`.
///
/// The deferred accessors resolve once the corresponding value is committed
/// to the store, immediately if it already is, and to `None` if the
/// operation fails instead. They are backed by the store's own update
/// stream, not a separate polling loop.
#[derive(Debug)]
pub struct AddUserOperationResult {
    id: OperationId,
    store: UserOperationStore,
}

impl AddUserOperationResult {
    /// Id of the created operation.
    pub fn id(&self) -> OperationId {
        self.id
    }

    /// The hash assigned by the bundler at submission.
    pub async fn user_operation_hash(&self) -> Option<B256> {
        self.wait_for_hash(|metadata| metadata.user_operation_hash)
            .await
    }

    /// The hash of the transaction that included the operation.
    pub async fn transaction_hash(&self) -> Option<B256> {
        self.wait_for_hash(|metadata| metadata.transaction_hash)
            .await
    }

    async fn wait_for_hash(
        &self,
        field: impl Fn(&UserOperationMetadata) -> Option<B256>,
    ) -> Option<B256> {
        // subscribe before the snapshot read so no commit is missed
        let mut updates = self.store.subscribe_updates();
        if let Some(metadata) = self.store.get(self.id) {
            if let Some(resolved) = resolution(&metadata, &field) {
                return resolved;
            }
        }
        loop {
            match updates.recv().await {
                Ok(update) if update.id == self.id => {
                    if let Some(resolved) = resolution(&update.metadata, &field) {
                        return resolved;
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    if let Some(metadata) = self.store.get(self.id) {
                        if let Some(resolved) = resolution(&metadata, &field) {
                            return resolved;
                        }
                    }
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return self.store.get(self.id).and_then(|m| field(&m));
                }
            }
        }
    }
}

/// `Some(value)` once the accessor can resolve, `None` while it must keep
/// waiting.
fn resolution(
    metadata: &UserOperationMetadata,
    field: &impl Fn(&UserOperationMetadata) -> Option<B256>,
) -> Option<Option<B256>> {
    if let Some(value) = field(metadata) {
        return Some(Some(value));
    }
    if metadata.status == UserOperationStatus::Failed {
        return Some(None);
    }
    None
}

/// Creates and manages the life cycle of user operations.
///
/// `add_user_operation` returns immediately after the store entry is
/// created; the pipeline (approval, build, fee resolution, gas estimation,
/// signing, submission) runs as a background task per operation. The
/// controller stays responsive to new calls and to polling of other
/// operations while any operation is suspended on a collaborator.
pub struct UserOperationController<A, F, R> {
    context: Arc<LifecycleContext<R>>,
    approval_gate: Arc<A>,
    fee_estimator: Arc<F>,
    tracker: PendingUserOperationTracker<R>,
}

impl<A, F, R> UserOperationController<A, F, R>
where
    A: ApprovalGate,
    F: GasFeeEstimator,
    R: NetworkClientRegistry,
{
    /// Construct a controller with an empty store.
    pub fn new(approval_gate: A, fee_estimator: F, registry: R, settings: Settings) -> Self {
        Self::with_state(
            approval_gate,
            fee_estimator,
            registry,
            settings,
            UserOperationControllerState::default(),
        )
    }

    /// Construct a controller seeded with previously persisted state.
    pub fn with_state(
        approval_gate: A,
        fee_estimator: F,
        registry: R,
        settings: Settings,
        state: UserOperationControllerState,
    ) -> Self {
        let context = Arc::new(LifecycleContext::new(
            registry,
            settings,
            UserOperationStore::with_state(state),
        ));
        Self {
            tracker: PendingUserOperationTracker::new(Arc::clone(&context)),
            approval_gate: Arc::new(approval_gate),
            fee_estimator: Arc::new(fee_estimator),
            context,
        }
    }

    /// Create a user operation and drive it through the pipeline.
    ///
    /// Returns as soon as the store entry exists; the entry is queryable by
    /// id immediately. Pipeline failures land on the entry and fire failure
    /// events rather than surfacing here.
    pub fn add_user_operation(
        &self,
        request: UserOperationRequest,
        options: AddUserOperationOptions,
    ) -> Result<AddUserOperationResult, LifecycleError> {
        self.add_internal(request, None, options)
    }

    /// Create a user operation from plain transaction parameters.
    ///
    /// The transaction is normalized into an operation request and enters
    /// the identical pipeline; additionally, every metadata mutation emits a
    /// transaction-shaped update event.
    pub fn add_user_operation_from_transaction(
        &self,
        transaction: TransactionParams,
        options: AddUserOperationOptions,
    ) -> Result<AddUserOperationResult, LifecycleError> {
        let request = UserOperationRequest::from(&transaction);
        self.add_internal(request, Some(transaction), options)
    }

    /// Begin (or join) receipt polling for a network client.
    pub fn start_polling_by_network_client_id(
        &self,
        network_client_id: NetworkClientId,
    ) -> Result<PollingToken, LifecycleError> {
        self.tracker
            .start_polling_by_network_client_id(network_client_id)
    }

    /// Release one polling registration.
    pub fn stop_polling(&self, token: PollingToken) {
        self.tracker.stop_polling(token)
    }

    /// One operation's metadata by id.
    pub fn get_user_operation(&self, id: OperationId) -> Option<UserOperationMetadata> {
        self.context.store.get(id)
    }

    /// Snapshot of the full persisted state.
    pub fn get_user_operation_state(&self) -> UserOperationControllerState {
        self.context.store.state()
    }

    /// Subscribe to the stream of committed state patches.
    pub fn subscribe_state_updates(&self) -> broadcast::Receiver<StoreUpdate> {
        self.context.store.subscribe_updates()
    }

    /// Subscribe to the global lifecycle event stream.
    pub fn subscribe_events(&self) -> broadcast::Receiver<UserOperationEvent> {
        self.context.hub.subscribe()
    }

    /// Spawn a task logging every lifecycle event at INFO level.
    pub fn spawn_event_logger(&self) -> tokio::task::JoinHandle<()> {
        opflow_utils::emit::receive_and_log_events_with_filter(self.subscribe_events(), |_| true)
    }

    /// Subscribe to the terminal outcome of one operation.
    ///
    /// Fires exactly once, immediately if the operation is already terminal.
    pub fn subscribe_terminal(&self, id: OperationId) -> oneshot::Receiver<TerminalOutcome> {
        let receiver = self.context.hub.register_terminal(id);
        if let Some(metadata) = self.context.store.get(id) {
            if metadata.status.is_terminal() {
                self.context.hub.fire_terminal(&metadata);
            }
        }
        receiver
    }

    fn add_internal(
        &self,
        request: UserOperationRequest,
        transaction_params: Option<TransactionParams>,
        options: AddUserOperationOptions,
    ) -> Result<AddUserOperationResult, LifecycleError> {
        let client = self.context.network_client(&options.network_client_id)?;

        let id = OperationId::random();
        let mut metadata = UserOperationMetadata::new(
            id,
            client.chain_id,
            options.network_client_id.clone(),
            options.origin.clone(),
            options.require_approval,
        );
        metadata.transaction_params = transaction_params;
        info!(%id, origin = %metadata.origin, "Added user operation");
        self.context.insert_metadata(metadata);

        let result = AddUserOperationResult {
            id,
            store: self.context.store.clone(),
        };

        let context = Arc::clone(&self.context);
        let approval_gate = Arc::clone(&self.approval_gate);
        let fee_estimator = Arc::clone(&self.fee_estimator);
        let account = options.smart_contract_account;
        let origin = options.origin;
        let require_approval = options.require_approval;
        tokio::spawn(async move {
            if let Err(error) = Self::drive_pipeline(
                &context,
                approval_gate.as_ref(),
                fee_estimator.as_ref(),
                account.as_ref(),
                &client,
                request,
                id,
                origin,
                require_approval,
            )
            .await
            {
                context.fail_user_operation(id, error);
            }
        });

        Ok(result)
    }

    #[allow(clippy::too_many_arguments)]
    async fn drive_pipeline(
        context: &LifecycleContext<R>,
        approval_gate: &A,
        fee_estimator: &F,
        account: &dyn SmartContractAccount,
        client: &NetworkClient,
        request: UserOperationRequest,
        id: OperationId,
        origin: String,
        require_approval: bool,
    ) -> Result<(), OperationError> {
        // approval; skipped entirely when not required
        let approval_fees = if require_approval {
            debug!(%id, "Requesting approval");
            let outcome = approval_gate
                .request_approval(ApprovalDescriptor {
                    id,
                    origin,
                    chain_id: client.chain_id,
                })
                .await;
            match outcome {
                ApprovalOutcome::Approved { updated_fees } => updated_fees,
                ApprovalOutcome::Rejected => {
                    return Err(OperationError::new(
                        ErrorKind::RejectedByUser,
                        "user rejected the operation",
                    ));
                }
            }
        } else {
            None
        };
        context.update_metadata(id, |metadata| {
            metadata.status = UserOperationStatus::Approved
        });

        // build call data and nonce via the account capability
        let prepared = account
            .prepare(&PreparedCallRequest {
                to: request.to,
                value: request.value,
                data: request.data.clone(),
            })
            .await
            .map_err(|error| {
                OperationError::new(ErrorKind::AccountPrepare, format!("{error:#}"))
            })?;
        let mut user_operation = UserOperation::empty();
        user_operation.sender = prepared.sender;
        user_operation.nonce = prepared.nonce;
        user_operation.init_code = prepared.init_code;
        user_operation.call_data = prepared.call_data;
        Self::commit_payload(context, id, &user_operation);

        // fee resolution; signing must see the final fees
        let fees = Self::resolve_gas_fees(fee_estimator, &request, approval_fees).await?;
        user_operation.set_gas_fees(fees);
        Self::commit_payload(context, id, &user_operation);

        // gas limits from the bundler, with a dummy signature standing in
        debug!(%id, "Estimating gas");
        let mut estimation_payload = user_operation.clone();
        estimation_payload.signature = Bytes::from_static(&DUMMY_SIGNATURE);
        let estimate = client
            .bundler
            .estimate_user_operation_gas(&estimation_payload, context.settings.entry_point)
            .await
            .map_err(|error| OperationError::new(ErrorKind::GasEstimation, error))?
            .with_buffer(context.settings.gas_limit_buffer_percent);
        user_operation.call_gas_limit = U256::from(estimate.call_gas_limit);
        user_operation.verification_gas_limit = U256::from(estimate.verification_gas_limit);
        user_operation.pre_verification_gas = U256::from(estimate.pre_verification_gas);
        Self::commit_payload(context, id, &user_operation);

        // optional paymaster sponsorship from the account capability
        let paymaster_and_data = account.paymaster_data(&user_operation).await.map_err(
            |error| OperationError::new(ErrorKind::AccountPrepare, format!("{error:#}")),
        )?;
        if let Some(paymaster_and_data) = paymaster_and_data {
            user_operation.paymaster_and_data = paymaster_and_data;
            Self::commit_payload(context, id, &user_operation);
        }

        // sign; the payload is immutable from here on
        debug!(%id, "Signing user operation");
        let signature = account
            .sign(&user_operation, client.chain_id)
            .await
            .map_err(|error| OperationError::new(ErrorKind::AccountSign, format!("{error:#}")))?;
        user_operation.signature = signature;
        let signed = user_operation.clone();
        context.update_metadata(id, move |metadata| {
            metadata.user_operation = signed;
            metadata.status = UserOperationStatus::Signed;
        });

        // submit; custody passes to the receipt tracker
        let hash = client
            .bundler
            .send_user_operation(&user_operation, context.settings.entry_point)
            .await
            .map_err(|error| OperationError::new(ErrorKind::Submission, error))?;
        info!(%id, user_operation_hash = ?hash, "Submitted user operation");
        context.update_metadata(id, move |metadata| {
            metadata.status = UserOperationStatus::Submitted;
            metadata.user_operation_hash = Some(hash);
        });
        Ok(())
    }

    fn commit_payload(context: &LifecycleContext<R>, id: OperationId, payload: &UserOperation) {
        let payload = payload.clone();
        context.update_metadata(id, move |metadata| metadata.user_operation = payload);
    }

    async fn resolve_gas_fees(
        fee_estimator: &F,
        request: &UserOperationRequest,
        approval_fees: Option<GasFees>,
    ) -> Result<GasFees, OperationError> {
        // fees confirmed during approval represent a deliberate user choice
        if let Some(fees) = approval_fees {
            return Ok(fees);
        }
        if let (Some(max_fee_per_gas), Some(max_priority_fee_per_gas)) =
            (request.max_fee_per_gas, request.max_priority_fee_per_gas)
        {
            return Ok(GasFees {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            });
        }
        let estimates = fee_estimator.estimate().await.map_err(|error| {
            OperationError::new(ErrorKind::FeeEstimation, format!("{error:#}"))
        })?;
        // caller-supplied fields always win over estimator values
        let max_fee_per_gas = request
            .max_fee_per_gas
            .or(estimates.max_fee_per_gas)
            .ok_or_else(|| {
                OperationError::new(ErrorKind::FeeEstimation, "no max fee per gas available")
            })?;
        let max_priority_fee_per_gas = request
            .max_priority_fee_per_gas
            .or(estimates.max_priority_fee_per_gas)
            .ok_or_else(|| {
                OperationError::new(
                    ErrorKind::FeeEstimation,
                    "no max priority fee per gas available",
                )
            })?;
        Ok(GasFees {
            max_fee_per_gas,
            max_priority_fee_per_gas,
        })
    }
}
