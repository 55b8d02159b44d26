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

//! Capability traits for the external collaborators consulted while driving
//! an operation through its pipeline.

use alloy_primitives::{Address, Bytes, U256};
#[cfg(feature = "test-utils")]
use mockall::automock;

use crate::{GasFees, OperationId, UserOperation};

/// The inner call a smart contract account is asked to wrap.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PreparedCallRequest {
    /// Recipient of the inner call
    pub to: Option<Address>,
    /// Value of the inner call
    pub value: Option<U256>,
    /// Data of the inner call
    pub data: Option<Bytes>,
}

/// The account-produced portion of a draft operation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PreparedCall {
    /// The account address
    pub sender: Address,
    /// The account's next nonce
    pub nonce: U256,
    /// Factory call data if the account must first be deployed
    pub init_code: Bytes,
    /// Encoded execution call data
    pub call_data: Bytes,
}

/// Capability provider for a smart contract account.
///
/// Concrete account kinds (different account-abstraction standards, different
/// signer setups) implement this same interface. `prepare` must be
/// deterministic for the same request so that a retried build cannot allocate
/// a second nonce for the same draft.
#[cfg_attr(feature = "test-utils", automock)]
#[async_trait::async_trait]
pub trait SmartContractAccount: Send + Sync {
    /// Produce sender, nonce, init code, and call data for the given inner
    /// call.
    async fn prepare(&self, request: &PreparedCallRequest) -> anyhow::Result<PreparedCall>;

    /// Optionally attach paymaster sponsorship data to the draft.
    ///
    /// Consulted after gas limits are resolved and before approval. The
    /// default implementation sponsors nothing.
    async fn paymaster_data(&self, operation: &UserOperation) -> anyhow::Result<Option<Bytes>> {
        let _ = operation;
        Ok(None)
    }

    /// Sign the fully fee-resolved payload.
    async fn sign(&self, operation: &UserOperation, chain_id: u64) -> anyhow::Result<Bytes>;
}

/// Description of a pending operation shown to the approval surface.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ApprovalDescriptor {
    /// Id of the pending operation
    pub id: OperationId,
    /// The requesting caller
    pub origin: String,
    /// Chain the operation targets
    pub chain_id: u64,
}

/// Resolution of an approval request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ApprovalOutcome {
    /// The user approved, optionally overriding the operation's gas fees
    /// (both fields or neither).
    Approved {
        /// Fee override chosen during approval, if any
        updated_fees: Option<GasFees>,
    },
    /// The user rejected the operation.
    Rejected,
}

/// Asynchronous approval surface.
///
/// May suspend indefinitely; a pending approval never times out on the
/// controller side. Implementations translate their own transport failures
/// into `Rejected`.
#[cfg_attr(feature = "test-utils", automock)]
#[async_trait::async_trait]
pub trait ApprovalGate: Send + Sync + 'static {
    /// Ask for approval of the described operation.
    async fn request_approval(&self, descriptor: ApprovalDescriptor) -> ApprovalOutcome;
}
