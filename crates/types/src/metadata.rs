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
    fmt::{self, Display, Formatter},
};

use alloy_primitives::{Address, Bytes, B256, U256};
use parse_display::Display as ParseDisplay;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{NetworkClientId, Timestamp, UserOperation};

/// Opaque unique identifier of a tracked user operation.
///
/// Generated at creation, never reused.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(Uuid);

impl OperationId {
    /// Generate a fresh id.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Display for OperationId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Lifecycle state of a user operation.
///
/// Advances monotonically through the pipeline stages; `Failed` is reachable
/// from any non-terminal state, including directly from `Unapproved` when the
/// approval gate rejects.
#[derive(
    Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, ParseDisplay, Serialize, Deserialize,
)]
#[display(style = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserOperationStatus {
    /// Created, awaiting approval (or approval bypass)
    Unapproved,
    /// Approved by the user or approval was not required
    Approved,
    /// Account signature attached, payload now immutable
    Signed,
    /// Accepted by the bundler, awaiting inclusion
    Submitted,
    /// Included on chain and executed successfully
    Confirmed,
    /// Rejected, errored, or reverted on chain
    Failed,
}

impl UserOperationStatus {
    /// Returns true for states that end the lifecycle.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed)
    }

    /// Returns true if `next` is a legal successor of this state.
    pub fn can_transition_to(self, next: Self) -> bool {
        use UserOperationStatus::*;
        match (self, next) {
            (Unapproved, Approved)
            | (Approved, Signed)
            | (Signed, Submitted)
            | (Submitted, Confirmed) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

/// Classification of a terminal failure.
#[derive(
    Clone, Copy, Debug, Eq, PartialEq, Hash, ParseDisplay, Serialize, Deserialize,
)]
#[display(style = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// The approval gate resolved to rejected
    RejectedByUser,
    /// The smart contract account failed to produce call data or a nonce
    AccountPrepare,
    /// The smart contract account failed to produce a signature
    AccountSign,
    /// The gas fee estimator failed
    FeeEstimation,
    /// The bundler failed to estimate gas limits
    GasEstimation,
    /// The bundler rejected the signed operation
    Submission,
    /// The operation was included on chain but reverted
    OnChainRevert,
}

/// Serializable record of why an operation failed.
///
/// Only definitive failures land here; transient poll errors are retried
/// internally and never persisted.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct OperationError {
    /// Failure classification
    pub kind: ErrorKind,
    /// Human-readable message captured from the underlying error
    pub message: String,
}

impl OperationError {
    /// Create a new error record.
    pub fn new(kind: ErrorKind, message: impl ToString) -> Self {
        Self {
            kind,
            message: message.to_string(),
        }
    }
}

impl Display for OperationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Plain transaction parameters, as supplied by callers that do not speak
/// user operations natively.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionParams {
    /// Sender, if the caller knows it
    pub from: Option<Address>,
    /// Recipient of the inner call
    pub to: Option<Address>,
    /// Value of the inner call
    pub value: Option<U256>,
    /// Data of the inner call
    pub data: Option<Bytes>,
    /// Caller-supplied max fee per gas override
    pub max_fee_per_gas: Option<u128>,
    /// Caller-supplied max priority fee per gas override
    pub max_priority_fee_per_gas: Option<u128>,
}

/// Everything the controller tracks about one user operation.
///
/// One entry per id; mutated exclusively through the store, never deleted.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperationMetadata {
    /// Unique id, generated at creation
    pub id: OperationId,
    /// Chain the operation targets, fixed at creation
    pub chain_id: u64,
    /// Network client the operation targets, fixed at creation
    pub network_client_id: NetworkClientId,
    /// The requesting caller, immutable
    pub origin: String,
    /// Current lifecycle state
    pub status: UserOperationStatus,
    /// The operation payload under construction
    pub user_operation: UserOperation,
    /// Hash assigned by the bundler at submission, write-once
    pub user_operation_hash: Option<B256>,
    /// Hash of the including transaction, write-once
    pub transaction_hash: Option<B256>,
    /// Set iff status is failed
    pub error: Option<OperationError>,
    /// Creation time
    pub time: Timestamp,
    /// Whether the approval gate is consulted, captured at creation
    pub require_approval: bool,
    /// Original transaction parameters when created from a transaction
    pub transaction_params: Option<TransactionParams>,
    /// Actual gas cost reported by the confirmed receipt
    pub actual_gas_cost: Option<U256>,
    /// Actual gas used reported by the confirmed receipt
    pub actual_gas_used: Option<U256>,
}

impl UserOperationMetadata {
    /// Create a fresh unapproved entry with an empty payload.
    pub fn new(
        id: OperationId,
        chain_id: u64,
        network_client_id: NetworkClientId,
        origin: String,
        require_approval: bool,
    ) -> Self {
        Self {
            id,
            chain_id,
            network_client_id,
            origin,
            status: UserOperationStatus::Unapproved,
            user_operation: UserOperation::empty(),
            user_operation_hash: None,
            transaction_hash: None,
            error: None,
            time: Timestamp::now(),
            require_approval,
            transaction_params: None,
            actual_gas_cost: None,
            actual_gas_used: None,
        }
    }
}

/// The controller's entire durable surface.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperationControllerState {
    /// All tracked operations, keyed by id
    pub user_operations: HashMap<OperationId, UserOperationMetadata>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_is_ordered() {
        use UserOperationStatus::*;
        assert!(Unapproved < Approved);
        assert!(Approved < Signed);
        assert!(Signed < Submitted);
        assert!(Submitted < Confirmed);
    }

    #[test]
    fn test_legal_transitions() {
        use UserOperationStatus::*;
        assert!(Unapproved.can_transition_to(Approved));
        assert!(Approved.can_transition_to(Signed));
        assert!(Signed.can_transition_to(Submitted));
        assert!(Submitted.can_transition_to(Confirmed));
        assert!(Unapproved.can_transition_to(Failed));
        assert!(Submitted.can_transition_to(Failed));
    }

    #[test]
    fn test_illegal_transitions() {
        use UserOperationStatus::*;
        assert!(!Approved.can_transition_to(Unapproved));
        assert!(!Unapproved.can_transition_to(Signed));
        assert!(!Confirmed.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Approved));
        assert!(!Failed.can_transition_to(Failed));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(
            UserOperationStatus::Unapproved.to_string(),
            "unapproved"
        );
        assert_eq!(UserOperationStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn test_state_serializes_camel_case() {
        let state = UserOperationControllerState::default();
        let json = serde_json::to_value(&state).unwrap();
        assert!(json.get("userOperations").is_some());
    }
}
