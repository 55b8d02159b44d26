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

use std::fmt::Display;

use alloy_primitives::B256;
use opflow_types::{OperationError, OperationId, UserOperationMetadata};
use opflow_utils::strs;

use crate::TransactionMetadata;

/// Lifecycle event published to global subscribers.
#[derive(Clone, Debug)]
pub enum UserOperationEvent {
    /// An operation with transaction-shaped origin was mutated.
    ///
    /// Fires on every metadata mutation, terminal or not, for operations
    /// created from plain transaction parameters.
    TransactionUpdated {
        /// Transaction-shaped projection of the operation
        transaction: TransactionMetadata,
    },
    /// An operation was confirmed on chain.
    Confirmed {
        /// Id of the confirmed operation
        id: OperationId,
        /// Hash of the including transaction
        transaction_hash: B256,
    },
    /// An operation failed definitively.
    Failed {
        /// Id of the failed operation
        id: OperationId,
        /// Why it failed
        error: OperationError,
    },
}

impl Display for UserOperationEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserOperationEvent::TransactionUpdated { transaction } => {
                write!(
                    f,
                    concat!(
                        "Transaction updated.",
                        "    Id: {}",
                        "    Status: {}",
                        "    Transaction hash: {}",
                        "    Error: {}",
                    ),
                    transaction.id,
                    transaction.status,
                    strs::to_debug_or(transaction.transaction_hash, "(pending)"),
                    strs::to_string_or(transaction.error.as_ref(), "(none)"),
                )
            }
            UserOperationEvent::Confirmed {
                id,
                transaction_hash,
            } => {
                write!(
                    f,
                    concat!(
                        "User operation confirmed!",
                        "    Id: {}",
                        "    Transaction hash: {:?}",
                    ),
                    id, transaction_hash,
                )
            }
            UserOperationEvent::Failed { id, error } => {
                write!(
                    f,
                    concat!(
                        "User operation failed.",
                        "    Id: {}",
                        "    Error: {}",
                    ),
                    id, error,
                )
            }
        }
    }
}

/// The terminal resolution delivered to per-operation subscribers.
///
/// Delivered exactly once, at the moment the terminal store transition is
/// committed.
#[derive(Clone, Debug)]
pub enum TerminalOutcome {
    /// The operation was confirmed on chain.
    Confirmed {
        /// Final metadata snapshot, transaction hash populated
        metadata: UserOperationMetadata,
    },
    /// The operation failed definitively.
    Failed {
        /// Final metadata snapshot
        metadata: UserOperationMetadata,
        /// Why it failed
        error: OperationError,
    },
}
