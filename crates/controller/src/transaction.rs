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

use alloy_primitives::B256;
use opflow_types::{
    OperationError, OperationId, Timestamp, TransactionParams, UserOperationMetadata,
    UserOperationStatus,
};
use serde::{Deserialize, Serialize};

/// Transaction-shaped projection of a user operation, for consumers that
/// track transactions rather than user operations.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMetadata {
    /// Id of the underlying user operation
    pub id: OperationId,
    /// Chain the transaction targets
    pub chain_id: u64,
    /// The requesting caller
    pub origin: String,
    /// Lifecycle state of the underlying operation
    pub status: UserOperationStatus,
    /// Creation time
    pub time: Timestamp,
    /// The original transaction parameters
    pub transaction_params: TransactionParams,
    /// Hash of the including transaction once confirmed
    pub transaction_hash: Option<B256>,
    /// Failure record, if the operation failed
    pub error: Option<OperationError>,
}

/// Project an operation into its transaction shape.
///
/// Returns `None` for operations that were not created from transaction
/// parameters; those have no transaction-shaped consumers.
pub fn transaction_metadata(metadata: &UserOperationMetadata) -> Option<TransactionMetadata> {
    let transaction_params = metadata.transaction_params.clone()?;
    Some(TransactionMetadata {
        id: metadata.id,
        chain_id: metadata.chain_id,
        origin: metadata.origin.clone(),
        status: metadata.status,
        time: metadata.time,
        transaction_params,
        transaction_hash: metadata.transaction_hash,
        error: metadata.error.clone(),
    })
}
