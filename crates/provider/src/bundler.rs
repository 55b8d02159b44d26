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

use alloy_primitives::{Address, B256, U256};
#[cfg(feature = "test-utils")]
use mockall::automock;
use opflow_types::{GasEstimate, UserOperation};
use serde::{Deserialize, Serialize};

/// Result type for bundler client calls.
pub type BundlerResult<T> = std::result::Result<T, BundlerClientError>;

/// Errors surfaced by a bundler client.
///
/// `Rpc` is a definitive answer from the bundler (e.g. validation failure on
/// submission); `Transport` covers everything that might self-heal and is
/// what receipt polling treats as transient.
#[derive(Debug, thiserror::Error)]
pub enum BundlerClientError {
    /// The bundler answered with a JSON-RPC error
    #[error("bundler rpc error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code
        code: i64,
        /// JSON-RPC error message
        message: String,
    },
    /// The bundler could not be reached or answered garbage
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

/// The transaction that included a user operation, as reported in its
/// receipt.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncludedTransaction {
    /// Hash of the including transaction
    pub transaction_hash: B256,
    /// Number of the including block
    pub block_number: U256,
}

/// Receipt for a user operation as returned by
/// `eth_getUserOperationReceipt`.
///
/// `success == false` is the definitive on-chain failure signal; anything
/// short of a receipt means the operation is still pending.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperationReceipt {
    /// Hash of the user operation
    pub user_op_hash: B256,
    /// Whether the inner call executed without reverting
    pub success: bool,
    /// Revert reason when `success` is false
    #[serde(default)]
    pub reason: Option<String>,
    /// Gas cost actually paid
    pub actual_gas_cost: U256,
    /// Gas actually used
    pub actual_gas_used: U256,
    /// The including transaction
    pub receipt: IncludedTransaction,
}

/// Client for an ERC-4337 bundler endpoint.
#[cfg_attr(feature = "test-utils", automock)]
#[async_trait::async_trait]
pub trait BundlerClient: Send + Sync + 'static {
    /// Submit a signed user operation, returning its hash.
    async fn send_user_operation(
        &self,
        operation: &UserOperation,
        entry_point: Address,
    ) -> BundlerResult<B256>;

    /// Estimate gas limits for an unsigned draft operation.
    async fn estimate_user_operation_gas(
        &self,
        operation: &UserOperation,
        entry_point: Address,
    ) -> BundlerResult<GasEstimate>;

    /// Fetch the receipt for a submitted operation, `None` while pending.
    async fn get_user_operation_receipt(
        &self,
        hash: B256,
    ) -> BundlerResult<Option<UserOperationReceipt>>;
}
