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

use alloy_primitives::{Address, Bytes, U256};

use crate::TransactionParams;

/// Caller-supplied inputs when adding a user operation.
///
/// All fields are optional overrides: fee fields supplied here always take
/// precedence over estimator values, and call fields are passed through to
/// the smart contract account for call data construction.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct UserOperationRequest {
    /// Data of the inner call
    pub data: Option<Bytes>,
    /// Recipient of the inner call
    pub to: Option<Address>,
    /// Value of the inner call
    pub value: Option<U256>,
    /// Max fee per gas override
    pub max_fee_per_gas: Option<u128>,
    /// Max priority fee per gas override
    pub max_priority_fee_per_gas: Option<u128>,
}

impl From<&TransactionParams> for UserOperationRequest {
    /// Normalize a plain transaction shape into an operation request.
    ///
    /// Gas-limit policy is intentionally not applied here; limits are owned
    /// by the smart contract account and bundler estimation.
    fn from(transaction: &TransactionParams) -> Self {
        Self {
            data: transaction.data.clone(),
            to: transaction.to,
            value: transaction.value,
            max_fee_per_gas: transaction.max_fee_per_gas,
            max_priority_fee_per_gas: transaction.max_priority_fee_per_gas,
        }
    }
}
