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

use std::cmp;

use opflow_utils::math;
use serde::{Deserialize, Serialize};

/// EIP-1559 gas fees for a user operation
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct GasFees {
    /// EIP-1559 max fee per gas
    pub max_fee_per_gas: u128,
    /// EIP-1559 max priority fee per gas
    pub max_priority_fee_per_gas: u128,
}

impl GasFees {
    /// Increase the gas fees by a percentage
    pub fn increase_by_percent(self, percent: u32) -> Self {
        Self {
            max_fee_per_gas: math::increase_by_percent_ceil(self.max_fee_per_gas, percent),
            max_priority_fee_per_gas: math::increase_by_percent_ceil(
                self.max_priority_fee_per_gas,
                percent,
            ),
        }
    }

    /// Get the effective gas price of these fees given a base fee
    pub fn gas_price(self, base_fee: u128) -> u128 {
        cmp::min(
            self.max_fee_per_gas,
            base_fee.saturating_add(self.max_priority_fee_per_gas),
        )
    }
}

/// Gas limits for a user operation as estimated by a bundler via
/// `eth_estimateUserOperationGas`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasEstimate {
    /// Gas to compensate the bundler for pre-verification work
    pub pre_verification_gas: u128,
    /// Gas limit for the verification phase
    pub verification_gas_limit: u128,
    /// Gas limit for the execution phase
    pub call_gas_limit: u128,
}

impl GasEstimate {
    /// Increase all estimated limits by a percentage.
    ///
    /// Bundler estimates are a lower bound. Callers add a buffer so that the
    /// operation is not rejected when on-chain conditions shift between
    /// estimation and inclusion.
    pub fn with_buffer(self, percent: u32) -> Self {
        Self {
            pre_verification_gas: math::increase_by_percent(self.pre_verification_gas, percent),
            verification_gas_limit: math::increase_by_percent(self.verification_gas_limit, percent),
            call_gas_limit: math::increase_by_percent(self.call_gas_limit, percent),
        }
    }
}
