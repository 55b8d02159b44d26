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
use serde::{Deserialize, Serialize};

use crate::GasFees;

/// An ERC-4337 user operation, entry point v0.6 shape.
///
/// Fields are filled in at different pipeline stages: call data and nonce by
/// the smart contract account, gas limits and fees during fee resolution, the
/// signature last. Once the signature is set the payload is treated as
/// immutable. Serializes in the camelCase hex form expected by bundler RPC
/// methods.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperation {
    /// The smart contract account sending the operation
    pub sender: Address,
    /// Anti-replay nonce, allocated by the account
    pub nonce: U256,
    /// Factory call to deploy the account if it does not yet exist
    pub init_code: Bytes,
    /// The call the account will execute
    pub call_data: Bytes,
    /// Gas limit for the execution phase
    pub call_gas_limit: U256,
    /// Gas limit for the verification phase
    pub verification_gas_limit: U256,
    /// Gas to compensate the bundler for pre-verification work
    pub pre_verification_gas: U256,
    /// EIP-1559 max fee per gas
    pub max_fee_per_gas: U256,
    /// EIP-1559 max priority fee per gas
    pub max_priority_fee_per_gas: U256,
    /// Paymaster address and sponsorship data, empty when unsponsored
    pub paymaster_and_data: Bytes,
    /// Account signature over the fully fee-resolved payload
    pub signature: Bytes,
}

impl UserOperation {
    /// An empty draft operation, as created at the start of the pipeline
    /// before any field has been resolved.
    pub fn empty() -> Self {
        Self {
            sender: Address::ZERO,
            nonce: U256::ZERO,
            init_code: Bytes::new(),
            call_data: Bytes::new(),
            call_gas_limit: U256::ZERO,
            verification_gas_limit: U256::ZERO,
            pre_verification_gas: U256::ZERO,
            max_fee_per_gas: U256::ZERO,
            max_priority_fee_per_gas: U256::ZERO,
            paymaster_and_data: Bytes::new(),
            signature: Bytes::new(),
        }
    }

    /// Returns true once the account signature has been attached.
    pub fn is_signed(&self) -> bool {
        !self.signature.is_empty()
    }

    /// The operation's gas fees as a pair.
    pub fn gas_fees(&self) -> GasFees {
        GasFees {
            max_fee_per_gas: self.max_fee_per_gas.saturating_to(),
            max_priority_fee_per_gas: self.max_priority_fee_per_gas.saturating_to(),
        }
    }

    /// Set the operation's gas fees from a pair.
    pub fn set_gas_fees(&mut self, fees: GasFees) {
        self.max_fee_per_gas = U256::from(fees.max_fee_per_gas);
        self.max_priority_fee_per_gas = U256::from(fees.max_priority_fee_per_gas);
    }
}

impl Default for UserOperation {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::address;

    use super::*;

    #[test]
    fn test_empty_operation_is_unsigned() {
        assert!(!UserOperation::empty().is_signed());
    }

    #[test]
    fn test_serializes_camel_case_hex() {
        let mut op = UserOperation::empty();
        op.sender = address!("1000000000000000000000000000000000000001");
        op.max_fee_per_gas = U256::from(0x10);

        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(
            json["sender"],
            "0x1000000000000000000000000000000000000001"
        );
        assert_eq!(json["maxFeePerGas"], "0x10");
        assert_eq!(json["paymasterAndData"], "0x");
    }

    #[test]
    fn test_gas_fees_round_trip() {
        let mut op = UserOperation::empty();
        op.set_gas_fees(GasFees {
            max_fee_per_gas: 100,
            max_priority_fee_per_gas: 2,
        });
        assert_eq!(op.max_fee_per_gas, U256::from(100));
        assert_eq!(op.gas_fees().max_priority_fee_per_gas, 2);
    }
}
