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

#![warn(missing_docs, unreachable_pub)]
#![deny(unused_must_use, rust_2018_idioms)]
#![doc(test(
    no_crate_inject,
    attr(deny(warnings, rust_2018_idioms), allow(dead_code, unused_variables))
))]

//! Opflow common types

mod account;
pub use account::{
    ApprovalDescriptor, ApprovalGate, ApprovalOutcome, PreparedCall, PreparedCallRequest,
    SmartContractAccount,
};
#[cfg(feature = "test-utils")]
pub use account::{MockApprovalGate, MockSmartContractAccount};

mod chain;
pub use chain::NetworkClientId;

mod gas;
pub use gas::{GasEstimate, GasFees};

mod metadata;
pub use metadata::{
    ErrorKind, OperationError, OperationId, TransactionParams, UserOperationControllerState,
    UserOperationMetadata, UserOperationStatus,
};

mod request;
pub use request::UserOperationRequest;

mod timestamp;
pub use timestamp::Timestamp;

mod user_operation;
pub use user_operation::UserOperation;
