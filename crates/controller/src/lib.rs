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

//! The Opflow user operation lifecycle controller.
//!
//! Drives each user operation through approval, building, fee resolution,
//! signing, and submission, then tracks it until the chain confirms or
//! definitively fails it. The store is the single source of truth for all
//! operation state; every mutation is observable as one atomic patch and
//! terminal transitions notify subscribers exactly once.

mod context;

mod controller;
pub use controller::{
    AddUserOperationOptions, AddUserOperationResult, LifecycleError, Settings,
    UserOperationController, ENTRY_POINT_0_6,
};

mod emit;
pub use emit::{TerminalOutcome, UserOperationEvent};

mod events;

mod receipt_tracker;
pub use receipt_tracker::{PendingUserOperationTracker, PollingToken};

mod store;
pub use store::{StoreUpdate, UserOperationStore};

mod transaction;
pub use transaction::{transaction_metadata, TransactionMetadata};
