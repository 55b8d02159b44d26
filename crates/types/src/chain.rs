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

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// Identifier of a configured network client (RPC endpoint + bundler pair).
///
/// Opaque to the controller. Fixed on an operation at creation time and used
/// to key the receipt polling sessions.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkClientId(String);

impl NetworkClientId {
    /// Create a new network client id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NetworkClientId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for NetworkClientId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Display for NetworkClientId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}
