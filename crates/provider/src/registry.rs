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

use std::{collections::HashMap, fmt::Debug, sync::Arc};

#[cfg(feature = "test-utils")]
use mockall::automock;
use opflow_types::NetworkClientId;

use crate::BundlerClient;

/// A resolved network client: the chain it serves and its bundler endpoint.
#[derive(Clone)]
pub struct NetworkClient {
    /// Chain id served by this client
    pub chain_id: u64,
    /// Bundler endpoint for this chain
    pub bundler: Arc<dyn BundlerClient>,
}

impl Debug for NetworkClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkClient")
            .field("chain_id", &self.chain_id)
            .finish()
    }
}

/// Resolves network client ids to concrete clients.
///
/// Network-client selection and RPC plumbing live outside the controller;
/// this is the boundary it reaches them through.
#[cfg_attr(feature = "test-utils", automock)]
pub trait NetworkClientRegistry: Send + Sync + 'static {
    /// Look up a client by id, `None` if unconfigured.
    fn get(&self, id: &NetworkClientId) -> Option<NetworkClient>;
}

/// A fixed registry configured up front.
#[derive(Clone, Debug, Default)]
pub struct StaticNetworkClientRegistry {
    clients: HashMap<NetworkClientId, NetworkClient>,
}

impl StaticNetworkClientRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a client under the given id, replacing any previous entry.
    pub fn with_client(
        mut self,
        id: NetworkClientId,
        chain_id: u64,
        bundler: Arc<dyn BundlerClient>,
    ) -> Self {
        self.clients
            .insert(id, NetworkClient { chain_id, bundler });
        self
    }
}

impl NetworkClientRegistry for StaticNetworkClientRegistry {
    fn get(&self, id: &NetworkClientId) -> Option<NetworkClient> {
        self.clients.get(id).cloned()
    }
}
