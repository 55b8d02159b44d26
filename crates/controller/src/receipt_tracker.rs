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

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use metrics::Counter;
use metrics_derive::Metrics;
use opflow_provider::{NetworkClient, NetworkClientRegistry};
use opflow_types::{ErrorKind, NetworkClientId, OperationError, UserOperationStatus};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{context::LifecycleContext, LifecycleError};

/// Opaque handle for one registered interest in polling a network client.
///
/// The polling loop for a client stays alive while at least one token for it
/// is outstanding.
#[derive(Debug)]
pub struct PollingToken {
    token: u64,
    network_client_id: NetworkClientId,
}

struct PollingSession {
    tokens: HashSet<u64>,
    cancel: CancellationToken,
}

/// Polls the network for receipts of submitted operations and drives their
/// terminal transitions.
///
/// One recurring check per network client, covering every submitted
/// operation targeting that client within the same cycle. Operations leave
/// the cycle as soon as they reach a terminal state. Transient query
/// failures are retried on the next cycle and never fail an operation; only
/// a receipt reporting on-chain failure does.
pub struct PendingUserOperationTracker<R> {
    context: Arc<LifecycleContext<R>>,
    sessions: Mutex<HashMap<NetworkClientId, PollingSession>>,
    next_token: AtomicU64,
}

impl<R: NetworkClientRegistry> PendingUserOperationTracker<R> {
    pub(crate) fn new(context: Arc<LifecycleContext<R>>) -> Self {
        Self {
            context,
            sessions: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(0),
        }
    }

    /// Begin (or join) the recurring receipt check for a network client.
    ///
    /// Idempotent per client: a second call while a session is active joins
    /// the existing loop instead of starting a concurrent one.
    pub fn start_polling_by_network_client_id(
        &self,
        network_client_id: NetworkClientId,
    ) -> Result<PollingToken, LifecycleError> {
        let client = self.context.network_client(&network_client_id)?;
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);

        let mut sessions = self.sessions.lock().expect("tracker lock poisoned");
        if let Some(session) = sessions.get_mut(&network_client_id) {
            session.tokens.insert(token);
            debug!(%network_client_id, "Joined existing polling session");
        } else {
            let cancel = CancellationToken::new();
            tokio::spawn(Self::poll_in_loop(
                Arc::clone(&self.context),
                client,
                network_client_id.clone(),
                cancel.clone(),
            ));
            sessions.insert(
                network_client_id.clone(),
                PollingSession {
                    tokens: HashSet::from([token]),
                    cancel,
                },
            );
            info!(%network_client_id, "Started polling session");
        }

        Ok(PollingToken {
            token,
            network_client_id,
        })
    }

    /// Release one polling registration.
    ///
    /// The client's loop is cancelled once its last token is released.
    pub fn stop_polling(&self, token: PollingToken) {
        let mut sessions = self.sessions.lock().expect("tracker lock poisoned");
        let Some(session) = sessions.get_mut(&token.network_client_id) else {
            return;
        };
        session.tokens.remove(&token.token);
        if session.tokens.is_empty() {
            session.cancel.cancel();
            sessions.remove(&token.network_client_id);
            info!(network_client_id = %token.network_client_id, "Stopped polling session");
        }
    }

    async fn poll_in_loop(
        context: Arc<LifecycleContext<R>>,
        client: NetworkClient,
        network_client_id: NetworkClientId,
        cancel: CancellationToken,
    ) {
        let metrics = TrackerMetrics::default();
        let mut interval = tokio::time::interval(context.settings.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    Self::check_submitted_user_operations(
                        &context,
                        &client,
                        &network_client_id,
                        &metrics,
                    )
                    .await;
                }
            }
        }
    }

    /// One polling cycle: query a receipt for every submitted operation on
    /// this network client.
    async fn check_submitted_user_operations(
        context: &LifecycleContext<R>,
        client: &NetworkClient,
        network_client_id: &NetworkClientId,
        metrics: &TrackerMetrics,
    ) {
        metrics.poll_cycles.increment(1);
        let submitted = context.store.list(|metadata| {
            metadata.status == UserOperationStatus::Submitted
                && metadata.network_client_id == *network_client_id
        });

        for metadata in submitted {
            let Some(hash) = metadata.user_operation_hash else {
                warn!(id = %metadata.id, "Submitted user operation without hash");
                continue;
            };
            match client.bundler.get_user_operation_receipt(hash).await {
                Ok(Some(receipt)) if receipt.success => {
                    metrics.receipts_found.increment(1);
                    context.confirm_user_operation(metadata.id, &receipt);
                }
                Ok(Some(receipt)) => {
                    metrics.receipts_found.increment(1);
                    let reason = receipt
                        .reason
                        .unwrap_or_else(|| "user operation reverted on chain".to_string());
                    context.fail_user_operation(
                        metadata.id,
                        OperationError::new(ErrorKind::OnChainRevert, reason),
                    );
                }
                Ok(None) => {
                    debug!(id = %metadata.id, "User operation still pending");
                }
                Err(error) => {
                    // transient: retried on the next cycle
                    metrics.transient_poll_errors.increment(1);
                    warn!(id = %metadata.id, %error, "Receipt query failed, will retry");
                }
            }
        }
    }

    #[cfg(test)]
    fn active_sessions(&self) -> usize {
        self.sessions.lock().expect("tracker lock poisoned").len()
    }

    #[cfg(test)]
    fn session_token_count(&self, network_client_id: &NetworkClientId) -> usize {
        self.sessions
            .lock()
            .expect("tracker lock poisoned")
            .get(network_client_id)
            .map_or(0, |session| session.tokens.len())
    }
}

#[derive(Metrics)]
#[metrics(scope = "opflow_tracker")]
struct TrackerMetrics {
    #[metric(describe = "the number of receipt poll cycles run.")]
    poll_cycles: Counter,
    #[metric(describe = "the number of receipts found.")]
    receipts_found: Counter,
    #[metric(describe = "the number of transient receipt query failures.")]
    transient_poll_errors: Counter,
}
