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

//! Utilities for emitting/collecting events from runtime components

use std::fmt::Display;

use tokio::{
    sync::broadcast::{self, error::RecvError},
    task::JoinHandle,
};
use tracing::{info, warn};

/// Capacity of the event channels.
/// Events are small (an id, a hash, an error snapshot), so allocating a few
/// megabytes for the channel is fine.
pub const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Receive events from a event broadcast channel and call
/// the given handler function for each event.
pub fn receive_events<T>(
    description: &'static str,
    mut rx: broadcast::Receiver<T>,
    handler: impl Fn(T) + Send + 'static,
) -> JoinHandle<()>
where
    T: Clone + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => handler(event),
                Err(RecvError::Closed) => {
                    info!("Event stream for {description} closed. Logging complete");
                    break;
                }
                Err(RecvError::Lagged(count)) => {
                    warn!("Event stream for {description} lagged. Missed {count} messages.")
                }
            }
        }
    })
}

/// An event handler that simply logs the event at an INFO level.
pub fn receive_and_log_events_with_filter<T>(
    rx: broadcast::Receiver<T>,
    filter: impl (Fn(&T) -> bool) + Send + 'static,
) -> JoinHandle<()>
where
    T: Clone + Display + Send + 'static,
{
    receive_events("logging", rx, move |event| {
        if filter(&event) {
            info!("{}", event);
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;

    #[tokio::test]
    async fn test_receive_events_drains_channel() {
        let (tx, rx) = broadcast::channel(16);
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = Arc::clone(&seen);

        let handle = receive_events("test", rx, move |_: u64| {
            seen_clone.fetch_add(1, Ordering::SeqCst);
        });

        tx.send(1).unwrap();
        tx.send(2).unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
