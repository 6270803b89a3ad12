// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Network reachability probe.
//!
//! Periodically attempts a TCP connection to a well-known address and
//! publishes the result as an online/offline flag. Consumers read the flag
//! directly, or receive every transition on a broadcast channel.

use std::time::Duration;

use log::{debug, info, warn};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, watch};
use tokio::time::{timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Transitions buffered per subscriber before it lags
const TRANSITION_CHANNEL_CAPACITY: usize = 16;

/// Configuration for the reachability probe.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Probe target in "host:port" format.
    pub address: String,
    /// Delay between probes.
    pub interval: Duration,
    /// Connect timeout for a single probe.
    pub timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            address: "1.1.1.1:53".to_string(),
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(2),
        }
    }
}

/// Handle to a running reachability probe.
///
/// The probe task stops when the handle is shut down or dropped.
pub struct ConnectivityProbe {
    state_rx: watch::Receiver<bool>,
    transition_tx: broadcast::Sender<bool>,
    cancel_token: CancellationToken,
    address: String,
}

impl std::fmt::Debug for ConnectivityProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityProbe")
            .field("address", &self.address)
            .field("online", &self.is_online())
            .finish_non_exhaustive()
    }
}

impl ConnectivityProbe {
    /// Run a first probe, then keep probing in a background task.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn start(config: ProbeConfig) -> Self {
        let initial = probe_once(&config.address, config.timeout).await;
        info!(
            "Initial connectivity probe to {}: {}",
            config.address,
            if initial { "reachable" } else { "unreachable" }
        );

        let (state_tx, state_rx) = watch::channel(initial);
        let (transition_tx, _) = broadcast::channel(TRANSITION_CHANNEL_CAPACITY);
        let cancel_token = CancellationToken::new();
        let address = config.address.clone();

        let task_cancel = cancel_token.clone();
        let task_transitions = transition_tx.clone();
        tokio::spawn(async move {
            probe_loop(config, state_tx, task_transitions, task_cancel).await;
        });

        Self {
            state_rx,
            transition_tx,
            cancel_token,
            address,
        }
    }

    /// Most recent probe result.
    #[must_use]
    pub fn is_online(&self) -> bool {
        *self.state_rx.borrow()
    }

    /// Receiver holding the latest flag. Flips between two reads collapse
    /// into the newest value.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state_rx.clone()
    }

    /// Receiver of every transition, in order, published after this call.
    #[must_use]
    pub fn transitions(&self) -> broadcast::Receiver<bool> {
        self.transition_tx.subscribe()
    }

    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Stop probing. The last published state stays readable.
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}

impl Drop for ConnectivityProbe {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

async fn probe_loop(
    config: ProbeConfig,
    state_tx: watch::Sender<bool>,
    transition_tx: broadcast::Sender<bool>,
    cancel_token: CancellationToken,
) {
    let mut interval = tokio::time::interval(config.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick fires immediately and the initial probe already ran
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            () = cancel_token.cancelled() => {
                info!("Connectivity probe cancelled");
                return;
            }
        }

        let online = tokio::select! {
            online = probe_once(&config.address, config.timeout) => online,
            () = cancel_token.cancelled() => {
                info!("Connectivity probe cancelled");
                return;
            }
        };

        let changed = state_tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });

        if changed {
            // No receivers is fine; the watch still holds the state
            let _ = transition_tx.send(online);
            if online {
                info!("{} became reachable", config.address);
            } else {
                warn!("{} became unreachable", config.address);
            }
        }
    }
}

/// Attempt one TCP connection to `address` within `limit`.
pub async fn probe_once(address: &str, limit: Duration) -> bool {
    match timeout(limit, TcpStream::connect(address)).await {
        Ok(Ok(_stream)) => true,
        Ok(Err(e)) => {
            debug!("Probe to {address} failed: {e}");
            false
        }
        Err(_elapsed) => {
            debug!("Probe to {address} timed out after {}ms", limit.as_millis());
            false
        }
    }
}
