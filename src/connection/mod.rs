// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ownership and recovery of the bus connection.
//!
//! [`ConnectionManager`] owns the one live bus handle. Consumers take cheap
//! snapshots of it with [`current_handle`](ConnectionManager::current_handle);
//! anyone who finds it unusable calls
//! [`report_failure`](ConnectionManager::report_failure), which runs the
//! reconnection protocol:
//!
//! 1. under the reconnection lock, clear the handle and close it
//! 2. without any lock, wait for the policy delay
//! 3. under the reconnection lock, connect and install a new handle unless
//!    another caller already did
//!
//! Concurrent callers therefore never install two handles, and nobody is
//! blocked while a caller sleeps.

mod policy;

pub use policy::ReconnectionPolicy;

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex;

use crate::error::ProtocolError;
use crate::protocol::{BusConnector, BusHandle};

/// Owner of the bus handle.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use traffic_accident::protocol::{MqttBusConfig, MqttBusConnector};
/// use traffic_accident::{ConnectionManager, ReconnectionPolicy};
///
/// # async fn example() -> traffic_accident::Result<()> {
/// let connector = MqttBusConnector::new(MqttBusConfig::default());
/// let connections = Arc::new(ConnectionManager::new(
///     connector,
///     "mqtt://127.0.0.1:1883",
///     ReconnectionPolicy::default(),
/// ));
///
/// connections.connect().await?;
/// tokio::spawn({
///     let connections = Arc::clone(&connections);
///     async move { connections.supervise().await }
/// });
/// # Ok(())
/// # }
/// ```
pub struct ConnectionManager<C: BusConnector> {
    connector: C,
    server_address: String,
    policy: ReconnectionPolicy,
    /// The live handle. Only written while `reconnect` is held.
    handle: RwLock<Option<Arc<C::Handle>>>,
    /// Serializes handle mutation; holds the count of consecutive failed
    /// connection attempts.
    reconnect: Mutex<u32>,
}

impl<C: BusConnector> ConnectionManager<C> {
    /// Creates a manager with no handle installed.
    #[must_use]
    pub fn new(connector: C, server_address: impl Into<String>, policy: ReconnectionPolicy) -> Self {
        Self {
            connector,
            server_address: server_address.into(),
            policy,
            handle: RwLock::new(None),
            reconnect: Mutex::new(0),
        }
    }

    /// Returns the bus server address handles are created for.
    #[must_use]
    pub fn server_address(&self) -> &str {
        &self.server_address
    }

    /// Returns the reconnection policy.
    #[must_use]
    pub fn policy(&self) -> &ReconnectionPolicy {
        &self.policy
    }

    /// Returns a snapshot of the current handle, if any.
    ///
    /// Never waits on a reconnection in progress.
    #[must_use]
    pub fn current_handle(&self) -> Option<Arc<C::Handle>> {
        self.handle.read().clone()
    }

    /// Returns true if a handle is installed and the transport reports it alive.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.current_handle().is_some_and(|handle| handle.is_alive())
    }

    /// Establishes the initial connection.
    ///
    /// Replaces and closes any handle already installed.
    ///
    /// # Errors
    ///
    /// Returns error if the bus server cannot be reached.
    pub async fn connect(&self) -> Result<(), ProtocolError> {
        let mut failures = self.reconnect.lock().await;
        let handle = self.connector.connect(&self.server_address).await?;
        let previous = self.handle.write().replace(Arc::new(handle));
        if let Some(previous) = previous {
            previous.close();
        }
        *failures = 0;
        tracing::info!(address = %self.server_address, "Connected to bus server");
        Ok(())
    }

    /// Reports that the current handle is unusable and tries to replace it.
    ///
    /// The removed handle is closed, so snapshots still held elsewhere see it
    /// dead and [`supervise`](Self::supervise) moves on to its replacement.
    /// Returns once a reconnection attempt has been made or skipped because
    /// another caller already reconnected. A failed attempt leaves the handle
    /// absent; the next call repeats the cycle.
    pub async fn report_failure(&self) {
        let failures = {
            let failures = self.reconnect.lock().await;
            let previous = self.handle.write().take();
            if let Some(previous) = previous {
                previous.close();
                tracing::info!(address = %self.server_address, "Bus client reset");
            }
            *failures
        };

        let delay = self.policy.delay_for_attempt(failures);
        tracing::debug!(delay_ms = delay.as_millis(), "Waiting before reconnecting");
        tokio::time::sleep(delay).await;

        let mut failures = self.reconnect.lock().await;
        let reconnected = self.handle.read().is_some();
        if reconnected {
            tracing::info!(
                address = %self.server_address,
                "Using already reconnected bus server"
            );
            return;
        }

        match self.connector.connect(&self.server_address).await {
            Ok(handle) => {
                *self.handle.write() = Some(Arc::new(handle));
                *failures = 0;
                tracing::info!(address = %self.server_address, "Reconnected to bus server");
            }
            Err(e) => {
                *failures = failures.saturating_add(1);
                tracing::warn!(
                    address = %self.server_address,
                    attempt = *failures,
                    error = %e,
                    "Reconnection failed"
                );
            }
        }
    }

    /// Watches the installed handle and reconnects whenever it dies.
    ///
    /// Runs forever; spawn it as a task and abort the task to stop it.
    pub async fn supervise(&self) {
        loop {
            let Some(handle) = self.current_handle() else {
                self.report_failure().await;
                continue;
            };

            handle.closed().await;

            // Only report the handle we watched; a newer one may already be in place.
            let still_current = self
                .current_handle()
                .is_some_and(|current| Arc::ptr_eq(&current, &handle));
            drop(handle);

            if still_current {
                tracing::warn!(address = %self.server_address, "Bus connection lost");
                self.report_failure().await;
            }
        }
    }
}

impl<C: BusConnector> std::fmt::Debug for ConnectionManager<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("server_address", &self.server_address)
            .field("policy", &self.policy)
            .field("connected", &self.handle.read().is_some())
            .finish_non_exhaustive()
    }
}
