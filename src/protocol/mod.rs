// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bus transport and the publish facade.
//!
//! The core logic talks to the bus through three small traits:
//!
//! - [`BusConnector`]: establishes a new handle to a server address
//! - [`BusHandle`]: a live connection that can publish and reports its own death
//! - [`Notifier`]: the single `notify(payload)` seam used by the update processor
//!
//! # Implementations
//!
//! - [`MqttBusConnector`]: MQTT broker connection via `rumqttc`
//! - [`NodeRegistry`]: registration with the discovery service via `reqwest`
//! - [`BusNotifier`]: [`Notifier`] backed by a [`ConnectionManager`]

#[cfg(feature = "mqtt")]
mod mqtt_bus;
#[cfg(feature = "registry")]
mod registry;

#[cfg(feature = "mqtt")]
pub use mqtt_bus::{MqttBusConfig, MqttBusConnector, MqttBusHandle};
#[cfg(feature = "registry")]
pub use registry::{NodeRegistration, NodeRegistry};

use std::future::Future;
use std::sync::Arc;

use crate::connection::ConnectionManager;
use crate::error::ProtocolError;
use crate::incident::Payload;

/// Channel types a node can declare when registering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelType {
    /// Generic JSON data service.
    JsonData,
}

impl ChannelType {
    /// Returns the numeric channel id used by the discovery service.
    #[must_use]
    pub fn id(self) -> u32 {
        match self {
            Self::JsonData => 14,
        }
    }

    /// Returns the topic segment messages of this channel are published under.
    #[must_use]
    pub fn topic_segment(self) -> &'static str {
        match self {
            Self::JsonData => "json_data",
        }
    }
}

/// A live connection to a bus server.
pub trait BusHandle: Send + Sync + 'static {
    /// Returns whether the transport still considers this handle usable.
    fn is_alive(&self) -> bool;

    /// Resolves once the transport has declared this handle dead.
    fn closed(&self) -> impl Future<Output = ()> + Send;

    /// Shuts the connection down and marks the handle dead.
    ///
    /// Must be idempotent. Pending [`closed`](Self::closed) futures resolve.
    fn close(&self);

    /// Publishes a JSON document on a topic.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the transport rejects the message.
    fn publish(
        &self,
        topic: &str,
        json: &str,
    ) -> impl Future<Output = Result<(), ProtocolError>> + Send;
}

/// Creates bus handles.
pub trait BusConnector: Send + Sync + 'static {
    /// The handle type produced by this connector.
    type Handle: BusHandle;

    /// Connects to `address` and returns a live handle.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the server is unreachable or refuses the
    /// connection.
    fn connect(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<Self::Handle, ProtocolError>> + Send;
}

/// The publish facade consumed by the update processor.
pub trait Notifier: Send + Sync {
    /// Publishes one payload.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the payload could not be handed to the bus.
    fn notify(&self, payload: &Payload) -> impl Future<Output = Result<(), ProtocolError>> + Send;

    /// Returns whether a publish could currently reach the bus.
    fn is_ready(&self) -> bool {
        true
    }
}

/// [`Notifier`] that publishes through the handle currently installed in a
/// [`ConnectionManager`].
///
/// A missing handle fails with [`ProtocolError::NotConnected`]. Failures are
/// returned to the caller only; recovering the connection is the job of
/// [`ConnectionManager::supervise`].
pub struct BusNotifier<C: BusConnector> {
    connections: Arc<ConnectionManager<C>>,
    channel: ChannelType,
    name: String,
}

impl<C: BusConnector> BusNotifier<C> {
    /// Creates a notifier publishing messages called `name` on `channel`.
    #[must_use]
    pub fn new(
        connections: Arc<ConnectionManager<C>>,
        channel: ChannelType,
        name: impl Into<String>,
    ) -> Self {
        Self {
            connections,
            channel,
            name: name.into(),
        }
    }

    /// Returns the connection manager this notifier publishes through.
    #[must_use]
    pub fn connections(&self) -> &Arc<ConnectionManager<C>> {
        &self.connections
    }

    /// Returns the topic messages are published on.
    #[must_use]
    pub fn topic(&self) -> String {
        format!("{}/{}", self.channel.topic_segment(), self.name)
    }
}

impl<C: BusConnector> Notifier for BusNotifier<C> {
    async fn notify(&self, payload: &Payload) -> Result<(), ProtocolError> {
        let request = payload.to_request(&self.name)?;
        let handle = self
            .connections
            .current_handle()
            .ok_or(ProtocolError::NotConnected)?;

        let topic = self.topic();
        tracing::debug!(topic = %topic, payload = %request.json, "Publishing notification");
        handle.publish(&topic, &request.json).await
    }

    fn is_ready(&self) -> bool {
        self.connections.is_connected()
    }
}

impl<C: BusConnector> std::fmt::Debug for BusNotifier<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusNotifier")
            .field("channel", &self.channel)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
