// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT broker as the bus transport.
//!
//! Each [`MqttBusHandle`] is one MQTT session with its own event loop task.
//! The handle is alive from `CONNACK` until the event loop reports an error
//! or a disconnect. A dead handle is never revived: the
//! [`ConnectionManager`] replaces it with a new one.
//!
//! [`ConnectionManager`]: crate::ConnectionManager

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use crate::error::ProtocolError;
use crate::protocol::{BusConnector, BusHandle};

/// Global counter for generating unique client IDs.
static BUS_CLIENT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Configuration shared by every connection a [`MqttBusConnector`] makes.
#[derive(Debug, Clone)]
pub struct MqttBusConfig {
    client_prefix: String,
    credentials: Option<(String, String)>,
    keep_alive: Duration,
    connection_timeout: Duration,
}

impl Default for MqttBusConfig {
    fn default() -> Self {
        Self {
            client_prefix: "traffic_accident".to_string(),
            credentials: None,
            keep_alive: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(10),
        }
    }
}

impl MqttBusConfig {
    /// Sets the prefix of generated MQTT client IDs.
    #[must_use]
    pub fn with_client_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.client_prefix = prefix.into();
        self
    }

    /// Sets authentication credentials.
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    /// Sets the keep-alive interval (default: 30 seconds).
    #[must_use]
    pub fn with_keep_alive(mut self, duration: Duration) -> Self {
        self.keep_alive = duration;
        self
    }

    /// Sets how long to wait for `CONNACK` (default: 10 seconds).
    #[must_use]
    pub fn with_connection_timeout(mut self, duration: Duration) -> Self {
        self.connection_timeout = duration;
        self
    }

    /// Returns the connection timeout.
    #[must_use]
    pub fn connection_timeout(&self) -> Duration {
        self.connection_timeout
    }
}

/// Opens MQTT sessions against a broker address.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use traffic_accident::protocol::{BusConnector, BusHandle, MqttBusConfig, MqttBusConnector};
///
/// # async fn example() -> Result<(), traffic_accident::ProtocolError> {
/// let connector = MqttBusConnector::new(
///     MqttBusConfig::default().with_connection_timeout(Duration::from_secs(5)),
/// );
/// let handle = connector.connect("127.0.0.1:1883").await?;
/// handle.publish("json_data/TrafficAccident", r#"{"TrafficAccident":null}"#).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MqttBusConnector {
    config: MqttBusConfig,
}

impl MqttBusConnector {
    /// Creates a connector with the given configuration.
    #[must_use]
    pub fn new(config: MqttBusConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &MqttBusConfig {
        &self.config
    }
}

impl BusConnector for MqttBusConnector {
    type Handle = MqttBusHandle;

    async fn connect(&self, address: &str) -> Result<MqttBusHandle, ProtocolError> {
        let (host, port) = parse_broker_url(address)?;

        let counter = BUS_CLIENT_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        let client_id = format!(
            "{}_{}_{}",
            self.config.client_prefix,
            std::process::id(),
            counter
        );

        let mut mqtt_options = MqttOptions::new(&client_id, &host, port);
        mqtt_options.set_keep_alive(self.config.keep_alive);
        mqtt_options.set_clean_session(true);

        if let Some((ref username, ref password)) = self.config.credentials {
            mqtt_options.set_credentials(username, password);
        }

        let (client, event_loop) = AsyncClient::new(mqtt_options, 10);
        let alive = Arc::new(watch::Sender::new(false));

        let (connack_tx, connack_rx) = oneshot::channel();
        let event_task = tokio::spawn(handle_bus_events(
            event_loop,
            Arc::clone(&alive),
            connack_tx,
        ));

        let timeout = self.config.connection_timeout;
        match tokio::time::timeout(timeout, connack_rx).await {
            Ok(Ok(())) => {
                tracing::info!(host = %host, port, client_id = %client_id, "Connected to MQTT bus");
                Ok(MqttBusHandle {
                    client,
                    address: address.to_string(),
                    alive,
                    event_task,
                })
            }
            Ok(Err(_)) => {
                event_task.abort();
                Err(ProtocolError::ConnectionFailed(format!(
                    "MQTT event loop for {address} terminated before CONNACK"
                )))
            }
            Err(_) => {
                event_task.abort();
                tracing::warn!(address = %address, "No CONNACK from MQTT bus before timeout");
                Err(ProtocolError::Timeout(
                    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                ))
            }
        }
    }
}

/// A live MQTT session.
///
/// Dropping the handle stops its event loop, which closes the session.
pub struct MqttBusHandle {
    client: AsyncClient,
    address: String,
    alive: Arc<watch::Sender<bool>>,
    event_task: JoinHandle<()>,
}

impl MqttBusHandle {
    /// Returns the broker address this session was opened against.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }
}

impl BusHandle for MqttBusHandle {
    fn is_alive(&self) -> bool {
        *self.alive.borrow()
    }

    async fn closed(&self) {
        let mut rx = self.alive.subscribe();
        // An error means the sender is gone, which is also closed.
        let _ = rx.wait_for(|alive| !*alive).await;
    }

    fn close(&self) {
        self.event_task.abort();
        self.alive.send_replace(false);
    }

    async fn publish(&self, topic: &str, json: &str) -> Result<(), ProtocolError> {
        if !self.is_alive() {
            return Err(ProtocolError::ConnectionFailed(format!(
                "MQTT session to {} is closed",
                self.address
            )));
        }

        self.client
            .publish(topic, QoS::AtLeastOnce, false, json.as_bytes().to_vec())
            .await
            .map_err(ProtocolError::Mqtt)
    }
}

impl Drop for MqttBusHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for MqttBusHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttBusHandle")
            .field("address", &self.address)
            .field("alive", &self.is_alive())
            .finish_non_exhaustive()
    }
}

/// Drives the MQTT event loop until the session fails.
async fn handle_bus_events(
    mut event_loop: EventLoop,
    alive: Arc<watch::Sender<bool>>,
    connack_tx: oneshot::Sender<()>,
) {
    use rumqttc::{Event, Packet};

    let mut connack_tx = Some(connack_tx);

    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                tracing::debug!(?connack, "MQTT bus connected");
                alive.send_replace(true);
                if let Some(tx) = connack_tx.take() {
                    let _ = tx.send(());
                }
            }
            Ok(Event::Incoming(Packet::PubAck(puback))) => {
                tracing::trace!(?puback, "MQTT publish acknowledged");
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                tracing::info!("MQTT bus disconnected");
                alive.send_replace(false);
                break;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(error = %e, "MQTT bus event loop error");
                alive.send_replace(false);
                break;
            }
        }
    }
}

/// Parses a broker address into host and port.
///
/// Accepts `mqtt://`, `tcp://` or no scheme; the port defaults to 1883.
fn parse_broker_url(url: &str) -> Result<(String, u16), ProtocolError> {
    let url = url
        .strip_prefix("mqtt://")
        .or_else(|| url.strip_prefix("tcp://"))
        .unwrap_or(url);

    let (host, port) = if let Some((h, p)) = url.rsplit_once(':') {
        let port = p
            .parse()
            .map_err(|_| ProtocolError::InvalidAddress(format!("Invalid port: {p}")))?;
        (h.to_string(), port)
    } else {
        (url.to_string(), 1883)
    };

    if host.is_empty() {
        return Err(ProtocolError::InvalidAddress(
            "bus server host is required".to_string(),
        ));
    }

    Ok((host, port))
}
