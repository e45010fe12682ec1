// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Traffic accident notifier node.
//!
//! A small pub/sub node: it receives train status updates over HTTP and,
//! for each one, publishes a message to the bus. When the update's
//! `(id, step)` equals the watched pair the message carries an incident,
//! otherwise it is empty.
//!
//! # Components
//!
//! - [`ConnectionManager`]: owns the bus handle and reconnects after failures
//! - [`TriggerState`]: the watched `(id, step)` pair, settable at runtime
//! - [`UpdateProcessor`]: evaluates an update and publishes exactly once
//! - [`protocol::Notifier`]: the publish seam, backed by [`protocol::BusNotifier`]
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use traffic_accident::protocol::{BusNotifier, ChannelType, MqttBusConfig, MqttBusConnector};
//! use traffic_accident::{
//!     ConnectionManager, IncidentDetails, ReconnectionPolicy, TriggerState, UpdateProcessor,
//! };
//!
//! #[tokio::main]
//! async fn main() -> traffic_accident::Result<()> {
//!     let connections = Arc::new(ConnectionManager::new(
//!         MqttBusConnector::new(MqttBusConfig::default()),
//!         "127.0.0.1:1883",
//!         ReconnectionPolicy::default(),
//!     ));
//!     connections.connect().await?;
//!
//!     let notifier = BusNotifier::new(Arc::clone(&connections), ChannelType::JsonData, "TrafficAccident");
//!     let processor = Arc::new(UpdateProcessor::new(
//!         Arc::new(TriggerState::default()),
//!         notifier,
//!         IncidentDetails::default(),
//!     ));
//!
//!     let shutdown = async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     };
//!     traffic_accident::server::serve(([0, 0, 0, 0], 8030).into(), processor, shutdown).await
//! }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod incident;
pub mod processor;
pub mod protocol;
pub mod server;
pub mod trigger;

pub use config::Config;
pub use connection::{ConnectionManager, ReconnectionPolicy};
pub use error::{Error, ProtocolError, Result};
pub use incident::{IncidentDetails, Payload, PublishRequest};
pub use processor::{StatusUpdate, TrainStatus, UpdateProcessor};
pub use trigger::{TriggerPair, TriggerState};
