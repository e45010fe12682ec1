// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the notifier node.
//!
//! Failures inside the publish path are reported as [`ProtocolError`] and
//! only ever logged. [`Error`] is what startup code sees: a failed node
//! registration or an unreachable bus is fatal there.

use thiserror::Error;

/// The main error type for this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Error occurred while talking to the bus or the discovery service.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The discovery service refused or could not process the registration.
    #[error("registration failed: {0}")]
    Registration(String),

    /// Startup configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The HTTP listener could not be started or failed while serving.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

/// Errors related to bus and registry communication.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// HTTP request to the discovery service failed.
    #[cfg(feature = "registry")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// MQTT client rejected the request.
    #[cfg(feature = "mqtt")]
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// Connection to the bus server failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Request timed out.
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    /// Invalid URL or address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// No live bus handle is installed.
    #[error("not connected to the bus")]
    NotConnected,

    /// A payload could not be encoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
