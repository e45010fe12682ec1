// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Node registration with the discovery service.
//!
//! A node announces its role and the channel types it serves; the discovery
//! service answers with a node id and the address of the bus server the node
//! should connect to.
//!
//! - Register: `POST /api/v0/nodes` with `{"name", "channel_types"}`
//! - Unregister: `DELETE /api/v0/nodes/<node_id>`
//!
//! This JSON-over-HTTP contract belongs to this crate. It is not wire
//! compatible with the Synerex node server's own registration protocol; a
//! deployment needs a discovery service, or a gateway in front of one, that
//! speaks these two endpoints.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{Error, ProtocolError};
use crate::protocol::ChannelType;

/// Result of a successful registration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NodeRegistration {
    /// Id assigned to this node.
    pub node_id: i32,
    /// Address of the bus server assigned to this node.
    pub server_address: String,
}

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    name: &'a str,
    channel_types: Vec<u32>,
}

/// HTTP client for the discovery service.
///
/// # Examples
///
/// ```no_run
/// use traffic_accident::protocol::{ChannelType, NodeRegistry};
///
/// # async fn example() -> traffic_accident::Result<()> {
/// let registry = NodeRegistry::new("127.0.0.1:9990")?;
/// let registration = registry
///     .register("TrafficAccident", &[ChannelType::JsonData])
///     .await?;
/// println!("bus server at {}", registration.server_address);
///
/// registry.unregister(&registration).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct NodeRegistry {
    base_url: String,
    client: Client,
}

impl NodeRegistry {
    /// Default request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a registry client for the discovery service at `address`.
    ///
    /// `address` may be `host:port` or a full `http://` / `https://` URL.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn new(address: impl Into<String>) -> Result<Self, ProtocolError> {
        Self::with_timeout(address, Self::DEFAULT_TIMEOUT)
    }

    /// Creates a registry client with a custom request timeout.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn with_timeout(address: impl Into<String>, timeout: Duration) -> Result<Self, ProtocolError> {
        let address = address.into();
        let base_url = if address.starts_with("http://") || address.starts_with("https://") {
            address.trim_end_matches('/').to_string()
        } else {
            format!("http://{}", address.trim_end_matches('/'))
        };

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ProtocolError::Http)?;

        Ok(Self { base_url, client })
    }

    /// Returns the base URL of the discovery service.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Registers this node under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the service is unreachable or answers
    /// with an unreadable body, and [`Error::Registration`] if it refuses the
    /// registration.
    pub async fn register(
        &self,
        name: &str,
        channel_types: &[ChannelType],
    ) -> crate::Result<NodeRegistration> {
        let url = format!("{}/api/v0/nodes", self.base_url);
        let request = RegisterRequest {
            name,
            channel_types: channel_types.iter().map(|c| c.id()).collect(),
        };

        tracing::debug!(url = %url, name = %name, "Registering node");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(ProtocolError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Registration(format!(
                "HTTP {} - {}",
                status.as_u16(),
                body.trim()
            )));
        }

        let registration: NodeRegistration =
            response.json().await.map_err(ProtocolError::Http)?;

        if registration.server_address.is_empty() {
            return Err(Error::Registration(
                "discovery service returned an empty server address".to_string(),
            ));
        }

        tracing::info!(
            node_id = registration.node_id,
            server = %registration.server_address,
            "Node registered"
        );

        Ok(registration)
    }

    /// Removes a registration.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the service answers with an
    /// error status.
    pub async fn unregister(&self, registration: &NodeRegistration) -> Result<(), ProtocolError> {
        let url = format!("{}/api/v0/nodes/{}", self.base_url, registration.node_id);

        tracing::debug!(url = %url, "Unregistering node");

        self.client
            .delete(&url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(ProtocolError::Http)?;

        tracing::info!(node_id = registration.node_id, "Node unregistered");
        Ok(())
    }
}
