// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Startup configuration.
//!
//! Every setting is a command-line flag; the addresses can also come from
//! the environment.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

use crate::connection::ReconnectionPolicy;
use crate::error::Error;
use crate::incident::{DEFAULT_ROLE, IncidentDetails};
use crate::trigger::{DEFAULT_WATCHED_ID, DEFAULT_WATCHED_STEP, TriggerPair};

/// Command-line configuration of the notifier node.
#[derive(Debug, Clone, Parser)]
#[command(name = "traffic-accident", version)]
#[command(about = "Publishes a traffic accident event when a watched train reaches a watched step")]
pub struct Config {
    /// Address of the node discovery service
    #[arg(long, env = "NODESRV", default_value = "127.0.0.1:9990")]
    pub nodesrv: String,

    /// Bus server address to use instead of the one assigned at registration
    #[arg(long, env = "LOCAL_SERVER")]
    pub local: Option<String>,

    /// Port of the HTTP control surface
    #[arg(long, env = "HTTP_PORT", default_value_t = 8030)]
    pub port: u16,

    /// Node role, also the name of published messages
    #[arg(long, default_value = DEFAULT_ROLE)]
    pub role: String,

    /// Seconds to wait before each reconnection attempt
    #[arg(long, default_value_t = 5)]
    pub reconnect_delay_secs: u64,

    /// Upper bound in seconds for exponential reconnection backoff
    /// (fixed delay when not set)
    #[arg(long)]
    pub reconnect_max_delay_secs: Option<u64>,

    /// Seconds to wait for the bus server to accept a connection
    #[arg(long, default_value_t = 10)]
    pub connect_timeout_secs: u64,

    /// Train id watched at startup
    #[arg(long, default_value = DEFAULT_WATCHED_ID)]
    pub watch_id: String,

    /// Step watched at startup
    #[arg(long, default_value = DEFAULT_WATCHED_STEP)]
    pub watch_step: String,

    /// Time label of the published incident
    #[arg(long, default_value = "18:00")]
    pub incident_time: String,

    /// Station label of the published incident
    #[arg(long, default_value = "犬山線布袋駅")]
    pub incident_station: String,

    /// Kind label of the published incident
    #[arg(long, default_value = "人身事故")]
    pub incident_type: String,
}

impl Config {
    /// Checks values clap cannot check on its own.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an empty role or discovery address, or a
    /// zero connection timeout.
    pub fn validate(&self) -> Result<(), Error> {
        if self.role.trim().is_empty() {
            return Err(Error::Config("role must not be empty".to_string()));
        }
        if self.nodesrv.trim().is_empty() {
            return Err(Error::Config("nodesrv must not be empty".to_string()));
        }
        if self.connect_timeout_secs == 0 {
            return Err(Error::Config(
                "connect timeout must be at least one second".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the address the HTTP listener binds to.
    #[must_use]
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }

    /// Returns the reconnection policy.
    #[must_use]
    pub fn reconnection_policy(&self) -> ReconnectionPolicy {
        let delay = Duration::from_secs(self.reconnect_delay_secs);
        match self.reconnect_max_delay_secs {
            Some(max) => ReconnectionPolicy::exponential(delay, Duration::from_secs(max)),
            None => ReconnectionPolicy::fixed(delay),
        }
    }

    /// Returns the bus connection timeout.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Returns the pair watched at startup.
    #[must_use]
    pub fn initial_trigger(&self) -> TriggerPair {
        TriggerPair::new(&self.watch_id, &self.watch_step)
    }

    /// Returns the published incident details.
    #[must_use]
    pub fn incident(&self) -> IncidentDetails {
        IncidentDetails::new(
            &self.incident_time,
            &self.incident_station,
            &self.incident_type,
        )
    }

    /// Picks the bus server address: the `--local` override when given,
    /// otherwise the registered one.
    #[must_use]
    pub fn server_address(&self, registered: &str) -> String {
        self.local
            .as_deref()
            .filter(|local| !local.is_empty())
            .unwrap_or(registered)
            .to_string()
    }
}
