// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Payloads published to the bus.
//!
//! Every status update produces exactly one [`Payload`]. Its wire form is a
//! single-key JSON object named after the node role:
//!
//! ```text
//! { "TrafficAccident": null }
//! { "TrafficAccident": { "time": "18:00", "station": "...", "type": "..." } }
//! ```

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Default node role, also used as the published message name.
pub const DEFAULT_ROLE: &str = "TrafficAccident";

/// Descriptive fields of an incident.
///
/// These are deployment constants; nothing here is derived from the update
/// that triggered the incident.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct IncidentDetails {
    /// Time label of the incident.
    pub time: String,
    /// Location label.
    pub station: String,
    /// Kind of incident.
    #[serde(rename = "type")]
    pub kind: String,
}

impl IncidentDetails {
    /// Creates incident details from the three labels.
    #[must_use]
    pub fn new(
        time: impl Into<String>,
        station: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            time: time.into(),
            station: station.into(),
            kind: kind.into(),
        }
    }
}

impl Default for IncidentDetails {
    fn default() -> Self {
        Self::new("18:00", "犬山線布袋駅", "人身事故")
    }
}

/// What gets published for one status update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// No incident at this update.
    Empty,
    /// The watched train reached the watched step.
    Incident(IncidentDetails),
}

impl Payload {
    /// Returns true for [`Payload::Incident`].
    #[must_use]
    pub fn is_incident(&self) -> bool {
        matches!(self, Self::Incident(_))
    }

    /// Encodes the payload as a named publish request.
    ///
    /// # Errors
    ///
    /// Returns error if JSON encoding fails.
    pub fn to_request(&self, name: &str) -> Result<PublishRequest, serde_json::Error> {
        let body = match self {
            Self::Empty => None,
            Self::Incident(details) => Some(details),
        };
        let json = serde_json::to_string(&Envelope { name, body })?;
        Ok(PublishRequest {
            name: name.to_string(),
            json,
        })
    }
}

/// A named JSON document ready to be handed to the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    /// Message name (the node role).
    pub name: String,
    /// Encoded JSON body.
    pub json: String,
}

/// `{ <name>: <body or null> }`, keeping the field order of the body.
struct Envelope<'a> {
    name: &'a str,
    body: Option<&'a IncidentDetails>,
}

impl Serialize for Envelope<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.name, &self.body)?;
        map.end()
    }
}
