// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Trigger evaluation and publishing for train status updates.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::incident::{IncidentDetails, Payload};
use crate::protocol::Notifier;
use crate::trigger::TriggerState;

/// One reported train position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StatusUpdate {
    /// Train identifier.
    #[serde(default)]
    pub id: String,
    /// Current step of the train.
    #[serde(default)]
    pub step: String,
}

impl StatusUpdate {
    /// Creates an update.
    #[must_use]
    pub fn new(id: impl Into<String>, step: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            step: step.into(),
        }
    }
}

/// Reply to a status update or a reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainStatus {
    /// Train identifier, echoed from the request.
    pub id: String,
    /// Step, echoed from the request.
    pub step: String,
    /// Whether the update matched the watched pair.
    pub acc_flg: bool,
}

/// Evaluates updates against the trigger and publishes one payload per update.
///
/// The returned [`TrainStatus`] only reflects the trigger decision; a failed
/// publish is logged and otherwise ignored.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use traffic_accident::processor::{StatusUpdate, UpdateProcessor};
/// use traffic_accident::{IncidentDetails, TriggerState};
/// # use traffic_accident::protocol::Notifier;
///
/// # async fn example(notifier: impl Notifier) {
/// let trigger = Arc::new(TriggerState::default());
/// let processor = UpdateProcessor::new(trigger, notifier, IncidentDetails::default());
///
/// let status = processor.process(&StatusUpdate::new("2", "37")).await;
/// assert!(status.acc_flg);
/// # }
/// ```
#[derive(Debug)]
pub struct UpdateProcessor<N> {
    trigger: Arc<TriggerState>,
    notifier: N,
    incident: IncidentDetails,
}

impl<N: Notifier> UpdateProcessor<N> {
    /// Creates a processor publishing `incident` when the trigger matches.
    #[must_use]
    pub fn new(trigger: Arc<TriggerState>, notifier: N, incident: IncidentDetails) -> Self {
        Self {
            trigger,
            notifier,
            incident,
        }
    }

    /// Returns the trigger state.
    #[must_use]
    pub fn trigger(&self) -> &Arc<TriggerState> {
        &self.trigger
    }

    /// Returns the notifier.
    #[must_use]
    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Builds the payload for an update and reports whether it matched.
    #[must_use]
    pub fn evaluate(&self, update: &StatusUpdate) -> (bool, Payload) {
        if self.trigger.matches(&update.id, &update.step) {
            (true, Payload::Incident(self.incident.clone()))
        } else {
            (false, Payload::Empty)
        }
    }

    /// Handles one status update: evaluate, publish once, answer.
    pub async fn process(&self, update: &StatusUpdate) -> TrainStatus {
        tracing::debug!(id = %update.id, step = %update.step, "Train status received");

        let (matched, payload) = self.evaluate(update);
        if matched {
            let detected_at = chrono::Local::now().format("%H:%M:%S");
            tracing::info!(
                id = %update.id,
                step = %update.step,
                detected_at = %detected_at,
                "Accident detected"
            );
        }

        if let Err(e) = self.notifier.notify(&payload).await {
            tracing::warn!(error = %e, incident = matched, "Send failed");
        }

        TrainStatus {
            id: update.id.clone(),
            step: update.step.clone(),
            acc_flg: matched,
        }
    }

    /// Replaces the watched pair.
    ///
    /// The returned status always has `acc_flg` set to false; no update is
    /// evaluated.
    pub fn reset(&self, id: &str, step: &str) -> TrainStatus {
        self.trigger.set(id, step);
        TrainStatus {
            id: id.to_string(),
            step: step.to_string(),
            acc_flg: false,
        }
    }
}
