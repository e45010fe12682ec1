// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The watched (train id, step) pair.
//!
//! [`TriggerState`] holds the single pair that marks an update as "the
//! accident". It is read on every status update and rewritten by the reset
//! endpoint, so both fields live behind one lock and are always replaced
//! together.

use parking_lot::RwLock;

/// Train id watched by default.
pub const DEFAULT_WATCHED_ID: &str = "2";

/// Step watched by default.
pub const DEFAULT_WATCHED_STEP: &str = "37";

/// An `(id, step)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerPair {
    /// Train (entity) identifier.
    pub id: String,
    /// Position step of the train.
    pub step: String,
}

impl TriggerPair {
    /// Creates a new pair.
    #[must_use]
    pub fn new(id: impl Into<String>, step: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            step: step.into(),
        }
    }
}

impl Default for TriggerPair {
    fn default() -> Self {
        Self::new(DEFAULT_WATCHED_ID, DEFAULT_WATCHED_STEP)
    }
}

/// Runtime-settable trigger configuration.
///
/// Readers never see a pair mixing an old id with a new step: [`set`](Self::set)
/// swaps the whole pair under the write lock.
///
/// # Examples
///
/// ```
/// use traffic_accident::TriggerState;
///
/// let trigger = TriggerState::default();
/// assert!(trigger.matches("2", "37"));
///
/// trigger.set("5", "12");
/// assert!(trigger.matches("5", "12"));
/// assert!(!trigger.matches("2", "37"));
/// ```
#[derive(Debug, Default)]
pub struct TriggerState {
    pair: RwLock<TriggerPair>,
}

impl TriggerState {
    /// Creates a trigger watching the given pair.
    #[must_use]
    pub fn new(pair: TriggerPair) -> Self {
        Self {
            pair: RwLock::new(pair),
        }
    }

    /// Replaces the watched pair.
    ///
    /// No validation is applied; an empty id or step is stored as is.
    pub fn set(&self, id: impl Into<String>, step: impl Into<String>) {
        let pair = TriggerPair::new(id, step);
        tracing::info!(id = %pair.id, step = %pair.step, "Trigger reset");
        *self.pair.write() = pair;
    }

    /// Returns true if both `id` and `step` equal the watched pair exactly.
    #[must_use]
    pub fn matches(&self, id: &str, step: &str) -> bool {
        let pair = self.pair.read();
        pair.id == id && pair.step == step
    }

    /// Returns a copy of the watched pair.
    #[must_use]
    pub fn snapshot(&self) -> TriggerPair {
        self.pair.read().clone()
    }
}
