// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Delay applied before each reconnection attempt.

use std::time::Duration;

/// Configuration for the delay before a reconnection attempt.
///
/// Retries are never bounded; the delay is what keeps an unreachable server
/// from being hammered.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use traffic_accident::ReconnectionPolicy;
///
/// // Default policy: fixed 5 second delay
/// let policy = ReconnectionPolicy::default();
/// assert_eq!(policy.delay_for_attempt(7), Duration::from_secs(5));
///
/// // Exponential backoff, capped
/// let policy = ReconnectionPolicy::exponential(Duration::from_secs(1), Duration::from_secs(30));
/// assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(4));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectionPolicy {
    /// Delay before the first attempt after a failure.
    pub initial_delay: Duration,
    /// Upper bound on the delay.
    pub max_delay: Duration,
    /// Multiplier applied per consecutive failed attempt.
    pub backoff_multiplier: f32,
}

impl ReconnectionPolicy {
    /// Default delay between reconnection attempts.
    pub const DEFAULT_DELAY: Duration = Duration::from_secs(5);

    /// Creates a policy that always waits `delay`.
    #[must_use]
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            max_delay: delay,
            backoff_multiplier: 1.0,
        }
    }

    /// Creates a doubling backoff starting at `initial` and capped at `max`.
    #[must_use]
    pub fn exponential(initial: Duration, max: Duration) -> Self {
        Self {
            initial_delay: initial,
            max_delay: max.max(initial),
            backoff_multiplier: 2.0,
        }
    }

    /// Sets the backoff multiplier.
    #[must_use]
    pub fn with_backoff_multiplier(mut self, multiplier: f32) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Calculates the delay given the number of consecutive failed attempts.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return self.initial_delay;
        }

        let multiplier = self
            .backoff_multiplier
            .powi(i32::try_from(attempt).unwrap_or(i32::MAX));

        // Safe: delays are seconds or minutes, far from f32 precision limits
        #[allow(clippy::cast_precision_loss)]
        let delay_ms = self.initial_delay.as_millis() as f32 * multiplier;

        // Safe: delay_ms is non-negative; saturating cast clamps infinity
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let delay = Duration::from_millis(delay_ms as u64);

        delay.min(self.max_delay)
    }
}

impl Default for ReconnectionPolicy {
    fn default() -> Self {
        Self::fixed(Self::DEFAULT_DELAY)
    }
}
