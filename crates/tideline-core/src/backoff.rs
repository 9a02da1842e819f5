//! Reconnect delay policy for the live stream.
//!
//! Delays grow exponentially from `initial` by `multiplier` per consecutive
//! failure, capped at `max`, with up to `jitter` of random spread added so
//! many widgets pointed at one failing server do not retry in lockstep.
//! After `max_attempts` consecutive failures the policy reports exhaustion
//! and the coordinator opens its circuit.

use std::time::Duration;

use rand::Rng;

use crate::config::ReconnectConfig;

/// Exponential backoff with jitter and an optional attempt budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    initial: Duration,
    max: Duration,
    multiplier: u32,
    jitter: Duration,
    max_attempts: Option<u32>,
}

impl ReconnectPolicy {
    /// Build a policy from explicit parameters.
    ///
    /// A `multiplier` of zero is treated as one.
    pub fn new(
        initial: Duration,
        max: Duration,
        multiplier: u32,
        jitter: Duration,
        max_attempts: Option<u32>,
    ) -> Self {
        Self {
            initial,
            max: max.max(initial),
            multiplier: multiplier.max(1),
            jitter,
            max_attempts,
        }
    }

    /// The attempt budget, if any.
    pub const fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    /// Whether `attempts` consecutive failures exhaust the budget.
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
    }

    /// Delay before reconnect attempt number `attempt` (1-based), without
    /// jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = u64::from(self.multiplier).saturating_pow(attempt.saturating_sub(1));
        let initial_ms = u64::try_from(self.initial.as_millis()).unwrap_or(u64::MAX);
        let max_ms = u64::try_from(self.max.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(initial_ms.saturating_mul(factor).min(max_ms))
    }

    /// Delay before reconnect attempt number `attempt` (1-based), with
    /// jitter drawn from `rng`.
    pub fn delay_for<R: Rng>(&self, attempt: u32, rng: &mut R) -> Duration {
        let base = self.base_delay(attempt);
        let jitter_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        if jitter_ms == 0 {
            return base;
        }
        base.saturating_add(Duration::from_millis(rng.random_range(0..=jitter_ms)))
    }
}

impl From<&ReconnectConfig> for ReconnectPolicy {
    fn from(config: &ReconnectConfig) -> Self {
        Self::new(
            Duration::from_millis(config.initial_delay_ms),
            Duration::from_millis(config.max_delay_ms),
            config.multiplier,
            Duration::from_millis(config.jitter_ms),
            config.max_attempts,
        )
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from(&ReconnectConfig::default())
    }
}
