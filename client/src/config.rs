//! Client configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use crate::utils::RoundingPolicy;

/// Default number of requests matched by a single `MatchOrders` instruction.
pub const DEFAULT_MATCH_LIMIT: u16 = 10;

/// Default number of events popped by a single `ConsumeEvents` instruction.
pub const DEFAULT_CONSUME_EVENTS_LIMIT: u16 = 10;

/// A configuration value that cannot be used.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The named limit is zero
    #[error("{0} must be greater than zero")]
    ZeroLimit(&'static str),
}

/// Knobs for [`Market`](crate::market::Market). Every field has a default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Applied when converting native prices and quantities into lots
    pub rounding: RoundingPolicy,
    /// Requests processed per `MatchOrders` instruction
    pub match_limit: u16,
    /// Events popped per `ConsumeEvents` instruction
    pub consume_events_limit: u16,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rounding: RoundingPolicy::default(),
            match_limit: DEFAULT_MATCH_LIMIT,
            consume_events_limit: DEFAULT_CONSUME_EVENTS_LIMIT,
        }
    }
}

impl ClientConfig {
    #[must_use]
    /// Replace the rounding policy.
    pub fn with_rounding(mut self, rounding: RoundingPolicy) -> Self {
        self.rounding = rounding;
        self
    }

    #[must_use]
    /// Replace the match limit.
    pub fn with_match_limit(mut self, limit: u16) -> Self {
        self.match_limit = limit;
        self
    }

    #[must_use]
    /// Replace the consume events limit.
    pub fn with_consume_events_limit(mut self, limit: u16) -> Self {
        self.consume_events_limit = limit;
        self
    }

    /// Both limits must be non-zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.match_limit == 0 {
            return Err(ConfigError::ZeroLimit("match_limit"));
        }
        if self.consume_events_limit == 0 {
            return Err(ConfigError::ZeroLimit("consume_events_limit"));
        }
        Ok(())
    }
}
