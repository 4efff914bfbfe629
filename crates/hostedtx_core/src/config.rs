//! Coordinator configuration.

use crate::error::{HostedTxError, HostedTxResult};
use std::time::Duration;

/// Configuration for a [`TxCoordinator`](crate::TxCoordinator).
#[derive(Debug, Clone)]
pub struct Config {
    /// Number of registry shards, rounded up to a power of two of at
    /// least two.
    ///
    /// Each shard lock also serializes finalization against the lock
    /// protocol for the ids that hash onto it.
    pub registry_shards: usize,

    /// Maximum number of finalized outcomes retained for client failover.
    pub outcome_cache_capacity: usize,

    /// How long a finalized outcome stays queryable (`None` = until evicted).
    pub outcome_retention: Option<Duration>,

    /// Upper bound on attempts made by `masquerade_as` when the entry keeps
    /// being replaced.
    pub max_masquerade_attempts: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registry_shards: 16,
            outcome_cache_capacity: 1000,
            outcome_retention: Some(Duration::from_secs(10 * 60)),
            max_masquerade_attempts: 64,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of registry shards.
    #[must_use]
    pub const fn registry_shards(mut self, shards: usize) -> Self {
        self.registry_shards = shards;
        self
    }

    /// Sets the outcome cache capacity.
    #[must_use]
    pub const fn outcome_cache_capacity(mut self, capacity: usize) -> Self {
        self.outcome_cache_capacity = capacity;
        self
    }

    /// Sets how long finalized outcomes are retained.
    #[must_use]
    pub const fn outcome_retention(mut self, retention: Option<Duration>) -> Self {
        self.outcome_retention = retention;
        self
    }

    /// Sets the attempt bound for `masquerade_as`.
    #[must_use]
    pub const fn max_masquerade_attempts(mut self, attempts: usize) -> Self {
        self.max_masquerade_attempts = attempts;
        self
    }

    /// Checks that every setting is usable.
    pub fn validate(&self) -> HostedTxResult<()> {
        if self.registry_shards == 0 {
            return Err(HostedTxError::invalid_config(
                "registry_shards must be at least 1",
            ));
        }
        if self.outcome_cache_capacity == 0 {
            return Err(HostedTxError::invalid_config(
                "outcome_cache_capacity must be at least 1",
            ));
        }
        if self.outcome_retention == Some(Duration::ZERO) {
            return Err(HostedTxError::invalid_config(
                "outcome_retention must be non-zero; use None to disable expiry",
            ));
        }
        if self.max_masquerade_attempts == 0 {
            return Err(HostedTxError::invalid_config(
                "max_masquerade_attempts must be at least 1",
            ));
        }
        Ok(())
    }
}
