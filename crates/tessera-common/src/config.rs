//! Configuration types for the Tessera control plane
//!
//! This module defines the configuration consumed by the leader-side
//! controllers and the client-side poller.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for a Tessera master (cluster leader)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MasterConfig {
    /// Leader state configuration
    pub master: LeaderConfig,
    /// Distributed coordination retry policy
    pub coordination: CoordinationConfig,
    /// Client-side polling defaults
    pub client: ClientConfig,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            master: LeaderConfig::default(),
            coordination: CoordinationConfig::default(),
            client: ClientConfig::default(),
        }
    }
}

/// Leader identity and durable-state configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LeaderConfig {
    /// Node name (human-readable identifier)
    pub name: String,
    /// Directory holding the sys catalog database
    pub data_dir: PathBuf,
}

impl Default for LeaderConfig {
    fn default() -> Self {
        Self {
            name: "tessera-master".to_string(),
            data_dir: PathBuf::from("/var/lib/tessera"),
        }
    }
}

/// Retry bounds for shard-level coordination calls.
///
/// Exhausting the retries marks the owning entry FAILED; it never crashes
/// the leader.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CoordinationConfig {
    /// Maximum attempts per tablet-level call
    pub max_attempts: u32,
    /// Delay between attempts, in milliseconds
    pub retry_backoff_ms: u64,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_backoff_ms: 200,
        }
    }
}

impl CoordinationConfig {
    /// Backoff between attempts as a `Duration`
    #[must_use]
    pub const fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Defaults for client-side completion polling
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Delay between status polls, in milliseconds
    pub poll_interval_ms: u64,
    /// Overall polling deadline, in milliseconds; hitting it is
    /// inconclusive, not a failure of the server-side operation
    pub poll_deadline_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            poll_deadline_ms: 30_000,
        }
    }
}

impl ClientConfig {
    /// Poll interval as a `Duration`
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Poll deadline as a `Duration`
    #[must_use]
    pub const fn poll_deadline(&self) -> Duration {
        Duration::from_millis(self.poll_deadline_ms)
    }
}
