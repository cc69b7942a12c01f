//! Collaborator seam to the storage shards.
//!
//! The control plane never speaks wire bytes itself; tablet-level
//! coordination goes through this trait. Shard timeouts are retried a
//! bounded number of times before the owning entry is marked FAILED.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tessera_common::config::CoordinationConfig;
use tessera_common::{HybridTime, Result, SnapshotId, TabletId};
use tracing::warn;

/// RPC surface of a tablet server, as seen by the leader.
#[async_trait]
pub trait TabletProxy: Send + Sync {
    /// Capture a consistent cut of the tablet's data under the snapshot id.
    async fn create_tablet_snapshot(&self, tablet: &TabletId, snapshot: &SnapshotId)
    -> Result<()>;

    /// Drop the tablet-local data held for the snapshot.
    async fn delete_tablet_snapshot(&self, tablet: &TabletId, snapshot: &SnapshotId)
    -> Result<()>;

    /// Revert the tablet to the snapshot's content as of `restore_at`:
    /// every mutation committed strictly after `restore_at` is undone.
    async fn restore_tablet_snapshot(
        &self,
        tablet: &TabletId,
        snapshot: &SnapshotId,
        restore_at: HybridTime,
    ) -> Result<()>;
}

/// Bounded retry policy for tablet-level coordination calls.
///
/// Only retryable errors (timeout, unavailable) are re-attempted; anything
/// else surfaces immediately.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Build from the leader's coordination configuration
    #[must_use]
    pub const fn from_config(config: &CoordinationConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            backoff: config.retry_backoff(),
        }
    }

    /// Run `op`, retrying retryable failures up to `max_attempts` times.
    pub async fn run<F, Fut>(&self, what: &str, mut op: F) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    warn!(
                        "Attempt {}/{} of {} failed: {}; retrying",
                        attempt, self.max_attempts, what, e
                    );
                    attempt += 1;
                    tokio::time::sleep(self.backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&CoordinationConfig::default())
    }
}
