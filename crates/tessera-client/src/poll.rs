//! Generic retry-with-deadline polling loop.
//!
//! Server-side operations are not cancellable; a caller that stops
//! polling simply stops observing. The loop therefore has no cancel
//! path, only a deadline.

use std::future::Future;
use std::time::Duration;
use tessera_common::config::ClientConfig;
use tessera_common::{Error, Result};
use tracing::debug;

/// Poll interval and overall deadline for a wait loop
#[derive(Clone, Copy, Debug)]
pub struct PollOptions {
    pub interval: Duration,
    pub deadline: Duration,
}

impl PollOptions {
    /// Build from the client configuration
    #[must_use]
    pub const fn from_config(config: &ClientConfig) -> Self {
        Self {
            interval: config.poll_interval(),
            deadline: config.poll_deadline(),
        }
    }
}

impl Default for PollOptions {
    fn default() -> Self {
        Self::from_config(&ClientConfig::default())
    }
}

/// Poll `check` until it returns true, fails, or the deadline passes.
///
/// A check error aborts immediately; deadline exhaustion surfaces as a
/// `Timeout` naming `description`.
pub async fn wait_for<F, Fut>(options: &PollOptions, description: &str, mut check: F) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let start = tokio::time::Instant::now();
    loop {
        if check().await? {
            return Ok(());
        }
        if start.elapsed() >= options.deadline {
            return Err(Error::Timeout(format!(
                "timed out waiting for {description}"
            )));
        }
        debug!("Still waiting for {}", description);
        tokio::time::sleep(options.interval).await;
    }
}
