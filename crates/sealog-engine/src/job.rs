//! Periodic time-stamping job with failure backoff.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::manager::LogManager;

/// Shortest allowed cadence between rounds.
const MIN_INTERVAL: Duration = Duration::from_secs(60);
/// Longest allowed cadence between rounds.
const MAX_INTERVAL: Duration = Duration::from_secs(86_400);

/// Drives [`LogManager::timestamp_pending`] on a fixed cadence.
///
/// After a failed round the job switches to the shorter retry delay until a
/// round succeeds again; a round that fills its batch is followed by an
/// immediate one so a large backlog drains without waiting out the cadence.
pub struct TimestamperJob {
    manager: Arc<LogManager>,
    interval: Duration,
    retry_delay: Duration,
}

impl TimestamperJob {
    /// The configured interval is clamped to [1 minute, 24 hours]; the
    /// retry delay may be shorter but never zero.
    pub fn new(manager: Arc<LogManager>, interval: Duration, retry_delay: Duration) -> Self {
        Self {
            manager,
            interval: interval.clamp(MIN_INTERVAL, MAX_INTERVAL),
            retry_delay: retry_delay.max(Duration::from_secs(1)),
        }
    }

    /// Effective cadence after clamping.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run until `shutdown` flips to true.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        debug!(interval = ?self.interval, "time-stamping job started");
        let mut delay = self.interval;
        loop {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.wait_for(|stop| *stop) => {
                    debug!("time-stamping job stopped");
                    return;
                }
            }

            delay = match self.manager.timestamp_pending().await {
                // A full round means more is waiting; follow up immediately.
                Ok(count) if count == self.manager.round_limit() => Duration::ZERO,
                Ok(_) => self.interval,
                Err(e) => {
                    warn!(error = %e, retry_in = ?self.retry_delay, "time-stamping round failed");
                    self.retry_delay
                }
            };
        }
    }
}
