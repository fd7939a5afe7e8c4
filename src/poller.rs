//! Readiness poller
//!
//! Bounded retry loop waiting for an eventually-consistent external data
//! source to reach a usability threshold. This is a bounded-wait policy,
//! not an indefinite-retry loop: the caller gets an answer within
//! `max_attempts * interval` wall-clock time.
//!
//! A low final count does not say why the data is missing - still loading
//! and genuinely empty look the same here. Callers treat exhaustion as a
//! soft failure (log and move on), never as an error to throw.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Outcome of one bounded poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    /// Count reported by the last probe invocation
    pub count: usize,
    /// Attempts actually used (<= max_attempts)
    pub attempts: u32,
}

impl PollOutcome {
    pub fn is_ready(&self, minimum: usize) -> bool {
        self.count >= minimum
    }
}

/// Repeatedly invoke `probe` until it reports at least `minimum`, or
/// `max_attempts` attempts are exhausted, sleeping `interval` between
/// attempts.
pub async fn poll_until_ready<F, Fut>(
    mut probe: F,
    minimum: usize,
    max_attempts: u32,
    interval: Duration,
) -> PollOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = usize>,
{
    let mut count = 0;
    let mut attempts = 0;

    while attempts < max_attempts {
        attempts += 1;
        count = probe().await;

        if count >= minimum {
            break;
        }

        debug!(
            "Readiness probe attempt {}/{}: {} of {} required",
            attempts, max_attempts, count, minimum
        );

        if attempts < max_attempts {
            sleep(interval).await;
        }
    }

    PollOutcome { count, attempts }
}
