//! Token-bucket admission control for provider calls.
//!
//! The bucket starts full with `burst` tokens and gains one token per elapsed
//! `refill_interval`, never exceeding `burst`. Waiters queue on a FIFO async
//! mutex so permits are issued in arrival order; only the head of the queue
//! sleeps on the refill clock.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::domain::ports::{AdmissionControl, AdmissionError};

/// Default bucket capacity.
pub const DEFAULT_BURST: u32 = 10;
/// Default time to earn one token.
pub const DEFAULT_REFILL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug)]
struct BucketState {
    tokens: u32,
    burst: u32,
    refill_interval: Duration,
    last_refill: Instant,
}

impl BucketState {
    fn refill(&mut self, now: Instant) {
        if self.tokens >= self.burst {
            self.tokens = self.burst;
            self.last_refill = now;
            return;
        }
        if self.refill_interval.is_zero() {
            self.tokens = self.burst;
            self.last_refill = now;
            return;
        }

        let elapsed = now.saturating_duration_since(self.last_refill);
        let earned = elapsed.as_nanos() / self.refill_interval.as_nanos();
        if earned == 0 {
            return;
        }

        let earned = u32::try_from(earned).unwrap_or(u32::MAX);
        self.tokens = self.tokens.saturating_add(earned).min(self.burst);
        if self.tokens == self.burst {
            self.last_refill = now;
        } else {
            self.last_refill += self.refill_interval * earned;
        }
    }

    /// Take a token, or report how long until the next one is earned.
    fn take(&mut self, now: Instant) -> Result<(), Duration> {
        self.refill(now);
        if self.tokens > 0 {
            self.tokens -= 1;
            return Ok(());
        }
        let next = self.last_refill + self.refill_interval;
        Err(next.saturating_duration_since(now))
    }
}

/// Token bucket implementing [`AdmissionControl`].
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use tidewatch::domain::TokenBucket;
/// use tidewatch::domain::ports::AdmissionControl;
///
/// let bucket = TokenBucket::new(2, Duration::from_secs(1));
/// assert!(bucket.try_acquire());
/// assert_eq!(bucket.available_tokens(), 1);
/// ```
#[derive(Debug)]
pub struct TokenBucket {
    state: Mutex<BucketState>,
    queue: tokio::sync::Mutex<()>,
}

impl TokenBucket {
    /// Create a full bucket. A zero `burst` is raised to one.
    pub fn new(burst: u32, refill_interval: Duration) -> Self {
        let burst = burst.max(1);
        Self {
            state: Mutex::new(BucketState {
                tokens: burst,
                burst,
                refill_interval,
                last_refill: Instant::now(),
            }),
            queue: tokio::sync::Mutex::new(()),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, BucketState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Change the capacity. Excess tokens are discarded; zero is raised to one.
    pub fn set_burst(&self, burst: u32) {
        let mut state = self.lock_state();
        state.refill(Instant::now());
        state.burst = burst.max(1);
        state.tokens = state.tokens.min(state.burst);
        debug!(burst = state.burst, "token bucket burst updated");
    }

    /// Change the time needed to earn one token.
    pub fn set_refill_interval(&self, refill_interval: Duration) {
        let mut state = self.lock_state();
        state.refill(Instant::now());
        state.refill_interval = refill_interval;
        debug!(
            refill_ms = refill_interval.as_millis() as u64,
            "token bucket refill interval updated"
        );
    }

    /// Current capacity.
    pub fn burst(&self) -> u32 {
        self.lock_state().burst
    }

    /// Current refill interval.
    pub fn refill_interval(&self) -> Duration {
        self.lock_state().refill_interval
    }
}

impl Default for TokenBucket {
    fn default() -> Self {
        Self::new(DEFAULT_BURST, DEFAULT_REFILL_INTERVAL)
    }
}

#[async_trait]
impl AdmissionControl for TokenBucket {
    async fn wait(&self, cancel: &CancellationToken) -> Result<(), AdmissionError> {
        let _turn = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(AdmissionError::Cancelled),
            turn = self.queue.lock() => turn,
        };

        loop {
            let outcome = self.lock_state().take(Instant::now());
            let delay = match outcome {
                Ok(()) => {
                    debug!("admission granted");
                    return Ok(());
                }
                Err(delay) => delay,
            };

            debug!(wait_ms = delay.as_millis() as u64, "waiting for admission token");
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!("admission wait cancelled");
                    return Err(AdmissionError::Cancelled);
                }
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    fn try_acquire(&self) -> bool {
        self.lock_state().take(Instant::now()).is_ok()
    }

    fn available_tokens(&self) -> u32 {
        let mut state = self.lock_state();
        state.refill(Instant::now());
        state.tokens
    }
}
