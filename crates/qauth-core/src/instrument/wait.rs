//! Bounded polling with exponential backoff and cooperative cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::error::Result;

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Shortest sleep between polls, whatever the configured schedule says.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Poll interval schedule: starts at `initial`, multiplies by `factor`,
/// never exceeds `max` and never drops below [`MIN_POLL_INTERVAL`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
    pub factor: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(1),
            factor: 2,
        }
    }
}

impl Backoff {
    fn first(&self) -> Duration {
        self.initial.max(MIN_POLL_INTERVAL)
    }

    fn next(&self, current: Duration) -> Duration {
        current
            .saturating_mul(self.factor.max(1))
            .min(self.max)
            .max(MIN_POLL_INTERVAL)
    }
}

/// How a [`poll_until`] call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The condition held.
    Ready,
    /// The deadline passed first.
    TimedOut,
    /// The cancel token fired first.
    Cancelled,
}

/// Poll `ready` until it returns `true`, the deadline passes, or `cancel`
/// fires. The condition is always checked at least once, and once more at
/// the deadline. Errors from `ready` are propagated immediately.
pub fn poll_until<F>(
    deadline: Instant,
    backoff: Backoff,
    cancel: &CancelToken,
    mut ready: F,
) -> Result<WaitOutcome>
where
    F: FnMut() -> Result<bool>,
{
    let mut delay = backoff.first();
    loop {
        if cancel.is_cancelled() {
            return Ok(WaitOutcome::Cancelled);
        }
        if ready()? {
            return Ok(WaitOutcome::Ready);
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(WaitOutcome::TimedOut);
        }
        let sleep = delay.min(deadline - now);
        log::debug!("condition not met, polling again in {sleep:?}");
        std::thread::sleep(sleep);
        delay = backoff.next(delay);
    }
}
