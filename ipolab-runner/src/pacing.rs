//! Pacing between upstream calls.
//!
//! The harvest owns a [`Pacer`] and calls [`Pacer::pace`] right before each
//! fetch. Pacing is cooperative rate-limit courtesy; fetches are sequential
//! regardless of the policy.

use std::time::{Duration, Instant};

/// Default spacing between successive upstream calls.
pub const DEFAULT_MIN_DELAY: Duration = Duration::from_millis(100);

/// Policy invoked before every upstream call.
pub trait Pacer {
    /// Block until the next call may start.
    fn pace(&mut self);
}

/// Enforces a minimum spacing between the starts of successive calls.
///
/// The first call never waits. Later calls sleep only for whatever part of
/// `min_delay` has not already elapsed since the previous call started.
#[derive(Debug, Clone)]
pub struct FixedDelay {
    min_delay: Duration,
    last_call: Option<Instant>,
}

impl FixedDelay {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            last_call: None,
        }
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }
}

impl Default for FixedDelay {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_DELAY)
    }
}

impl Pacer for FixedDelay {
    fn pace(&mut self) {
        if let Some(last) = self.last_call {
            let remaining = self.min_delay.saturating_sub(last.elapsed());
            if !remaining.is_zero() {
                std::thread::sleep(remaining);
            }
        }
        self.last_call = Some(Instant::now());
    }
}

/// No pacing at all. Meant for tests and local providers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

impl Pacer for NoDelay {
    fn pace(&mut self) {}
}
