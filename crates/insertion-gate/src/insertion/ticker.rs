use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic clock read by the detector.
///
/// Readings are nanoseconds relative to an arbitrary origin and never
/// decrease between calls on the same ticker.
pub trait Ticker: Debug + Send + Sync {
    fn read(&self) -> u64;
}

/// Ticker backed by [`Instant`], counting from the moment it was created.
#[derive(Debug, Clone, Copy)]
pub struct SystemTicker {
    origin: Instant,
}

impl SystemTicker {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemTicker {
    fn default() -> Self {
        Self::new()
    }
}

impl Ticker for SystemTicker {
    fn read(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }
}

/// Hand-driven ticker for deterministic tests and simulations.
///
/// Clones share the same reading, so a test can keep one handle while the
/// detector owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualTicker {
    nanos: Arc<AtomicU64>,
}

impl ManualTicker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        let step = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        let _ = self
            .nanos
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(current.saturating_add(step))
            });
    }

    /// Moves the reading to `at` past the origin. Earlier values are ignored
    /// to keep the ticker monotonic.
    pub fn set(&self, at: Duration) {
        let target = u64::try_from(at.as_nanos()).unwrap_or(u64::MAX);
        self.nanos.fetch_max(target, Ordering::AcqRel);
    }
}

impl Ticker for ManualTicker {
    fn read(&self) -> u64 {
        self.nanos.load(Ordering::Acquire)
    }
}
