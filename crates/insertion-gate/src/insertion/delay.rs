use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// Shared, live-adjustable insertion delay in whole seconds.
///
/// Every clone observes the same value. The detector reads it on each check,
/// so an update applies to the very next poll without resetting a running
/// debounce timer.
#[derive(Debug, Clone)]
pub struct InsertionDelay {
    seconds: Arc<AtomicU32>,
}

impl InsertionDelay {
    pub fn new(seconds: u32) -> Self {
        Self {
            seconds: Arc::new(AtomicU32::new(seconds)),
        }
    }

    pub fn get(&self) -> u32 {
        self.seconds.load(Ordering::Relaxed)
    }

    /// Stores a new delay and returns the previous one.
    pub fn set(&self, seconds: u32) -> u32 {
        self.seconds.swap(seconds, Ordering::Relaxed)
    }
}

impl Default for InsertionDelay {
    fn default() -> Self {
        Self::new(60)
    }
}

impl Serialize for InsertionDelay {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u32(self.get())
    }
}
