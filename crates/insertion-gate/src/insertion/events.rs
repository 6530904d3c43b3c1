use std::time::Duration;

use super::fingerprint::Fingerprint;

/// Lifecycle of a single insert attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertionEvent {
    Inserting {
        fingerprint: Fingerprint,
    },
    Inserted {
        fingerprint: Fingerprint,
        uri: String,
        duration: Duration,
    },
    Aborted {
        fingerprint: Fingerprint,
        reason: String,
    },
}

impl InsertionEvent {
    pub fn fingerprint(&self) -> &Fingerprint {
        match self {
            Self::Inserting { fingerprint }
            | Self::Inserted { fingerprint, .. }
            | Self::Aborted { fingerprint, .. } => fingerprint,
        }
    }
}

/// Receives insert lifecycle events (status pages, notifications, logs).
pub trait InsertionListener: Send + Sync {
    fn on_event(&self, event: &InsertionEvent);
}
