//! Debounced insertion of a single local document.
//!
//! [`ModificationDetector`] is the gate: a pure state machine fed by a
//! [`LockableFingerprintProvider`], a [`Ticker`] and a shared
//! [`InsertionDelay`]. [`DocumentInserter`] drives it from a poll loop and
//! hands eligible content to a [`DocumentPublisher`].

mod delay;
mod detector;
mod events;
mod fingerprint;
mod inserter;
mod publisher;
mod ticker;

pub use delay::InsertionDelay;
pub use detector::{DetectorPhase, DetectorStatus, ModificationDetector};
pub use events::{InsertionEvent, InsertionListener};
pub use fingerprint::{Fingerprint, LockableFingerprintProvider};
pub use inserter::{
    DocumentInserter, InsertError, PollOutcome, INSERT_DURATION_METRIC, INSERT_ERRORS_METRIC,
};
pub use publisher::{DocumentPublisher, PublishError, PublishReceipt};
pub use ticker::{ManualTicker, SystemTicker, Ticker};
