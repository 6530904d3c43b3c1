use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, trace};

use super::delay::InsertionDelay;
use super::fingerprint::{Fingerprint, LockableFingerprintProvider};
use super::ticker::{SystemTicker, Ticker};

const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// What the previous poll saw.
///
/// `ForceFresh` is left behind by a locked poll so that whatever fingerprint
/// shows up next is treated as a new change, including an empty one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum CheckMarker {
    #[default]
    Unpolled,
    ForceFresh,
    Tracking(Fingerprint),
}

impl CheckMarker {
    fn tracks(&self, fingerprint: &Fingerprint) -> bool {
        matches!(self, Self::Tracking(tracked) if tracked == fingerprint)
    }
}

#[derive(Debug, Default)]
struct DetectorState {
    last_insert: Option<Fingerprint>,
    last_check: CheckMarker,
    last_modification: Option<u64>,
}

impl DetectorState {
    fn stable_secs(&self, now: u64) -> Option<u64> {
        self.last_modification
            .map(|started| now.saturating_sub(started) / NANOS_PER_SECOND)
    }
}

/// Coarse phase reported by [`ModificationDetector::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorPhase {
    /// Nothing pending: content matches the last insert, or the document is locked.
    Idle,
    /// A change is pending and the delay has not yet elapsed.
    Debouncing,
    /// The pending change has been stable for at least the delay, so the next
    /// poll that still sees the same content reports eligible. Right after the
    /// poll that first saw a change this already holds for a zero delay.
    Eligible,
}

/// Read-only snapshot of the detector for status surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectorStatus {
    pub phase: DetectorPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_insert_fingerprint: Option<Fingerprint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stable_for_secs: Option<u64>,
    pub insertion_delay_secs: u32,
}

/// Decides when a modified document has settled long enough to be inserted.
///
/// Each call to [`is_eligible_for_insert`](Self::is_eligible_for_insert)
/// is one poll. A changed fingerprint starts (or restarts) the debounce
/// timer; the poll only turns positive once the same fingerprint has been
/// seen again after the insertion delay. Locking the document discards any
/// pending timer. The published baseline only advances through
/// [`set_fingerprint`](Self::set_fingerprint).
#[derive(Debug)]
pub struct ModificationDetector<P, T = SystemTicker> {
    provider: P,
    ticker: T,
    insertion_delay: InsertionDelay,
    state: Mutex<DetectorState>,
}

impl<P> ModificationDetector<P, SystemTicker>
where
    P: LockableFingerprintProvider,
{
    pub fn new(provider: P, insertion_delay: InsertionDelay) -> Self {
        Self::with_ticker(SystemTicker::new(), provider, insertion_delay)
    }
}

impl<P, T> ModificationDetector<P, T>
where
    P: LockableFingerprintProvider,
    T: Ticker,
{
    pub fn with_ticker(ticker: T, provider: P, insertion_delay: InsertionDelay) -> Self {
        Self {
            provider,
            ticker,
            insertion_delay,
            state: Mutex::new(DetectorState::default()),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn insertion_delay(&self) -> &InsertionDelay {
        &self.insertion_delay
    }

    pub fn is_eligible_for_insert(&self) -> bool {
        self.eligible_fingerprint().is_some()
    }

    /// One poll, returning the fingerprint that has been stable for the
    /// insertion delay. Inserting exactly this fingerprint keeps an edit that
    /// lands after the poll from being published undebounced.
    pub fn eligible_fingerprint(&self) -> Option<Fingerprint> {
        let mut state = self.lock_state();

        if self.provider.is_locked() {
            if state.last_modification.take().is_some() {
                debug!("document locked, pending change discarded");
            }
            state.last_check = CheckMarker::ForceFresh;
            return None;
        }

        let fingerprint = self.provider.fingerprint();
        if state.last_insert.as_ref() == Some(&fingerprint) {
            state.last_modification = None;
            state.last_check = CheckMarker::Tracking(fingerprint);
            return None;
        }

        let pending = if state.last_check.tracks(&fingerprint) {
            state.last_modification
        } else {
            None
        };
        let Some(started) = pending else {
            let now = self.ticker.read();
            debug!(%fingerprint, "document changed, debounce timer restarted");
            state.last_modification = Some(now);
            state.last_check = CheckMarker::Tracking(fingerprint);
            return None;
        };

        let elapsed_secs = self.ticker.read().saturating_sub(started) / NANOS_PER_SECOND;
        let delay = self.insertion_delay.get();
        trace!(%fingerprint, elapsed_secs, delay, "document stable since last poll");
        (elapsed_secs >= u64::from(delay)).then_some(fingerprint)
    }

    pub fn last_insert_fingerprint(&self) -> Option<Fingerprint> {
        self.lock_state().last_insert.clone()
    }

    /// Records a committed insert. Call only once the store confirmed it.
    pub fn set_fingerprint(&self, fingerprint: Fingerprint) {
        let mut state = self.lock_state();
        state.last_check = CheckMarker::Tracking(fingerprint.clone());
        state.last_insert = Some(fingerprint);
        state.last_modification = None;
    }

    /// Whether the live content differs from the last insert, regardless of
    /// locks or debounce timers.
    pub fn is_modified(&self) -> bool {
        let fingerprint = self.provider.fingerprint();
        self.lock_state().last_insert.as_ref() != Some(&fingerprint)
    }

    pub fn status(&self) -> DetectorStatus {
        let state = self.lock_state();
        let insertion_delay_secs = self.insertion_delay.get();
        let stable_for_secs = state.stable_secs(self.ticker.read());
        let phase = match stable_for_secs {
            None => DetectorPhase::Idle,
            Some(secs) if secs >= u64::from(insertion_delay_secs) => DetectorPhase::Eligible,
            Some(_) => DetectorPhase::Debouncing,
        };

        DetectorStatus {
            phase,
            last_insert_fingerprint: state.last_insert.clone(),
            stable_for_secs,
            insertion_delay_secs,
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, DetectorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
