use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use super::delay::InsertionDelay;
use super::detector::{DetectorStatus, ModificationDetector};
use super::events::{InsertionEvent, InsertionListener};
use super::fingerprint::{Fingerprint, LockableFingerprintProvider};
use super::publisher::{DocumentPublisher, PublishError, PublishReceipt};
use super::ticker::{SystemTicker, Ticker};

pub const INSERT_DURATION_METRIC: &str = "document_insert_duration_seconds";
pub const INSERT_ERRORS_METRIC: &str = "document_insert_errors_total";

/// Result of a single poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PollOutcome {
    Idle,
    Inserted(PublishReceipt),
    /// The store already held this content, so it was committed without a
    /// new insert.
    AlreadyStored { fingerprint: Fingerprint, uri: String },
}

#[derive(Debug, thiserror::Error)]
pub enum InsertError {
    #[error("insert of {fingerprint} failed: {source}")]
    Publish {
        fingerprint: Fingerprint,
        #[source]
        source: PublishError,
    },
}

/// Polls a [`ModificationDetector`] and inserts the document once it is
/// eligible, committing the inserted fingerprint back into the detector.
pub struct DocumentInserter<P, B, T = SystemTicker> {
    detector: ModificationDetector<P, T>,
    publisher: B,
    listeners: Vec<Arc<dyn InsertionListener>>,
}

impl<P, B, T> DocumentInserter<P, B, T>
where
    P: LockableFingerprintProvider,
    B: DocumentPublisher,
    T: Ticker,
{
    pub fn new(detector: ModificationDetector<P, T>, publisher: B) -> Self {
        Self {
            detector,
            publisher,
            listeners: Vec::new(),
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn InsertionListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn detector(&self) -> &ModificationDetector<P, T> {
        &self.detector
    }

    pub fn is_modified(&self) -> bool {
        self.detector.is_modified()
    }

    pub fn last_insert_fingerprint(&self) -> Option<Fingerprint> {
        self.detector.last_insert_fingerprint()
    }

    /// Seeds the baseline with a fingerprint inserted by an earlier run.
    pub fn restore_last_insert(&self, fingerprint: Fingerprint) {
        info!(%fingerprint, "restored last inserted fingerprint");
        self.detector.set_fingerprint(fingerprint);
    }

    pub fn status(&self) -> DetectorStatus {
        self.detector.status()
    }

    pub fn insertion_delay(&self) -> &InsertionDelay {
        self.detector.insertion_delay()
    }

    pub fn set_insertion_delay(&self, seconds: u32) {
        let previous = self.detector.insertion_delay().set(seconds);
        if previous != seconds {
            info!(previous, current = seconds, "insertion delay changed");
        }
    }

    /// Runs one poll, inserting the document when the detector allows it.
    ///
    /// The publisher is asked for the fingerprint the detector judged stable.
    /// Content the store already holds commits the baseline as if it had just
    /// been inserted. Any other failed insert leaves the baseline untouched so
    /// the pending change is retried by a later poll.
    pub fn poll_once(&self) -> Result<PollOutcome, InsertError> {
        let Some(fingerprint) = self.detector.eligible_fingerprint() else {
            return Ok(PollOutcome::Idle);
        };

        self.notify(&InsertionEvent::Inserting {
            fingerprint: fingerprint.clone(),
        });

        let started = Instant::now();
        match self.publisher.publish(&fingerprint) {
            Ok(receipt) => {
                let duration = started.elapsed();
                self.detector.set_fingerprint(fingerprint.clone());
                metrics::histogram!(INSERT_DURATION_METRIC).record(duration.as_secs_f64());
                info!(%fingerprint, uri = %receipt.uri, ?duration, "document inserted");
                self.notify(&InsertionEvent::Inserted {
                    fingerprint,
                    uri: receipt.uri.clone(),
                    duration,
                });
                Ok(PollOutcome::Inserted(receipt))
            }
            Err(PublishError::Duplicate { uri }) => {
                let duration = started.elapsed();
                self.detector.set_fingerprint(fingerprint.clone());
                info!(%fingerprint, %uri, "document already stored, baseline committed");
                self.notify(&InsertionEvent::Inserted {
                    fingerprint: fingerprint.clone(),
                    uri: uri.clone(),
                    duration,
                });
                Ok(PollOutcome::AlreadyStored { fingerprint, uri })
            }
            Err(source) => {
                metrics::counter!(INSERT_ERRORS_METRIC).increment(1);
                self.notify(&InsertionEvent::Aborted {
                    fingerprint: fingerprint.clone(),
                    reason: source.to_string(),
                });
                Err(InsertError::Publish {
                    fingerprint,
                    source,
                })
            }
        }
    }

    fn notify(&self, event: &InsertionEvent) {
        for listener in &self.listeners {
            listener.on_event(event);
        }
    }
}

impl<P, B, T> DocumentInserter<P, B, T>
where
    P: LockableFingerprintProvider + 'static,
    B: DocumentPublisher + 'static,
    T: Ticker + 'static,
{
    /// Polls every `poll_interval` until `shutdown` resolves.
    ///
    /// Polls run on the blocking pool. Errors are logged and the loop keeps
    /// going; an in-flight poll always completes before shutdown is honored.
    pub async fn run<F>(self: Arc<Self>, poll_interval: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(poll_interval.max(Duration::from_millis(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(?poll_interval, "document inserter started");
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = interval.tick() => {}
            }

            let inserter = Arc::clone(&self);
            match tokio::task::spawn_blocking(move || inserter.poll_once()).await {
                Ok(Ok(_)) => {}
                Ok(Err(err)) => warn!(error = %err, "insert attempt failed"),
                Err(err) => warn!(error = %err, "poll task aborted"),
            }
        }
        info!("document inserter stopped");
    }
}
