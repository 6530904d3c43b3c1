use chrono::{DateTime, Utc};
use serde::Serialize;

use super::fingerprint::Fingerprint;

/// Outbound insert hook: pushes the document's current content to the store.
///
/// Implementations own their handle on the document and are told which
/// fingerprint the inserter expects them to publish.
pub trait DocumentPublisher: Send + Sync {
    fn publish(&self, fingerprint: &Fingerprint) -> Result<PublishReceipt, PublishError>;
}

/// Confirmation that the store committed an insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishReceipt {
    pub fingerprint: Fingerprint,
    pub uri: String,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("store already holds an insert at {uri}")]
    Duplicate { uri: String },
    #[error("store rejected insert: {0}")]
    Rejected(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl<B> DocumentPublisher for std::sync::Arc<B>
where
    B: DocumentPublisher + ?Sized,
{
    fn publish(&self, fingerprint: &Fingerprint) -> Result<PublishReceipt, PublishError> {
        (**self).publish(fingerprint)
    }
}
