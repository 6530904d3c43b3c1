use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque digest of a document's full content.
///
/// Two fingerprints compare equal exactly when the documents they summarize
/// are considered identical for publishing purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(pub String);

impl Fingerprint {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Fingerprint {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Fingerprint {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Capability the document layer hands to the detector so the detector never
/// needs the document type itself.
pub trait LockableFingerprintProvider: Send + Sync {
    /// True while the document is being mutated or inserted.
    fn is_locked(&self) -> bool;

    /// Fingerprint of the current content. Ignored while locked.
    fn fingerprint(&self) -> Fingerprint;
}

impl<P> LockableFingerprintProvider for std::sync::Arc<P>
where
    P: LockableFingerprintProvider + ?Sized,
{
    fn is_locked(&self) -> bool {
        (**self).is_locked()
    }

    fn fingerprint(&self) -> Fingerprint {
        (**self).fingerprint()
    }
}
