use chrono::Utc;
use insertion_gate::insertion::{
    DocumentPublisher, Fingerprint, InsertionEvent, InsertionListener,
    LockableFingerprintProvider, PublishError, PublishReceipt,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sha2::{Digest, Sha256};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) fn fingerprint_bytes(bytes: &[u8]) -> Fingerprint {
    let mut digest = Sha256::new();
    digest.update(bytes);
    let output = digest.finalize();
    let mut rendered = String::with_capacity(output.len() * 2);
    for byte in output {
        rendered.push_str(format!("{byte:02x}").as_str());
    }
    Fingerprint(rendered)
}

/// Local document stored in a single file.
///
/// The document counts as locked while `<file>.lock` exists next to it, which
/// is how editors signal an in-progress mutation.
#[derive(Debug, Clone)]
pub(crate) struct FileDocument {
    path: PathBuf,
    lock_path: PathBuf,
}

impl FileDocument {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut lock_name = path.file_name().map(|name| name.to_os_string()).unwrap_or_default();
        lock_name.push(".lock");
        let lock_path = path.with_file_name(lock_name);
        Self { path, lock_path }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Current content; a missing file reads as empty.
    pub(crate) fn read(&self) -> std::io::Result<Vec<u8>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }
}

impl LockableFingerprintProvider for FileDocument {
    fn is_locked(&self) -> bool {
        self.lock_path.exists()
    }

    fn fingerprint(&self) -> Fingerprint {
        match self.read() {
            Ok(bytes) => fingerprint_bytes(&bytes),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "document unreadable");
                fingerprint_bytes(&[])
            }
        }
    }
}

/// Append-only store keeping one snapshot file per inserted fingerprint.
#[derive(Debug, Clone)]
pub(crate) struct DirectoryStore {
    document: Arc<FileDocument>,
    root: PathBuf,
}

impl DirectoryStore {
    pub(crate) fn new(document: Arc<FileDocument>, root: impl Into<PathBuf>) -> Self {
        Self {
            document,
            root: root.into(),
        }
    }

    pub(crate) fn snapshot_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.root.join(format!("{fingerprint}.snapshot"))
    }

    pub(crate) fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.snapshot_path(fingerprint).is_file()
    }

    fn uri(path: &Path) -> String {
        format!("file://{}", path.display())
    }
}

impl DocumentPublisher for DirectoryStore {
    fn publish(&self, fingerprint: &Fingerprint) -> Result<PublishReceipt, PublishError> {
        let content = self.document.read()?;
        let actual = fingerprint_bytes(&content);
        if &actual != fingerprint {
            return Err(PublishError::Rejected(format!(
                "document changed to {actual} before insert"
            )));
        }

        fs::create_dir_all(&self.root)?;
        let target = self.snapshot_path(fingerprint);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&target) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                return Err(PublishError::Duplicate {
                    uri: Self::uri(&target),
                })
            }
            Err(err) => return Err(err.into()),
        };
        file.write_all(&content)?;
        file.sync_all()?;

        Ok(PublishReceipt {
            fingerprint: fingerprint.clone(),
            uri: Self::uri(&target),
            published_at: Utc::now(),
        })
    }
}

/// Mirrors insert lifecycle events into the service log.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct LoggingListener;

impl InsertionListener for LoggingListener {
    fn on_event(&self, event: &InsertionEvent) {
        let fingerprint = event.fingerprint();
        match event {
            InsertionEvent::Inserting { .. } => info!(%fingerprint, "inserting document"),
            InsertionEvent::Inserted { uri, duration, .. } => {
                info!(%fingerprint, %uri, ?duration, "document insert finished")
            }
            InsertionEvent::Aborted { reason, .. } => {
                warn!(%fingerprint, %reason, "document insert aborted")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_hex_sha256() {
        assert_eq!(
            fingerprint_bytes(b"").as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn missing_document_reads_as_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let document = FileDocument::new(dir.path().join("absent.json"));
        assert_eq!(document.fingerprint(), fingerprint_bytes(&[]));
        assert!(!document.is_locked());
    }

    #[test]
    fn lock_file_sits_next_to_document() {
        let dir = tempfile::tempdir().expect("tempdir");
        let document = FileDocument::new(dir.path().join("profile.json"));
        assert_eq!(document.lock_path(), dir.path().join("profile.json.lock"));

        fs::write(document.lock_path(), b"").expect("write lock");
        assert!(document.is_locked());
    }

    #[test]
    fn store_is_append_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        let document = Arc::new(FileDocument::new(dir.path().join("profile.json")));
        fs::write(document.path(), b"{\"posts\":[]}").expect("write document");
        let store = DirectoryStore::new(document.clone(), dir.path().join("store"));

        let fingerprint = document.fingerprint();
        let receipt = store.publish(&fingerprint).expect("first insert");
        assert!(receipt.uri.ends_with(&format!("{fingerprint}.snapshot")));
        assert!(store.contains(&fingerprint));
        assert_eq!(
            fs::read(store.snapshot_path(&fingerprint)).expect("snapshot"),
            b"{\"posts\":[]}"
        );

        match store.publish(&fingerprint) {
            Err(PublishError::Duplicate { uri }) => assert_eq!(uri, receipt.uri),
            other => panic!("expected duplicate, got {other:?}"),
        }
    }

    #[test]
    fn store_rejects_content_that_moved_on() {
        let dir = tempfile::tempdir().expect("tempdir");
        let document = Arc::new(FileDocument::new(dir.path().join("profile.json")));
        fs::write(document.path(), b"first").expect("write document");
        let stale = document.fingerprint();
        fs::write(document.path(), b"second").expect("rewrite document");

        let store = DirectoryStore::new(document, dir.path().join("store"));
        assert!(matches!(
            store.publish(&stale),
            Err(PublishError::Rejected(_))
        ));
        assert!(!store.contains(&stale));
    }

    #[test]
    fn file_document_is_inserted_once_edits_settle() {
        use insertion_gate::insertion::{
            DocumentInserter, InsertionDelay, ManualTicker, ModificationDetector, PollOutcome,
        };
        use std::time::Duration;

        let dir = tempfile::tempdir().expect("tempdir");
        let document = Arc::new(FileDocument::new(dir.path().join("profile.json")));
        let store = DirectoryStore::new(document.clone(), dir.path().join("store"));
        let ticker = ManualTicker::new();
        let detector = ModificationDetector::with_ticker(
            ticker.clone(),
            document.clone(),
            InsertionDelay::new(30),
        );
        let inserter = DocumentInserter::new(detector, store.clone());

        fs::write(document.path(), b"draft").expect("write draft");
        assert_eq!(inserter.poll_once().expect("poll"), PollOutcome::Idle);

        ticker.advance(Duration::from_secs(20));
        fs::write(document.lock_path(), b"").expect("take lock");
        assert_eq!(inserter.poll_once().expect("poll"), PollOutcome::Idle);
        fs::write(document.path(), b"final").expect("write final");
        fs::remove_file(document.lock_path()).expect("release lock");

        ticker.advance(Duration::from_secs(20));
        assert_eq!(inserter.poll_once().expect("poll"), PollOutcome::Idle);
        ticker.advance(Duration::from_secs(30));
        let receipt = match inserter.poll_once().expect("poll") {
            PollOutcome::Inserted(receipt) => receipt,
            other => panic!("expected insert, got {other:?}"),
        };

        assert_eq!(receipt.fingerprint, fingerprint_bytes(b"final"));
        assert!(store.contains(&receipt.fingerprint));
        assert!(!store.contains(&fingerprint_bytes(b"draft")));
        assert!(!inserter.is_modified());
    }

    #[test]
    fn reverting_to_a_stored_version_commits_it() {
        use insertion_gate::insertion::{
            DocumentInserter, InsertionDelay, ManualTicker, ModificationDetector, PollOutcome,
        };

        let dir = tempfile::tempdir().expect("tempdir");
        let document = Arc::new(FileDocument::new(dir.path().join("profile.json")));
        let store = DirectoryStore::new(document.clone(), dir.path().join("store"));
        let detector = ModificationDetector::with_ticker(
            ManualTicker::new(),
            document.clone(),
            InsertionDelay::new(0),
        );
        let inserter = DocumentInserter::new(detector, store.clone());

        for content in [b"A", b"B", b"A"] {
            fs::write(document.path(), content).expect("write document");
            for _ in 0..4 {
                inserter.poll_once().expect("poll");
            }
        }

        let original = fingerprint_bytes(b"A");
        assert_eq!(inserter.last_insert_fingerprint(), Some(original.clone()));
        assert!(!inserter.is_modified());
        assert!(store.contains(&fingerprint_bytes(b"B")));
        assert_eq!(inserter.poll_once().expect("poll"), PollOutcome::Idle);
        assert_eq!(
            fs::read_dir(dir.path().join("store")).expect("store dir").count(),
            2
        );
    }
}
