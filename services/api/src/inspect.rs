use crate::infra::FileDocument;
use clap::Args;
use insertion_gate::error::AppError;
use insertion_gate::insertion::LockableFingerprintProvider;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub(crate) struct FingerprintArgs {
    /// Document to fingerprint
    #[arg(long)]
    pub(crate) document: PathBuf,
}

pub(crate) fn run_fingerprint(args: FingerprintArgs) -> Result<(), AppError> {
    let document = FileDocument::new(args.document);
    // Surface read failures here instead of the empty-content fallback.
    document.read()?;

    println!("Document: {}", document.path().display());
    println!("Fingerprint: {}", document.fingerprint());
    if document.is_locked() {
        println!("Locked: yes ({})", document.lock_path().display());
    } else {
        println!("Locked: no");
    }
    Ok(())
}
