use crate::inspect::{run_fingerprint, FingerprintArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use insertion_gate::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "Insertion Gate",
    about = "Watch a local document and insert it into the store once edits settle",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Watch the document and serve status endpoints (default command)
    Serve(ServeArgs),
    /// Print the current fingerprint and lock state of a document
    Fingerprint(FingerprintArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Document to watch
    #[arg(long)]
    pub(crate) document: Option<PathBuf>,
    /// Directory receiving inserted snapshots
    #[arg(long)]
    pub(crate) store: Option<PathBuf>,
    /// Seconds a change must stay untouched before it is inserted
    #[arg(long)]
    pub(crate) insertion_delay: Option<u32>,
    /// Milliseconds between polls
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub(crate) poll_interval_ms: Option<u64>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Fingerprint(args) => run_fingerprint(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["insertion-gate"]).expect("parses");
        assert!(cli.command.is_none());
    }

    #[test]
    fn serve_accepts_insertion_overrides() {
        let cli = Cli::try_parse_from([
            "insertion-gate",
            "serve",
            "--document",
            "profile.json",
            "--insertion-delay",
            "15",
            "--poll-interval-ms",
            "250",
        ])
        .expect("parses");

        match cli.command {
            Some(Command::Serve(args)) => {
                assert_eq!(args.document, Some(PathBuf::from("profile.json")));
                assert_eq!(args.insertion_delay, Some(15));
                assert_eq!(args.poll_interval_ms, Some(250));
            }
            other => panic!("expected serve, got {other:?}"),
        }
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        assert!(
            Cli::try_parse_from(["insertion-gate", "serve", "--poll-interval-ms", "0"]).is_err()
        );
    }
}
