use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use ichnaea_sdk::DocumentFormat;

#[derive(Parser)]
#[command(
    name = "ichnaea",
    about = "Ichnaea: content-addressed dataset versioning with structural diffs",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Dataset root (overrides `root` from the config file)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Path to an ichnaea.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Fetch a locator and commit it as a new version
    Ingest(IngestArgs),
    /// Show the version history of a path
    Log(LogArgs),
    /// Print the exact bytes of a version
    Show(ShowArgs),
    /// Show the structural difference between two versions
    Diff(DiffArgs),
    /// Push unsynced versions to the replica
    Sync(SyncArgs),
    /// Check history integrity and stored content of a path
    Verify(VerifyArgs),
    /// List tracked dataset paths
    Paths(PathsArgs),
}

#[derive(Args)]
pub struct IngestArgs {
    /// Dataset name, used as its path
    pub name: String,
    /// http://, https:// or file:// locator
    pub locator: String,
    #[arg(short, long)]
    pub message: Option<String>,
    /// Anchor the new version with the notary afterwards
    #[arg(long)]
    pub notarize: bool,
}

#[derive(Args)]
pub struct LogArgs {
    pub path: String,
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
}

#[derive(Args)]
pub struct ShowArgs {
    pub commit: String,
    pub path: String,
}

#[derive(Args)]
pub struct DiffArgs {
    pub path: String,
    pub commit_a: String,
    pub commit_b: String,
    /// Parse both versions as this format instead of the path's extension
    #[arg(long = "as")]
    pub as_format: Option<DocumentFormat>,
    /// Line diff of the raw bytes
    #[arg(long, conflicts_with = "as_format")]
    pub raw: bool,
}

#[derive(Args)]
pub struct SyncArgs {
    pub path: String,
}

#[derive(Args)]
pub struct VerifyArgs {
    pub path: String,
}

#[derive(Args)]
pub struct PathsArgs {}
