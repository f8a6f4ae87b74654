use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "chaindefs",
    about = "Signed chain definitions for hardware wallets",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Pipeline configuration (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Merge candidate lists into the definitions file and commit a new root
    Reconcile(ReconcileArgs),
    /// Attach a collective signature to the definitions file
    Sign(SignArgs),
    /// Write signed per-record artifacts
    Generate(GenerateArgs),
    /// Verify a single artifact
    Verify(VerifyArgs),
    /// Compare firmware built-in definitions with the current set
    CheckBuiltin(CheckBuiltinArgs),
    /// Print the Merkle root of the definitions file
    Root(RootArgs),
    /// Generate a signer key pair
    Keygen,
}

#[derive(Args)]
pub struct ReconcileArgs {
    /// Last signed definitions file (defaults to the configured path)
    #[arg(long)]
    pub previous: Option<PathBuf>,
    /// Candidate record lists, later files take precedence
    #[arg(long = "candidate", required = true)]
    pub candidates: Vec<PathBuf>,
    /// Ask before accepting symbol or decimals changes
    #[arg(short, long)]
    pub interactive: bool,
    /// Accept symbol and decimals changes without asking
    #[arg(long)]
    pub force_accept: bool,
    /// Show every modification, not only top-ranked ones
    #[arg(long)]
    pub show_all: bool,
    /// JSON array of external ids whose modifications are shown
    #[arg(long, conflicts_with = "show_all")]
    pub highlight: Option<PathBuf>,
    /// Without --highlight, show modifications of records ranked this high
    #[arg(long, default_value = "100")]
    pub top: u32,
    /// Where to write the result (defaults to the previous file)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct SignArgs {
    /// Hex-encoded collective signature
    pub signature: Option<String>,
    /// Sign locally with these key files (hex seeds) instead
    #[arg(long = "key", conflicts_with = "signature")]
    pub keys: Vec<PathBuf>,
    /// Recompute the Merkle root before attaching
    #[arg(long)]
    pub verify: bool,
}

#[derive(Args)]
pub struct GenerateArgs {
    #[arg(short, long)]
    pub outdir: Option<PathBuf>,
    /// Sign with the development keys instead of the stored signature
    #[arg(long)]
    pub dev_sign: bool,
    /// Remove a non-empty output directory first
    #[arg(long)]
    pub clean: bool,
}

#[derive(Args)]
pub struct VerifyArgs {
    pub artifact: PathBuf,
    /// Check against the development keys
    #[arg(long)]
    pub dev: bool,
}

#[derive(Args)]
pub struct CheckBuiltinArgs {
    /// Built-in definitions (same format as a candidate list)
    pub builtin: PathBuf,
    /// Rank cutoff for definitions that should be built in
    #[arg(long, default_value = "100")]
    pub top: u32,
}

#[derive(Args)]
pub struct RootArgs {
    /// Definitions file (defaults to the configured path)
    pub definitions: Option<PathBuf>,
    /// Print the stored root without recomputing it
    #[arg(long)]
    pub stored: bool,
}
