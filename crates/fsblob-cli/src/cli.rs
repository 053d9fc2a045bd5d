use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "fsblob",
    about = "fsblob - content-addressed blob store on a local filesystem",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Store root directory (overrides `root` from --config)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// TOML store configuration
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the content key of a file (or stdin) without storing it
    Hash(HashArgs),
    #[command(flatten)]
    Store(StoreCommand),
}

/// Commands that operate on an opened store root.
#[derive(Subcommand)]
pub enum StoreCommand {
    /// Store a file (or stdin) under a name
    Put(PutArgs),
    /// Write a blob to stdout or a file
    Get(GetArgs),
    /// Check whether a blob exists
    Exists(DescriptorArgs),
    /// List committed blob names
    List,
    /// Forget a name
    Rm(DescriptorArgs),
}

#[derive(Args)]
pub struct PutArgs {
    /// Target blob name, e.g. `assets/logo.png`
    pub name: String,
    /// Input file; reads stdin when omitted
    pub file: Option<PathBuf>,
    /// Fail unless the content hashes to this key
    #[arg(long)]
    pub expect_key: Option<String>,
}

#[derive(Args)]
pub struct DescriptorArgs {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub key: Option<String>,
}

#[derive(Args)]
pub struct GetArgs {
    #[command(flatten)]
    pub descriptor: DescriptorArgs,
    /// Output file; writes stdout when omitted
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct HashArgs {
    pub file: Option<PathBuf>,
}
