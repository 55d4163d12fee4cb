use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "shelf",
    about = "Inspect and maintain Shelf document stores",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Store configuration file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Root directory of a local store; overrides the configured backend
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

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
    /// List sessions
    Sessions,
    /// List the entity types stored in a session
    Types(SessionArgs),
    /// List the record ids of one entity type
    Ls(TypeArgs),
    /// Decode and print one record without its Rust type
    Dump(RecordArgs),
    /// Delete one record
    Rm(RecordArgs),
    /// Delete a session and all of its records
    Drop(DropArgs),
    /// Print the effective store configuration
    Config,
}

#[derive(Args)]
pub struct SessionArgs {
    pub session: String,
}

#[derive(Args)]
pub struct TypeArgs {
    pub session: String,
    pub entity_type: String,
}

#[derive(Args)]
pub struct RecordArgs {
    pub session: String,
    pub entity_type: String,
    pub id: String,
}

#[derive(Args)]
pub struct DropArgs {
    pub session: String,
    /// Do not ask for confirmation
    #[arg(short, long)]
    pub yes: bool,
}
