use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "passvault")]
#[command(about = "Import and manage Apple Wallet and Google Wallet passes", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to config/passvault.toml or $PASSVAULT_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Parse a pass file and print the result without storing it
    Inspect(PathArgs),
    /// Parse a pass file and add it to the store
    Import(PathArgs),
    /// List stored passes
    List,
    /// Print one stored pass as JSON
    Show(IdArgs),
    /// Remove a stored pass and its images
    Delete(IdArgs),
    /// Print the effective configuration as TOML
    Config,
}

#[derive(clap::Args, Debug)]
pub struct PathArgs {
    /// Path to a .pkpass archive or a Google Wallet JSON export
    pub path: PathBuf,
}

#[derive(clap::Args, Debug)]
pub struct IdArgs {
    /// Pass identifier
    pub id: String,
}
