use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

use circlelog::Category;
use circlelog::humanize::HumanDuration;

#[derive(Parser, Debug)]
#[command(name = "circlelog")]
#[command(about = "Community log pipeline: local buffers, archive and relevance search", long_about = None)]
pub struct Cli {
    /// Configuration file (overrides CIRCLELOG_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the read API
    Serve(ServeArgs),
    /// Search the archive
    Search(SearchArgs),
    /// Print the newest records of a local buffer
    Tail(TailArgs),
    /// Truncate a local buffer to its newest records
    Reset(ResetArgs),
    /// Print the effective configuration as TOML
    ShowConfig,
}

#[derive(clap::Args, Debug)]
pub struct ServeArgs {
    /// Address to bind the HTTP server to (defaults to server.bind_addr)
    #[arg(long)]
    pub address: Option<SocketAddr>,
}

#[derive(clap::Args, Debug)]
pub struct SearchArgs {
    #[arg(long)]
    pub category: Category,

    #[arg(long)]
    pub term: String,

    /// Look back this far (e.g. `24h`, `3d`); defaults to search.lookback
    #[arg(long)]
    pub since: Option<HumanDuration>,

    #[arg(long)]
    pub limit: Option<usize>,

    /// Fold near-identical entries together
    #[arg(long)]
    pub merge: bool,
}

#[derive(clap::Args, Debug)]
pub struct TailArgs {
    #[arg(long)]
    pub category: Category,

    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

#[derive(clap::Args, Debug)]
pub struct ResetArgs {
    #[arg(long)]
    pub category: Category,

    /// Number of newest records to keep
    #[arg(long)]
    pub retain: usize,
}
