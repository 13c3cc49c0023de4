use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Stacking cycle dashboard engine", long_about = None)]
pub struct Cli {
    /// JSON config file; every key is optional.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Cycle store, overrides `store_path` from the config.
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Project missing cycles up to the current height and print the dashboard response.
    Refresh {
        /// Use this burn height instead of asking the chain API.
        #[arg(long)]
        height: Option<u64>,
        /// Seed for the generator; random when omitted.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Progress through the last stored cycle.
    Progress {
        #[arg(long)]
        height: Option<u64>,
    },
    /// Print the stored cycles without projecting.
    Cycles,
    /// Print the current burn height.
    Height,
    /// Collect real cycles from the node API, prices and the rewards database.
    Collect {
        #[arg(long)]
        from: u64,
        #[arg(long)]
        to: u64,
    },
    /// Chart series: value increase, dollar yield, thresholds and rewards.
    Report {
        /// Use the mobile window (3 cycles) instead of the desktop one (20).
        #[arg(long, default_value_t = false)]
        mobile: bool,
        /// Explicit window, overrides --mobile.
        #[arg(long)]
        window: Option<usize>,
    },
    /// Write the cycle table as CSV to stdout or a file.
    ExportCsv {
        /// JSON field name to sort by, e.g. `apy` or `stxPriceAtEnd`.
        #[arg(long)]
        sort: Option<String>,
        #[arg(long, default_value_t = false)]
        asc: bool,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Monte Carlo of projected paths from the last stored cycle.
    Ensemble {
        #[arg(long, default_value_t = 26)]
        horizon: usize,
        #[arg(long, default_value_t = 30)]
        runs: usize,
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
}
