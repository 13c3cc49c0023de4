// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Stacking Cycle Engine - Command Line Runner
//
// Usage:
//   stacking refresh                          # project against the live height
//   stacking refresh --height 846000 --seed 7 # offline, reproducible
//   stacking collect --from 80 --to 90        # real cycles from node, prices, Postgres
//   stacking export-csv --sort apy --asc      # table as CSV
//   stacking ensemble --horizon 26 --runs 30  # Monte Carlo of projected paths

mod cli;
mod commands;

use std::process::ExitCode;

use clap::Parser;
use log::error;

use cli::Cli;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match commands::run(cli) {
        Ok(outcome) => {
            println!("{}", outcome.output);
            if outcome.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
