#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! `car`: serves the console protocol on the vehicle.

mod cli;
mod error_fmt;
mod logging;
mod vehicle;

use std::time::Duration;

use clap::Parser;

use crate::cli::{Cli, Commands, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};
use crate::vehicle::ServeOpts;

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    let _ = color_eyre::install();

    if let Err(err) = run(cli) {
        tracing::error!(error = %err, "exiting");
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        std::process::exit(exit_code_for_error(&err));
    }
}

fn run(cli: Cli) -> eyre::Result<()> {
    let cfg = vehicle::load_config(&cli.config)?;
    logging::init_tracing(cli.json, cli.log_level.as_deref(), &cfg.logging)?;

    match cli.cmd {
        Commands::Serve {
            port,
            baud,
            stdio,
            sim_edge_ms,
        } => vehicle::run_serve(
            &cfg,
            &ServeOpts {
                port,
                baud,
                stdio,
                sim_edge: Duration::from_millis(sim_edge_ms),
            },
        ),
        Commands::SelfCheck => vehicle::self_check(&cfg, cli.json),
    }
}
