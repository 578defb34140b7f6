//! # Cashbox Launcher
//!
//! One executable, two roles:
//!
//! - `run` (default): the supervisor. Loads the cashbox configuration,
//!   starts one worker per component and keeps them alive.
//! - `plebeian`: a worker, spawned by the supervisor with its configuration
//!   on the command line.
//!
//! ## Exit Codes
//!
//! - `0`: normal shutdown, including a worker that lost its supervisor
//! - `1`: any fatal startup failure

use anyhow::Result;
use clap::Parser;

use cashbox_launcher::app::{run_monarch, run_plebeian};
use cashbox_launcher::cli::{Cli, Command};
use cashbox_launcher::plugins::PluginRegistry;

#[tokio::main]
async fn main() -> Result<()> {
    match Cli::parse().command() {
        Command::Run(args) => run_monarch(args).await,
        Command::Plebeian(args) => run_plebeian(args, PluginRegistry::with_builtins())
            .await
            .map(|_| ()),
    }
}
