//! Command-line interface.
//!
//! ```text
//! cashbox-launcher [run] [--launcher-configuration <path>] [--cashbox-configuration <path>]
//! cashbox-launcher plebeian --plebeian-configuration <b64> --launcher-configuration <b64>
//!                           [--no-control-plane | --control-plane-address <addr>]
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "cashbox-launcher",
    version,
    about = "Local supervisor for cashbox components",
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub run: RunArgs,
}

impl Cli {
    /// The selected command; top-level arguments mean `run`.
    pub fn command(self) -> Command {
        self.command.unwrap_or(Command::Run(self.run))
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the supervisor (default)
    Run(RunArgs),
    /// Host a single component (spawned by the supervisor)
    #[command(hide = true)]
    Plebeian(PlebeianArgs),
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Launcher configuration file (JSON)
    #[arg(long, env = "CASHBOX_LAUNCHER_CONFIGURATION")]
    pub launcher_configuration: Option<PathBuf>,

    /// Cashbox configuration file (JSON)
    #[arg(long, env = "CASHBOX_CONFIGURATION", default_value = "cashbox.json")]
    pub cashbox_configuration: PathBuf,
}

#[derive(Debug, Clone, Args)]
pub struct PlebeianArgs {
    /// Base64-encoded JSON of the component and its kind
    #[arg(long)]
    pub plebeian_configuration: String,

    /// Base64-encoded JSON of the launcher configuration
    #[arg(long)]
    pub launcher_configuration: String,

    /// Run without talking to a supervisor
    #[arg(long, conflicts_with = "control_plane_address")]
    pub no_control_plane: bool,

    /// Supervisor socket or pipe; derived from the launcher configuration when omitted
    #[arg(long)]
    pub control_plane_address: Option<String>,
}
