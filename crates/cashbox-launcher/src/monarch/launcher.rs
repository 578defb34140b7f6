//! Worker process construction.
//!
//! The supervisor never builds a `Command` itself; it asks a
//! [`ProcessLauncher`] for one and then applies its own stdio and lifetime
//! settings. Tests substitute scripted processes here.

use std::path::PathBuf;

use cashbox_control::ControlPlaneAddress;
use cashbox_types::{encode_argument, LauncherConfiguration, PlebeianConfiguration};
use tokio::process::Command;

use super::error::SupervisorError;

/// Builds the command for one worker process.
pub trait ProcessLauncher: Send + Sync {
    fn command(
        &self,
        worker: &PlebeianConfiguration,
        launcher: &LauncherConfiguration,
        control_plane: Option<&ControlPlaneAddress>,
    ) -> Result<Command, SupervisorError>;
}

/// Re-invokes an executable (the running one by default) in `plebeian` mode.
#[derive(Debug, Clone)]
pub struct SelfExeLauncher {
    executable: PathBuf,
}

impl SelfExeLauncher {
    /// Use the currently running executable.
    pub fn current() -> std::io::Result<Self> {
        Ok(Self {
            executable: std::env::current_exe()?,
        })
    }

    pub fn with_executable(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    /// Arguments passed after the executable.
    pub fn arguments(
        worker: &PlebeianConfiguration,
        launcher: &LauncherConfiguration,
        control_plane: Option<&ControlPlaneAddress>,
    ) -> Result<Vec<String>, SupervisorError> {
        let mut args = vec![
            "plebeian".to_string(),
            "--plebeian-configuration".to_string(),
            encode_argument(worker)?,
            "--launcher-configuration".to_string(),
            encode_argument(launcher)?,
        ];
        match control_plane {
            Some(address) => {
                args.push("--control-plane-address".to_string());
                args.push(address.to_string());
            }
            None => args.push("--no-control-plane".to_string()),
        }
        Ok(args)
    }
}

impl ProcessLauncher for SelfExeLauncher {
    fn command(
        &self,
        worker: &PlebeianConfiguration,
        launcher: &LauncherConfiguration,
        control_plane: Option<&ControlPlaneAddress>,
    ) -> Result<Command, SupervisorError> {
        let mut command = Command::new(&self.executable);
        command.args(Self::arguments(worker, launcher, control_plane)?);
        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cashbox_types::{decode_argument, ComponentConfiguration, ComponentKind};
    use uuid::Uuid;

    fn worker() -> PlebeianConfiguration {
        PlebeianConfiguration {
            component: ComponentConfiguration::new(Uuid::new_v4(), "InMemory.Queue", "1.0.0")
                .with_url("grpc://localhost:1502"),
            kind: ComponentKind::Queue,
        }
    }

    #[test]
    fn test_arguments_with_control_plane() {
        let worker = worker();
        let launcher = LauncherConfiguration::default();
        let address = ControlPlaneAddress::new("/tmp/cashbox-launcher-5050.sock");

        let args = SelfExeLauncher::arguments(&worker, &launcher, Some(&address)).unwrap();

        assert_eq!(args[0], "plebeian");
        assert_eq!(args[1], "--plebeian-configuration");
        let decoded: PlebeianConfiguration = decode_argument(&args[2]).unwrap();
        assert_eq!(decoded, worker);
        assert_eq!(args[3], "--launcher-configuration");
        let decoded: LauncherConfiguration = decode_argument(&args[4]).unwrap();
        assert_eq!(decoded, launcher);
        assert_eq!(&args[5..], ["--control-plane-address", address.as_str()]);
    }

    #[test]
    fn test_arguments_without_control_plane() {
        let args =
            SelfExeLauncher::arguments(&worker(), &LauncherConfiguration::default(), None).unwrap();
        assert_eq!(args.last().map(String::as_str), Some("--no-control-plane"));
    }
}
