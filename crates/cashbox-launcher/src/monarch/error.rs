//! Supervisor errors.

use cashbox_control::ControlPlaneError;
use cashbox_types::InvocationError;
use thiserror::Error;
use uuid::Uuid;

use crate::packages::PackageError;

#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The component id is already registered.
    #[error("component {0} is already supervised")]
    DuplicateComponent(Uuid),

    /// Configuration could not be encoded for the command line.
    #[error("failed to encode worker arguments: {0}")]
    Invocation(#[from] InvocationError),

    /// The worker process could not be spawned.
    #[error("failed to spawn worker for component {component_id}: {source}")]
    Spawn {
        component_id: Uuid,
        #[source]
        source: std::io::Error,
    },

    /// The worker terminated before reporting started.
    #[error("component {component_id} failed to start: {reason}")]
    StartFailed { component_id: Uuid, reason: String },

    #[error(transparent)]
    Package(#[from] PackageError),

    #[error(transparent)]
    ControlPlane(#[from] ControlPlaneError),
}
