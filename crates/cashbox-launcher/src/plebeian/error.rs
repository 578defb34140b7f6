//! Worker runtime errors. Every variant is fatal to the worker process.

use cashbox_types::{ConfigurationError, InvocationError, ServiceError};
use thiserror::Error;
use uuid::Uuid;

use crate::plugins::PluginError;

#[derive(Debug, Error)]
pub enum WorkerError {
    /// Command-line hand-off could not be decoded.
    #[error("invalid worker arguments: {0}")]
    Arguments(#[from] InvocationError),

    /// Launcher settings handed to the worker are unusable.
    #[error("invalid launcher configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Plugin(#[from] PluginError),

    /// Every configured bind URI failed.
    #[error("component {component_id}: none of its {configured} bind URIs could be hosted")]
    NoBindSucceeded { component_id: Uuid, configured: usize },

    /// A helper startup hook failed.
    #[error("helper {hook} hook failed: {source}")]
    HelperHook {
        hook: &'static str,
        #[source]
        source: ServiceError,
    },
}
