//! # Cashbox Types Crate
//!
//! Domain types shared by every part of the launcher.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: everything that crosses a process boundary
//!   (component configuration, launcher configuration, relayed log records)
//!   is defined here, together with its wire encoding.
//! - **Capability Interfaces**: the business interfaces a worker can host
//!   (`Pos`, `DeScu`, `ItScu`, `Helper`) are plain async traits; how an
//!   implementation is obtained is the plugin layer's concern.
//! - **Immutable Hand-off**: a `ComponentConfiguration` is never mutated once
//!   the supervisor has serialized it onto a worker's command line.

pub mod component;
pub mod config;
pub mod errors;
pub mod interfaces;
pub mod invocation;
pub mod logging;

pub use component::{
    CashboxConfiguration, ComponentConfiguration, ComponentKind, PlebeianConfiguration,
};
pub use config::{BackoffSettings, ConfigurationError, LauncherConfiguration, LogLevel, RestartPolicy};
pub use errors::ServiceError;
pub use invocation::{decode_argument, encode_argument, InvocationError};
pub use logging::LogRecord;

/// Launcher version reported in environment summaries and health checks.
pub const LAUNCHER_VERSION: &str = env!("CARGO_PKG_VERSION");
