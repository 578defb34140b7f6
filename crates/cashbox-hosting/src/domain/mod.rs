//! Domain types for the hosting layer.
//!
//! Bind URIs, listener options and the error table.

pub mod bind;
pub mod config;
pub mod error;

// Re-exports for convenience
pub use bind::{check_route_path, resolve_bind_addr, BindUri, Protocol};
pub use config::HostingOptions;
pub use error::{grpc_status, ApiError, HostingError};
