// Allow missing docs for internal items in development
#![allow(missing_docs)]

//! Cashbox Hosting - Multi-protocol listeners for business services.
//!
//! One business instance can be exposed on any number of bind URIs. Each
//! URI's scheme picks the front end.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                              HOSTING                                         │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │  grpc://host:port        rest://host:port/base       http(s)://  net.tcp:// │
//! │  ┌─────────────┐         ┌─────────────┐         ┌──────────────────────┐  │
//! │  │ GrpcService │         │ rest_router │         │  DocumentState       │  │
//! │  │ (JsonCodec) │         │ (binder)    │         │  (JSON-RPC 2.0)      │  │
//! │  └──────┬──────┘         └──────┬──────┘         └──────────┬───────────┘  │
//! │         │                       │                           │              │
//! │         │        ┌──────────────┴───────────────────────────┘              │
//! │         │        │  Trace → BodyLogging → Timeout → BodyLimit               │
//! │         │        │                                                          │
//! │  ┌──────┴────────┴────────────────────────────────────┐                    │
//! │  │        BusinessService::invoke(op, payload)        │                    │
//! │  └────────────────────────────────────────────────────┘                    │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use cashbox_hosting::{host, HostingOptions, PosService, PosEndpoints};
//!
//! let service = Arc::new(PosService::new(pos));
//! let handle = host(service, "rest://localhost:1503/pos", Some(&PosEndpoints), &options, &token).await?;
//! ```
//!
//! `https://` bindings are recognised but fail with `TlsNotConfigured`.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod domain;
pub mod grpc;
pub mod jsonrpc;
pub mod listener;
pub mod middleware;
pub mod rest;
pub mod services;

// Re-exports for public API
pub use domain::bind::{resolve_bind_addr, BindUri, Protocol};
pub use domain::config::HostingOptions;
pub use domain::error::{codes, grpc_status, ApiError, HostingError};
pub use grpc::{GrpcService, JsonCodec};
pub use jsonrpc::DocumentState;
pub use listener::{host, ListenerHandle};
pub use services::{
    BusinessService, DeScuEndpoints, DeScuService, EndpointBinder, ItScuEndpoints, ItScuService,
    PosEndpoints, PosService, RestMethod, RestRoute, RestRoutes,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
