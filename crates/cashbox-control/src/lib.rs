//! # Cashbox Control Plane
//!
//! The narrow RPC contract between the supervisor and its workers.
//!
//! ```text
//! ┌──────────────┐   ReportStarted / Ping / RelayLog   ┌──────────────┐
//! │   Worker     │ ──────────────────────────────────► │  Supervisor  │
//! │ (client)     │ ◄────────────────────────────────── │  (server)    │
//! └──────────────┘        Ok / Err { message }         └──────────────┘
//!            Unix domain socket or Windows named pipe only
//! ```
//!
//! Both sides share the [`ControlPlane`] trait: the supervisor implements it
//! on its registry, the worker calls it through [`ControlPlaneClient`].

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod client;
pub mod error;
pub mod framing;
pub mod messages;
pub mod server;
pub mod transport;

use std::collections::BTreeMap;

use async_trait::async_trait;
use cashbox_types::LogRecord;
use uuid::Uuid;

pub use client::ControlPlaneClient;
pub use error::ControlPlaneError;
pub use messages::{ControlRequest, ControlResponse};
pub use server::ControlPlaneServer;
pub use transport::ControlPlaneAddress;

/// The control-plane contract.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// A worker finished startup. Resolves the component's "started" signal.
    ///
    /// Fails with `UnknownComponent` for an id the supervisor never launched.
    async fn report_started(&self, component_id: Uuid) -> Result<(), ControlPlaneError>;

    /// Liveness check. Always succeeds while the supervisor is alive.
    async fn ping(&self) -> Result<(), ControlPlaneError>;

    /// Forward one structured log record with enrichment tags.
    async fn relay_log(
        &self,
        record: LogRecord,
        tags: BTreeMap<String, String>,
    ) -> Result<(), ControlPlaneError>;
}
