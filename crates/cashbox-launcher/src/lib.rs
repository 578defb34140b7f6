//! # Cashbox Launcher Library
//!
//! The supervisor ("Monarch"), the worker runtime ("Plebeian") and the
//! pieces they share. The `cashbox-launcher` binary is a thin wrapper around
//! [`app`].
//!
//! ```text
//! ┌──────────────────────────── supervisor process ───────────────────────────┐
//! │ Orchestrator ─► Monarch ─► WorkerRegistry ◄─ MonarchControlService        │
//! │                    │                              ▲                       │
//! └────────────────────┼──────────────────────────────┼───────────────────────┘
//!                      │ spawn `plebeian`             │ ReportStarted / Ping / RelayLog
//! ┌────────────────────▼──────────────────────────────┴───────────────────────┐
//! │ Plebeian ─► PluginRegistry ─► Business ─► cashbox_hosting::host(...)      │
//! └──────────────────────────── worker process (one per component) ─────────┘
//! ```

#![allow(missing_docs)]
#![allow(clippy::too_many_lines)]

pub mod app;
pub mod cli;
pub mod environment;
pub mod monarch;
pub mod packages;
pub mod plebeian;
pub mod plugins;
pub mod signals;

pub use monarch::{Monarch, Orchestrator, SupervisorError, WorkerHandle, WorkerState};
pub use plebeian::{Plebeian, WorkerError, WorkerExit};
pub use plugins::{Business, Plugin, PluginError, PluginRegistry};
