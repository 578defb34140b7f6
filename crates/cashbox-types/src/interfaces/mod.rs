//! # Business Interfaces
//!
//! The capability interfaces a worker can host. The launcher never depends
//! on how an implementation was obtained; it only ever sees one of these
//! traits behind an `Arc`.
//!
//! ```text
//! ┌────────────────┬──────────────────────┬───────────────────────────┐
//! │ ComponentKind  │ Interface            │ Network surface           │
//! ├────────────────┼──────────────────────┼───────────────────────────┤
//! │ Queue          │ Pos                  │ echo, sign, journal       │
//! │ SignatureDevice│ DeScu, then ItScu    │ transaction / export ops  │
//! │ Helper         │ Helper               │ none (lifecycle hooks)    │
//! └────────────────┴──────────────────────┴───────────────────────────┘
//! ```
//!
//! DTOs use PascalCase JSON field names on every protocol.

pub mod helper;
pub mod pos;
pub mod scu_de;
pub mod scu_it;

use serde::{Deserialize, Serialize};

pub use helper::Helper;
pub use pos::Pos;
pub use scu_de::DeScu;
pub use scu_it::ItScu;

/// Echo request shared by every business interface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EchoRequest {
    pub message: String,
}

/// Echo response; carries the request message unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EchoResponse {
    pub message: String,
}

impl From<EchoRequest> for EchoResponse {
    fn from(request: EchoRequest) -> Self {
        Self {
            message: request.message,
        }
    }
}
