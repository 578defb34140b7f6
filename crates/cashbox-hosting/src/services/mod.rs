//! # Business Services
//!
//! Every business interface is hosted through one uniform shape: a named
//! service with a fixed list of operations, each taking and returning a
//! JSON document. The protocol front ends (gRPC, REST, document RPC) only
//! ever see this shape, so one business instance can sit behind any number
//! of listeners.

pub mod pos;
pub mod scu_de;
pub mod scu_it;

use async_trait::async_trait;
use cashbox_types::ServiceError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

pub use pos::{PosEndpoints, PosService};
pub use scu_de::{DeScuEndpoints, DeScuService};
pub use scu_it::{ItScuEndpoints, ItScuService};

/// A business interface as seen by the protocol front ends.
#[async_trait]
pub trait BusinessService: Send + Sync + 'static {
    /// Package-qualified service name; gRPC paths are
    /// `/<service_name>/<operation>`.
    fn service_name(&self) -> &'static str;

    /// Operation names, PascalCase.
    fn operations(&self) -> &'static [&'static str];

    /// Run one operation.
    async fn invoke(&self, operation: &str, payload: Value) -> Result<Value, ServiceError>;

    /// Find an operation by name, ignoring case and any `Service.` or
    /// `Service/` prefix.
    fn resolve_operation(&self, name: &str) -> Option<&'static str> {
        let bare = name
            .rsplit(|c: char| c == '/' || c == '.')
            .next()
            .unwrap_or(name);
        self.operations()
            .iter()
            .copied()
            .find(|op| op.eq_ignore_ascii_case(bare))
    }
}

/// HTTP method of a REST route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RestMethod {
    Get,
    Post,
}

/// One REST route: `<base path>/<path>` → operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestRoute {
    pub method: RestMethod,
    pub path: String,
    pub operation: &'static str,
}

/// Route table filled by an [`EndpointBinder`].
#[derive(Debug, Default, Clone)]
pub struct RestRoutes {
    routes: Vec<RestRoute>,
}

impl RestRoutes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post(&mut self, path: &str, operation: &'static str) -> &mut Self {
        self.push(RestMethod::Post, path, operation)
    }

    pub fn get(&mut self, path: &str, operation: &'static str) -> &mut Self {
        self.push(RestMethod::Get, path, operation)
    }

    fn push(&mut self, method: RestMethod, path: &str, operation: &'static str) -> &mut Self {
        self.routes.push(RestRoute {
            method,
            path: path.trim_matches('/').to_string(),
            operation,
        });
        self
    }

    pub fn routes(&self) -> &[RestRoute] {
        &self.routes
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Maps business operations onto REST paths.
pub trait EndpointBinder: Send + Sync {
    fn bind(&self, routes: &mut RestRoutes);
}

/// Decode an operation payload.
pub(crate) fn decode<T: DeserializeOwned>(payload: Value) -> Result<T, ServiceError> {
    serde_json::from_value(payload).map_err(ServiceError::invalid)
}

pub(crate) fn encode<T: Serialize>(value: T) -> Result<Value, ServiceError> {
    serde_json::to_value(value).map_err(|e| ServiceError::Failed(e.to_string()))
}
