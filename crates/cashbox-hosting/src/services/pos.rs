//! Queue (POS) service adapter.

use std::sync::Arc;

use async_trait::async_trait;
use cashbox_types::interfaces::Pos;
use cashbox_types::ServiceError;
use serde_json::Value;

use super::{decode, encode, BusinessService, EndpointBinder, RestRoutes};

/// Hosts a [`Pos`] implementation.
#[derive(Clone)]
pub struct PosService {
    inner: Arc<dyn Pos>,
}

impl PosService {
    pub const NAME: &'static str = "cashbox.pos.v2.Pos";
    pub const OPERATIONS: &'static [&'static str] = &["Echo", "Sign", "Journal"];

    pub fn new(inner: Arc<dyn Pos>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl BusinessService for PosService {
    fn service_name(&self) -> &'static str {
        Self::NAME
    }

    fn operations(&self) -> &'static [&'static str] {
        Self::OPERATIONS
    }

    async fn invoke(&self, operation: &str, payload: Value) -> Result<Value, ServiceError> {
        match operation {
            "Echo" => encode(self.inner.echo(decode(payload)?).await?),
            "Sign" => encode(self.inner.sign(decode(payload)?).await?),
            "Journal" => encode(self.inner.journal(decode(payload)?).await?),
            other => Err(ServiceError::UnknownOperation(other.to_string())),
        }
    }
}

/// REST routes of the POS interface.
#[derive(Debug, Default, Clone, Copy)]
pub struct PosEndpoints;

impl EndpointBinder for PosEndpoints {
    fn bind(&self, routes: &mut RestRoutes) {
        routes
            .post("v2/echo", "Echo")
            .post("v2/sign", "Sign")
            .post("v2/journal", "Journal");
    }
}
