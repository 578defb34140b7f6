//! Italian SCU service adapter.

use std::sync::Arc;

use async_trait::async_trait;
use cashbox_types::interfaces::ItScu;
use cashbox_types::ServiceError;
use serde_json::Value;

use super::{decode, encode, BusinessService, EndpointBinder, RestRoutes};

/// Hosts an [`ItScu`] implementation.
#[derive(Clone)]
pub struct ItScuService {
    inner: Arc<dyn ItScu>,
}

impl ItScuService {
    pub const NAME: &'static str = "cashbox.scu.it.v2.ItScu";
    pub const OPERATIONS: &'static [&'static str] = &["Echo", "GetDeviceInfo", "ProcessReceipt"];

    pub fn new(inner: Arc<dyn ItScu>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl BusinessService for ItScuService {
    fn service_name(&self) -> &'static str {
        Self::NAME
    }

    fn operations(&self) -> &'static [&'static str] {
        Self::OPERATIONS
    }

    async fn invoke(&self, operation: &str, payload: Value) -> Result<Value, ServiceError> {
        match operation {
            "Echo" => encode(self.inner.echo(decode(payload)?).await?),
            "GetDeviceInfo" => encode(self.inner.device_info().await?),
            "ProcessReceipt" => encode(self.inner.process_receipt(decode(payload)?).await?),
            other => Err(ServiceError::UnknownOperation(other.to_string())),
        }
    }
}

/// REST routes of the Italian SCU interface.
#[derive(Debug, Default, Clone, Copy)]
pub struct ItScuEndpoints;

impl EndpointBinder for ItScuEndpoints {
    fn bind(&self, routes: &mut RestRoutes) {
        routes
            .post("v2/echo", "Echo")
            .get("v2/deviceinfo", "GetDeviceInfo")
            .post("v2/processreceipt", "ProcessReceipt");
    }
}
