//! German SCU service adapter.

use std::sync::Arc;

use async_trait::async_trait;
use cashbox_types::interfaces::DeScu;
use cashbox_types::ServiceError;
use serde_json::Value;

use super::{decode, encode, BusinessService, EndpointBinder, RestRoutes};

/// Hosts a [`DeScu`] implementation.
#[derive(Clone)]
pub struct DeScuService {
    inner: Arc<dyn DeScu>,
}

impl DeScuService {
    pub const NAME: &'static str = "cashbox.scu.de.v2.DeScu";
    pub const OPERATIONS: &'static [&'static str] = &[
        "Echo",
        "StartTransaction",
        "UpdateTransaction",
        "FinishTransaction",
        "GetTseInfo",
        "ExecuteSelfTest",
        "RegisterClientId",
        "StartExportSession",
        "ExportData",
        "EndExportSession",
    ];

    pub fn new(inner: Arc<dyn DeScu>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl BusinessService for DeScuService {
    fn service_name(&self) -> &'static str {
        Self::NAME
    }

    fn operations(&self) -> &'static [&'static str] {
        Self::OPERATIONS
    }

    async fn invoke(&self, operation: &str, payload: Value) -> Result<Value, ServiceError> {
        let scu = &self.inner;
        match operation {
            "Echo" => encode(scu.echo(decode(payload)?).await?),
            "StartTransaction" => encode(scu.start_transaction(decode(payload)?).await?),
            "UpdateTransaction" => encode(scu.update_transaction(decode(payload)?).await?),
            "FinishTransaction" => encode(scu.finish_transaction(decode(payload)?).await?),
            "GetTseInfo" => encode(scu.tse_info().await?),
            "ExecuteSelfTest" => {
                let request = if payload.is_null() {
                    Default::default()
                } else {
                    decode(payload)?
                };
                encode(scu.self_test(request).await?)
            }
            "RegisterClientId" => encode(scu.register_client_id(decode(payload)?).await?),
            "StartExportSession" => encode(scu.start_export_session(decode(payload)?).await?),
            "ExportData" => encode(scu.export_data(decode(payload)?).await?),
            "EndExportSession" => encode(scu.end_export_session(decode(payload)?).await?),
            other => Err(ServiceError::UnknownOperation(other.to_string())),
        }
    }
}

/// REST routes of the German SCU interface.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeScuEndpoints;

impl EndpointBinder for DeScuEndpoints {
    fn bind(&self, routes: &mut RestRoutes) {
        routes
            .post("v2/echo", "Echo")
            .post("v2/starttransaction", "StartTransaction")
            .post("v2/updatetransaction", "UpdateTransaction")
            .post("v2/finishtransaction", "FinishTransaction")
            .get("v2/tseinfo", "GetTseInfo")
            .post("v2/selftest", "ExecuteSelfTest")
            .post("v2/registerclientid", "RegisterClientId")
            .post("v2/startexportsession", "StartExportSession")
            .post("v2/exportdata", "ExportData")
            .post("v2/endexportsession", "EndExportSession");
    }
}
