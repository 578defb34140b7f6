//! Italian signature-creation unit interface (RT printer / server).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::pos::{ReceiptRequest, ReceiptResponse};
use super::{EchoRequest, EchoResponse};
use crate::errors::ServiceError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeviceInfo {
    pub serial_number: String,
    pub device_type: String,
    pub firmware_version: String,
    #[serde(default)]
    pub info_data: String,
}

/// A receipt together with the queue's preliminary response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProcessRequest {
    pub receipt_request: ReceiptRequest,
    pub receipt_response: ReceiptResponse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProcessResponse {
    pub receipt_response: ReceiptResponse,
}

/// Business interface of an Italian SCU.
#[async_trait]
pub trait ItScu: Send + Sync {
    async fn echo(&self, request: EchoRequest) -> Result<EchoResponse, ServiceError>;

    async fn device_info(&self) -> Result<DeviceInfo, ServiceError>;

    async fn process_receipt(&self, request: ProcessRequest)
        -> Result<ProcessResponse, ServiceError>;
}
