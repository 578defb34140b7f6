//! German signature-creation unit interface (TSE).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{EchoRequest, EchoResponse};
use crate::errors::ServiceError;

/// Signature data returned by every transaction operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TseSignatureData {
    pub signature_counter: u64,
    pub signature_algorithm: String,
    pub signature_base64: String,
    pub public_key_base64: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StartTransactionRequest {
    pub queue_item_id: Uuid,
    pub client_id: String,
    #[serde(default)]
    pub process_type: String,
    #[serde(default)]
    pub process_data_base64: String,
    #[serde(default)]
    pub is_retry: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StartTransactionResponse {
    pub transaction_number: u64,
    pub time_stamp: DateTime<Utc>,
    pub tse_serial_number_octet: String,
    pub client_id: String,
    pub signature_data: TseSignatureData,
}

/// Request shape shared by update and finish.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransactionRequest {
    pub queue_item_id: Uuid,
    pub transaction_number: u64,
    pub client_id: String,
    #[serde(default)]
    pub process_type: String,
    #[serde(default)]
    pub process_data_base64: String,
    #[serde(default)]
    pub is_retry: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TransactionResponse {
    pub transaction_number: u64,
    pub client_id: String,
    pub process_type: String,
    pub process_data_base64: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub signature_data: TseSignatureData,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TseState {
    #[default]
    Uninitialized,
    Initialized,
    Terminated,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TseInfo {
    pub max_number_of_clients: u32,
    pub current_number_of_clients: u32,
    pub current_client_ids: Vec<String>,
    pub max_number_of_started_transactions: u32,
    pub current_number_of_started_transactions: u32,
    pub current_started_transaction_numbers: Vec<u64>,
    pub serial_number_octet: String,
    pub firmware_identification: String,
    pub current_state: TseState,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SelfTestRequest {
    #[serde(default)]
    pub client_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SelfTestResponse {
    pub passed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RegisterClientIdRequest {
    pub client_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RegisterClientIdResponse {
    pub client_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StartExportSessionRequest {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub erase: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StartExportSessionResponse {
    pub token_id: String,
    pub tse_serial_number_octet: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExportDataRequest {
    pub token_id: String,
    #[serde(default)]
    pub max_chunk_size: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExportDataResponse {
    pub token_id: String,
    pub tar_file_byte_chunk_base64: String,
    pub tar_file_end_of_file: bool,
    pub total_tar_file_size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EndExportSessionRequest {
    pub token_id: String,
    #[serde(default)]
    pub sha256_checksum_base64: String,
    #[serde(default)]
    pub erase: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EndExportSessionResponse {
    pub token_id: String,
    pub is_valid: bool,
    pub is_erased: bool,
}

/// Business interface of a German SCU.
#[async_trait]
pub trait DeScu: Send + Sync {
    async fn echo(&self, request: EchoRequest) -> Result<EchoResponse, ServiceError>;

    async fn start_transaction(
        &self,
        request: StartTransactionRequest,
    ) -> Result<StartTransactionResponse, ServiceError>;

    async fn update_transaction(
        &self,
        request: TransactionRequest,
    ) -> Result<TransactionResponse, ServiceError>;

    async fn finish_transaction(
        &self,
        request: TransactionRequest,
    ) -> Result<TransactionResponse, ServiceError>;

    async fn tse_info(&self) -> Result<TseInfo, ServiceError>;

    async fn self_test(&self, request: SelfTestRequest) -> Result<SelfTestResponse, ServiceError>;

    async fn register_client_id(
        &self,
        request: RegisterClientIdRequest,
    ) -> Result<RegisterClientIdResponse, ServiceError>;

    async fn start_export_session(
        &self,
        request: StartExportSessionRequest,
    ) -> Result<StartExportSessionResponse, ServiceError>;

    async fn export_data(&self, request: ExportDataRequest)
        -> Result<ExportDataResponse, ServiceError>;

    async fn end_export_session(
        &self,
        request: EndExportSessionRequest,
    ) -> Result<EndExportSessionResponse, ServiceError>;
}
