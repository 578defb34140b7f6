//! POS interface exposed by queue components.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{EchoRequest, EchoResponse};
use crate::errors::ServiceError;

/// Receipt submitted for signing.
///
/// Only the fields the launcher needs to route and log are typed; the rest
/// of the document is carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReceiptRequest {
    #[serde(default, rename = "ftCashBoxID")]
    pub cashbox_id: Option<Uuid>,
    #[serde(default, rename = "cbReceiptReference")]
    pub receipt_reference: String,
    #[serde(default, rename = "ftReceiptCase")]
    pub receipt_case: i64,
    #[serde(default, rename = "cbChargeItems")]
    pub charge_items: Vec<serde_json::Value>,
    #[serde(default, rename = "cbPayItems")]
    pub pay_items: Vec<serde_json::Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One signature attached to a receipt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SignatureItem {
    #[serde(rename = "ftSignatureFormat")]
    pub format: i64,
    #[serde(rename = "ftSignatureType")]
    pub signature_type: i64,
    pub caption: String,
    pub data: String,
}

/// Signed receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReceiptResponse {
    #[serde(rename = "ftCashBoxID")]
    pub cashbox_id: Option<Uuid>,
    #[serde(rename = "ftQueueID")]
    pub queue_id: Uuid,
    #[serde(rename = "ftQueueRow")]
    pub queue_row: u64,
    #[serde(rename = "cbReceiptReference")]
    pub receipt_reference: String,
    #[serde(rename = "ftReceiptIdentification")]
    pub receipt_identification: String,
    #[serde(rename = "ftReceiptMoment")]
    pub receipt_moment: DateTime<Utc>,
    #[serde(rename = "ftSignatures")]
    pub signatures: Vec<SignatureItem>,
    #[serde(rename = "ftState")]
    pub state: i64,
}

/// Journal query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JournalRequest {
    #[serde(default, rename = "ftJournalType")]
    pub journal_type: i64,
    #[serde(default)]
    pub from: i64,
    #[serde(default)]
    pub to: i64,
}

/// Journal entries matching a query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JournalResponse {
    pub entries: Vec<serde_json::Value>,
}

/// Business interface of a queue.
#[async_trait]
pub trait Pos: Send + Sync {
    async fn echo(&self, request: EchoRequest) -> Result<EchoResponse, ServiceError>;

    async fn sign(&self, request: ReceiptRequest) -> Result<ReceiptResponse, ServiceError>;

    async fn journal(&self, request: JournalRequest) -> Result<JournalResponse, ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receipt_request_keeps_unknown_fields() {
        let json = serde_json::json!({
            "ftCashBoxID": Uuid::nil(),
            "cbReceiptReference": "R-1",
            "ftReceiptCase": 4_919_338_172_267_102_209_i64,
            "cbArea": "Bar",
        });

        let request: ReceiptRequest = serde_json::from_value(json).unwrap();
        assert_eq!(request.receipt_reference, "R-1");
        assert_eq!(request.extra["cbArea"], "Bar");

        let back = serde_json::to_value(&request).unwrap();
        assert_eq!(back["cbArea"], "Bar");
    }
}
