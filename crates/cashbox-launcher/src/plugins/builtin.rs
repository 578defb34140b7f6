//! In-memory reference components.
//!
//! They keep all state in process memory and sign nothing for real. They
//! exist so a launcher can be exercised end to end without vendor packages.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use cashbox_types::interfaces::pos::{
    JournalRequest, JournalResponse, ReceiptRequest, ReceiptResponse, SignatureItem,
};
use cashbox_types::interfaces::scu_de::{
    EndExportSessionRequest, EndExportSessionResponse, ExportDataRequest, ExportDataResponse,
    RegisterClientIdRequest, RegisterClientIdResponse, SelfTestRequest, SelfTestResponse,
    StartExportSessionRequest, StartExportSessionResponse, StartTransactionRequest,
    StartTransactionResponse, TransactionRequest, TransactionResponse, TseInfo,
    TseSignatureData, TseState,
};
use cashbox_types::interfaces::scu_it::{DeviceInfo, ProcessRequest, ProcessResponse};
use cashbox_types::interfaces::{DeScu, EchoRequest, EchoResponse, Helper, ItScu, Pos};
use cashbox_types::{ComponentConfiguration, ServiceError};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

use super::{Plugin, PluginError, PluginRegistry};

pub const QUEUE_PACKAGE: &str = "InMemory.Queue";
pub const SCU_DE_PACKAGE: &str = "InMemory.SCU.DE";
pub const SCU_IT_PACKAGE: &str = "InMemory.SCU.IT";
pub const HELPER_PACKAGE: &str = "InMemory.Helper";

/// Every built-in package name.
pub const PACKAGES: [&str; 4] = [QUEUE_PACKAGE, SCU_DE_PACKAGE, SCU_IT_PACKAGE, HELPER_PACKAGE];

const MAX_CLIENTS: usize = 10;
const MAX_STARTED_TRANSACTIONS: usize = 512;
const SIGNATURE_ALGORITHM: &str = "in-memory-sha256";

pub(crate) fn register(registry: &mut PluginRegistry) {
    registry
        .register(QUEUE_PACKAGE, Arc::new(BuiltinPlugin::Queue))
        .register(SCU_DE_PACKAGE, Arc::new(BuiltinPlugin::DeScu))
        .register(SCU_IT_PACKAGE, Arc::new(BuiltinPlugin::ItScu))
        .register(HELPER_PACKAGE, Arc::new(BuiltinPlugin::Helper));
}

enum BuiltinPlugin {
    Queue,
    DeScu,
    ItScu,
    Helper,
}

impl Plugin for BuiltinPlugin {
    fn create_pos(
        &self,
        config: &ComponentConfiguration,
    ) -> Result<Option<Arc<dyn Pos>>, PluginError> {
        Ok(matches!(self, Self::Queue).then(|| Arc::new(InMemoryQueue::new(config)) as Arc<dyn Pos>))
    }

    fn create_de_scu(
        &self,
        config: &ComponentConfiguration,
    ) -> Result<Option<Arc<dyn DeScu>>, PluginError> {
        Ok(matches!(self, Self::DeScu)
            .then(|| Arc::new(InMemoryDeScu::new(config)) as Arc<dyn DeScu>))
    }

    fn create_it_scu(
        &self,
        config: &ComponentConfiguration,
    ) -> Result<Option<Arc<dyn ItScu>>, PluginError> {
        Ok(matches!(self, Self::ItScu)
            .then(|| Arc::new(InMemoryItScu::new(config)) as Arc<dyn ItScu>))
    }

    fn create_helper(
        &self,
        config: &ComponentConfiguration,
    ) -> Result<Option<Arc<dyn Helper>>, PluginError> {
        Ok(matches!(self, Self::Helper)
            .then(|| Arc::new(InMemoryHelper::new(config)) as Arc<dyn Helper>))
    }
}

fn serial_number(config: &ComponentConfiguration) -> String {
    config.id.simple().to_string()
}

fn cashbox_id(config: &ComponentConfiguration) -> Option<Uuid> {
    config
        .configuration
        .get("cashboxid")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
}

fn sign(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update(b"|");
    }
    STANDARD.encode(hasher.finalize())
}

// ============================================================================
// Queue
// ============================================================================

#[derive(Default)]
struct QueueState {
    row: u64,
    journal: Vec<ReceiptResponse>,
}

pub struct InMemoryQueue {
    queue_id: Uuid,
    cashbox_id: Option<Uuid>,
    state: Mutex<QueueState>,
}

impl InMemoryQueue {
    pub fn new(config: &ComponentConfiguration) -> Self {
        Self {
            queue_id: config.id,
            cashbox_id: cashbox_id(config),
            state: Mutex::new(QueueState::default()),
        }
    }
}

#[async_trait]
impl Pos for InMemoryQueue {
    async fn echo(&self, request: EchoRequest) -> Result<EchoResponse, ServiceError> {
        Ok(request.into())
    }

    async fn sign(&self, request: ReceiptRequest) -> Result<ReceiptResponse, ServiceError> {
        if let (Some(expected), Some(actual)) = (self.cashbox_id, request.cashbox_id) {
            if expected != actual {
                return Err(ServiceError::InvalidRequest(format!(
                    "receipt addressed to cashbox {actual}, this queue belongs to {expected}"
                )));
            }
        }

        let mut state = self.state.lock();
        state.row += 1;
        let row = state.row;
        let moment = Utc::now();
        let signature = sign(&[
            self.queue_id.to_string().as_str(),
            row.to_string().as_str(),
            request.receipt_reference.as_str(),
            moment.to_rfc3339().as_str(),
        ]);

        let response = ReceiptResponse {
            cashbox_id: request.cashbox_id.or(self.cashbox_id),
            queue_id: self.queue_id,
            queue_row: row,
            receipt_reference: request.receipt_reference,
            receipt_identification: format!("ft{row:X}#"),
            receipt_moment: moment,
            signatures: vec![SignatureItem {
                format: 1,
                signature_type: 0,
                caption: "In-memory receipt signature".to_string(),
                data: signature,
            }],
            state: 0,
        };
        state.journal.push(response.clone());
        Ok(response)
    }

    async fn journal(&self, request: JournalRequest) -> Result<JournalResponse, ServiceError> {
        let state = self.state.lock();
        let from = u64::try_from(request.from).unwrap_or(0);
        let to = u64::try_from(request.to).ok().filter(|to| *to > 0).unwrap_or(u64::MAX);

        let entries = state
            .journal
            .iter()
            .filter(|r| r.queue_row >= from && r.queue_row <= to)
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ServiceError::Failed(e.to_string()))?;
        Ok(JournalResponse { entries })
    }
}

// ============================================================================
// German SCU
// ============================================================================

struct OpenTransaction {
    client_id: String,
    start_time: DateTime<Utc>,
}

struct ExportSession {
    data: Vec<u8>,
    offset: usize,
}

#[derive(Default)]
struct TseMemory {
    clients: Vec<String>,
    last_transaction: u64,
    signature_counter: u64,
    open: BTreeMap<u64, OpenTransaction>,
    log: Vec<String>,
    exports: HashMap<String, ExportSession>,
}

impl TseMemory {
    fn signature(&mut self, serial: &str, process_type: &str, process_data: &str) -> TseSignatureData {
        self.signature_counter += 1;
        let counter = self.signature_counter;
        self.log
            .push(format!("{counter};{process_type};{process_data}"));
        TseSignatureData {
            signature_counter: counter,
            signature_algorithm: SIGNATURE_ALGORITHM.to_string(),
            signature_base64: sign(&[serial, counter.to_string().as_str(), process_type, process_data]),
            public_key_base64: STANDARD.encode(serial.as_bytes()),
        }
    }

    fn require_client(&self, client_id: &str) -> Result<(), ServiceError> {
        if self.clients.iter().any(|c| c == client_id) {
            Ok(())
        } else {
            Err(ServiceError::InvalidRequest(format!(
                "client '{client_id}' is not registered"
            )))
        }
    }
}

pub struct InMemoryDeScu {
    serial: String,
    memory: Mutex<TseMemory>,
}

impl InMemoryDeScu {
    pub fn new(config: &ComponentConfiguration) -> Self {
        Self {
            serial: serial_number(config),
            memory: Mutex::new(TseMemory::default()),
        }
    }

    fn transaction(
        &self,
        request: TransactionRequest,
        finish: bool,
    ) -> Result<TransactionResponse, ServiceError> {
        let mut memory = self.memory.lock();
        memory.require_client(&request.client_id)?;

        let start_time = match memory.open.get(&request.transaction_number) {
            Some(open) if open.client_id == request.client_id => open.start_time,
            Some(_) => {
                return Err(ServiceError::InvalidRequest(format!(
                    "transaction {} belongs to another client",
                    request.transaction_number
                )))
            }
            None => {
                return Err(ServiceError::InvalidRequest(format!(
                    "transaction {} is not open",
                    request.transaction_number
                )))
            }
        };
        if finish {
            memory.open.remove(&request.transaction_number);
        }

        let signature_data = memory.signature(
            &self.serial,
            &request.process_type,
            &request.process_data_base64,
        );
        Ok(TransactionResponse {
            transaction_number: request.transaction_number,
            client_id: request.client_id,
            process_type: request.process_type,
            process_data_base64: request.process_data_base64,
            start_time: Some(start_time),
            end_time: finish.then(Utc::now),
            signature_data,
        })
    }
}

#[async_trait]
impl DeScu for InMemoryDeScu {
    async fn echo(&self, request: EchoRequest) -> Result<EchoResponse, ServiceError> {
        Ok(request.into())
    }

    async fn start_transaction(
        &self,
        request: StartTransactionRequest,
    ) -> Result<StartTransactionResponse, ServiceError> {
        let mut memory = self.memory.lock();
        memory.require_client(&request.client_id)?;
        if memory.open.len() >= MAX_STARTED_TRANSACTIONS {
            return Err(ServiceError::Unavailable(
                "maximum number of started transactions reached".into(),
            ));
        }

        memory.last_transaction += 1;
        let number = memory.last_transaction;
        let now = Utc::now();
        memory.open.insert(
            number,
            OpenTransaction {
                client_id: request.client_id.clone(),
                start_time: now,
            },
        );
        let signature_data = memory.signature(
            &self.serial,
            &request.process_type,
            &request.process_data_base64,
        );

        Ok(StartTransactionResponse {
            transaction_number: number,
            time_stamp: now,
            tse_serial_number_octet: self.serial.clone(),
            client_id: request.client_id,
            signature_data,
        })
    }

    async fn update_transaction(
        &self,
        request: TransactionRequest,
    ) -> Result<TransactionResponse, ServiceError> {
        self.transaction(request, false)
    }

    async fn finish_transaction(
        &self,
        request: TransactionRequest,
    ) -> Result<TransactionResponse, ServiceError> {
        self.transaction(request, true)
    }

    async fn tse_info(&self) -> Result<TseInfo, ServiceError> {
        let memory = self.memory.lock();
        Ok(TseInfo {
            max_number_of_clients: MAX_CLIENTS as u32,
            current_number_of_clients: memory.clients.len() as u32,
            current_client_ids: memory.clients.clone(),
            max_number_of_started_transactions: MAX_STARTED_TRANSACTIONS as u32,
            current_number_of_started_transactions: memory.open.len() as u32,
            current_started_transaction_numbers: memory.open.keys().copied().collect(),
            serial_number_octet: self.serial.clone(),
            firmware_identification: format!("in-memory {}", cashbox_types::LAUNCHER_VERSION),
            current_state: TseState::Initialized,
        })
    }

    async fn self_test(&self, request: SelfTestRequest) -> Result<SelfTestResponse, ServiceError> {
        let memory = self.memory.lock();
        let passed = request.client_id.is_empty() || memory.require_client(&request.client_id).is_ok();
        Ok(SelfTestResponse { passed })
    }

    async fn register_client_id(
        &self,
        request: RegisterClientIdRequest,
    ) -> Result<RegisterClientIdResponse, ServiceError> {
        if request.client_id.trim().is_empty() {
            return Err(ServiceError::InvalidRequest("client id is empty".into()));
        }
        let mut memory = self.memory.lock();
        if !memory.clients.contains(&request.client_id) {
            if memory.clients.len() >= MAX_CLIENTS {
                return Err(ServiceError::Unavailable(
                    "maximum number of clients reached".into(),
                ));
            }
            memory.clients.push(request.client_id);
        }
        Ok(RegisterClientIdResponse {
            client_ids: memory.clients.clone(),
        })
    }

    async fn start_export_session(
        &self,
        request: StartExportSessionRequest,
    ) -> Result<StartExportSessionResponse, ServiceError> {
        let mut memory = self.memory.lock();
        if let Some(client_id) = &request.client_id {
            memory.require_client(client_id)?;
        }

        let mut data = memory.log.join("\n").into_bytes();
        if !data.is_empty() {
            data.push(b'\n');
        }
        let token_id = Uuid::new_v4().to_string();
        memory
            .exports
            .insert(token_id.clone(), ExportSession { data, offset: 0 });

        Ok(StartExportSessionResponse {
            token_id,
            tse_serial_number_octet: self.serial.clone(),
        })
    }

    async fn export_data(
        &self,
        request: ExportDataRequest,
    ) -> Result<ExportDataResponse, ServiceError> {
        let mut memory = self.memory.lock();
        let session = memory.exports.get_mut(&request.token_id).ok_or_else(|| {
            ServiceError::InvalidRequest(format!("unknown export token '{}'", request.token_id))
        })?;

        let remaining = session.data.len() - session.offset;
        let chunk = match request.max_chunk_size {
            0 => remaining,
            max => max.min(remaining),
        };
        let bytes = &session.data[session.offset..session.offset + chunk];
        session.offset += chunk;

        Ok(ExportDataResponse {
            token_id: request.token_id,
            tar_file_byte_chunk_base64: STANDARD.encode(bytes),
            tar_file_end_of_file: session.offset == session.data.len(),
            total_tar_file_size: session.data.len() as u64,
        })
    }

    async fn end_export_session(
        &self,
        request: EndExportSessionRequest,
    ) -> Result<EndExportSessionResponse, ServiceError> {
        let mut memory = self.memory.lock();
        let session = memory.exports.remove(&request.token_id).ok_or_else(|| {
            ServiceError::InvalidRequest(format!("unknown export token '{}'", request.token_id))
        })?;

        let checksum = STANDARD.encode(Sha256::digest(&session.data));
        let is_valid = checksum == request.sha256_checksum_base64;
        let is_erased = is_valid && request.erase;
        if is_erased {
            memory.log.clear();
        }

        Ok(EndExportSessionResponse {
            token_id: request.token_id,
            is_valid,
            is_erased,
        })
    }
}

// ============================================================================
// Italian SCU
// ============================================================================

pub struct InMemoryItScu {
    serial: String,
    counter: Mutex<u64>,
}

impl InMemoryItScu {
    pub fn new(config: &ComponentConfiguration) -> Self {
        Self {
            serial: serial_number(config),
            counter: Mutex::new(0),
        }
    }
}

#[async_trait]
impl ItScu for InMemoryItScu {
    async fn echo(&self, request: EchoRequest) -> Result<EchoResponse, ServiceError> {
        Ok(request.into())
    }

    async fn device_info(&self) -> Result<DeviceInfo, ServiceError> {
        Ok(DeviceInfo {
            serial_number: self.serial.clone(),
            device_type: "in-memory".to_string(),
            firmware_version: cashbox_types::LAUNCHER_VERSION.to_string(),
            info_data: String::new(),
        })
    }

    async fn process_receipt(
        &self,
        request: ProcessRequest,
    ) -> Result<ProcessResponse, ServiceError> {
        let number = {
            let mut counter = self.counter.lock();
            *counter += 1;
            *counter
        };

        let mut receipt_response = request.receipt_response;
        receipt_response.signatures.push(SignatureItem {
            format: 1,
            signature_type: 0,
            caption: "Numero documento".to_string(),
            data: format!("{}-{number:04}", self.serial),
        });
        Ok(ProcessResponse { receipt_response })
    }
}

// ============================================================================
// Helper
// ============================================================================

pub struct InMemoryHelper {
    id: Uuid,
    calls: Mutex<Vec<&'static str>>,
}

impl InMemoryHelper {
    pub fn new(config: &ComponentConfiguration) -> Self {
        Self {
            id: config.id,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Hooks invoked so far, in order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().clone()
    }

    fn record(&self, hook: &'static str) {
        info!(component_id = %self.id, hook, "Helper hook");
        self.calls.lock().push(hook);
    }
}

#[async_trait]
impl Helper for InMemoryHelper {
    async fn begin_startup(&self) -> Result<(), ServiceError> {
        self.record("begin_startup");
        Ok(())
    }

    async fn end_startup(&self) -> Result<(), ServiceError> {
        self.record("end_startup");
        Ok(())
    }

    async fn stop(&self) -> Result<(), ServiceError> {
        self.record("stop");
        Ok(())
    }
}
