//! # Control Plane Client
//!
//! Worker-side implementation of [`ControlPlane`]. One persistent
//! connection is opened lazily and reused; any failure drops it so the next
//! call reconnects.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use cashbox_types::LogRecord;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::ControlPlaneError;
use crate::framing::{framed, receive, send, FramedConnection};
use crate::messages::{ControlRequest, ControlResponse};
use crate::transport::{connect, ControlPlaneAddress};
use crate::ControlPlane;

/// Default time a single call may take.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the supervisor's control plane.
pub struct ControlPlaneClient {
    address: ControlPlaneAddress,
    timeout: Duration,
    connection: Mutex<Option<FramedConnection>>,
}

impl ControlPlaneClient {
    pub fn new(address: ControlPlaneAddress) -> Self {
        Self::with_timeout(address, DEFAULT_CALL_TIMEOUT)
    }

    pub fn with_timeout(address: ControlPlaneAddress, timeout: Duration) -> Self {
        Self {
            address,
            timeout,
            connection: Mutex::new(None),
        }
    }

    pub fn address(&self) -> &ControlPlaneAddress {
        &self.address
    }

    async fn call(&self, request: ControlRequest) -> Result<(), ControlPlaneError> {
        let mut guard = self.connection.lock().await;

        let result = tokio::time::timeout(self.timeout, async {
            if guard.is_none() {
                *guard = Some(framed(connect(&self.address).await?));
            }
            let connection = guard.as_mut().ok_or(ControlPlaneError::ConnectionClosed)?;

            send(connection, &request).await?;
            let response: ControlResponse = receive(connection)
                .await?
                .ok_or(ControlPlaneError::ConnectionClosed)?;
            Ok::<_, ControlPlaneError>(response)
        })
        .await
        .unwrap_or(Err(ControlPlaneError::Timeout));

        match result {
            Ok(response) => response.into_result(),
            Err(e) => {
                *guard = None;
                Err(e)
            }
        }
    }
}

#[async_trait]
impl ControlPlane for ControlPlaneClient {
    async fn report_started(&self, component_id: Uuid) -> Result<(), ControlPlaneError> {
        self.call(ControlRequest::ReportStarted { component_id }).await
    }

    async fn ping(&self) -> Result<(), ControlPlaneError> {
        self.call(ControlRequest::Ping).await
    }

    async fn relay_log(
        &self,
        record: LogRecord,
        tags: BTreeMap<String, String>,
    ) -> Result<(), ControlPlaneError> {
        self.call(ControlRequest::RelayLog { record, tags }).await
    }
}
