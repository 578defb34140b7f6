//! Supervisor side of the control plane.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use cashbox_control::{ControlPlane, ControlPlaneError};
use cashbox_telemetry::LogSink;
use cashbox_types::LogRecord;
use parking_lot::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use super::registry::WorkerRegistry;

/// Answers worker calls against the registry.
pub struct MonarchControlService {
    registry: Arc<WorkerRegistry>,
    sink: Arc<dyn LogSink>,
    relay_lock: Mutex<()>,
}

impl MonarchControlService {
    pub fn new(registry: Arc<WorkerRegistry>, sink: Arc<dyn LogSink>) -> Self {
        Self {
            registry,
            sink,
            relay_lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl ControlPlane for MonarchControlService {
    async fn report_started(&self, component_id: Uuid) -> Result<(), ControlPlaneError> {
        let handle = self
            .registry
            .get(&component_id)
            .ok_or(ControlPlaneError::UnknownComponent(component_id))?;

        if handle.mark_started() {
            info!(
                component_id = %component_id,
                package = %handle.config().package,
                kind = %handle.kind(),
                "Component reported started"
            );
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), ControlPlaneError> {
        debug!("Ping");
        Ok(())
    }

    async fn relay_log(
        &self,
        record: LogRecord,
        tags: BTreeMap<String, String>,
    ) -> Result<(), ControlPlaneError> {
        let _guard = self.relay_lock.lock();
        self.sink.write(&record, &tags);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monarch::handle::WorkerHandle;
    use crate::monarch::state::{StartOutcome, WorkerState};
    use cashbox_telemetry::MemoryLogSink;
    use cashbox_types::{ComponentConfiguration, ComponentKind, LogLevel};

    fn service() -> (Arc<WorkerRegistry>, Arc<MemoryLogSink>, MonarchControlService) {
        let registry = Arc::new(WorkerRegistry::new());
        let sink = Arc::new(MemoryLogSink::new());
        let service = MonarchControlService::new(registry.clone(), sink.clone());
        (registry, sink, service)
    }

    #[tokio::test]
    async fn test_report_started_resolves_signal() {
        let (registry, _, service) = service();
        let handle = Arc::new(WorkerHandle::new(
            ComponentConfiguration::new(Uuid::new_v4(), "InMemory.Queue", "1.0.0"),
            ComponentKind::Queue,
            10,
        ));
        registry.insert(handle.clone()).unwrap();
        handle.transition(WorkerState::Starting);

        service.report_started(handle.id()).await.unwrap();

        assert_eq!(handle.started().wait().await, StartOutcome::Started);
        assert_eq!(handle.state(), WorkerState::Started);
    }

    #[tokio::test]
    async fn test_report_started_unknown_component() {
        let (_, _, service) = service();
        let id = Uuid::new_v4();
        let err = service.report_started(id).await.unwrap_err();
        assert!(matches!(err, ControlPlaneError::UnknownComponent(unknown) if unknown == id));
    }

    #[tokio::test]
    async fn test_relay_log_reaches_sink() {
        let (_, sink, service) = service();
        let tags: BTreeMap<_, _> = [("component_id".to_string(), "c1".to_string())].into();

        service
            .relay_log(LogRecord::new(LogLevel::Warn, "disk almost full"), tags.clone())
            .await
            .unwrap();
        service.ping().await.unwrap();

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].0.rendered_message, "disk almost full");
        assert_eq!(records[0].1, tags);
    }
}
