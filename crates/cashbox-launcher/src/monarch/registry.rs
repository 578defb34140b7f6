//! # Worker Registry
//!
//! Concurrent map of every component the supervisor launched.
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                WorkerRegistry               │
//! │   component id ──► Arc<WorkerHandle>        │
//! │        ▲                  ▲                 │
//! │        │                  │                 │
//! │  start_component    ControlPlane service    │
//! │  (insert)           (report_started lookup) │
//! └─────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::info;
use uuid::Uuid;

use super::error::SupervisorError;
use super::handle::WorkerHandle;
use super::state::WorkerState;

#[derive(Debug, Default)]
pub struct WorkerRegistry {
    workers: DashMap<Uuid, Arc<WorkerHandle>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handle. A component id can be registered only once.
    pub fn insert(&self, handle: Arc<WorkerHandle>) -> Result<(), SupervisorError> {
        match self.workers.entry(handle.id()) {
            Entry::Occupied(_) => Err(SupervisorError::DuplicateComponent(handle.id())),
            Entry::Vacant(slot) => {
                slot.insert(handle);
                Ok(())
            }
        }
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<WorkerHandle>> {
        self.workers.get(id).map(|entry| entry.value().clone())
    }

    pub fn handles(&self) -> Vec<Arc<WorkerHandle>> {
        self.workers.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Log a status table of every worker.
    pub fn print_status(&self) {
        info!("===========================================");
        info!("  WORKER STATUS");
        info!("===========================================");

        for handle in self.handles() {
            let state = handle.state();
            let icon = match state {
                WorkerState::Started => "✅",
                WorkerState::Crashed => "❌",
                WorkerState::Stopped => "⏹️ ",
                _ => "⏳",
            };
            info!(
                "  {} {:8} {:30} {}",
                icon,
                handle.kind().name(),
                handle.config().package,
                state
            );
        }

        info!("===========================================");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cashbox_types::{ComponentConfiguration, ComponentKind};

    fn handle(id: Uuid) -> Arc<WorkerHandle> {
        Arc::new(WorkerHandle::new(
            ComponentConfiguration::new(id, "InMemory.Helper", "1.0.0"),
            ComponentKind::Helper,
            10,
        ))
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let registry = WorkerRegistry::new();
        let id = Uuid::new_v4();

        registry.insert(handle(id)).unwrap();
        let err = registry.insert(handle(id)).unwrap_err();

        assert!(matches!(err, SupervisorError::DuplicateComponent(dup) if dup == id));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_lookup() {
        let registry = WorkerRegistry::new();
        let id = Uuid::new_v4();
        assert!(registry.is_empty());

        registry.insert(handle(id)).unwrap();
        assert_eq!(registry.get(&id).map(|h| h.id()), Some(id));
        assert!(registry.get(&Uuid::new_v4()).is_none());
    }
}
