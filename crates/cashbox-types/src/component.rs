//! # Component Model
//!
//! A cashbox is made of components: signature-creation devices (SCUs),
//! queues and helpers. Each one is supervised as its own worker process.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::ConfigurationError;

/// Configuration of one supervised component.
///
/// Serialized with PascalCase field names; this is the exact document a
/// worker receives on its command line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ComponentConfiguration {
    /// Unique component identifier.
    pub id: Uuid,
    /// Logical package name resolved by the plugin registry.
    pub package: String,
    /// Package version.
    #[serde(default)]
    pub version: String,
    /// Bind URIs; the scheme selects the protocol. May be empty.
    #[serde(default, rename = "Url")]
    pub urls: Vec<String>,
    /// Opaque settings passed through to the business component.
    #[serde(default)]
    pub configuration: serde_json::Map<String, serde_json::Value>,
}

impl ComponentConfiguration {
    /// Create a configuration without bind URIs or settings.
    pub fn new(id: Uuid, package: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id,
            package: package.into(),
            version: version.into(),
            urls: Vec::new(),
            configuration: serde_json::Map::new(),
        }
    }

    /// Builder-style helper to append a bind URI.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.urls.push(url.into());
        self
    }

    /// Whether the component exposes any network surface.
    pub fn has_network_surface(&self) -> bool {
        !self.urls.is_empty()
    }
}

/// Kind of component, deciding which business interface a worker resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    /// POS business interface.
    Queue,
    /// SCU business interface; the country variant is resolved at runtime.
    SignatureDevice,
    /// Lifecycle hooks only, no network surface required.
    Helper,
}

impl ComponentKind {
    /// Stable lowercase name used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Queue => "queue",
            Self::SignatureDevice => "scu",
            Self::Helper => "helper",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a worker process receives: the component and its kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlebeianConfiguration {
    /// The component to host.
    pub component: ComponentConfiguration,
    /// Its kind.
    pub kind: ComponentKind,
}

/// All components of one installation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CashboxConfiguration {
    /// Cashbox identifier.
    #[serde(rename = "ftCashBoxId", default)]
    pub cashbox_id: Option<Uuid>,
    /// Signature-creation devices.
    #[serde(rename = "ftSignaturCreationDevices", default)]
    pub signature_devices: Vec<ComponentConfiguration>,
    /// Queues.
    #[serde(rename = "ftQueues", default)]
    pub queues: Vec<ComponentConfiguration>,
    /// Helpers.
    #[serde(rename = "helpers", default)]
    pub helpers: Vec<ComponentConfiguration>,
}

impl CashboxConfiguration {
    /// Load a cashbox configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigurationError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigurationError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigurationError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Components in start order: signature devices, then queues, then helpers.
    pub fn components(&self) -> Vec<(ComponentKind, &ComponentConfiguration)> {
        self.signature_devices
            .iter()
            .map(|c| (ComponentKind::SignatureDevice, c))
            .chain(self.queues.iter().map(|c| (ComponentKind::Queue, c)))
            .chain(self.helpers.iter().map(|c| (ComponentKind::Helper, c)))
            .collect()
    }

    /// Reject duplicate component identifiers.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let mut seen = std::collections::HashSet::new();
        for (_, component) in self.components() {
            if !seen.insert(component.id) {
                return Err(ConfigurationError::DuplicateComponent(component.id));
            }
            if component.package.trim().is_empty() {
                return Err(ConfigurationError::Invalid(format!(
                    "component {} has no package name",
                    component.id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(package: &str) -> ComponentConfiguration {
        ComponentConfiguration::new(Uuid::new_v4(), package, "1.3.0")
    }

    #[test]
    fn test_component_json_uses_pascal_case() {
        let config = component("InMemory.Queue").with_url("grpc://localhost:1502");
        let json = serde_json::to_value(&config).unwrap();

        assert!(json.get("Id").is_some());
        assert_eq!(json["Package"], "InMemory.Queue");
        assert_eq!(json["Url"][0], "grpc://localhost:1502");
    }

    #[test]
    fn test_missing_urls_default_to_empty() {
        let json = serde_json::json!({
            "Id": Uuid::new_v4(),
            "Package": "InMemory.Helper",
        });
        let config: ComponentConfiguration = serde_json::from_value(json).unwrap();

        assert!(config.urls.is_empty());
        assert!(!config.has_network_surface());
    }

    #[test]
    fn test_components_start_order() {
        let cashbox = CashboxConfiguration {
            cashbox_id: None,
            signature_devices: vec![component("scu")],
            queues: vec![component("queue-a"), component("queue-b")],
            helpers: vec![component("helper")],
        };

        let kinds: Vec<_> = cashbox.components().into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            kinds,
            vec![
                ComponentKind::SignatureDevice,
                ComponentKind::Queue,
                ComponentKind::Queue,
                ComponentKind::Helper
            ]
        );
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let queue = component("queue");
        let cashbox = CashboxConfiguration {
            queues: vec![queue.clone(), queue],
            ..Default::default()
        };

        assert!(matches!(
            cashbox.validate(),
            Err(ConfigurationError::DuplicateComponent(_))
        ));
    }

    #[test]
    fn test_load_cashbox_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cashbox.json");
        let id = Uuid::new_v4();
        std::fs::write(
            &path,
            serde_json::json!({
                "ftQueues": [{ "Id": id, "Package": "InMemory.Queue", "Url": ["rest://localhost:1503"] }]
            })
            .to_string(),
        )
        .unwrap();

        let cashbox = CashboxConfiguration::load(&path).unwrap();
        assert_eq!(cashbox.queues.len(), 1);
        assert_eq!(cashbox.queues[0].id, id);
    }
}
