//! # Plugin Registry
//!
//! Maps a component's package name to the factory that builds its business
//! implementation.
//!
//! ```text
//! ComponentConfiguration.package ──► PluginRegistry ──► Arc<dyn Plugin>
//!                                                           │
//!        ComponentKind::Queue           ──► create_pos      │
//!        ComponentKind::SignatureDevice ──► create_de_scu ─►│ (first that
//!                                       ──► create_it_scu   │  resolves)
//!        ComponentKind::Helper          ──► create_helper   ▼
//!                                                        Business
//! ```
//!
//! Registration is explicit; nothing is discovered at runtime.

pub mod builtin;

use std::collections::HashMap;
use std::sync::Arc;

use cashbox_hosting::{
    BusinessService, DeScuEndpoints, DeScuService, EndpointBinder, ItScuEndpoints, ItScuService,
    PosEndpoints, PosService,
};
use cashbox_types::interfaces::{DeScu, Helper, ItScu, Pos};
use cashbox_types::{ComponentConfiguration, ComponentKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("no plugin registered for package '{0}'")]
    UnknownPackage(String),

    #[error("package '{package}' does not provide a {kind} component")]
    MissingCapability { package: String, kind: ComponentKind },

    #[error("package '{package}' rejected its configuration: {message}")]
    Configuration { package: String, message: String },
}

/// Factories for the business interfaces a package can provide.
///
/// Every factory defaults to "not provided".
pub trait Plugin: Send + Sync {
    fn create_pos(
        &self,
        _config: &ComponentConfiguration,
    ) -> Result<Option<Arc<dyn Pos>>, PluginError> {
        Ok(None)
    }

    fn create_de_scu(
        &self,
        _config: &ComponentConfiguration,
    ) -> Result<Option<Arc<dyn DeScu>>, PluginError> {
        Ok(None)
    }

    fn create_it_scu(
        &self,
        _config: &ComponentConfiguration,
    ) -> Result<Option<Arc<dyn ItScu>>, PluginError> {
        Ok(None)
    }

    fn create_helper(
        &self,
        _config: &ComponentConfiguration,
    ) -> Result<Option<Arc<dyn Helper>>, PluginError> {
        Ok(None)
    }
}

/// A resolved business implementation.
#[derive(Clone)]
pub enum Business {
    Pos(Arc<dyn Pos>),
    DeScu(Arc<dyn DeScu>),
    ItScu(Arc<dyn ItScu>),
    Helper(Arc<dyn Helper>),
}

impl Business {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pos(_) => "pos",
            Self::DeScu(_) => "scu-de",
            Self::ItScu(_) => "scu-it",
            Self::Helper(_) => "helper",
        }
    }

    /// The hostable service; helpers have none.
    pub fn service(&self) -> Option<Arc<dyn BusinessService>> {
        match self {
            Self::Pos(pos) => Some(Arc::new(PosService::new(pos.clone()))),
            Self::DeScu(scu) => Some(Arc::new(DeScuService::new(scu.clone()))),
            Self::ItScu(scu) => Some(Arc::new(ItScuService::new(scu.clone()))),
            Self::Helper(_) => None,
        }
    }

    /// REST route table of the hostable service.
    pub fn endpoints(&self) -> Option<&'static dyn EndpointBinder> {
        match self {
            Self::Pos(_) => Some(&PosEndpoints),
            Self::DeScu(_) => Some(&DeScuEndpoints),
            Self::ItScu(_) => Some(&ItScuEndpoints),
            Self::Helper(_) => None,
        }
    }

    pub fn helper(&self) -> Option<Arc<dyn Helper>> {
        match self {
            Self::Helper(helper) => Some(helper.clone()),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Business {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Business").field(&self.name()).finish()
    }
}

#[derive(Default, Clone)]
pub struct PluginRegistry {
    plugins: HashMap<String, Arc<dyn Plugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the in-memory reference packages.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtin::register(&mut registry);
        registry
    }

    /// Register `plugin` for `package`, replacing any previous registration.
    pub fn register(&mut self, package: impl Into<String>, plugin: Arc<dyn Plugin>) -> &mut Self {
        self.plugins.insert(package.into(), plugin);
        self
    }

    pub fn get(&self, package: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins.get(package).cloned()
    }

    pub fn packages(&self) -> impl Iterator<Item = &str> {
        self.plugins.keys().map(String::as_str)
    }

    /// Build the business implementation for a component.
    ///
    /// Signature devices try the German interface first, then the Italian
    /// one.
    pub fn resolve(
        &self,
        config: &ComponentConfiguration,
        kind: ComponentKind,
    ) -> Result<Business, PluginError> {
        let plugin = self
            .get(&config.package)
            .ok_or_else(|| PluginError::UnknownPackage(config.package.clone()))?;

        let business = match kind {
            ComponentKind::Queue => plugin.create_pos(config)?.map(Business::Pos),
            ComponentKind::SignatureDevice => match plugin.create_de_scu(config)? {
                Some(scu) => Some(Business::DeScu(scu)),
                None => plugin.create_it_scu(config)?.map(Business::ItScu),
            },
            ComponentKind::Helper => plugin.create_helper(config)?.map(Business::Helper),
        };

        business.ok_or_else(|| PluginError::MissingCapability {
            package: config.package.clone(),
            kind,
        })
    }
}
