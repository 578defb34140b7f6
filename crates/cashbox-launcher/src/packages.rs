//! # Package Cache
//!
//! Before a worker is spawned its package must be available locally.
//!
//! ```text
//! <packages folder>/
//! └── <package>/
//!     └── <version>/      ← LocalPackageCache::local_path
//! ```
//!
//! Packages compiled into the launcher (see `plugins::builtin`) need no
//! files on disk.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use cashbox_types::ComponentConfiguration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum PackageError {
    #[error("package {package} {version} is not available locally")]
    NotFound { package: String, version: String },

    #[error("package cache I/O failed at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid package reference: {0}")]
    Invalid(String),
}

/// Where a prepared package lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageLocation {
    /// Compiled into the launcher.
    Builtin,
    /// Extracted under the package cache.
    Directory(PathBuf),
}

/// Makes component packages available before their worker starts.
#[async_trait]
pub trait PackageDownloader: Send + Sync {
    /// Cache directory of one package version.
    fn local_path(&self, package: &str, version: &str) -> Result<PathBuf, PackageError>;

    /// Ensure the component's package is present, fetching it if needed.
    async fn ensure_downloaded(
        &self,
        component: &ComponentConfiguration,
    ) -> Result<PackageLocation, PackageError>;

    /// Prepare the cache ahead of the first component. Best-effort.
    async fn warm_up(&self) -> Result<(), PackageError>;
}

/// Filesystem-only cache: packages must already be extracted under `root`.
#[derive(Debug, Clone)]
pub struct LocalPackageCache {
    root: PathBuf,
    builtins: HashSet<String>,
}

impl LocalPackageCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            builtins: HashSet::new(),
        }
    }

    /// Treat `packages` as always available.
    #[must_use]
    pub fn with_builtins<I, S>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.builtins.extend(packages.into_iter().map(Into::into));
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn is_safe_segment(value: &str) -> bool {
    let path = Path::new(value);
    if value.trim().is_empty() || path.is_absolute() {
        return false;
    }
    let mut components = path.components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

#[async_trait]
impl PackageDownloader for LocalPackageCache {
    fn local_path(&self, package: &str, version: &str) -> Result<PathBuf, PackageError> {
        if !is_safe_segment(package) {
            return Err(PackageError::Invalid(format!("package name '{package}'")));
        }
        let version = if version.trim().is_empty() { "latest" } else { version };
        if !is_safe_segment(version) {
            return Err(PackageError::Invalid(format!("package version '{version}'")));
        }
        Ok(self.root.join(package).join(version))
    }

    async fn ensure_downloaded(
        &self,
        component: &ComponentConfiguration,
    ) -> Result<PackageLocation, PackageError> {
        if self.builtins.contains(&component.package) {
            debug!(package = %component.package, "Using built-in package");
            return Ok(PackageLocation::Builtin);
        }

        let path = self.local_path(&component.package, &component.version)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => {
                debug!(package = %component.package, path = ?path, "Package found in cache");
                Ok(PackageLocation::Directory(path))
            }
            Ok(_) => Err(PackageError::NotFound {
                package: component.package.clone(),
                version: component.version.clone(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(PackageError::NotFound {
                package: component.package.clone(),
                version: component.version.clone(),
            }),
            Err(source) => Err(PackageError::Io { path, source }),
        }
    }

    async fn warm_up(&self) -> Result<(), PackageError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| PackageError::Io {
                path: self.root.clone(),
                source,
            })?;

        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|source| PackageError::Io {
                path: self.root.clone(),
                source,
            })?;
        let mut cached = 0usize;
        while let Ok(Some(_)) = entries.next_entry().await {
            cached += 1;
        }

        info!(root = ?self.root, cached, builtin = self.builtins.len(), "Package cache ready");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn component(package: &str, version: &str) -> ComponentConfiguration {
        ComponentConfiguration::new(Uuid::new_v4(), package, version)
    }

    #[test]
    fn test_local_path_layout() {
        let cache = LocalPackageCache::new("/srv/packages");
        assert_eq!(
            cache.local_path("Vendor.Queue", "1.3.0").unwrap(),
            PathBuf::from("/srv/packages/Vendor.Queue/1.3.0")
        );
        assert_eq!(
            cache.local_path("Vendor.Queue", "").unwrap(),
            PathBuf::from("/srv/packages/Vendor.Queue/latest")
        );
    }

    #[test]
    fn test_rejects_path_escapes() {
        let cache = LocalPackageCache::new("/srv/packages");
        for name in ["../etc", "/abs", "a/b", "..", ""] {
            assert!(
                matches!(cache.local_path(name, "1.0"), Err(PackageError::Invalid(_))),
                "accepted {name:?}"
            );
        }
        assert!(matches!(
            cache.local_path("pkg", "../1.0"),
            Err(PackageError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_builtin_and_cached_packages() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalPackageCache::new(dir.path()).with_builtins(["InMemory.Queue"]);
        cache.warm_up().await.unwrap();

        assert_eq!(
            cache
                .ensure_downloaded(&component("InMemory.Queue", "1.0"))
                .await
                .unwrap(),
            PackageLocation::Builtin
        );

        let err = cache
            .ensure_downloaded(&component("Vendor.Scu", "2.0"))
            .await
            .unwrap_err();
        assert!(matches!(err, PackageError::NotFound { .. }));

        std::fs::create_dir_all(dir.path().join("Vendor.Scu").join("2.0")).unwrap();
        assert_eq!(
            cache
                .ensure_downloaded(&component("Vendor.Scu", "2.0"))
                .await
                .unwrap(),
            PackageLocation::Directory(dir.path().join("Vendor.Scu").join("2.0"))
        );
    }
}
