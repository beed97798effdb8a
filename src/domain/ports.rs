//! Domain Ports - Boundaries between the operator logic and the outside
//!
//! The classification and merge logic is pure; everything it needs from the
//! cluster, the process environment or the filesystem comes through these
//! traits. Adapters live next to the controllers that use them.

use crate::crd::{OperatorCondition, Storage};
use crate::error::Result;
use crate::snapshotcrd::DiscoveredVersionSet;
use async_trait::async_trait;
use std::collections::BTreeMap;

// =============================================================================
// Cluster Ports
// =============================================================================

/// Source of the CRDs currently registered in the cluster
#[async_trait]
pub trait CrdInventory: Send + Sync {
    /// Snapshot the CRD name to version mapping
    async fn discover(&self) -> Result<DiscoveredVersionSet>;
}

/// Read/write access to the singleton Storage resource
#[async_trait]
pub trait StorageStatusClient: Send + Sync {
    /// Fetch the current Storage resource
    async fn get(&self) -> Result<Storage>;

    /// Replace the status conditions of `current`.
    ///
    /// `current` must be the object returned by [`get`](Self::get); its
    /// resource version is used for optimistic locking and a stale
    /// version yields a conflict error.
    async fn update_conditions(
        &self,
        current: &Storage,
        conditions: Vec<OperatorCondition>,
    ) -> Result<Storage>;
}

// =============================================================================
// Process Ports
// =============================================================================

/// Named configuration values, typically the process environment
pub trait EnvironmentReader {
    /// Look up a value, `None` if unset
    fn get(&self, key: &str) -> Option<String>;

    /// Look up a value, empty string if unset
    fn get_or_empty(&self, key: &str) -> String {
        self.get(key).unwrap_or_default()
    }
}

/// Reads from `std::env`
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl EnvironmentReader for ProcessEnvironment {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Fixed in-memory environment
#[derive(Debug, Clone, Default)]
pub struct MapEnvironment {
    values: BTreeMap<String, String>,
}

impl MapEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapEnvironment {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl EnvironmentReader for MapEnvironment {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Loads manifest assets by relative path
pub trait AssetLoader {
    fn load(&self, path: &str) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_environment() {
        let env = MapEnvironment::new().with("OVIRT_DRIVER_IMAGE", "quay.io/ovirt/csi:4.6");
        assert_eq!(
            env.get("OVIRT_DRIVER_IMAGE").as_deref(),
            Some("quay.io/ovirt/csi:4.6")
        );
        assert_eq!(env.get("MISSING"), None);
        assert_eq!(env.get_or_empty("MISSING"), "");
    }

    #[test]
    fn test_map_environment_from_iter() {
        let env: MapEnvironment = [("A", "1"), ("B", "2")].into_iter().collect();
        assert_eq!(env.get_or_empty("B"), "2");
    }
}
