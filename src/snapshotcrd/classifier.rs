//! CRD version classification
//!
//! Decides whether the snapshot CRDs installed in the cluster allow an
//! upgrade. A CRD that is served only at alpha versions blocks it; a CRD
//! that is missing, or that has at least one beta or stable version, does
//! not.

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// Tracked Resources
// =============================================================================

/// A CRD whose registered versions gate the upgrade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackedResource {
    /// Full CRD name (`<plural>.<group>`)
    pub name: &'static str,
    /// Kind served by the CRD
    pub kind: &'static str,
    /// Versions the operator expects to find served
    pub expected_versions: &'static [&'static str],
}

/// The external-snapshotter CRDs
pub const SNAPSHOT_CRDS: &[TrackedResource] = &[
    TrackedResource {
        name: "volumesnapshots.snapshot.storage.k8s.io",
        kind: "VolumeSnapshot",
        expected_versions: &["v1beta1", "v1"],
    },
    TrackedResource {
        name: "volumesnapshotcontents.snapshot.storage.k8s.io",
        kind: "VolumeSnapshotContent",
        expected_versions: &["v1beta1", "v1"],
    },
    TrackedResource {
        name: "volumesnapshotclasses.snapshot.storage.k8s.io",
        kind: "VolumeSnapshotClass",
        expected_versions: &["v1beta1", "v1"],
    },
];

// =============================================================================
// Version Stability
// =============================================================================

/// Stability level encoded in a Kubernetes API version name
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VersionStability {
    Alpha,
    Beta,
    Stable,
}

impl VersionStability {
    /// Classify a version such as `v1alpha1`, `v1beta1` or `v1`.
    ///
    /// This is a substring match on the `v<major><stability><minor>`
    /// convention; anything without `alpha` or `beta` counts as stable.
    pub fn of(version: &str) -> Self {
        if version.contains("alpha") {
            VersionStability::Alpha
        } else if version.contains("beta") {
            VersionStability::Beta
        } else {
            VersionStability::Stable
        }
    }
}

impl std::fmt::Display for VersionStability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VersionStability::Alpha => write!(f, "alpha"),
            VersionStability::Beta => write!(f, "beta"),
            VersionStability::Stable => write!(f, "stable"),
        }
    }
}

// =============================================================================
// Discovered Versions
// =============================================================================

/// CRD name to the versions registered for it in the cluster
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveredVersionSet {
    versions: BTreeMap<String, BTreeSet<String>>,
}

impl DiscoveredVersionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the versions of one CRD, merging with anything already known
    pub fn insert<I, S>(&mut self, name: impl Into<String>, versions: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.versions
            .entry(name.into())
            .or_default()
            .extend(versions.into_iter().map(Into::into));
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn with<I, S>(mut self, name: impl Into<String>, versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(name, versions);
        self
    }

    /// Build from CRD objects as returned by the apiextensions API
    pub fn from_crds<'a>(crds: impl IntoIterator<Item = &'a CustomResourceDefinition>) -> Self {
        let mut set = Self::new();
        for crd in crds {
            let Some(name) = crd.metadata.name.as_deref() else {
                continue;
            };
            set.insert(name, crd.spec.versions.iter().map(|v| v.name.clone()));
        }
        set
    }

    /// Versions registered for a CRD, `None` if it is not installed
    pub fn get(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.versions.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }
}

// =============================================================================
// Classification
// =============================================================================

/// Check if a version set is non-empty and contains only alpha versions
pub fn is_alpha_only<'a>(versions: impl IntoIterator<Item = &'a String>) -> bool {
    let mut seen = false;
    for version in versions {
        if VersionStability::of(version) != VersionStability::Alpha {
            return false;
        }
        seen = true;
    }
    seen
}

/// Tracked resources that are installed with alpha versions only, in
/// `tracked` order
pub fn alpha_only_resources<'a>(
    tracked: &'a [TrackedResource],
    discovered: &DiscoveredVersionSet,
) -> Vec<&'a TrackedResource> {
    tracked
        .iter()
        .filter(|res| discovered.get(res.name).is_some_and(|v| is_alpha_only(v)))
        .collect()
}

/// Upgrade verdict: `true` unless some tracked resource is alpha-only
pub fn classify(tracked: &[TrackedResource], discovered: &DiscoveredVersionSet) -> bool {
    alpha_only_resources(tracked, discovered).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::{
        CustomResourceDefinitionSpec, CustomResourceDefinitionVersion,
    };
    use kube::api::ObjectMeta;

    const SNAPSHOTS: &str = "volumesnapshots.snapshot.storage.k8s.io";
    const CONTENTS: &str = "volumesnapshotcontents.snapshot.storage.k8s.io";
    const CLASSES: &str = "volumesnapshotclasses.snapshot.storage.k8s.io";

    fn all_at(version: &str) -> DiscoveredVersionSet {
        DiscoveredVersionSet::new()
            .with(SNAPSHOTS, [version])
            .with(CONTENTS, [version])
            .with(CLASSES, [version])
    }

    #[test]
    fn test_version_stability() {
        assert_eq!(VersionStability::of("v1alpha1"), VersionStability::Alpha);
        assert_eq!(VersionStability::of("v1beta1"), VersionStability::Beta);
        assert_eq!(VersionStability::of("v1"), VersionStability::Stable);
        assert_eq!(VersionStability::of("v2"), VersionStability::Stable);
    }

    #[test]
    fn test_no_crds_is_upgradeable() {
        assert!(classify(SNAPSHOT_CRDS, &DiscoveredVersionSet::new()));
    }

    #[test]
    fn test_beta_crds_are_upgradeable() {
        assert!(classify(SNAPSHOT_CRDS, &all_at("v1beta1")));
        assert!(classify(SNAPSHOT_CRDS, &all_at("v1")));
    }

    #[test]
    fn test_alpha_crds_block_upgrade() {
        let discovered = all_at("v1alpha1");
        assert!(!classify(SNAPSHOT_CRDS, &discovered));
        assert_eq!(alpha_only_resources(SNAPSHOT_CRDS, &discovered).len(), 3);
    }

    #[test]
    fn test_mixed_crds_block_upgrade() {
        let discovered = DiscoveredVersionSet::new()
            .with(SNAPSHOTS, ["v1alpha1", "v1beta1"])
            .with(CONTENTS, ["v1beta1"])
            .with(CLASSES, ["v1alpha1"]);

        assert!(!classify(SNAPSHOT_CRDS, &discovered));
        let blocking: Vec<_> = alpha_only_resources(SNAPSHOT_CRDS, &discovered)
            .into_iter()
            .map(|r| r.kind)
            .collect();
        assert_eq!(blocking, vec!["VolumeSnapshotClass"]);
    }

    #[test]
    fn test_alpha_and_beta_on_one_crd_does_not_block() {
        let discovered = DiscoveredVersionSet::new().with(SNAPSHOTS, ["v1alpha1", "v1beta1"]);
        assert!(classify(SNAPSHOT_CRDS, &discovered));
    }

    #[test]
    fn test_untracked_crds_are_ignored() {
        let discovered = DiscoveredVersionSet::new()
            .with("widgets.example.com", ["v1alpha1"])
            .with(CONTENTS, ["v1"]);
        assert!(classify(SNAPSHOT_CRDS, &discovered));
    }

    #[test]
    fn test_registered_without_versions_does_not_block() {
        let discovered = DiscoveredVersionSet::new().with(SNAPSHOTS, Vec::<String>::new());
        assert_eq!(discovered.get(SNAPSHOTS).map(|v| v.len()), Some(0));
        assert!(classify(SNAPSHOT_CRDS, &discovered));
    }

    #[test]
    fn test_from_crds() {
        let crd = |name: &str, versions: &[&str]| CustomResourceDefinition {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            spec: CustomResourceDefinitionSpec {
                versions: versions
                    .iter()
                    .map(|v| CustomResourceDefinitionVersion {
                        name: v.to_string(),
                        ..Default::default()
                    })
                    .collect(),
                ..Default::default()
            },
            status: None,
        };
        let crds = vec![
            crd(SNAPSHOTS, &["v1alpha1", "v1beta1"]),
            crd(CLASSES, &["v1alpha1"]),
        ];

        let discovered = DiscoveredVersionSet::from_crds(&crds);
        assert_eq!(discovered.len(), 2);
        assert!(discovered.get(CONTENTS).is_none());
        assert!(!classify(SNAPSHOT_CRDS, &discovered));
    }
}
