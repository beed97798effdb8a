//! Storage CRD
//!
//! The cluster-scoped operator resource. A single instance named
//! `cluster` carries the conditions every storage sub-controller reports.

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Name of the singleton Storage resource
pub const GLOBAL_CONFIG_NAME: &str = "cluster";

// =============================================================================
// Storage CRD
// =============================================================================

/// Storage configures and reports on the cluster storage operator.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "operator.openshift.io",
    version = "v1",
    kind = "Storage",
    plural = "storages",
    status = "StorageStatus",
    printcolumn = r#"{"name": "State", "type": "string", "jsonPath": ".spec.managementState"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#,
    namespaced = false
)]
#[serde(rename_all = "camelCase")]
pub struct StorageSpec {
    /// Whether and how the operator should manage the component
    #[serde(default)]
    pub management_state: ManagementState,

    /// Log level for the managed operands
    #[serde(default)]
    pub log_level: Option<LogLevel>,

    /// Log level for the operator itself
    #[serde(default)]
    pub operator_log_level: Option<LogLevel>,
}

// =============================================================================
// Sub-Types
// =============================================================================

/// Management state of an operator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ManagementState {
    #[default]
    Managed,
    Unmanaged,
    Removed,
    Force,
}

impl std::fmt::Display for ManagementState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ManagementState::Managed => write!(f, "Managed"),
            ManagementState::Unmanaged => write!(f, "Unmanaged"),
            ManagementState::Removed => write!(f, "Removed"),
            ManagementState::Force => write!(f, "Force"),
        }
    }
}

/// Operand log verbosity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum LogLevel {
    #[default]
    Normal,
    Debug,
    Trace,
    TraceAll,
}

// =============================================================================
// Status
// =============================================================================

/// Observed state of the Storage resource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StorageStatus {
    /// Conditions reported by the operator's controllers
    #[serde(default)]
    pub conditions: Vec<OperatorCondition>,

    /// Generation of the spec last acted upon
    #[serde(default)]
    pub observed_generation: Option<i64>,

    /// Operator version
    #[serde(default)]
    pub version: Option<String>,
}

/// Status of a condition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}

impl From<bool> for ConditionStatus {
    fn from(value: bool) -> Self {
        if value {
            ConditionStatus::True
        } else {
            ConditionStatus::False
        }
    }
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConditionStatus::True => write!(f, "True"),
            ConditionStatus::False => write!(f, "False"),
            ConditionStatus::Unknown => write!(f, "Unknown"),
        }
    }
}

/// A typed, timestamped status entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OperatorCondition {
    /// Type of condition; unique within a list
    pub r#type: String,
    /// True, False or Unknown
    pub status: ConditionStatus,
    /// Last time the status changed
    #[serde(default)]
    #[schemars(with = "Option<String>")]
    pub last_transition_time: Option<DateTime<Utc>>,
    /// Machine-readable reason
    #[serde(default)]
    pub reason: String,
    /// Human-readable message
    #[serde(default)]
    pub message: String,
}

// =============================================================================
// Implementations
// =============================================================================

impl Storage {
    /// Get the resource name
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or(GLOBAL_CONFIG_NAME)
    }

    /// Conditions currently reported, empty if there is no status yet
    pub fn conditions(&self) -> &[OperatorCondition] {
        self.status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or(&[])
    }

    /// Check if the operator is expected to act on this resource
    pub fn is_managed(&self) -> bool {
        matches!(
            self.spec.management_state,
            ManagementState::Managed | ManagementState::Force
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::CustomResourceExt;

    #[test]
    fn test_condition_status_from_bool() {
        assert_eq!(ConditionStatus::from(true), ConditionStatus::True);
        assert_eq!(ConditionStatus::from(false), ConditionStatus::False);
        assert_eq!(ConditionStatus::default(), ConditionStatus::Unknown);
    }

    #[test]
    fn test_condition_serialization() {
        let cond = OperatorCondition {
            r#type: "SnapshotCRDControllerUpgradeable".into(),
            status: ConditionStatus::True,
            last_transition_time: None,
            reason: "AsExpected".into(),
            message: String::new(),
        };
        let json = serde_json::to_value(&cond).unwrap();
        assert_eq!(json["type"], "SnapshotCRDControllerUpgradeable");
        assert_eq!(json["status"], "True");
        assert_eq!(json["lastTransitionTime"], serde_json::Value::Null);
    }

    #[test]
    fn test_storage_defaults() {
        let storage = Storage::new(GLOBAL_CONFIG_NAME, StorageSpec::default());
        assert_eq!(storage.name(), "cluster");
        assert!(storage.conditions().is_empty());
        assert!(storage.is_managed());
    }

    #[test]
    fn test_crd_is_cluster_scoped() {
        let crd = Storage::crd();
        assert_eq!(crd.spec.scope, "Cluster");
        assert_eq!(crd.spec.group, "operator.openshift.io");
    }
}
