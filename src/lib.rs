//! Cluster Storage Operator
//!
//! Reconciles cluster-wide storage status and bootstraps per-platform CSI
//! driver operators.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                     Snapshot CRD Controller                          │
//! │                                                                      │
//! │   CrdInventory ──► classify ──► ConditionUpdate ──► merge ──► Storage │
//! │   (apiextensions)  (alpha-only?)  (<Prefix>Upgradeable)  (status)     │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │                     CSI Driver Operators                             │
//! │                                                                      │
//! │   EnvironmentReader ──► build_config ──► CsiOperatorConfig           │
//! │                                          (assets + image replacer)   │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`snapshotcrd`]: VolumeSnapshot CRD classification and its controller
//! - [`status`]: Condition list merging
//! - [`csidriveroperator`]: CSI driver operator configuration
//! - [`crd`]: The Storage custom resource
//! - [`domain`]: Port traits for cluster, environment and asset access
//! - [`error`]: Error types and handling

pub mod crd;
pub mod csidriveroperator;
pub mod domain;
pub mod error;
pub mod snapshotcrd;
pub mod status;

// Re-export commonly used types
pub use crd::{
    ConditionStatus, ManagementState, OperatorCondition, Storage, StorageSpec, StorageStatus,
    GLOBAL_CONFIG_NAME,
};

pub use csidriveroperator::{
    build_config, configs_for_platform, AssetBundle, CsiOperatorConfig, DirAssetLoader,
    DriverDescriptor, ImageReplacer, ImageVar, PlatformType,
};

pub use domain::ports::{
    AssetLoader, CrdInventory, EnvironmentReader, MapEnvironment, ProcessEnvironment,
    StorageStatusClient,
};

pub use error::{Error, ErrorAction, Result};

pub use snapshotcrd::{
    classify, ControllerConfig, DiscoveredVersionSet, KubeCrdInventory, KubeStorageClient,
    SnapshotCrdController, TrackedResource, SNAPSHOT_CRDS,
};

pub use status::{merge, ConditionUpdate};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
