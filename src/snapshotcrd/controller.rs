//! Snapshot CRD Controller
//!
//! Periodically inspects the installed VolumeSnapshot CRDs and reports
//! `SnapshotCRDControllerUpgradeable` on the Storage singleton. Only this
//! one condition is ever written; all others are carried over untouched.

use crate::crd::{ConditionStatus, OperatorCondition, Storage, GLOBAL_CONFIG_NAME};
use crate::domain::ports::{CrdInventory, StorageStatusClient};
use crate::error::{Error, Result};
use crate::snapshotcrd::classifier::{
    alpha_only_resources, DiscoveredVersionSet, TrackedResource, SNAPSHOT_CRDS,
};
use crate::status::{merge, ConditionUpdate};
use async_trait::async_trait;
use backoff::ExponentialBackoff;
use chrono::{DateTime, Utc};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, ListParams, PostParams};
use kube::Client;
use prometheus::IntGauge;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Prefix of every condition this controller owns
pub const CONDITIONS_PREFIX: &str = "SnapshotCRDController";

const REASON_AS_EXPECTED: &str = "AsExpected";
const REASON_ALPHA_DETECTED: &str = "AlphaDetected";

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the snapshot CRD controller
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Interval between periodic syncs
    pub resync_interval: Duration,
    /// First delay after an update conflict
    pub conflict_initial_backoff: Duration,
    /// Give up retrying conflicts after this long
    pub conflict_retry_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            resync_interval: Duration::from_secs(60),
            conflict_initial_backoff: Duration::from_millis(100),
            conflict_retry_timeout: Duration::from_secs(10),
        }
    }
}

impl ControllerConfig {
    /// Reject settings the controller cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.resync_interval.is_zero() {
            return Err(Error::Configuration(
                "resync interval must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Controller
// =============================================================================

/// Result of one sync
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Upgrade verdict that was reported
    pub upgradeable: bool,
    /// Whether the Storage status was written
    pub updated: bool,
}

/// Reconciles the snapshot CRD Upgradeable condition
pub struct SnapshotCrdController<I, S> {
    config: ControllerConfig,
    inventory: I,
    storage: S,
    tracked: &'static [TrackedResource],
    upgradeable_gauge: Option<IntGauge>,
}

impl<I, S> SnapshotCrdController<I, S>
where
    I: CrdInventory,
    S: StorageStatusClient,
{
    /// Create a controller watching the external-snapshotter CRDs
    pub fn new(config: ControllerConfig, inventory: I, storage: S) -> Self {
        let upgradeable_gauge = IntGauge::new(
            "snapshot_crd_upgradeable",
            "1 if the installed VolumeSnapshot CRDs allow an upgrade, 0 otherwise",
        )
        .ok();
        if let Some(gauge) = &upgradeable_gauge {
            // Already registered when more than one controller is built in-process
            let _ = prometheus::register(Box::new(gauge.clone()));
        }

        Self {
            config,
            inventory,
            storage,
            tracked: SNAPSHOT_CRDS,
            upgradeable_gauge,
        }
    }

    /// Condition type written by this controller
    pub fn condition_type(&self) -> String {
        format!("{}{}", CONDITIONS_PREFIX, crate::status::UPGRADEABLE_SUFFIX)
    }

    /// Build the condition update for the CRDs currently installed
    pub fn evaluate(&self, discovered: &DiscoveredVersionSet) -> ConditionUpdate {
        let blocking = alpha_only_resources(self.tracked, discovered);
        if blocking.is_empty() {
            return ConditionUpdate::upgradeable(CONDITIONS_PREFIX, true, REASON_AS_EXPECTED, "");
        }

        let names: Vec<&str> = blocking.iter().map(|r| r.name).collect();
        let expected = blocking[0].expected_versions.join(", ");
        ConditionUpdate::upgradeable(
            CONDITIONS_PREFIX,
            false,
            REASON_ALPHA_DETECTED,
            format!(
                "Unable to update cluster as only alpha versions of {} are installed. \
                 Remove these CRDs or install one of versions [{}] to allow the upgrade to proceed.",
                names.join(", "),
                expected
            ),
        )
    }

    /// Run one reconciliation: discover, classify, merge and persist.
    ///
    /// `now` stamps the condition if its status changes. Update conflicts
    /// retry the whole read-modify-write with exponential backoff.
    pub async fn sync(&self, now: DateTime<Utc>) -> Result<SyncOutcome> {
        let discovered = self.inventory.discover().await?;
        debug!("Discovered {} CRDs", discovered.len());

        let update = self.evaluate(&discovered);
        let upgradeable = update.status == ConditionStatus::True;
        if let Some(gauge) = &self.upgradeable_gauge {
            gauge.set(i64::from(upgradeable));
        }

        let policy = ExponentialBackoff {
            initial_interval: self.config.conflict_initial_backoff,
            max_elapsed_time: Some(self.config.conflict_retry_timeout),
            ..Default::default()
        };
        let update = &update;
        let updated = backoff::future::retry(policy, || async move {
            self.apply(update, now).await.map_err(|e| {
                if e.is_conflict() {
                    debug!("Conflict updating Storage status, retrying: {}", e);
                    backoff::Error::transient(e)
                } else {
                    backoff::Error::permanent(e)
                }
            })
        })
        .await?;

        if updated {
            info!(
                "Set {} to {} ({})",
                update.r#type, update.status, update.reason
            );
        }

        Ok(SyncOutcome { upgradeable, updated })
    }

    async fn apply(&self, update: &ConditionUpdate, now: DateTime<Utc>) -> Result<bool> {
        let storage = self.storage.get().await?;
        if !storage.is_managed() {
            debug!(
                "Storage {} is {}, skipping",
                storage.name(),
                storage.spec.management_state
            );
            return Ok(false);
        }

        let current = storage.conditions();
        let merged = merge(current, update.clone(), now);
        if merged.as_slice() == current {
            debug!("{} unchanged", update.r#type);
            return Ok(false);
        }

        self.storage.update_conditions(&storage, merged).await?;
        Ok(true)
    }

    /// Sync every `resync_interval` until `cancel` fires.
    ///
    /// An in-flight sync is abandoned on cancellation.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        self.config.validate()?;
        info!(
            "Starting snapshot CRD controller (resync every {:?})",
            self.config.resync_interval
        );

        let mut ticker = tokio::time::interval(self.config.resync_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        result = self.sync(Utc::now()) => match result {
                            Ok(_) => {}
                            Err(e) if e.is_retryable() => {
                                warn!("Snapshot CRD sync failed, retrying next resync: {}", e)
                            }
                            Err(e) => error!("Snapshot CRD sync failed: {}", e),
                        },
                    }
                }
            }
        }

        info!("Snapshot CRD controller stopped");
        Ok(())
    }
}

// =============================================================================
// Kubernetes Adapters
// =============================================================================

/// Lists CRDs through the apiextensions API
#[derive(Clone)]
pub struct KubeCrdInventory {
    api: Api<CustomResourceDefinition>,
}

impl KubeCrdInventory {
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }
}

#[async_trait]
impl CrdInventory for KubeCrdInventory {
    async fn discover(&self) -> Result<DiscoveredVersionSet> {
        let crds = self.api.list(&ListParams::default()).await?;
        Ok(DiscoveredVersionSet::from_crds(&crds.items))
    }
}

/// Reads and updates the `cluster` Storage resource
#[derive(Clone)]
pub struct KubeStorageClient {
    api: Api<Storage>,
}

impl KubeStorageClient {
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }
}

#[async_trait]
impl StorageStatusClient for KubeStorageClient {
    async fn get(&self) -> Result<Storage> {
        self.api
            .get_opt(GLOBAL_CONFIG_NAME)
            .await?
            .ok_or_else(|| Error::ResourceNotFound {
                kind: "Storage".into(),
                name: GLOBAL_CONFIG_NAME.into(),
            })
    }

    async fn update_conditions(
        &self,
        current: &Storage,
        conditions: Vec<OperatorCondition>,
    ) -> Result<Storage> {
        let mut updated = current.clone();
        updated.status.get_or_insert_with(Default::default).conditions = conditions;

        let data = serde_json::to_vec(&updated)?;
        match self
            .api
            .replace_status(current.name(), &PostParams::default(), data)
            .await
        {
            Ok(storage) => Ok(storage),
            Err(kube::Error::Api(resp)) if resp.code == 409 => Err(Error::Conflict {
                kind: "Storage".into(),
                name: current.name().into(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}
