//! CSI driver operator configuration
//!
//! Each managed CSI driver gets an immutable [`CsiOperatorConfig`] built
//! once at startup from the process environment. It names the manifests
//! to apply and the image references to substitute into them.

use crate::domain::ports::{AssetLoader, EnvironmentReader};
use crate::error::{Error, Result};
use k8s_openapi::api::apps::v1::Deployment;
use serde::Serialize;
use std::path::PathBuf;
use std::str::FromStr;

/// Placeholder for the driver operator image in deployment manifests
pub const OPERATOR_IMAGE_PLACEHOLDER: &str = "${OPERATOR_IMAGE}";
/// Placeholder for the CSI driver image in deployment manifests
pub const DRIVER_IMAGE_PLACEHOLDER: &str = "${DRIVER_IMAGE}";

// =============================================================================
// Platform
// =============================================================================

/// Infrastructure platform a driver belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PlatformType {
    #[serde(rename = "AWS")]
    Aws,
    Azure,
    #[serde(rename = "GCP")]
    Gcp,
    OpenStack,
    #[serde(rename = "oVirt")]
    Ovirt,
    VSphere,
    BareMetal,
    None,
}

impl std::fmt::Display for PlatformType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlatformType::Aws => write!(f, "AWS"),
            PlatformType::Azure => write!(f, "Azure"),
            PlatformType::Gcp => write!(f, "GCP"),
            PlatformType::OpenStack => write!(f, "OpenStack"),
            PlatformType::Ovirt => write!(f, "oVirt"),
            PlatformType::VSphere => write!(f, "VSphere"),
            PlatformType::BareMetal => write!(f, "BareMetal"),
            PlatformType::None => write!(f, "None"),
        }
    }
}

impl FromStr for PlatformType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "aws" => Ok(PlatformType::Aws),
            "azure" => Ok(PlatformType::Azure),
            "gcp" => Ok(PlatformType::Gcp),
            "openstack" => Ok(PlatformType::OpenStack),
            "ovirt" => Ok(PlatformType::Ovirt),
            "vsphere" => Ok(PlatformType::VSphere),
            "baremetal" => Ok(PlatformType::BareMetal),
            "none" => Ok(PlatformType::None),
            other => Err(Error::Configuration(format!("Unknown platform: {}", other))),
        }
    }
}

// =============================================================================
// Assets
// =============================================================================

/// Manifest paths for one driver operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetBundle {
    /// Applied as-is, in order
    pub static_assets: Vec<String>,
    /// Operator CR instructing the driver operator to install the driver
    pub cr_asset: String,
    /// Driver operator Deployment, rendered through the image replacer
    pub deployment_asset: String,
}

impl AssetBundle {
    /// Standard layout under `csidriveroperators/<dir>/`: six RBAC and
    /// namespace manifests, `07_deployment.yaml` and `08_cr.yaml`
    pub fn standard(dir: &str) -> Self {
        let static_assets = [
            "01_namespace.yaml",
            "02_sa.yaml",
            "03_role.yaml",
            "04_rolebinding.yaml",
            "05_clusterrole.yaml",
            "06_clusterrolebinding.yaml",
        ]
        .iter()
        .map(|file| format!("csidriveroperators/{dir}/{file}"))
        .collect();

        Self {
            static_assets,
            cr_asset: format!("csidriveroperators/{dir}/08_cr.yaml"),
            deployment_asset: format!("csidriveroperators/{dir}/07_deployment.yaml"),
        }
    }
}

/// Reads assets relative to a base directory
#[derive(Debug, Clone)]
pub struct DirAssetLoader {
    base: PathBuf,
}

impl DirAssetLoader {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }
}

impl AssetLoader for DirAssetLoader {
    fn load(&self, path: &str) -> Result<String> {
        let full = self.base.join(path);
        if !full.is_file() {
            return Err(Error::AssetNotFound {
                path: full.display().to_string(),
            });
        }
        Ok(std::fs::read_to_string(full)?)
    }
}

// =============================================================================
// Image Replacer
// =============================================================================

/// Literal placeholder substitution.
///
/// Scans the input once from left to right. At each position the first
/// placeholder, in table order, that matches is replaced; substituted text
/// is never scanned again. No patterns or templating.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImageReplacer {
    pairs: Vec<(String, String)>,
}

impl ImageReplacer {
    pub fn new<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            pairs: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .filter(|(k, _): &(String, String)| !k.is_empty())
                .collect(),
        }
    }

    /// Placeholder to value pairs, in table order
    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// Value substituted for `placeholder`, if it is in the table
    pub fn value_of(&self, placeholder: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == placeholder)
            .map(|(_, v)| v.as_str())
    }

    pub fn replace(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        'scan: while let Some(ch) = rest.chars().next() {
            for (from, to) in &self.pairs {
                if let Some(tail) = rest.strip_prefix(from.as_str()) {
                    out.push_str(to);
                    rest = tail;
                    continue 'scan;
                }
            }
            out.push(ch);
            rest = &rest[ch.len_utf8()..];
        }

        out
    }
}

// =============================================================================
// CSI Operator Config
// =============================================================================

/// Placeholder token and the environment variable that supplies its value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageVar {
    pub placeholder: &'static str,
    pub env_key: &'static str,
}

/// Everything needed to deploy one CSI driver operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsiOperatorConfig {
    csi_driver_name: String,
    condition_prefix: String,
    platform: PlatformType,
    assets: AssetBundle,
    image_replacer: ImageReplacer,
    optional: bool,
}

/// Build the config for one driver.
///
/// Unset environment variables substitute as empty strings; deciding
/// whether that is acceptable is up to the caller.
pub fn build_config(
    env: &dyn EnvironmentReader,
    driver_name: &str,
    condition_prefix: &str,
    platform: PlatformType,
    assets: AssetBundle,
    image_vars: &[ImageVar],
    optional: bool,
) -> CsiOperatorConfig {
    let image_replacer = ImageReplacer::new(
        image_vars
            .iter()
            .map(|var| (var.placeholder, env.get_or_empty(var.env_key))),
    );

    CsiOperatorConfig {
        csi_driver_name: driver_name.to_string(),
        condition_prefix: condition_prefix.to_string(),
        platform,
        assets,
        image_replacer,
        optional,
    }
}

impl CsiOperatorConfig {
    pub fn csi_driver_name(&self) -> &str {
        &self.csi_driver_name
    }

    pub fn condition_prefix(&self) -> &str {
        &self.condition_prefix
    }

    pub fn platform(&self) -> PlatformType {
        self.platform
    }

    pub fn static_assets(&self) -> &[String] {
        &self.assets.static_assets
    }

    pub fn cr_asset(&self) -> &str {
        &self.assets.cr_asset
    }

    pub fn deployment_asset(&self) -> &str {
        &self.assets.deployment_asset
    }

    pub fn image_replacer(&self) -> &ImageReplacer {
        &self.image_replacer
    }

    /// Whether the cluster may run without this driver
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Placeholders whose environment variable was unset or empty
    pub fn missing_images(&self) -> Vec<&str> {
        self.image_replacer
            .pairs()
            .iter()
            .filter(|(_, v)| v.is_empty())
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// Load the deployment asset, substitute images and parse it
    pub fn render_deployment(&self, loader: &dyn AssetLoader) -> Result<Deployment> {
        let manifest = loader.load(&self.assets.deployment_asset)?;
        let rendered = self.image_replacer.replace(&manifest);
        Ok(serde_yaml::from_str(&rendered)?)
    }
}
