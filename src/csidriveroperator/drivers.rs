//! Managed CSI driver operators
//!
//! One descriptor per driver; [`configs_for_platform`] turns the ones that
//! apply to the current platform into startup configs.

use super::config::{
    build_config, AssetBundle, CsiOperatorConfig, ImageVar, PlatformType,
    DRIVER_IMAGE_PLACEHOLDER, OPERATOR_IMAGE_PLACEHOLDER,
};
use crate::domain::ports::EnvironmentReader;

/// Static description of a managed driver
#[derive(Debug, Clone, Copy)]
pub struct DriverDescriptor {
    pub driver_name: &'static str,
    pub condition_prefix: &'static str,
    pub platform: PlatformType,
    pub asset_dir: &'static str,
    pub image_vars: &'static [ImageVar],
    pub optional: bool,
}

impl DriverDescriptor {
    pub fn build(&self, env: &dyn EnvironmentReader) -> CsiOperatorConfig {
        build_config(
            env,
            self.driver_name,
            self.condition_prefix,
            self.platform,
            AssetBundle::standard(self.asset_dir),
            self.image_vars,
            self.optional,
        )
    }
}

pub const OVIRT_DRIVER_NAME: &str = "csi.ovirt.org";
pub const AWS_EBS_DRIVER_NAME: &str = "ebs.csi.aws.com";
pub const MANILA_DRIVER_NAME: &str = "manila.csi.openstack.org";

pub const OVIRT: DriverDescriptor = DriverDescriptor {
    driver_name: OVIRT_DRIVER_NAME,
    condition_prefix: "OVirt",
    platform: PlatformType::Ovirt,
    asset_dir: "ovirt",
    image_vars: &[
        ImageVar {
            placeholder: OPERATOR_IMAGE_PLACEHOLDER,
            env_key: "OVIRT_DRIVER_OPERATOR_IMAGE",
        },
        ImageVar {
            placeholder: DRIVER_IMAGE_PLACEHOLDER,
            env_key: "OVIRT_DRIVER_IMAGE",
        },
    ],
    optional: false,
};

pub const AWS_EBS: DriverDescriptor = DriverDescriptor {
    driver_name: AWS_EBS_DRIVER_NAME,
    condition_prefix: "AWSEBS",
    platform: PlatformType::Aws,
    asset_dir: "aws-ebs",
    image_vars: &[
        ImageVar {
            placeholder: OPERATOR_IMAGE_PLACEHOLDER,
            env_key: "AWS_EBS_DRIVER_OPERATOR_IMAGE",
        },
        ImageVar {
            placeholder: DRIVER_IMAGE_PLACEHOLDER,
            env_key: "AWS_EBS_DRIVER_IMAGE",
        },
    ],
    optional: false,
};

// Manila is only present on OpenStack clouds that run the share service
pub const MANILA: DriverDescriptor = DriverDescriptor {
    driver_name: MANILA_DRIVER_NAME,
    condition_prefix: "Manila",
    platform: PlatformType::OpenStack,
    asset_dir: "manila",
    image_vars: &[
        ImageVar {
            placeholder: OPERATOR_IMAGE_PLACEHOLDER,
            env_key: "MANILA_DRIVER_OPERATOR_IMAGE",
        },
        ImageVar {
            placeholder: DRIVER_IMAGE_PLACEHOLDER,
            env_key: "MANILA_DRIVER_IMAGE",
        },
        ImageVar {
            placeholder: "${NFS_DRIVER_IMAGE}",
            env_key: "MANILA_NFS_DRIVER_IMAGE",
        },
    ],
    optional: true,
};

/// Every driver operator this operator knows how to deploy
pub const ALL_DRIVERS: &[DriverDescriptor] = &[AWS_EBS, MANILA, OVIRT];

/// Build configs for the drivers that run on `platform`
pub fn configs_for_platform(
    platform: PlatformType,
    env: &dyn EnvironmentReader,
) -> Vec<CsiOperatorConfig> {
    ALL_DRIVERS
        .iter()
        .filter(|d| d.platform == platform)
        .map(|d| d.build(env))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::MapEnvironment;

    #[test]
    fn test_ovirt_config() {
        let env = MapEnvironment::new()
            .with("OVIRT_DRIVER_OPERATOR_IMAGE", "quay.io/ovirt/operator:4.6")
            .with("OVIRT_DRIVER_IMAGE", "quay.io/ovirt/csi-driver:4.6");
        let config = OVIRT.build(&env);

        assert_eq!(config.csi_driver_name(), "csi.ovirt.org");
        assert_eq!(config.condition_prefix(), "OVirt");
        assert_eq!(config.platform(), PlatformType::Ovirt);
        assert_eq!(
            config.static_assets(),
            [
                "csidriveroperators/ovirt/01_namespace.yaml",
                "csidriveroperators/ovirt/02_sa.yaml",
                "csidriveroperators/ovirt/03_role.yaml",
                "csidriveroperators/ovirt/04_rolebinding.yaml",
                "csidriveroperators/ovirt/05_clusterrole.yaml",
                "csidriveroperators/ovirt/06_clusterrolebinding.yaml",
            ]
        );
        assert_eq!(config.cr_asset(), "csidriveroperators/ovirt/08_cr.yaml");
        assert_eq!(config.deployment_asset(), "csidriveroperators/ovirt/07_deployment.yaml");
        assert_eq!(
            config.image_replacer().replace("${OPERATOR_IMAGE} ${DRIVER_IMAGE}"),
            "quay.io/ovirt/operator:4.6 quay.io/ovirt/csi-driver:4.6"
        );
        assert!(!config.is_optional());
    }

    #[test]
    fn test_manila_is_optional() {
        let config = MANILA.build(&MapEnvironment::new());
        assert!(config.is_optional());
        assert_eq!(config.missing_images().len(), 3);
    }

    #[test]
    fn test_configs_for_platform() {
        let env = MapEnvironment::new();

        let openstack = configs_for_platform(PlatformType::OpenStack, &env);
        assert_eq!(openstack.len(), 1);
        assert_eq!(openstack[0].csi_driver_name(), MANILA_DRIVER_NAME);

        let aws = configs_for_platform(PlatformType::Aws, &env);
        assert_eq!(aws[0].csi_driver_name(), AWS_EBS_DRIVER_NAME);

        assert!(configs_for_platform(PlatformType::BareMetal, &env).is_empty());
    }
}
