//! Fixed catalog of klusterlet addons managed by this operator.

use crate::crd::KlusterletAddonConfigSpec;

/// Infix shared by every addon manifest work name
const MANIFEST_WORK_INFIX: &str = "-klusterlet-addon-";

/// Static metadata for one addon in the catalog
#[derive(Debug)]
pub struct AddonDescriptor {
    /// ManagedClusterAddOn and Lease name
    pub name: &'static str,
    /// Suffix of the addon's manifest work name
    pub short_name: &'static str,
    enabled: fn(&KlusterletAddonConfigSpec) -> bool,
}

impl AddonDescriptor {
    /// Whether the configuration enables this addon.
    pub fn is_enabled(&self, spec: &KlusterletAddonConfigSpec) -> bool {
        (self.enabled)(spec)
    }

    /// Name of the manifest work delivering this addon to `cluster`.
    pub fn manifest_work_name(&self, cluster: &str) -> String {
        format!("{}{}{}", cluster, MANIFEST_WORK_INFIX, self.short_name)
    }
}

pub const APPLICATION_MANAGER: &str = "application-manager";
pub const CERT_POLICY_CONTROLLER: &str = "cert-policy-controller";
pub const IAM_POLICY_CONTROLLER: &str = "iam-policy-controller";
pub const POLICY_CONTROLLER: &str = "policy-controller";
pub const SEARCH_COLLECTOR: &str = "search-collector";
pub const WORK_MANAGER: &str = "work-manager";

/// All addons known to this operator
pub static CATALOG: &[AddonDescriptor] = &[
    AddonDescriptor {
        name: APPLICATION_MANAGER,
        short_name: "appmgr",
        enabled: |s| s.application_manager.enabled,
    },
    AddonDescriptor {
        name: CERT_POLICY_CONTROLLER,
        short_name: "certpolicyctrl",
        enabled: |s| s.cert_policy_controller.enabled,
    },
    AddonDescriptor {
        name: IAM_POLICY_CONTROLLER,
        short_name: "iampolicyctrl",
        enabled: |s| s.iam_policy_controller.enabled,
    },
    AddonDescriptor {
        name: POLICY_CONTROLLER,
        short_name: "policyctrl",
        enabled: |s| s.policy_controller.enabled,
    },
    AddonDescriptor {
        name: SEARCH_COLLECTOR,
        short_name: "search",
        enabled: |s| s.search_collector.enabled,
    },
    AddonDescriptor {
        name: WORK_MANAGER,
        short_name: "workmgr",
        enabled: |_| true,
    },
];

/// Look up an addon by its resource name.
pub fn resolve(name: &str) -> Option<&'static AddonDescriptor> {
    CATALOG.iter().find(|d| d.name == name)
}

/// Look up the addon a manifest work belongs to, by its name suffix.
pub fn from_manifest_work_name(work_name: &str) -> Option<&'static AddonDescriptor> {
    let (_, short) = work_name.rsplit_once(MANIFEST_WORK_INFIX)?;
    CATALOG.iter().find(|d| d.short_name == short)
}
