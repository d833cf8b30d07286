//! KlusterletAddonConfig Custom Resource Definition
//!
//! Per-cluster configuration declaring which addons are enabled. This
//! operator only reads it.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// KlusterletAddonConfig is the Schema for the klusterletaddonconfigs API
#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "agent.open-cluster-management.io",
    version = "v1",
    kind = "KlusterletAddonConfig",
    namespaced,
    shortname = "kac"
)]
#[serde(rename_all = "camelCase")]
pub struct KlusterletAddonConfigSpec {
    /// Name of the managed cluster
    #[serde(default)]
    pub cluster_name: String,

    /// Namespace of the managed cluster on the hub
    #[serde(default)]
    pub cluster_namespace: String,

    #[serde(default)]
    pub application_manager: AddonToggle,

    #[serde(default)]
    pub cert_policy_controller: AddonToggle,

    #[serde(default)]
    pub iam_policy_controller: AddonToggle,

    #[serde(default)]
    pub policy_controller: AddonToggle,

    #[serde(default)]
    pub search_collector: AddonToggle,
}

/// Enablement switch for a single addon
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddonToggle {
    #[serde(default)]
    pub enabled: bool,
}

impl KlusterletAddonConfig {
    /// Whether the configuration has a deletion timestamp.
    pub fn is_deleting(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

    #[test]
    fn test_spec_toggles_default_to_disabled() {
        let json = r#"{"clusterName": "cluster1", "clusterNamespace": "cluster1"}"#;
        let spec: KlusterletAddonConfigSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.cluster_name, "cluster1");
        assert!(!spec.application_manager.enabled);
        assert!(!spec.search_collector.enabled);
    }

    #[test]
    fn test_spec_parses_enabled_toggles() {
        let json = r#"{
            "clusterName": "cluster1",
            "policyController": {"enabled": true},
            "searchCollector": {"enabled": false}
        }"#;
        let spec: KlusterletAddonConfigSpec = serde_json::from_str(json).unwrap();
        assert!(spec.policy_controller.enabled);
        assert!(!spec.search_collector.enabled);
    }

    #[test]
    fn test_is_deleting() {
        let mut config =
            KlusterletAddonConfig::new("cluster1", KlusterletAddonConfigSpec::default());
        assert!(!config.is_deleting());
        config.metadata.deletion_timestamp = Some(Time(chrono::Utc::now()));
        assert!(config.is_deleting());
    }
}
