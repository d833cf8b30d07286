//! ManagedClusterAddOn Custom Resource Definition
//!
//! One addon instance on one managed cluster. The namespace is the managed
//! cluster's namespace on the hub.

use crate::conditions::Condition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// ManagedClusterAddOn is the Schema for the managedclusteraddons API
#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "addon.open-cluster-management.io",
    version = "v1alpha1",
    kind = "ManagedClusterAddOn",
    namespaced,
    status = "AddonStatus",
    shortname = "mca",
    printcolumn = r#"{"name":"Available","type":"string","jsonPath":".status.conditions[?(@.type==\"Available\")].status"}"#,
    printcolumn = r#"{"name":"Degraded","type":"string","jsonPath":".status.conditions[?(@.type==\"Degraded\")].status"}"#,
    printcolumn = r#"{"name":"Progressing","type":"string","jsonPath":".status.conditions[?(@.type==\"Progressing\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AddonSpec {
    /// Namespace on the managed cluster the addon agent is installed into
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_namespace: Option<String>,
}

/// Status of the ManagedClusterAddOn
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddonStatus {
    /// Conditions representing addon state, unique by type
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// Objects related to this addon, including the configuration that owns it
    #[serde(default)]
    pub related_objects: Vec<ObjectReference>,
}

/// Reference to a related object by group, resource and name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ObjectReference {
    #[serde(default)]
    pub group: String,
    pub resource: String,
    pub name: String,
}

/// Group and resource of a Kubernetes API type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupResource {
    pub group: &'static str,
    pub resource: &'static str,
}

/// Return the name of the first related object matching `expected`.
///
/// Addons are owned through `status.relatedObjects` rather than owner
/// references, so this is how the owning configuration is located.
pub fn verify_reference(refs: &[ObjectReference], expected: GroupResource) -> Option<String> {
    refs.iter()
        .find(|r| r.group == expected.group && r.resource == expected.resource)
        .map(|r| r.name.clone())
}
