//! Custom Resource Definitions read and written by the addon operator
//!
//! - ManagedClusterAddOn: one addon instance on one managed cluster
//! - KlusterletAddonConfig: per-cluster addon enablement
//! - ManifestWork: delivery of an addon's manifests to the managed cluster

mod addon;
mod addon_config;
mod manifest_work;

pub use addon::{
    verify_reference, AddonSpec, AddonStatus, GroupResource, ManagedClusterAddOn, ObjectReference,
};
pub use addon_config::{AddonToggle, KlusterletAddonConfig, KlusterletAddonConfigSpec};
pub use manifest_work::{
    ManifestCondition, ManifestResourceMeta, ManifestResourceStatus, ManifestWork,
    ManifestWorkSpec, ManifestWorkStatus, ManifestsTemplate,
};
