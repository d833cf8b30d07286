//! Controllers for the klusterlet addon operator
//!
//! Each controller watches its primary resource plus the objects that feed
//! its status, and reconciles on any change.

mod addon;

pub use addon::{
    map_addon_config, map_lease, map_manifest_work, AddonController, AddonReconciler,
    ReconcileOutcome,
};
