//! Klusterlet Addon Operator
//!
//! Hub-side controller that turns two indirect signals about a managed
//! cluster addon into its status:
//!
//! - the ManifestWork apply report (did the addon's manifests land?)
//! - the addon's Lease (is the addon agent still renewing its heartbeat?)
//!
//! Each `ManagedClusterAddOn` gets `Progressing`, `Available` and, only when
//! something is wrong, `Degraded` conditions. Addons that are disabled or
//! whose `KlusterletAddonConfig` is gone are deleted together with their
//! lease.

pub mod addons;
pub mod cascade;
pub mod conditions;
pub mod config;
pub mod controllers;
pub mod crd;
pub mod error;
pub mod leader_election;
pub mod liveness;
pub mod manifests;
pub mod reconcile;
pub mod status;
pub mod store;

pub use controllers::{AddonController, AddonReconciler, ReconcileOutcome};
pub use crd::{
    AddonStatus, KlusterletAddonConfig, KlusterletAddonConfigSpec, ManagedClusterAddOn,
    ManifestWork,
};
pub use error::{OperatorError, Result};
