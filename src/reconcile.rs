//! Store-independent evaluation of one addon snapshot.
//!
//! Given the addon, its lease, manifest work and configuration as read in
//! this cycle, decide whether to tear the addon down or what its status
//! should be and when to look again.

use crate::addons::AddonDescriptor;
use crate::cascade::should_teardown;
use crate::crd::{
    AddonStatus, GroupResource, KlusterletAddonConfig, ManagedClusterAddOn, ManifestWork,
};
use crate::liveness::{
    self, Liveness, LEASE_DURATION_LOWER_BOUND, LEASE_DURATION_UPPER_BOUND,
    LEASE_GRACE_MULTIPLIER,
};
use crate::manifests;
use crate::status::{apply_diagnosis, InstallState};
use chrono::{DateTime, Utc};
use k8s_openapi::api::coordination::v1::Lease;
use std::time::Duration;

/// Resource an addon's owning configuration is referenced as
pub const ADDON_CONFIG_RESOURCE: GroupResource = GroupResource {
    group: "agent.open-cluster-management.io",
    resource: "klusterletaddonconfigs",
};

/// Requeue delay when the lease gives no earlier deadline
pub const DEFAULT_REQUEUE: Duration =
    Duration::from_secs((LEASE_GRACE_MULTIPLIER * LEASE_DURATION_UPPER_BOUND) as u64);

/// Objects read for one reconcile cycle
#[derive(Debug)]
pub struct Snapshot<'a> {
    pub descriptor: &'static AddonDescriptor,
    pub addon: &'a ManagedClusterAddOn,
    pub lease: Option<&'a Lease>,
    pub manifest_work: Option<&'a ManifestWork>,
    pub config: Option<&'a KlusterletAddonConfig>,
}

/// What to do with the addon after evaluating a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Delete the lease and the addon.
    Teardown,
    /// Keep the addon with this status.
    Keep {
        status: AddonStatus,
        /// Status differs from what the addon currently has
        changed: bool,
        requeue_after: Duration,
    },
}

/// Evaluate a snapshot at `now`.
pub fn evaluate(snapshot: &Snapshot<'_>, now: DateTime<Utc>) -> Decision {
    let Some(config) = snapshot.config else {
        return Decision::Teardown;
    };

    let current = snapshot.addon.status.clone().unwrap_or_default();
    let mut status = current.clone();

    let enabled = snapshot.descriptor.is_enabled(&config.spec);
    let config_deleting = config.is_deleting();
    let state = if !enabled || config_deleting {
        InstallState::Terminating
    } else {
        InstallState::Enabled(snapshot.manifest_work.map(|w| manifests::count(Some(w))))
    };
    let liveness = liveness::classify(snapshot.lease, now);
    apply_diagnosis(&mut status.conditions, state, &liveness, now);

    if should_teardown(enabled, config_deleting, snapshot.manifest_work.is_some()) {
        return Decision::Teardown;
    }

    Decision::Keep {
        changed: status != current,
        status,
        requeue_after: requeue_after(&liveness, now),
    }
}

/// Next reconcile delay: the lease deadline while alive, the default otherwise.
pub fn requeue_after(liveness: &Liveness, now: DateTime<Utc>) -> Duration {
    match liveness {
        Liveness::Alive { expiry, grace } => liveness::next_check(*expiry, *grace, now)
            .min(DEFAULT_REQUEUE)
            .max(Duration::from_secs(LEASE_DURATION_LOWER_BOUND as u64)),
        _ => DEFAULT_REQUEUE,
    }
}
