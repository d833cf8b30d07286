//! Derivation of the addon's Progressing, Available and Degraded conditions.
//!
//! Progressing follows the manifest work, Available follows the lease, and
//! Degraded exists only while one of the other two has something to report.

use crate::conditions::{
    build_condition, remove_condition, set_condition, Condition, ConditionStatus, ConditionType,
};
use crate::liveness::{LeaseError, Liveness};
use crate::manifests::ManifestApplyCount;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub const REASON_TERMINATING: &str = "Terminating";
pub const REASON_CREATING_MANIFESTS: &str = "CreatingManifests";
pub const REASON_INSTALLING: &str = "Installing";
pub const REASON_APPLIED: &str = "Applied";

pub const REASON_ADDON_AVAILABLE: &str = "AddonAvailable";
pub const REASON_STATUS_TIMEOUT: &str = "GetAddonStatusTimeout";
pub const REASON_NOT_AVAILABLE: &str = "AddonNotAvailable";

pub const REASON_MANIFESTS_FAILED: &str = "ManifestsFailedToApply";

/// A problem found while deriving Progressing or Available.
///
/// These are folded into the Degraded condition, never returned as
/// reconcile errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DegradedCause {
    #[error("{failed} of {total} manifests failed to apply")]
    ManifestsFailed { failed: usize, total: usize },
    #[error("addon status timeout: {0}")]
    StatusTimeout(LeaseError),
}

impl DegradedCause {
    pub fn reason(&self) -> &'static str {
        match self {
            DegradedCause::ManifestsFailed { .. } => REASON_MANIFESTS_FAILED,
            DegradedCause::StatusTimeout(_) => REASON_STATUS_TIMEOUT,
        }
    }
}

/// Where the addon is in its install lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    /// Disabled, or its configuration is being deleted
    Terminating,
    /// Enabled; `None` until the manifest work exists
    Enabled(Option<ManifestApplyCount>),
}

/// Progressing condition plus a failure to fold into Degraded.
pub fn derive_progressing(
    state: InstallState,
    now: DateTime<Utc>,
) -> (Condition, Option<DegradedCause>) {
    let progressing = |status: ConditionStatus, reason: &'static str, message: String| {
        build_condition(ConditionType::Progressing, status, reason, message, now)
    };
    match state {
        InstallState::Terminating => (
            progressing(
                ConditionStatus::True,
                REASON_TERMINATING,
                "addon is being removed".to_string(),
            ),
            None,
        ),
        InstallState::Enabled(None) => (
            progressing(
                ConditionStatus::True,
                REASON_CREATING_MANIFESTS,
                "waiting for addon manifests to be created".to_string(),
            ),
            None,
        ),
        InstallState::Enabled(Some(count)) if !count.is_finished() => (
            progressing(
                ConditionStatus::True,
                REASON_INSTALLING,
                format!(
                    "{} of {} manifests applied, {} pending",
                    count.succeeded,
                    count.total,
                    count.pending()
                ),
            ),
            None,
        ),
        InstallState::Enabled(Some(count)) => {
            let cause = (count.failed > 0).then_some(DegradedCause::ManifestsFailed {
                failed: count.failed,
                total: count.total,
            });
            (
                progressing(
                    ConditionStatus::False,
                    REASON_APPLIED,
                    format!("all {} manifests have been processed", count.total),
                ),
                cause,
            )
        }
    }
}

/// Available condition plus a failure to fold into Degraded.
pub fn derive_available(
    liveness: &Liveness,
    now: DateTime<Utc>,
) -> (Condition, Option<DegradedCause>) {
    match liveness {
        Liveness::Alive { .. } => (
            build_condition(
                ConditionType::Available,
                ConditionStatus::True,
                REASON_ADDON_AVAILABLE,
                "addon lease is being renewed",
                now,
            ),
            None,
        ),
        Liveness::Stale(err) => (
            build_condition(
                ConditionType::Available,
                ConditionStatus::Unknown,
                REASON_STATUS_TIMEOUT,
                format!("addon stopped reporting: {}", err),
                now,
            ),
            Some(DegradedCause::StatusTimeout(err.clone())),
        ),
        Liveness::NotReporting => (
            build_condition(
                ConditionType::Available,
                ConditionStatus::False,
                REASON_NOT_AVAILABLE,
                "addon not yet reporting",
                now,
            ),
            None,
        ),
    }
}

/// Degraded condition, or `None` when nothing is wrong.
///
/// An install failure outranks a liveness timeout.
pub fn derive_degraded(
    progressing: Option<&DegradedCause>,
    available: Option<&DegradedCause>,
    now: DateTime<Utc>,
) -> Option<Condition> {
    let cause = progressing.or(available)?;
    Some(build_condition(
        ConditionType::Degraded,
        ConditionStatus::True,
        cause.reason(),
        cause.to_string(),
        now,
    ))
}

/// Merge a freshly derived diagnosis into an existing condition list.
pub fn apply_diagnosis(
    conditions: &mut Vec<Condition>,
    state: InstallState,
    liveness: &Liveness,
    now: DateTime<Utc>,
) {
    let (progressing, progressing_err) = derive_progressing(state, now);
    let (available, available_err) = derive_available(liveness, now);
    let degraded = derive_degraded(progressing_err.as_ref(), available_err.as_ref(), now);

    set_condition(conditions, progressing);
    set_condition(conditions, available);
    match degraded {
        Some(d) => {
            set_condition(conditions, d);
        }
        None => {
            remove_condition(conditions, &ConditionType::Degraded);
        }
    }
}
