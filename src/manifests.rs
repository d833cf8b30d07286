//! Aggregation of per-manifest apply results reported on a ManifestWork.

use crate::conditions::{find_condition, ConditionStatus, ConditionType};
use crate::crd::ManifestWork;

/// Apply outcome counts for one manifest work.
///
/// Manifests with no report yet are in neither bucket; see [`Self::pending`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManifestApplyCount {
    pub failed: usize,
    pub succeeded: usize,
    pub total: usize,
}

impl ManifestApplyCount {
    pub fn pending(&self) -> usize {
        self.total - self.failed - self.succeeded
    }

    /// Every manifest has reported either success or failure.
    pub fn is_finished(&self) -> bool {
        self.failed + self.succeeded >= self.total
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ManifestState {
    Pending,
    Applied,
    Failed,
}

/// Count applied and failed manifests, keyed by ordinal.
///
/// Reports whose ordinal is outside `spec.workload.manifests` are ignored.
/// When the same ordinal is reported more than once the last report wins.
pub fn count(work: Option<&ManifestWork>) -> ManifestApplyCount {
    let Some(work) = work else {
        return ManifestApplyCount::default();
    };
    let total = work.spec.workload.manifests.len();
    let mut states = vec![ManifestState::Pending; total];

    let reports = work
        .status
        .as_ref()
        .map(|s| s.resource_status.manifests.as_slice())
        .unwrap_or_default();
    for report in reports {
        let Ok(ordinal) = usize::try_from(report.resource_meta.ordinal) else {
            continue;
        };
        let Some(slot) = states.get_mut(ordinal) else {
            continue;
        };
        match find_condition(&report.conditions, &ConditionType::Applied).map(|c| c.status) {
            Some(ConditionStatus::True) => *slot = ManifestState::Applied,
            Some(ConditionStatus::False) => *slot = ManifestState::Failed,
            _ => {}
        }
    }

    states.iter().fold(
        ManifestApplyCount {
            total,
            ..Default::default()
        },
        |mut acc, state| {
            match state {
                ManifestState::Applied => acc.succeeded += 1,
                ManifestState::Failed => acc.failed += 1,
                ManifestState::Pending => {}
            }
            acc
        },
    )
}
