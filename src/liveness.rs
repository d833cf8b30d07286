//! Lease-based liveness detection for addon agents.
//!
//! A running addon renews its Lease periodically. The addon is considered
//! alive until five declared renewal intervals have passed since the last
//! renewal. The declared interval is clamped to
//! [`LEASE_DURATION_LOWER_BOUND`]..=[`LEASE_DURATION_UPPER_BOUND`] seconds.

use chrono::{DateTime, Duration, Utc};
use k8s_openapi::api::coordination::v1::Lease;
use thiserror::Error;
use tracing::debug;

/// Smallest lease duration used for expiry math, in seconds
pub const LEASE_DURATION_LOWER_BOUND: i64 = 30;
/// Largest lease duration used for expiry math, in seconds
pub const LEASE_DURATION_UPPER_BOUND: i64 = 90;
/// Missed renewals tolerated before the lease is considered stale
pub const LEASE_GRACE_MULTIPLIER: i64 = 5;

/// Why a lease cannot vouch for a live addon
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LeaseError {
    #[error("lease has no renew time")]
    MissingRenewTime,
    #[error("lease expired at {expiry}, last renewed at {renewed_at}")]
    Expired {
        renewed_at: DateTime<Utc>,
        expiry: DateTime<Utc>,
    },
}

/// Liveness of an addon as seen through its lease
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Liveness {
    /// The lease was renewed within the grace period.
    Alive {
        expiry: DateTime<Utc>,
        grace: Duration,
    },
    /// A lease exists but it is stale or unreadable.
    Stale(LeaseError),
    /// No lease exists; the addon has never reported.
    NotReporting,
}

/// Declared lease duration clamped to the supported bounds.
pub fn effective_duration(declared: Option<i32>) -> Duration {
    let secs = declared.map(i64::from).unwrap_or(LEASE_DURATION_LOWER_BOUND);
    let clamped = secs.clamp(LEASE_DURATION_LOWER_BOUND, LEASE_DURATION_UPPER_BOUND);
    if clamped != secs {
        debug!(declared = secs, effective = clamped, "Clamped lease duration");
    }
    Duration::seconds(clamped)
}

/// Grace period for a lease: five effective durations.
pub fn grace_period(lease: &Lease) -> Duration {
    let declared = lease.spec.as_ref().and_then(|s| s.lease_duration_seconds);
    effective_duration(declared) * LEASE_GRACE_MULTIPLIER as i32
}

/// Time after which a lease that has not been renewed is stale.
pub fn expiry(lease: Option<&Lease>) -> Result<DateTime<Utc>, LeaseError> {
    let lease = lease.ok_or(LeaseError::MissingRenewTime)?;
    let renewed_at = renew_time(lease)?;
    Ok(renewed_at + grace_period(lease))
}

/// Classify the addon's liveness at `now`.
pub fn classify(lease: Option<&Lease>, now: DateTime<Utc>) -> Liveness {
    let Some(lease) = lease else {
        return Liveness::NotReporting;
    };
    let grace = grace_period(lease);
    match expiry(Some(lease)) {
        Ok(expiry) if now < expiry => Liveness::Alive { expiry, grace },
        Ok(expiry) => Liveness::Stale(LeaseError::Expired {
            renewed_at: expiry - grace,
            expiry,
        }),
        Err(e) => Liveness::Stale(e),
    }
}

/// How long to wait before checking a live lease again.
///
/// One second past the expiry so a missed renewal is caught on the next
/// cycle, never sooner than the lower bound and never later than the grace
/// period.
pub fn next_check(
    expiry: DateTime<Utc>,
    grace: Duration,
    now: DateTime<Utc>,
) -> std::time::Duration {
    let until = (expiry - now).num_seconds() + 1;
    let secs = until
        .max(LEASE_DURATION_LOWER_BOUND)
        .min(grace.num_seconds().max(LEASE_DURATION_LOWER_BOUND));
    std::time::Duration::from_secs(secs as u64)
}

fn renew_time(lease: &Lease) -> Result<DateTime<Utc>, LeaseError> {
    lease
        .spec
        .as_ref()
        .and_then(|s| s.renew_time.as_ref())
        .map(|t| t.0)
        .ok_or(LeaseError::MissingRenewTime)
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{DateTime, Utc};
    use k8s_openapi::api::coordination::v1::{Lease, LeaseSpec};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{MicroTime, ObjectMeta};

    pub fn lease(renewed_at: Option<DateTime<Utc>>, duration: Option<i32>) -> Lease {
        Lease {
            metadata: ObjectMeta {
                name: Some("work-manager".to_string()),
                namespace: Some("cluster1".to_string()),
                ..Default::default()
            },
            spec: Some(LeaseSpec {
                renew_time: renewed_at.map(MicroTime),
                lease_duration_seconds: duration,
                ..Default::default()
            }),
        }
    }
}
