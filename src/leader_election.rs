//! Kubernetes Lease-based leader election for HA operator deployments.
//!
//! Only the replica holding the election Lease runs the addon controller.
//! Standby replicas block in [`LeaderElector::acquire`] until the holder's
//! lease expires or is released.

use chrono::{DateTime, Utc};
use k8s_openapi::api::coordination::v1::{Lease, LeaseSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{MicroTime, ObjectMeta};
use kube::api::{Api, PostParams};
use kube::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

const LEASE_DURATION_SECS: i32 = 15;
const RENEW_INTERVAL: Duration = Duration::from_secs(10);
const RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Detects the namespace for leader election.
///
/// Priority: explicit argument → service account file → `"default"`.
pub fn detect_namespace(explicit: &str) -> String {
    if !explicit.is_empty() {
        return explicit.to_string();
    }
    std::fs::read_to_string("/var/run/secrets/kubernetes.io/serviceaccount/namespace")
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| "default".to_string())
}

/// Whether an election lease is free to take over at `now`.
///
/// Holder-less and never-renewed leases are free.
pub fn is_expired(spec: Option<&LeaseSpec>, now: DateTime<Utc>) -> bool {
    let Some(spec) = spec else {
        return true;
    };
    if spec.holder_identity.as_deref().map_or(true, str::is_empty) {
        return true;
    }
    let duration = spec.lease_duration_seconds.unwrap_or(LEASE_DURATION_SECS) as i64;
    match &spec.renew_time {
        Some(MicroTime(t)) => now.signed_duration_since(*t).num_seconds() > duration,
        None => true,
    }
}

/// Spec for a lease held by `identity`, renewed at `now`.
fn held_spec(
    identity: &str,
    previous: Option<&LeaseSpec>,
    now: DateTime<Utc>,
    takeover: bool,
) -> LeaseSpec {
    let transitions = previous.and_then(|s| s.lease_transitions).unwrap_or(0);
    LeaseSpec {
        holder_identity: Some(identity.to_string()),
        lease_duration_seconds: Some(LEASE_DURATION_SECS),
        acquire_time: if takeover || previous.is_none() {
            Some(MicroTime(now))
        } else {
            previous.and_then(|s| s.acquire_time.clone())
        },
        renew_time: Some(MicroTime(now)),
        lease_transitions: Some(if takeover { transitions + 1 } else { transitions }),
        ..Default::default()
    }
}

/// Lease-based leader election.
///
/// Uses a `coordination.k8s.io/v1` Lease with optimistic concurrency (via
/// `resourceVersion`) so that only one operator instance runs at a time.
pub struct LeaderElector {
    lease_api: Api<Lease>,
    lease_name: String,
    identity: String,
}

impl LeaderElector {
    pub fn new(client: Client, namespace: &str, lease_name: &str) -> Self {
        let lease_api = Api::<Lease>::namespaced(client, namespace);
        let identity = std::env::var("POD_NAME")
            .or_else(|_| std::env::var("HOSTNAME"))
            .unwrap_or_else(|_| format!("klusterlet-addon-operator-{:08x}", rand::random::<u32>()));
        info!(
            identity = %identity,
            namespace = %namespace,
            lease = %lease_name,
            "Initialized leader elector"
        );
        Self {
            lease_api,
            lease_name: lease_name.to_string(),
            identity,
        }
    }

    /// Blocks until the lease is successfully acquired.
    pub async fn acquire(&self) -> anyhow::Result<()> {
        info!(identity = %self.identity, "Waiting to acquire leader lease '{}'", self.lease_name);
        loop {
            match self.try_acquire().await {
                Ok(true) => {
                    info!(identity = %self.identity, "Acquired leader lease");
                    return Ok(());
                }
                Ok(false) => {
                    debug!("Lease held by another instance, retrying in {:?}", RETRY_INTERVAL)
                }
                Err(e) => warn!("Lease acquisition error: {}, retrying in {:?}", e, RETRY_INTERVAL),
            }
            tokio::time::sleep(RETRY_INTERVAL).await;
        }
    }

    /// Renews the lease. Returns `Ok(true)` if still leader, `Ok(false)` if lost.
    pub async fn renew(&self) -> anyhow::Result<bool> {
        let lease = self.lease_api.get(&self.lease_name).await?;
        if !self.holds(&lease) {
            return Ok(false);
        }
        self.replace(&lease, held_spec(&self.identity, lease.spec.as_ref(), Utc::now(), false))
            .await
    }

    /// Releases the lease by clearing the holder identity.
    pub async fn release(&self) {
        info!(identity = %self.identity, "Releasing leader lease");
        let lease = match self.lease_api.get(&self.lease_name).await {
            Ok(l) => l,
            Err(e) => {
                warn!("Failed to read lease for release: {}", e);
                return;
            }
        };
        if !self.holds(&lease) {
            debug!("Lease not held by us, skipping release");
            return;
        }

        let mut spec = lease.spec.clone().unwrap_or_default();
        spec.holder_identity = None;
        match self.replace(&lease, spec).await {
            Ok(true) => info!("Released leader lease"),
            Ok(false) => warn!("Lease changed while releasing"),
            Err(e) => warn!("Failed to release leader lease: {}", e),
        }
    }

    /// Returns the recommended interval between lease renewals.
    pub fn renew_interval(&self) -> Duration {
        RENEW_INTERVAL
    }

    fn holds(&self, lease: &Lease) -> bool {
        lease.spec.as_ref().and_then(|s| s.holder_identity.as_deref())
            == Some(self.identity.as_str())
    }

    async fn try_acquire(&self) -> anyhow::Result<bool> {
        let now = Utc::now();
        match self.lease_api.get_opt(&self.lease_name).await? {
            Some(existing) if self.holds(&existing) => {
                let spec = held_spec(&self.identity, existing.spec.as_ref(), now, false);
                self.replace(&existing, spec).await
            }
            Some(existing) if is_expired(existing.spec.as_ref(), now) => {
                let spec = held_spec(&self.identity, existing.spec.as_ref(), now, true);
                self.replace(&existing, spec).await
            }
            Some(_) => Ok(false),
            None => self.create(now).await,
        }
    }

    async fn create(&self, now: DateTime<Utc>) -> anyhow::Result<bool> {
        let lease = Lease {
            metadata: ObjectMeta {
                name: Some(self.lease_name.clone()),
                ..Default::default()
            },
            spec: Some(held_spec(&self.identity, None, now, false)),
        };
        match self.lease_api.create(&PostParams::default(), &lease).await {
            Ok(_) => Ok(true),
            Err(kube::Error::Api(ae)) if ae.code == 409 => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace the lease spec; a 409 means another replica got there first.
    async fn replace(&self, existing: &Lease, spec: LeaseSpec) -> anyhow::Result<bool> {
        let mut updated = existing.clone();
        updated.spec = Some(spec);
        match self
            .lease_api
            .replace(&self.lease_name, &PostParams::default(), &updated)
            .await
        {
            Ok(_) => Ok(true),
            Err(kube::Error::Api(ae)) if ae.code == 409 => {
                warn!("Lease conflict, another replica updated it first");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}
