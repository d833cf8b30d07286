//! Addon Controller
//!
//! Reconciles ManagedClusterAddOn status from the addon's manifest work and
//! lease, and removes addons that are no longer wanted.

use crate::addons;
use crate::cascade;
use crate::crd::{verify_reference, KlusterletAddonConfig, ManagedClusterAddOn, ManifestWork};
use crate::error::{OperatorError, Result};
use crate::reconcile::{evaluate, Decision, Snapshot, ADDON_CONFIG_RESOURCE};
use crate::store::{AddonStore, KubeStore};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use k8s_openapi::api::coordination::v1::Lease;
use k8s_openapi::NamespaceResourceScope;
use kube::api::Api;
use kube::runtime::controller::{Action, Controller};
use kube::runtime::reflector::ObjectRef;
use kube::runtime::watcher::Config;
use kube::{Client, Resource, ResourceExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Result of a single reconcile pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Nothing left to track until the next change event
    Done,
    /// Look at the addon again after this delay
    RequeueAfter(Duration),
}

impl From<ReconcileOutcome> for Action {
    fn from(outcome: ReconcileOutcome) -> Self {
        match outcome {
            ReconcileOutcome::Done => Action::await_change(),
            ReconcileOutcome::RequeueAfter(d) => Action::requeue(d),
        }
    }
}

/// Store-driven reconcile steps for one addon key
pub struct AddonReconciler<S> {
    store: S,
}

impl<S: AddonStore> AddonReconciler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Reconcile the addon `namespace/name` as of `now`.
    #[instrument(skip(self, now))]
    pub async fn reconcile_addon(
        &self,
        namespace: &str,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<ReconcileOutcome> {
        let Some(descriptor) = addons::resolve(name) else {
            debug!("Not a catalog addon, ignoring");
            return Ok(ReconcileOutcome::Done);
        };

        let Some(addon) = self.store.get_addon(namespace, name).await? else {
            debug!("Addon not found");
            return Ok(ReconcileOutcome::Done);
        };

        let related = addon
            .status
            .as_ref()
            .map(|s| s.related_objects.as_slice())
            .unwrap_or_default();
        let Some(config_name) = verify_reference(related, ADDON_CONFIG_RESOURCE) else {
            debug!("Addon is not owned by a KlusterletAddonConfig, ignoring");
            return Ok(ReconcileOutcome::Done);
        };

        let lease = self.store.get_lease(namespace, name).await?;
        let work_name = descriptor.manifest_work_name(namespace);
        let manifest_work = self.store.get_manifest_work(namespace, &work_name).await?;

        let Some(config) = self.store.get_addon_config(namespace, &config_name).await? else {
            info!(config = %config_name, "Addon configuration is gone, removing addon");
            cascade::teardown(&self.store, namespace, name).await?;
            return Ok(ReconcileOutcome::Done);
        };

        let snapshot = Snapshot {
            descriptor,
            addon: &addon,
            lease: lease.as_ref(),
            manifest_work: manifest_work.as_ref(),
            config: Some(&config),
        };
        match evaluate(&snapshot, now) {
            Decision::Teardown => {
                info!("Addon disabled and its manifests are gone, removing addon");
                cascade::teardown(&self.store, namespace, name).await?;
                Ok(ReconcileOutcome::Done)
            }
            Decision::Keep {
                status,
                changed,
                requeue_after,
            } => {
                if changed {
                    self.store.update_addon_status(&addon, &status).await?;
                    info!("Updated addon status");
                } else {
                    debug!("Addon status unchanged");
                }
                Ok(ReconcileOutcome::RequeueAfter(requeue_after))
            }
        }
    }
}

/// Map a manifest work event to the addon it delivers.
pub fn map_manifest_work(work: ManifestWork) -> Option<ObjectRef<ManagedClusterAddOn>> {
    let descriptor = addons::from_manifest_work_name(&work.name_any())?;
    Some(ObjectRef::new(descriptor.name).within(&work.namespace()?))
}

/// Map a lease event to the addon of the same name.
pub fn map_lease(lease: Lease) -> Option<ObjectRef<ManagedClusterAddOn>> {
    let descriptor = addons::resolve(&lease.name_any())?;
    Some(ObjectRef::new(descriptor.name).within(&lease.namespace()?))
}

/// Map a configuration event to every catalog addon in its namespace.
pub fn map_addon_config(config: KlusterletAddonConfig) -> Vec<ObjectRef<ManagedClusterAddOn>> {
    let Some(namespace) = config.namespace() else {
        return Vec::new();
    };
    addons::CATALOG
        .iter()
        .map(|d| ObjectRef::new(d.name).within(&namespace))
        .collect()
}

/// Controller runtime wiring for ManagedClusterAddOn
pub struct AddonController {
    client: Client,
    reconciler: AddonReconciler<KubeStore>,
    namespace: Option<String>,
    error_requeue: Duration,
}

impl AddonController {
    /// Create a new addon controller watching `namespace` (all when `None`)
    pub fn new(client: Client, namespace: Option<String>, error_requeue: Duration) -> Self {
        Self {
            reconciler: AddonReconciler::new(KubeStore::new(client.clone())),
            client,
            namespace,
            error_requeue,
        }
    }

    /// Run the addon controller
    pub async fn run(self: Arc<Self>) -> Result<()> {
        info!(
            namespace = self.namespace.as_deref().unwrap_or("all"),
            "Starting ManagedClusterAddOn controller"
        );

        Controller::new(self.api::<ManagedClusterAddOn>(), Config::default())
            .watches(self.api::<ManifestWork>(), Config::default(), map_manifest_work)
            .watches(self.api::<Lease>(), Config::default(), map_lease)
            .watches(self.api::<KlusterletAddonConfig>(), Config::default(), map_addon_config)
            .shutdown_on_signal()
            .run(
                |addon, ctx| async move { ctx.reconcile(addon).await },
                |addon, error, ctx| ctx.error_policy(addon, error),
                Arc::clone(&self),
            )
            .for_each(|result| async move {
                match result {
                    Ok((obj, _action)) => {
                        debug!("Reconciled addon: {}", obj);
                    }
                    Err(e) => {
                        warn!("Reconciliation failed: {}", e);
                    }
                }
            })
            .await;

        Ok(())
    }

    async fn reconcile(
        &self,
        addon: Arc<ManagedClusterAddOn>,
    ) -> std::result::Result<Action, OperatorError> {
        let namespace = addon.namespace().ok_or_else(|| {
            OperatorError::Configuration(format!("addon {} has no namespace", addon.name_any()))
        })?;
        let outcome = self
            .reconciler
            .reconcile_addon(&namespace, &addon.name_any(), Utc::now())
            .await?;
        Ok(outcome.into())
    }

    fn error_policy(&self, addon: Arc<ManagedClusterAddOn>, error: &OperatorError) -> Action {
        let namespace = addon.namespace().unwrap_or_default();
        error!(
            addon = %addon.name_any(),
            namespace = %namespace,
            "Reconciliation error: {}", error
        );
        Action::requeue(self.error_requeue)
    }

    fn api<K>(&self) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope>,
        K::DynamicType: Default,
    {
        match &self.namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::{find_condition, ConditionStatus, ConditionType};
    use crate::crd::{
        AddonSpec, AddonStatus, AddonToggle, KlusterletAddonConfigSpec, ObjectReference,
    };
    use crate::liveness::test_support::lease;
    use crate::manifests::test_support::work_with;
    use crate::store::MockAddonStore;
    use chrono::TimeZone;
    use mockall::predicate::eq;
    use mockall::Sequence;
    use std::sync::Mutex;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn owned_addon(name: &str) -> ManagedClusterAddOn {
        let mut addon = ManagedClusterAddOn::new(name, AddonSpec::default());
        addon.metadata.namespace = Some("cluster1".to_string());
        addon.metadata.resource_version = Some("42".to_string());
        addon.status = Some(AddonStatus {
            conditions: vec![],
            related_objects: vec![ObjectReference {
                group: "agent.open-cluster-management.io".to_string(),
                resource: "klusterletaddonconfigs".to_string(),
                name: "cluster1".to_string(),
            }],
        });
        addon
    }

    fn config(search_enabled: bool) -> KlusterletAddonConfig {
        let mut config = KlusterletAddonConfig::new(
            "cluster1",
            KlusterletAddonConfigSpec {
                cluster_name: "cluster1".to_string(),
                cluster_namespace: "cluster1".to_string(),
                search_collector: AddonToggle { enabled: search_enabled },
                ..Default::default()
            },
        );
        config.metadata.namespace = Some("cluster1".to_string());
        config
    }

    #[tokio::test]
    async fn test_unknown_addon_is_ignored() {
        let store = MockAddonStore::new();
        let reconciler = AddonReconciler::new(store);
        let outcome = reconciler
            .reconcile_addon("cluster1", "cluster-proxy", now())
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Done);
    }

    #[tokio::test]
    async fn test_missing_addon_ends_cycle() {
        let mut store = MockAddonStore::new();
        store.expect_get_addon().returning(|_, _| Ok(None));
        store.expect_get_lease().never();
        let reconciler = AddonReconciler::new(store);
        let outcome = reconciler
            .reconcile_addon("cluster1", "work-manager", now())
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Done);
    }

    #[tokio::test]
    async fn test_foreign_addon_is_ignored() {
        let mut store = MockAddonStore::new();
        store.expect_get_addon().returning(|_, name| {
            let mut addon = owned_addon(name);
            addon.status.as_mut().unwrap().related_objects.clear();
            Ok(Some(addon))
        });
        store.expect_get_addon_config().never();
        store.expect_update_addon_status().never();
        let reconciler = AddonReconciler::new(store);
        let outcome = reconciler
            .reconcile_addon("cluster1", "work-manager", now())
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Done);
    }

    #[tokio::test]
    async fn test_applied_addon_status_is_written() {
        let written: Arc<Mutex<Option<AddonStatus>>> = Arc::default();
        let sink = Arc::clone(&written);

        let mut store = MockAddonStore::new();
        store
            .expect_get_addon()
            .with(eq("cluster1"), eq("work-manager"))
            .returning(|_, name| Ok(Some(owned_addon(name))));
        store
            .expect_get_lease()
            .returning(|_, _| Ok(Some(lease(Some(now()), Some(30)))));
        store
            .expect_get_manifest_work()
            .with(eq("cluster1"), eq("cluster1-klusterlet-addon-workmgr"))
            .returning(|_, _| {
                let applied = [(0, ConditionStatus::True), (1, ConditionStatus::True)];
                Ok(Some(work_with(2, &applied)))
            });
        store
            .expect_get_addon_config()
            .with(eq("cluster1"), eq("cluster1"))
            .returning(|_, _| Ok(Some(config(false))));
        store
            .expect_update_addon_status()
            .times(1)
            .returning(move |addon, status| {
                assert_eq!(addon.metadata.resource_version.as_deref(), Some("42"));
                *sink.lock().unwrap() = Some(status.clone());
                Ok(())
            });

        let reconciler = AddonReconciler::new(store);
        let outcome = reconciler
            .reconcile_addon("cluster1", "work-manager", now())
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::RequeueAfter(Duration::from_secs(150)));

        let status = written.lock().unwrap().clone().unwrap();
        let progressing = find_condition(&status.conditions, &ConditionType::Progressing).unwrap();
        assert_eq!(progressing.status, ConditionStatus::False);
        assert!(find_condition(&status.conditions, &ConditionType::Degraded).is_none());
        assert_eq!(status.related_objects.len(), 1);
    }

    #[tokio::test]
    async fn test_unchanged_status_skips_write() {
        let mut current = owned_addon("work-manager");
        let mut conditions = Vec::new();
        crate::status::apply_diagnosis(
            &mut conditions,
            crate::status::InstallState::Enabled(Some(crate::manifests::ManifestApplyCount {
                failed: 0,
                succeeded: 1,
                total: 1,
            })),
            &crate::liveness::classify(Some(&lease(Some(now()), Some(30))), now()),
            now(),
        );
        current.status.as_mut().unwrap().conditions = conditions;

        let mut store = MockAddonStore::new();
        store
            .expect_get_addon()
            .returning(move |_, _| Ok(Some(current.clone())));
        store
            .expect_get_lease()
            .returning(|_, _| Ok(Some(lease(Some(now()), Some(30)))));
        store
            .expect_get_manifest_work()
            .returning(|_, _| Ok(Some(work_with(1, &[(0, ConditionStatus::True)]))));
        store
            .expect_get_addon_config()
            .returning(|_, _| Ok(Some(config(false))));
        store.expect_update_addon_status().never();

        let reconciler = AddonReconciler::new(store);
        let outcome = reconciler
            .reconcile_addon("cluster1", "work-manager", now() + chrono::Duration::seconds(30))
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::RequeueAfter(Duration::from_secs(121)));
    }

    #[tokio::test]
    async fn test_disabled_addon_without_work_is_deleted() {
        let mut store = MockAddonStore::new();
        let mut seq = Sequence::new();
        store
            .expect_get_addon()
            .returning(|_, name| Ok(Some(owned_addon(name))));
        store.expect_get_lease().returning(|_, _| Ok(None));
        store.expect_get_manifest_work().returning(|_, _| Ok(None));
        store
            .expect_get_addon_config()
            .returning(|_, _| Ok(Some(config(false))));
        store
            .expect_delete_lease()
            .with(eq("cluster1"), eq("search-collector"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(OperatorError::NotFound("lease".to_string())));
        store
            .expect_delete_addon()
            .with(eq("cluster1"), eq("search-collector"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        store.expect_update_addon_status().never();

        let reconciler = AddonReconciler::new(store);
        let outcome = reconciler
            .reconcile_addon("cluster1", "search-collector", now())
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Done);
    }

    #[tokio::test]
    async fn test_missing_config_cascades_immediately() {
        let mut store = MockAddonStore::new();
        store
            .expect_get_addon()
            .returning(|_, name| Ok(Some(owned_addon(name))));
        store
            .expect_get_lease()
            .returning(|_, _| Ok(Some(lease(Some(now()), Some(30)))));
        store
            .expect_get_manifest_work()
            .returning(|_, _| Ok(Some(work_with(1, &[]))));
        store.expect_get_addon_config().returning(|_, _| Ok(None));
        store.expect_delete_lease().times(1).returning(|_, _| Ok(()));
        store.expect_delete_addon().times(1).returning(|_, _| Ok(()));
        store.expect_update_addon_status().never();

        let reconciler = AddonReconciler::new(store);
        let outcome = reconciler
            .reconcile_addon("cluster1", "work-manager", now())
            .await
            .unwrap();
        assert_eq!(outcome, ReconcileOutcome::Done);
    }

    #[tokio::test]
    async fn test_fetch_error_aborts_without_write() {
        let mut store = MockAddonStore::new();
        store
            .expect_get_addon()
            .returning(|_, name| Ok(Some(owned_addon(name))));
        store
            .expect_get_lease()
            .returning(|_, _| Err(OperatorError::KubeApi("connection refused".to_string())));
        store.expect_update_addon_status().never();
        store.expect_delete_addon().never();

        let reconciler = AddonReconciler::new(store);
        let err = reconciler
            .reconcile_addon("cluster1", "work-manager", now())
            .await
            .unwrap_err();
        assert!(matches!(err, OperatorError::KubeApi(_)));
    }

    #[tokio::test]
    async fn test_status_write_conflict_is_returned() {
        let mut store = MockAddonStore::new();
        store
            .expect_get_addon()
            .returning(|_, name| Ok(Some(owned_addon(name))));
        store.expect_get_lease().returning(|_, _| Ok(None));
        store.expect_get_manifest_work().returning(|_, _| Ok(None));
        store
            .expect_get_addon_config()
            .returning(|_, _| Ok(Some(config(true))));
        store
            .expect_update_addon_status()
            .returning(|_, _| Err(OperatorError::KubeApi("conflict".to_string())));

        let reconciler = AddonReconciler::new(store);
        assert!(reconciler
            .reconcile_addon("cluster1", "search-collector", now())
            .await
            .is_err());
    }

    #[test]
    fn test_map_manifest_work() {
        let work = work_with(1, &[]);
        let addon = map_manifest_work(work).unwrap();
        assert_eq!(addon.name, "work-manager");
        assert_eq!(addon.namespace.as_deref(), Some("cluster1"));

        let unrelated = ManifestWork::new("cluster1-something-else", Default::default());
        assert!(map_manifest_work(unrelated).is_none());
    }

    #[test]
    fn test_map_lease() {
        let addon = map_lease(lease(Some(now()), Some(30))).unwrap();
        assert_eq!(addon.name, "work-manager");

        let mut other = lease(Some(now()), Some(30));
        other.metadata.name = Some("kube-controller-manager".to_string());
        assert!(map_lease(other).is_none());
    }

    #[test]
    fn test_map_addon_config_fans_out() {
        let refs = map_addon_config(config(true));
        assert_eq!(refs.len(), addons::CATALOG.len());
        assert!(refs.iter().all(|r| r.namespace.as_deref() == Some("cluster1")));

        let unscoped = KlusterletAddonConfig::new("cluster1", KlusterletAddonConfigSpec::default());
        assert!(map_addon_config(unscoped).is_empty());
    }

    #[test]
    fn test_outcome_into_action() {
        assert_eq!(Action::from(ReconcileOutcome::Done), Action::await_change());
        assert_eq!(
            Action::from(ReconcileOutcome::RequeueAfter(Duration::from_secs(30))),
            Action::requeue(Duration::from_secs(30))
        );
    }
}
