//! Object store access for the addon controller.
//!
//! The controller reads four kinds of objects and writes to two. Reads
//! normalize 404 to `None`; deletes surface 404 as
//! [`OperatorError::NotFound`] so callers decide whether absence is fine.

use crate::crd::{AddonStatus, KlusterletAddonConfig, ManagedClusterAddOn, ManifestWork};
use crate::error::{OperatorError, Result};
use async_trait::async_trait;
use k8s_openapi::api::coordination::v1::Lease;
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, DeleteParams, Patch, PatchParams};
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

/// Trait abstracting Kubernetes operations needed to reconcile an addon
///
/// This trait allows mocking the Kubernetes client in tests while using
/// the real client in production.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AddonStore: Send + Sync {
    async fn get_addon(&self, namespace: &str, name: &str) -> Result<Option<ManagedClusterAddOn>>;

    async fn get_lease(&self, namespace: &str, name: &str) -> Result<Option<Lease>>;

    async fn get_manifest_work(&self, namespace: &str, name: &str) -> Result<Option<ManifestWork>>;

    async fn get_addon_config(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<KlusterletAddonConfig>>;

    /// Write `status` to the addon, failing on a resourceVersion conflict.
    async fn update_addon_status(
        &self,
        addon: &ManagedClusterAddOn,
        status: &AddonStatus,
    ) -> Result<()>;

    async fn delete_lease(&self, namespace: &str, name: &str) -> Result<()>;

    async fn delete_addon(&self, namespace: &str, name: &str) -> Result<()>;
}

/// [`AddonStore`] backed by the Kubernetes API
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn get_opt<K>(&self, namespace: &str, name: &str) -> Result<Option<K>>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + DeserializeOwned
            + Debug,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn delete<K>(&self, namespace: &str, name: &str) -> Result<()>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + DeserializeOwned
            + Debug,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        api.delete(name, &DeleteParams::default()).await?;
        debug!(kind = %K::kind(&()), namespace, name, "Delete requested");
        Ok(())
    }
}

#[async_trait]
impl AddonStore for KubeStore {
    async fn get_addon(&self, namespace: &str, name: &str) -> Result<Option<ManagedClusterAddOn>> {
        self.get_opt(namespace, name).await
    }

    async fn get_lease(&self, namespace: &str, name: &str) -> Result<Option<Lease>> {
        self.get_opt(namespace, name).await
    }

    async fn get_manifest_work(&self, namespace: &str, name: &str) -> Result<Option<ManifestWork>> {
        self.get_opt(namespace, name).await
    }

    async fn get_addon_config(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<KlusterletAddonConfig>> {
        self.get_opt(namespace, name).await
    }

    async fn update_addon_status(
        &self,
        addon: &ManagedClusterAddOn,
        status: &AddonStatus,
    ) -> Result<()> {
        let namespace = addon.namespace().ok_or_else(|| {
            OperatorError::Configuration(format!("addon {} has no namespace", addon.name_any()))
        })?;
        let addons: Api<ManagedClusterAddOn> = Api::namespaced(self.client.clone(), &namespace);

        // resourceVersion makes the patch fail with 409 if the addon changed
        // since it was read.
        let patch = serde_json::json!({
            "metadata": { "resourceVersion": addon.resource_version() },
            "status": status,
        });
        addons
            .patch_status(&addon.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn delete_lease(&self, namespace: &str, name: &str) -> Result<()> {
        self.delete::<Lease>(namespace, name).await
    }

    async fn delete_addon(&self, namespace: &str, name: &str) -> Result<()> {
        self.delete::<ManagedClusterAddOn>(namespace, name).await
    }
}
