//! Seed client backed by the Kubernetes API

use async_trait::async_trait;
use k8s_openapi::api::coordination::v1::Lease;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Client, Resource, ResourceExt};
use runtime_gvisor_core::{Cluster, ContainerRuntime, ContainerRuntimeStatus, ExtensionCondition};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Debug;

use super::SeedClient;
use crate::error::{KubeError, Result};
use crate::managed_resource::ManagedResource;

/// Seed client talking to the API server
#[derive(Clone)]
pub struct KubeSeedClient {
    client: Client,
}

impl KubeSeedClient {
    /// Create a client from the default kubeconfig / in-cluster config
    pub async fn new() -> Result<Self> {
        let client = Client::try_default().await?;
        Ok(Self { client })
    }

    /// Create with an existing client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// The underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        K::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn container_runtimes(&self, cr: &ContainerRuntime) -> Result<Api<ContainerRuntime>> {
        let namespace = cr.namespace().ok_or_else(|| {
            KubeError::InvalidResource(format!("ContainerRuntime '{}' has no namespace", cr.name_any()))
        })?;
        Ok(self.api(&namespace))
    }
}

fn object_key<K: Resource>(obj: &K) -> Result<(String, String)> {
    let meta = obj.meta();
    match (&meta.namespace, &meta.name) {
        (Some(ns), Some(name)) => Ok((ns.clone(), name.clone())),
        _ => Err(KubeError::InvalidResource(
            "object without namespace or name".to_string(),
        )),
    }
}

async fn delete_ignore_missing<K>(api: &Api<K>, name: &str) -> Result<()>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    match api.delete(name, &DeleteParams::background()).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(resp)) if resp.code == 404 => Ok(()),
        Err(e) => Err(e.into()),
    }
}

async fn create<K>(api: &Api<K>, obj: &K) -> Result<()>
where
    K: Resource + Clone + Serialize + DeserializeOwned + Debug,
{
    api.create(&PostParams::default(), obj).await?;
    Ok(())
}

async fn replace<K>(api: &Api<K>, name: &str, obj: &K) -> Result<()>
where
    K: Resource + Clone + Serialize + DeserializeOwned + Debug,
{
    api.replace(name, &PostParams::default(), obj).await?;
    Ok(())
}

/// Merge patches replace lists; the resource version guards against dropping
/// finalizers written concurrently.
async fn patch_finalizers(
    api: &Api<ContainerRuntime>,
    current: &ContainerRuntime,
    finalizers: Vec<String>,
) -> Result<()> {
    let patch = serde_json::json!({
        "metadata": {
            "finalizers": finalizers,
            "resourceVersion": current.resource_version(),
        }
    });
    api.patch(&current.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
        .await?;
    Ok(())
}

#[async_trait]
impl SeedClient for KubeSeedClient {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>> {
        Ok(self.api::<Secret>(namespace).get_opt(name).await?)
    }

    async fn create_secret(&self, secret: &Secret) -> Result<()> {
        let (namespace, _) = object_key(secret)?;
        create(&self.api(&namespace), secret).await
    }

    async fn update_secret(&self, secret: &Secret) -> Result<()> {
        let (namespace, name) = object_key(secret)?;
        replace(&self.api(&namespace), &name, secret).await
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<()> {
        delete_ignore_missing(&self.api::<Secret>(namespace), name).await
    }

    async fn get_managed_resource(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ManagedResource>> {
        Ok(self.api::<ManagedResource>(namespace).get_opt(name).await?)
    }

    async fn create_managed_resource(&self, mr: &ManagedResource) -> Result<()> {
        let (namespace, _) = object_key(mr)?;
        create(&self.api(&namespace), mr).await
    }

    async fn update_managed_resource(&self, mr: &ManagedResource) -> Result<()> {
        let (namespace, name) = object_key(mr)?;
        replace(&self.api(&namespace), &name, mr).await
    }

    async fn delete_managed_resource(&self, namespace: &str, name: &str) -> Result<()> {
        delete_ignore_missing(&self.api::<ManagedResource>(namespace), name).await
    }

    async fn list_container_runtimes(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<ContainerRuntime>> {
        let api: Api<ContainerRuntime> = match namespace {
            Some(ns) => self.api(ns),
            None => Api::all(self.client.clone()),
        };
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn get_cluster(&self, name: &str) -> Result<Option<Cluster>> {
        let api: Api<Cluster> = Api::all(self.client.clone());
        Ok(api.get_opt(name).await?)
    }

    async fn update_container_runtime_status(
        &self,
        cr: &ContainerRuntime,
        status: &ContainerRuntimeStatus,
    ) -> Result<()> {
        // null clears a field in a merge patch
        let patch = serde_json::json!({
            "status": {
                "lastOperation": status.last_operation,
                "lastError": status.last_error,
                "observedGeneration": status.observed_generation,
            }
        });
        self.container_runtimes(cr)?
            .patch_status(&cr.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn update_container_runtime_conditions(
        &self,
        cr: &ContainerRuntime,
        conditions: &[ExtensionCondition],
    ) -> Result<()> {
        let patch = serde_json::json!({ "status": { "conditions": conditions } });
        self.container_runtimes(cr)?
            .patch_status(&cr.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn add_container_runtime_finalizer(
        &self,
        cr: &ContainerRuntime,
        finalizer: &str,
    ) -> Result<()> {
        let api = self.container_runtimes(cr)?;
        let Some(current) = api.get_opt(&cr.name_any()).await? else {
            return Err(KubeError::InvalidResource(format!(
                "ContainerRuntime '{}' no longer exists",
                cr.name_any()
            )));
        };
        if current.finalizers().iter().any(|f| f == finalizer) {
            return Ok(());
        }
        let mut finalizers = current.finalizers().to_vec();
        finalizers.push(finalizer.to_string());
        patch_finalizers(&api, &current, finalizers).await
    }

    async fn remove_container_runtime_finalizer(
        &self,
        cr: &ContainerRuntime,
        finalizer: &str,
    ) -> Result<()> {
        let api = self.container_runtimes(cr)?;
        let Some(current) = api.get_opt(&cr.name_any()).await? else {
            return Ok(());
        };
        if !current.finalizers().iter().any(|f| f == finalizer) {
            return Ok(());
        }
        let finalizers = current
            .finalizers()
            .iter()
            .filter(|f| *f != finalizer)
            .cloned()
            .collect();
        match patch_finalizers(&api, &current, finalizers).await {
            Err(e) if e.is_not_found() => Ok(()),
            other => other,
        }
    }

    async fn remove_container_runtime_annotation(
        &self,
        cr: &ContainerRuntime,
        annotation: &str,
    ) -> Result<()> {
        let patch = serde_json::json!({
            "metadata": { "annotations": { annotation: null } }
        });
        self.container_runtimes(cr)?
            .patch(&cr.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn get_lease(&self, namespace: &str, name: &str) -> Result<Option<Lease>> {
        Ok(self.api::<Lease>(namespace).get_opt(name).await?)
    }

    async fn create_lease(&self, lease: &Lease) -> Result<()> {
        let (namespace, _) = object_key(lease)?;
        create(&self.api(&namespace), lease).await
    }

    async fn update_lease(&self, lease: &Lease) -> Result<()> {
        let (namespace, name) = object_key(lease)?;
        replace(&self.api(&namespace), &name, lease).await
    }
}
