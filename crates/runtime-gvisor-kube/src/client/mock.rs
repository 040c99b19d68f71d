//! In-memory seed client for testing
//!
//! Besides storing objects, the mock plays the resource manager: creating a
//! ManagedResource "deploys" its objects, deleting it removes them again
//! unless `keepObjects` is set. With finalisation switched off, deleted
//! ManagedResources linger with a deletion timestamp until
//! [`MockSeedClient::finalize_deletions`] is called.

use async_trait::async_trait;
use k8s_openapi::api::coordination::v1::Lease;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::{Resource, ResourceExt};
use runtime_gvisor_core::{Cluster, ContainerRuntime, ContainerRuntimeStatus, ExtensionCondition};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::SeedClient;
use crate::error::{KubeError, Result};
use crate::managed_resource::ManagedResource;

type Key = (String, String);

/// In-memory seed client for testing
#[derive(Clone, Default)]
pub struct MockSeedClient {
    state: Arc<RwLock<MockState>>,
    operations: Arc<RwLock<OperationCounts>>,
}

#[derive(Default)]
struct MockState {
    secrets: BTreeMap<Key, Secret>,
    managed_resources: BTreeMap<Key, ManagedResource>,
    container_runtimes: BTreeMap<Key, ContainerRuntime>,
    clusters: BTreeMap<String, Cluster>,
    leases: BTreeMap<Key, Lease>,
    /// ManagedResources whose objects exist in the shoot
    deployed: BTreeSet<Key>,
    /// Leave deleted ManagedResources pending
    hold_deletions: bool,
    resource_version: u64,
}

impl MockState {
    fn next_version(&mut self) -> String {
        self.resource_version += 1;
        self.resource_version.to_string()
    }
}

/// Counts of operations performed for testing assertions
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OperationCounts {
    pub gets: usize,
    pub lists: usize,
    pub creates: usize,
    pub updates: usize,
    pub deletes: usize,
    pub patches: usize,
}

fn key_of<K: Resource>(obj: &K) -> Result<Key> {
    let meta = obj.meta();
    match (&meta.namespace, &meta.name) {
        (Some(ns), Some(name)) => Ok((ns.clone(), name.clone())),
        _ => Err(KubeError::InvalidResource(
            "object without namespace or name".to_string(),
        )),
    }
}

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

fn already_exists(kind: &str, key: &Key) -> KubeError {
    KubeError::Api(kube::Error::Api(kube::core::ErrorResponse {
        status: "Failure".to_string(),
        message: format!("{} \"{}\" already exists", kind, key.1),
        reason: "AlreadyExists".to_string(),
        code: 409,
    }))
}

fn not_found(kind: &str, key: &Key) -> KubeError {
    KubeError::Api(kube::Error::Api(kube::core::ErrorResponse {
        status: "Failure".to_string(),
        message: format!("{} \"{}\" not found", kind, key.1),
        reason: "NotFound".to_string(),
        code: 404,
    }))
}

impl MockSeedClient {
    /// Create an empty seed
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep deleted ManagedResources around (with a deletion timestamp)
    /// instead of finalising them right away
    pub async fn hold_deletions(&self, hold: bool) {
        self.state.write().await.hold_deletions = hold;
    }

    /// Finalise all pending ManagedResource deletions
    pub async fn finalize_deletions(&self) {
        let mut state = self.state.write().await;
        let pending: Vec<Key> = state
            .managed_resources
            .iter()
            .filter(|(_, mr)| mr.meta().deletion_timestamp.is_some())
            .map(|(k, _)| k.clone())
            .collect();
        for k in pending {
            if let Some(mr) = state.managed_resources.remove(&k)
                && !mr.keeps_objects()
            {
                state.deployed.remove(&k);
            }
        }
    }

    /// Store a ContainerRuntime
    pub async fn insert_container_runtime(&self, cr: ContainerRuntime) {
        let Ok(k) = key_of(&cr) else { return };
        self.state.write().await.container_runtimes.insert(k, cr);
    }

    /// Store a Cluster
    pub async fn insert_cluster(&self, cluster: Cluster) {
        self.state
            .write()
            .await
            .clusters
            .insert(cluster.name_any(), cluster);
    }

    /// Store a ManagedResource as is, without deploying it
    pub async fn insert_managed_resource(&self, mr: ManagedResource) {
        let Ok(k) = key_of(&mr) else { return };
        self.state.write().await.managed_resources.insert(k, mr);
    }

    /// Current copy of a ContainerRuntime
    pub async fn container_runtime(&self, namespace: &str, name: &str) -> Option<ContainerRuntime> {
        self.state
            .read()
            .await
            .container_runtimes
            .get(&key(namespace, name))
            .cloned()
    }

    /// Current copy of a ManagedResource
    pub async fn managed_resource(&self, namespace: &str, name: &str) -> Option<ManagedResource> {
        self.state
            .read()
            .await
            .managed_resources
            .get(&key(namespace, name))
            .cloned()
    }

    /// Current copy of a Secret
    pub async fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.state
            .read()
            .await
            .secrets
            .get(&key(namespace, name))
            .cloned()
    }

    /// Current copy of a Lease
    pub async fn lease(&self, namespace: &str, name: &str) -> Option<Lease> {
        self.state
            .read()
            .await
            .leases
            .get(&key(namespace, name))
            .cloned()
    }

    /// Names of all ManagedResources in a namespace
    pub async fn managed_resource_names(&self, namespace: &str) -> Vec<String> {
        self.state
            .read()
            .await
            .managed_resources
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, name)| name.clone())
            .collect()
    }

    /// Names of all Secrets in a namespace
    pub async fn secret_names(&self, namespace: &str) -> Vec<String> {
        self.state
            .read()
            .await
            .secrets
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, name)| name.clone())
            .collect()
    }

    /// Whether the objects of a ManagedResource exist in the shoot
    pub async fn is_deployed(&self, namespace: &str, name: &str) -> bool {
        self.state.read().await.deployed.contains(&key(namespace, name))
    }

    /// Get operation counts for assertions
    pub async fn operation_counts(&self) -> OperationCounts {
        self.operations.read().await.clone()
    }

    /// Reset operation counts
    pub async fn reset_counts(&self) {
        *self.operations.write().await = OperationCounts::default();
    }

    async fn count(&self, f: impl FnOnce(&mut OperationCounts)) {
        f(&mut *self.operations.write().await);
    }
}

#[async_trait]
impl SeedClient for MockSeedClient {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>> {
        self.count(|o| o.gets += 1).await;
        Ok(self.secret(namespace, name).await)
    }

    async fn create_secret(&self, secret: &Secret) -> Result<()> {
        self.count(|o| o.creates += 1).await;
        let k = key_of(secret)?;
        let mut state = self.state.write().await;
        if state.secrets.contains_key(&k) {
            return Err(already_exists("secrets", &k));
        }
        let mut secret = secret.clone();
        secret.metadata.resource_version = Some(state.next_version());
        state.secrets.insert(k, secret);
        Ok(())
    }

    async fn update_secret(&self, secret: &Secret) -> Result<()> {
        self.count(|o| o.updates += 1).await;
        let k = key_of(secret)?;
        let mut state = self.state.write().await;
        if !state.secrets.contains_key(&k) {
            return Err(not_found("secrets", &k));
        }
        let mut secret = secret.clone();
        secret.metadata.resource_version = Some(state.next_version());
        state.secrets.insert(k, secret);
        Ok(())
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<()> {
        self.count(|o| o.deletes += 1).await;
        self.state.write().await.secrets.remove(&key(namespace, name));
        Ok(())
    }

    async fn get_managed_resource(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ManagedResource>> {
        self.count(|o| o.gets += 1).await;
        Ok(self.managed_resource(namespace, name).await)
    }

    async fn create_managed_resource(&self, mr: &ManagedResource) -> Result<()> {
        self.count(|o| o.creates += 1).await;
        let k = key_of(mr)?;
        let mut state = self.state.write().await;
        if state.managed_resources.contains_key(&k) {
            return Err(already_exists("managedresources", &k));
        }
        let mut mr = mr.clone();
        mr.metadata.resource_version = Some(state.next_version());
        state.managed_resources.insert(k.clone(), mr);
        state.deployed.insert(k);
        Ok(())
    }

    async fn update_managed_resource(&self, mr: &ManagedResource) -> Result<()> {
        self.count(|o| o.updates += 1).await;
        let k = key_of(mr)?;
        let mut state = self.state.write().await;
        if !state.managed_resources.contains_key(&k) {
            return Err(not_found("managedresources", &k));
        }
        let mut mr = mr.clone();
        mr.metadata.resource_version = Some(state.next_version());
        state.managed_resources.insert(k.clone(), mr);
        state.deployed.insert(k);
        Ok(())
    }

    async fn delete_managed_resource(&self, namespace: &str, name: &str) -> Result<()> {
        self.count(|o| o.deletes += 1).await;
        let k = key(namespace, name);
        let mut state = self.state.write().await;

        if state.hold_deletions {
            if let Some(mr) = state.managed_resources.get_mut(&k)
                && mr.metadata.deletion_timestamp.is_none()
            {
                mr.metadata.deletion_timestamp = Some(Time(chrono::Utc::now()));
            }
            return Ok(());
        }

        if let Some(mr) = state.managed_resources.remove(&k)
            && !mr.keeps_objects()
        {
            state.deployed.remove(&k);
        }
        Ok(())
    }

    async fn list_container_runtimes(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<ContainerRuntime>> {
        self.count(|o| o.lists += 1).await;
        Ok(self
            .state
            .read()
            .await
            .container_runtimes
            .iter()
            .filter(|((ns, _), _)| namespace.is_none_or(|n| n == ns))
            .map(|(_, cr)| cr.clone())
            .collect())
    }

    async fn get_cluster(&self, name: &str) -> Result<Option<Cluster>> {
        self.count(|o| o.gets += 1).await;
        Ok(self.state.read().await.clusters.get(name).cloned())
    }

    async fn update_container_runtime_status(
        &self,
        cr: &ContainerRuntime,
        status: &ContainerRuntimeStatus,
    ) -> Result<()> {
        self.count(|o| o.patches += 1).await;
        let k = key_of(cr)?;
        let mut state = self.state.write().await;
        let stored = state
            .container_runtimes
            .get_mut(&k)
            .ok_or_else(|| not_found("containerruntimes", &k))?;
        let stored = stored.status.get_or_insert_with(Default::default);
        stored.last_operation = status.last_operation.clone();
        stored.last_error = status.last_error.clone();
        stored.observed_generation = status.observed_generation;
        Ok(())
    }

    async fn update_container_runtime_conditions(
        &self,
        cr: &ContainerRuntime,
        conditions: &[ExtensionCondition],
    ) -> Result<()> {
        self.count(|o| o.patches += 1).await;
        let k = key_of(cr)?;
        let mut state = self.state.write().await;
        let stored = state
            .container_runtimes
            .get_mut(&k)
            .ok_or_else(|| not_found("containerruntimes", &k))?;
        stored.status.get_or_insert_with(Default::default).conditions = conditions.to_vec();
        Ok(())
    }

    async fn add_container_runtime_finalizer(
        &self,
        cr: &ContainerRuntime,
        finalizer: &str,
    ) -> Result<()> {
        self.count(|o| o.patches += 1).await;
        let k = key_of(cr)?;
        let mut state = self.state.write().await;
        let stored = state
            .container_runtimes
            .get_mut(&k)
            .ok_or_else(|| not_found("containerruntimes", &k))?;
        if !stored.finalizers().iter().any(|f| f == finalizer) {
            stored.finalizers_mut().push(finalizer.to_string());
        }
        Ok(())
    }

    async fn remove_container_runtime_finalizer(
        &self,
        cr: &ContainerRuntime,
        finalizer: &str,
    ) -> Result<()> {
        self.count(|o| o.patches += 1).await;
        let k = key_of(cr)?;
        let mut state = self.state.write().await;
        let Some(stored) = state.container_runtimes.get_mut(&k) else {
            return Ok(());
        };
        stored.finalizers_mut().retain(|f| f != finalizer);
        // an object under deletion goes away with its last finalizer
        if stored.is_deleting() && stored.finalizers().is_empty() {
            state.container_runtimes.remove(&k);
        }
        Ok(())
    }

    async fn remove_container_runtime_annotation(
        &self,
        cr: &ContainerRuntime,
        annotation: &str,
    ) -> Result<()> {
        self.count(|o| o.patches += 1).await;
        let k = key_of(cr)?;
        let mut state = self.state.write().await;
        let stored = state
            .container_runtimes
            .get_mut(&k)
            .ok_or_else(|| not_found("containerruntimes", &k))?;
        stored.annotations_mut().remove(annotation);
        Ok(())
    }

    async fn get_lease(&self, namespace: &str, name: &str) -> Result<Option<Lease>> {
        self.count(|o| o.gets += 1).await;
        Ok(self.lease(namespace, name).await)
    }

    async fn create_lease(&self, lease: &Lease) -> Result<()> {
        self.count(|o| o.creates += 1).await;
        let k = key_of(lease)?;
        let mut state = self.state.write().await;
        if state.leases.contains_key(&k) {
            return Err(already_exists("leases", &k));
        }
        let mut lease = lease.clone();
        lease.metadata.resource_version = Some(state.next_version());
        state.leases.insert(k, lease);
        Ok(())
    }

    async fn update_lease(&self, lease: &Lease) -> Result<()> {
        self.count(|o| o.updates += 1).await;
        let k = key_of(lease)?;
        let mut state = self.state.write().await;
        if !state.leases.contains_key(&k) {
            return Err(not_found("leases", &k));
        }
        let mut lease = lease.clone();
        lease.metadata.resource_version = Some(state.next_version());
        state.leases.insert(k, lease);
        Ok(())
    }
}
