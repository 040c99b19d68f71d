//! Access to the seed cluster
//!
//! The controllers only talk to the seed through [`SeedClient`]:
//! - **KubeSeedClient**: the real client backed by `kube`
//! - **MockSeedClient**: an in-memory seed for tests, including a simulated
//!   resource manager that finalises deleted ManagedResources
//!
//! Reads return `None` for objects that do not exist and deletes of missing
//! objects succeed, so callers never see not-found errors.

mod kube_client;
mod mock;

pub use kube_client::KubeSeedClient;
pub use mock::{MockSeedClient, OperationCounts};

use async_trait::async_trait;
use k8s_openapi::api::coordination::v1::Lease;
use k8s_openapi::api::core::v1::Secret;
use runtime_gvisor_core::{Cluster, ContainerRuntime, ContainerRuntimeStatus, ExtensionCondition};

use crate::error::Result;
use crate::managed_resource::ManagedResource;

/// Seed cluster operations used by the controllers
///
/// Implementations must be Send + Sync for use across async tasks.
#[async_trait]
pub trait SeedClient: Send + Sync {
    /// Get a secret
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>>;

    /// Create a secret
    async fn create_secret(&self, secret: &Secret) -> Result<()>;

    /// Replace an existing secret
    async fn update_secret(&self, secret: &Secret) -> Result<()>;

    /// Delete a secret, succeeding if it is already gone
    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<()>;

    /// Get a ManagedResource
    async fn get_managed_resource(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ManagedResource>>;

    /// Create a ManagedResource
    async fn create_managed_resource(&self, mr: &ManagedResource) -> Result<()>;

    /// Replace an existing ManagedResource
    async fn update_managed_resource(&self, mr: &ManagedResource) -> Result<()>;

    /// Delete a ManagedResource, succeeding if it is already gone
    async fn delete_managed_resource(&self, namespace: &str, name: &str) -> Result<()>;

    /// List ContainerRuntimes in a namespace, or in all namespaces
    async fn list_container_runtimes(&self, namespace: Option<&str>)
    -> Result<Vec<ContainerRuntime>>;

    /// Get the cluster-scoped Cluster resource
    async fn get_cluster(&self, name: &str) -> Result<Option<Cluster>>;

    /// Write `lastOperation`, `lastError` and `observedGeneration` of a
    /// ContainerRuntime status. Unset fields are cleared; conditions are
    /// left untouched.
    async fn update_container_runtime_status(
        &self,
        cr: &ContainerRuntime,
        status: &ContainerRuntimeStatus,
    ) -> Result<()>;

    /// Replace `status.conditions` of a ContainerRuntime, leaving the rest
    /// of the status untouched
    async fn update_container_runtime_conditions(
        &self,
        cr: &ContainerRuntime,
        conditions: &[ExtensionCondition],
    ) -> Result<()>;

    /// Add a finalizer to a ContainerRuntime unless present
    async fn add_container_runtime_finalizer(&self, cr: &ContainerRuntime, finalizer: &str)
    -> Result<()>;

    /// Remove a finalizer from a ContainerRuntime, succeeding if the
    /// resource is already gone
    async fn remove_container_runtime_finalizer(
        &self,
        cr: &ContainerRuntime,
        finalizer: &str,
    ) -> Result<()>;

    /// Remove an annotation from a ContainerRuntime
    async fn remove_container_runtime_annotation(
        &self,
        cr: &ContainerRuntime,
        annotation: &str,
    ) -> Result<()>;

    /// Get a Lease
    async fn get_lease(&self, namespace: &str, name: &str) -> Result<Option<Lease>>;

    /// Create a Lease
    async fn create_lease(&self, lease: &Lease) -> Result<()>;

    /// Replace an existing Lease
    async fn update_lease(&self, lease: &Lease) -> Result<()>;
}
