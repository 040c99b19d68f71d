//! The `ManagedResource` resource of the gardener-resource-manager
//!
//! A ManagedResource bundles the objects stored in its referenced secrets.
//! The resource manager applies them to the shoot and deletes them again when
//! the ManagedResource goes away, unless `keepObjects` is set.

use kube::CustomResource;
use runtime_gvisor_core::ExtensionCondition;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

use crate::client::SeedClient;
use crate::error::{KubeError, Result};

/// Condition set once all objects were applied
pub const CONDITION_RESOURCES_APPLIED: &str = "ResourcesApplied";

/// Condition set once all applied objects are healthy
pub const CONDITION_RESOURCES_HEALTHY: &str = "ResourcesHealthy";

/// Condition set while applied objects are still rolling out
pub const CONDITION_RESOURCES_PROGRESSING: &str = "ResourcesProgressing";

#[derive(CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "resources.gardener.cloud",
    version = "v1alpha1",
    kind = "ManagedResource",
    plural = "managedresources",
    shortname = "mr",
    status = "ManagedResourceStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ManagedResourceSpec {
    /// Resource class handled by a specific resource manager instance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,

    /// Secrets holding the objects to apply
    #[serde(default)]
    pub secret_refs: Vec<SecretRef>,

    /// Leave the applied objects in place when the ManagedResource is deleted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_objects: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct SecretRef {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManagedResourceStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<ExtensionCondition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl ManagedResource {
    /// Look up a status condition by type
    pub fn condition(&self, type_: &str) -> Option<&ExtensionCondition> {
        self.status
            .as_ref()?
            .conditions
            .iter()
            .find(|c| c.type_ == type_)
    }

    /// Names of the referenced secrets
    pub fn secret_ref_names(&self) -> Vec<&str> {
        self.spec.secret_refs.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn keeps_objects(&self) -> bool {
        self.spec.keep_objects.unwrap_or(false)
    }
}

/// Set `keepObjects` on a ManagedResource. A missing ManagedResource is not an error.
pub async fn set_keep_objects(
    client: &dyn SeedClient,
    namespace: &str,
    name: &str,
    keep: bool,
) -> Result<()> {
    let Some(mut mr) = client.get_managed_resource(namespace, name).await? else {
        return Ok(());
    };
    if mr.spec.keep_objects == Some(keep) {
        return Ok(());
    }
    mr.spec.keep_objects = Some(keep);
    client.update_managed_resource(&mr).await
}

/// Delete a ManagedResource and the secret holding its objects
pub async fn delete_managed_resource(
    client: &dyn SeedClient,
    namespace: &str,
    name: &str,
    secret_name: &str,
) -> Result<()> {
    client.delete_managed_resource(namespace, name).await?;
    client.delete_secret(namespace, secret_name).await
}

/// Poll until the resource manager has removed a ManagedResource
pub async fn wait_until_managed_resource_deleted(
    client: &dyn SeedClient,
    namespace: &str,
    name: &str,
    interval: Duration,
    timeout: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;

    loop {
        if client.get_managed_resource(namespace, name).await?.is_none() {
            return Ok(());
        }

        if Instant::now() >= deadline {
            return Err(KubeError::Timeout(format!(
                "managed resource {}/{} still exists after {}s",
                namespace,
                name,
                timeout.as_secs_f64()
            )));
        }

        tokio::time::sleep(interval).await;
    }
}
