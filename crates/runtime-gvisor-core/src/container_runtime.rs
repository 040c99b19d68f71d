//! The `ContainerRuntime` extension resource
//!
//! One ContainerRuntime exists per worker pool and runtime type. It is written
//! by the orchestrator in the shoot's control-plane namespace; this extension
//! only handles resources whose `spec.type` is [`TYPE`](crate::constants::TYPE).

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, Time};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::{self, OPERATION_ANNOTATION, TYPE};

#[derive(CustomResource, Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "extensions.gardener.cloud",
    version = "v1alpha1",
    kind = "ContainerRuntime",
    plural = "containerruntimes",
    shortname = "cr",
    status = "ContainerRuntimeStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ContainerRuntimeSpec {
    /// Folder on the worker nodes the runtime binaries are installed into
    pub binary_path: String,

    /// Runtime type (e.g. `gvisor`)
    #[serde(rename = "type")]
    pub type_: String,

    /// Raw provider configuration, decoded by [`crate::config`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_config: Option<serde_json::Value>,

    /// Worker pool the runtime is requested for
    pub worker_pool: ContainerRuntimeWorkerPool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContainerRuntimeWorkerPool {
    /// Worker pool name
    pub name: String,

    /// Selector matching the nodes of the worker pool
    #[serde(default)]
    pub selector: LabelSelector,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContainerRuntimeStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_operation: Option<LastOperation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<LastError>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<ExtensionCondition>,
}

/// Kind of the operation last performed on the resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum LastOperationType {
    Create,
    Reconcile,
    Delete,
    Migrate,
    Restore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum LastOperationState {
    Processing,
    Succeeded,
    Error,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LastOperation {
    pub description: String,
    pub last_update_time: Time,
    pub progress: i32,
    pub state: LastOperationState,
    #[serde(rename = "type")]
    pub type_: LastOperationType,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LastError {
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub codes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<Time>,
}

/// Condition reported on extension resources (e.g. by the health check)
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionCondition {
    #[serde(rename = "type")]
    pub type_: String,
    /// `True`, `False`, `Unknown` or `Progressing`
    pub status: String,
    pub last_transition_time: Time,
    pub last_update_time: Time,
    pub reason: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub codes: Vec<String>,
}

impl ContainerRuntime {
    /// Name of the worker pool this runtime is requested for
    pub fn worker_pool_name(&self) -> &str {
        &self.spec.worker_pool.name
    }

    /// Name of the per worker pool installation ManagedResource
    pub fn installation_managed_resource_name(&self) -> String {
        constants::installation_managed_resource_name(self.worker_pool_name())
    }

    /// Name of the per worker pool installation secret
    pub fn installation_secret_name(&self) -> String {
        constants::installation_secret_name(self.worker_pool_name())
    }

    /// Whether this resource is handled by the gVisor extension
    pub fn is_gvisor(&self) -> bool {
        self.spec.type_ == TYPE
    }

    /// Whether the resource carries a deletion timestamp
    pub fn is_deleting(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    /// Value of the `gardener.cloud/operation` annotation, if any
    pub fn operation_annotation(&self) -> Option<&str> {
        self.annotations().get(OPERATION_ANNOTATION).map(String::as_str)
    }

    /// Labels of the worker pool selector (empty if unset)
    pub fn match_labels(&self) -> BTreeMap<String, String> {
        self.spec
            .worker_pool
            .selector
            .match_labels
            .clone()
            .unwrap_or_default()
    }
}
