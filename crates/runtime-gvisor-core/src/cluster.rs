//! The `Cluster` extension resource and the parts of the embedded Shoot we use
//!
//! Gardener writes one cluster-scoped `Cluster` per shoot, named like the
//! shoot's control-plane namespace. Its spec embeds the full Shoot manifest as
//! a raw object; only metadata and the Kubernetes version are decoded here.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::constants::{FORCE_DELETION_ANNOTATION, parse_bool};
use crate::error::{CoreError, Result};

#[derive(CustomResource, Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "extensions.gardener.cloud",
    version = "v1alpha1",
    kind = "Cluster",
    plural = "clusters"
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    #[serde(default)]
    pub cloud_profile: serde_json::Value,

    #[serde(default)]
    pub seed: serde_json::Value,

    #[serde(default)]
    pub shoot: serde_json::Value,
}

/// Minimal view of a Shoot
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Shoot {
    #[serde(default)]
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub spec: ShootSpec,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShootSpec {
    #[serde(default)]
    pub kubernetes: ShootKubernetes,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShootKubernetes {
    #[serde(default)]
    pub version: String,
}

impl Cluster {
    /// Decode the embedded Shoot
    pub fn shoot(&self) -> Result<Shoot> {
        if self.spec.shoot.is_null() {
            return Err(CoreError::InvalidShoot {
                cluster: self.name_any(),
                message: "spec.shoot is empty".to_string(),
            });
        }

        serde_json::from_value(self.spec.shoot.clone()).map_err(|e| CoreError::InvalidShoot {
            cluster: self.name_any(),
            message: e.to_string(),
        })
    }
}

impl Shoot {
    /// Declared Kubernetes version of the shoot
    pub fn kubernetes_version(&self) -> &str {
        &self.spec.kubernetes.version
    }

    /// Whether the shoot is being deleted and the deletion was confirmed as forced.
    /// Deletions of a force-deleted shoot must not wait for the resource manager.
    pub fn needs_force_deletion(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
            && self
                .metadata
                .annotations
                .as_ref()
                .and_then(|a| a.get(FORCE_DELETION_ANNOTATION))
                .and_then(|v| parse_bool(v))
                .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster(shoot: serde_json::Value) -> Cluster {
        Cluster::new(
            "shoot--dev--test",
            ClusterSpec {
                shoot,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_shoot_kubernetes_version() {
        let cluster = cluster(serde_json::json!({
            "metadata": {"name": "test", "namespace": "garden-dev"},
            "spec": {"kubernetes": {"version": "1.31.1"}}
        }));

        let shoot = cluster.shoot().unwrap();
        assert_eq!(shoot.kubernetes_version(), "1.31.1");
        assert!(!shoot.needs_force_deletion());
    }

    #[test]
    fn test_shoot_missing() {
        let cluster = cluster(serde_json::Value::Null);
        assert!(matches!(cluster.shoot(), Err(CoreError::InvalidShoot { .. })));
    }

    #[test]
    fn test_force_deletion_requires_deletion_timestamp() {
        let cluster = cluster(serde_json::json!({
            "metadata": {
                "name": "test",
                "annotations": {"confirmation.gardener.cloud/force-deletion": "true"}
            },
            "spec": {"kubernetes": {"version": "1.31.1"}}
        }));
        assert!(!cluster.shoot().unwrap().needs_force_deletion());
    }

    #[test]
    fn test_force_deletion() {
        let cluster = cluster(serde_json::json!({
            "metadata": {
                "name": "test",
                "deletionTimestamp": "2026-01-01T00:00:00Z",
                "annotations": {"confirmation.gardener.cloud/force-deletion": "True"}
            },
            "spec": {"kubernetes": {"version": "1.31.1"}}
        }));
        assert!(cluster.shoot().unwrap().needs_force_deletion());
    }

    #[test]
    fn test_force_deletion_annotation_not_bool() {
        let cluster = cluster(serde_json::json!({
            "metadata": {
                "name": "test",
                "deletionTimestamp": "2026-01-01T00:00:00Z",
                "annotations": {"confirmation.gardener.cloud/force-deletion": "please"}
            }
        }));
        assert!(!cluster.shoot().unwrap().needs_force_deletion());
    }
}
