//! Health check of the gVisor installation
//!
//! Every sync period each live gVisor ContainerRuntime gets a
//! `SystemComponentsHealthy` condition derived from its installation
//! ManagedResource:
//! - missing, not applied or not healthy → `False`
//! - applied and healthy but still rolling out → `Progressing`
//! - otherwise → `True`

use futures::StreamExt;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::ResourceExt;
use runtime_gvisor_core::{ContainerRuntime, ExtensionCondition};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::client::SeedClient;
use crate::error::{KubeError, Result};
use crate::lifecycle::is_migrated;
use crate::managed_resource::{
    CONDITION_RESOURCES_APPLIED, CONDITION_RESOURCES_HEALTHY, CONDITION_RESOURCES_PROGRESSING,
    ManagedResource,
};

/// Condition written by the health check
pub const CONDITION_SYSTEM_COMPONENTS_HEALTHY: &str = "SystemComponentsHealthy";

const STATUS_TRUE: &str = "True";
const STATUS_FALSE: &str = "False";
const STATUS_PROGRESSING: &str = "Progressing";

/// Result of checking one ManagedResource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Progressing(String),
    Unhealthy(String),
}

impl HealthStatus {
    fn condition_status(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => STATUS_TRUE,
            HealthStatus::Progressing(_) => STATUS_PROGRESSING,
            HealthStatus::Unhealthy(_) => STATUS_FALSE,
        }
    }

    fn reason(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "HealthCheckSuccessful",
            HealthStatus::Progressing(_) => "HealthCheckProgressing",
            HealthStatus::Unhealthy(_) => "HealthCheckUnsuccessful",
        }
    }

    fn message(&self) -> String {
        match self {
            HealthStatus::Healthy => "All health checks successful".to_string(),
            HealthStatus::Progressing(m) | HealthStatus::Unhealthy(m) => m.clone(),
        }
    }
}

/// Judge a ManagedResource by the conditions of the resource manager
pub fn check_managed_resource(name: &str, mr: Option<&ManagedResource>) -> HealthStatus {
    let Some(mr) = mr else {
        return HealthStatus::Unhealthy(format!("managed resource {} not found", name));
    };

    let observed = mr.status.as_ref().and_then(|s| s.observed_generation);
    if mr.metadata.generation.is_some() && observed != mr.metadata.generation {
        return HealthStatus::Progressing(format!(
            "managed resource {} is not yet observed by the resource manager",
            name
        ));
    }

    for type_ in [CONDITION_RESOURCES_APPLIED, CONDITION_RESOURCES_HEALTHY] {
        match mr.condition(type_) {
            None => {
                return HealthStatus::Unhealthy(format!(
                    "condition {} of managed resource {} is missing",
                    type_, name
                ));
            }
            Some(c) if c.status != STATUS_TRUE => {
                return HealthStatus::Unhealthy(format!(
                    "condition {} of managed resource {} is {}: {}",
                    type_, name, c.status, c.message
                ));
            }
            Some(_) => {}
        }
    }

    if let Some(c) = mr.condition(CONDITION_RESOURCES_PROGRESSING)
        && c.status == STATUS_TRUE
    {
        return HealthStatus::Progressing(format!(
            "managed resource {} is progressing: {}",
            name, c.message
        ));
    }

    HealthStatus::Healthy
}

/// Set the health condition in `conditions`.
///
/// The transition time only moves when the status changes.
pub fn merge_condition(
    conditions: &[ExtensionCondition],
    health: &HealthStatus,
    now: Time,
) -> Vec<ExtensionCondition> {
    let status = health.condition_status();
    let mut merged: Vec<ExtensionCondition> = conditions
        .iter()
        .filter(|c| c.type_ != CONDITION_SYSTEM_COMPONENTS_HEALTHY)
        .cloned()
        .collect();

    let last_transition_time = conditions
        .iter()
        .find(|c| c.type_ == CONDITION_SYSTEM_COMPONENTS_HEALTHY && c.status == status)
        .map(|c| c.last_transition_time.clone())
        .unwrap_or_else(|| now.clone());

    merged.push(ExtensionCondition {
        type_: CONDITION_SYSTEM_COMPONENTS_HEALTHY.to_string(),
        status: status.to_string(),
        last_transition_time,
        last_update_time: now,
        reason: health.reason().to_string(),
        message: health.message(),
        codes: Vec::new(),
    });
    merged
}

/// Periodic health check over all gVisor ContainerRuntimes
pub struct HealthChecker {
    client: Arc<dyn SeedClient>,
    concurrency: usize,
}

impl HealthChecker {
    pub fn new(client: Arc<dyn SeedClient>) -> Self {
        Self {
            client,
            concurrency: 5,
        }
    }

    /// Maximum number of resources checked at once
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Check one ContainerRuntime and record the outcome in its status
    pub async fn check(&self, cr: &ContainerRuntime) -> Result<HealthStatus> {
        let namespace = cr.namespace().ok_or_else(|| {
            KubeError::InvalidResource(format!("ContainerRuntime '{}' has no namespace", cr.name_any()))
        })?;
        let name = cr.installation_managed_resource_name();
        let mr = self.client.get_managed_resource(&namespace, &name).await?;
        let health = check_managed_resource(&name, mr.as_ref());

        let current = cr.status.as_ref().map(|s| s.conditions.as_slice()).unwrap_or_default();
        let conditions = merge_condition(current, &health, Time(chrono::Utc::now()));
        self.client.update_container_runtime_conditions(cr, &conditions).await?;

        debug!(container_runtime = %cr.name_any(), namespace = %namespace, ?health, "health checked");
        Ok(health)
    }

    /// Check every live gVisor ContainerRuntime once
    pub async fn check_all(&self) -> Result<()> {
        let runtimes = self.client.list_container_runtimes(None).await?;
        futures::stream::iter(
            runtimes
                .into_iter()
                .filter(|cr| cr.is_gvisor() && !cr.is_deleting() && !is_migrated(cr)),
        )
        .for_each_concurrent(self.concurrency, |cr| async move {
            if let Err(e) = self.check(&cr).await {
                warn!(container_runtime = %cr.name_any(), error = %e, "health check failed");
            }
        })
        .await;
        Ok(())
    }

    /// Run [`HealthChecker::check_all`] every sync period
    pub async fn run(self, sync_period: Duration) {
        info!(sync_period = ?sync_period, "starting health checks");
        let mut ticker = tokio::time::interval(sync_period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = self.check_all().await {
                warn!(error = %e, "cannot list container runtimes for health checks");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::tests::{NAMESPACE, actuator, cluster, deleting, runtime};
    use crate::client::MockSeedClient;
    use crate::lifecycle::{ContainerRuntimeReconciler, Operation, Outcome};
    use runtime_gvisor_core::LastOperationState;
    use runtime_gvisor_core::constants::OPERATION_ANNOTATION;
    use std::collections::BTreeMap;
    use crate::managed_resource::{ManagedResourceSpec, ManagedResourceStatus};

    fn condition(type_: &str, status: &str) -> ExtensionCondition {
        let now = Time(chrono::Utc::now());
        ExtensionCondition {
            type_: type_.to_string(),
            status: status.to_string(),
            last_transition_time: now.clone(),
            last_update_time: now,
            reason: String::new(),
            message: "details".to_string(),
            codes: Vec::new(),
        }
    }

    fn managed_resource(conditions: &[(&str, &str)]) -> ManagedResource {
        let mut mr = ManagedResource::new(
            "extension-runtime-gvisor-installation-wp1",
            ManagedResourceSpec::default(),
        );
        mr.metadata.namespace = Some(NAMESPACE.to_string());
        mr.metadata.generation = Some(1);
        mr.status = Some(ManagedResourceStatus {
            conditions: conditions.iter().map(|(t, s)| condition(t, s)).collect(),
            observed_generation: Some(1),
        });
        mr
    }

    #[test]
    fn test_missing_managed_resource() {
        assert!(matches!(
            check_managed_resource("mr", None),
            HealthStatus::Unhealthy(_)
        ));
    }

    #[test]
    fn test_healthy() {
        let mr = managed_resource(&[
            (CONDITION_RESOURCES_APPLIED, "True"),
            (CONDITION_RESOURCES_HEALTHY, "True"),
            (CONDITION_RESOURCES_PROGRESSING, "False"),
        ]);
        assert_eq!(check_managed_resource("mr", Some(&mr)), HealthStatus::Healthy);
    }

    #[test]
    fn test_unhealthy_conditions() {
        let not_applied = managed_resource(&[
            (CONDITION_RESOURCES_APPLIED, "False"),
            (CONDITION_RESOURCES_HEALTHY, "True"),
        ]);
        assert!(matches!(
            check_managed_resource("mr", Some(&not_applied)),
            HealthStatus::Unhealthy(m) if m.contains("ResourcesApplied")
        ));

        let missing_healthy = managed_resource(&[(CONDITION_RESOURCES_APPLIED, "True")]);
        assert!(matches!(
            check_managed_resource("mr", Some(&missing_healthy)),
            HealthStatus::Unhealthy(m) if m.contains("ResourcesHealthy")
        ));
    }

    #[test]
    fn test_progressing() {
        let rolling = managed_resource(&[
            (CONDITION_RESOURCES_APPLIED, "True"),
            (CONDITION_RESOURCES_HEALTHY, "True"),
            (CONDITION_RESOURCES_PROGRESSING, "True"),
        ]);
        assert!(matches!(
            check_managed_resource("mr", Some(&rolling)),
            HealthStatus::Progressing(_)
        ));

        let mut outdated = managed_resource(&[]);
        outdated.metadata.generation = Some(2);
        assert!(matches!(
            check_managed_resource("mr", Some(&outdated)),
            HealthStatus::Progressing(_)
        ));
    }

    #[test]
    fn test_merge_condition_keeps_transition_time() {
        let earlier = Time(chrono::Utc::now() - chrono::Duration::minutes(5));
        let existing = vec![
            ExtensionCondition {
                last_transition_time: earlier.clone(),
                ..condition(CONDITION_SYSTEM_COMPONENTS_HEALTHY, "True")
            },
            condition("Other", "True"),
        ];
        let now = Time(chrono::Utc::now());

        let merged = merge_condition(&existing, &HealthStatus::Healthy, now.clone());
        assert_eq!(merged.len(), 2);
        let health = merged
            .iter()
            .find(|c| c.type_ == CONDITION_SYSTEM_COMPONENTS_HEALTHY)
            .unwrap();
        assert_eq!(health.last_transition_time, earlier);
        assert_eq!(health.last_update_time, now);

        let merged = merge_condition(
            &existing,
            &HealthStatus::Unhealthy("down".to_string()),
            now.clone(),
        );
        let health = merged
            .iter()
            .find(|c| c.type_ == CONDITION_SYSTEM_COMPONENTS_HEALTHY)
            .unwrap();
        assert_eq!(health.status, "False");
        assert_eq!(health.message, "down");
        assert_eq!(health.last_transition_time, now);
    }

    #[tokio::test]
    async fn test_check_all_writes_conditions() {
        let client = MockSeedClient::new();
        client
            .insert_managed_resource(managed_resource(&[
                (CONDITION_RESOURCES_APPLIED, "True"),
                (CONDITION_RESOURCES_HEALTHY, "True"),
            ]))
            .await;
        client.insert_container_runtime(runtime("gvisor-wp1", "wp1")).await;
        client.insert_container_runtime(runtime("gvisor-wp2", "wp2")).await;
        client
            .insert_container_runtime(deleting(runtime("gvisor-wp3", "wp3")))
            .await;

        HealthChecker::new(Arc::new(client.clone()))
            .check_all()
            .await
            .unwrap();

        let status_of = |name: &'static str| {
            let client = client.clone();
            async move {
                client
                    .container_runtime(NAMESPACE, name)
                    .await
                    .and_then(|cr| cr.status)
                    .and_then(|s| {
                        s.conditions
                            .into_iter()
                            .find(|c| c.type_ == CONDITION_SYSTEM_COMPONENTS_HEALTHY)
                    })
                    .map(|c| c.status)
            }
        };
        assert_eq!(status_of("gvisor-wp1").await.as_deref(), Some("True"));
        assert_eq!(status_of("gvisor-wp2").await.as_deref(), Some("False"));
        assert_eq!(status_of("gvisor-wp3").await, None);
    }

    fn health_condition(cr: &ContainerRuntime) -> Option<&ExtensionCondition> {
        cr.status
            .as_ref()?
            .conditions
            .iter()
            .find(|c| c.type_ == CONDITION_SYSTEM_COMPONENTS_HEALTHY)
    }

    #[tokio::test]
    async fn test_check_keeps_operation_status() {
        let client = MockSeedClient::new();
        client.insert_cluster(cluster("1.31.1")).await;
        let cr = runtime("gvisor-wp1", "wp1");
        client.insert_container_runtime(cr.clone()).await;
        let reconciler = ContainerRuntimeReconciler::new(
            Arc::new(client.clone()),
            Arc::new(actuator(&client)),
        );

        // listed before the reconcile finished
        let listed = cr.clone();
        reconciler.reconcile(&cr).await.unwrap();
        HealthChecker::new(Arc::new(client.clone()))
            .check(&listed)
            .await
            .unwrap();

        let stored = client.container_runtime(NAMESPACE, "gvisor-wp1").await.unwrap();
        assert!(health_condition(&stored).is_some());
        let status = stored.status.clone().unwrap();
        assert_eq!(
            status.last_operation.unwrap().state,
            LastOperationState::Succeeded
        );
        assert_eq!(status.observed_generation, Some(1));

        // the condition write does not start another reconcile
        assert_eq!(reconciler.reconcile(&stored).await.unwrap(), Outcome::Skipped);
    }

    #[tokio::test]
    async fn test_reconcile_keeps_health_condition() {
        let client = MockSeedClient::new();
        client.insert_cluster(cluster("1.31.1")).await;
        let cr = runtime("gvisor-wp1", "wp1");
        client.insert_container_runtime(cr.clone()).await;
        let reconciler = ContainerRuntimeReconciler::new(
            Arc::new(client.clone()),
            Arc::new(actuator(&client)),
        );
        reconciler.reconcile(&cr).await.unwrap();

        let stored = client.container_runtime(NAMESPACE, "gvisor-wp1").await.unwrap();
        HealthChecker::new(Arc::new(client.clone()))
            .check(&stored)
            .await
            .unwrap();

        // reconcile from a copy taken before the health check
        let mut requested = stored;
        requested.metadata.annotations = Some(BTreeMap::from([(
            OPERATION_ANNOTATION.to_string(),
            "reconcile".to_string(),
        )]));
        assert_eq!(
            reconciler.reconcile(&requested).await.unwrap(),
            Outcome::Completed(Operation::Reconcile)
        );

        let stored = client.container_runtime(NAMESPACE, "gvisor-wp1").await.unwrap();
        assert!(health_condition(&stored).is_some());
    }
}
