//! ContainerRuntime lifecycle
//!
//! Turns a watch event into one actuator operation and records its progress
//! in the resource status:
//!
//! 1. Resources of other runtime types are ignored
//! 2. A deletion timestamp selects Delete (ForceDelete for force-deleted shoots)
//! 3. The `gardener.cloud/operation` annotation selects Migrate or Restore
//! 4. Everything else is a Reconcile, gated by the operation annotation unless
//!    annotations are ignored
//!
//! The finalizer is added before any object is created and removed once the
//! objects are deleted or handed over to another seed.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::ResourceExt;
use runtime_gvisor_core::constants::{
    FINALIZER, OPERATION_ANNOTATION, OPERATION_MIGRATE, OPERATION_RECONCILE, OPERATION_RESTORE,
};
use runtime_gvisor_core::{
    Cluster, ContainerRuntime, ContainerRuntimeStatus, LastError, LastOperation,
    LastOperationState, LastOperationType,
};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::actuator::Actuator;
use crate::client::SeedClient;
use crate::error::{KubeError, Result};

/// Operation performed for an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Reconcile,
    Delete,
    ForceDelete,
    Migrate,
    Restore,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Reconcile => "reconcile",
            Operation::Delete => "delete",
            Operation::ForceDelete => "force-delete",
            Operation::Migrate => "migrate",
            Operation::Restore => "restore",
        };
        f.write_str(s)
    }
}

/// Pick the operation for a ContainerRuntime
pub fn select_operation(cr: &ContainerRuntime, force_deletion: bool) -> Operation {
    if cr.is_deleting() {
        return if force_deletion {
            Operation::ForceDelete
        } else {
            Operation::Delete
        };
    }
    match cr.operation_annotation() {
        Some(OPERATION_MIGRATE) => Operation::Migrate,
        Some(OPERATION_RESTORE) => Operation::Restore,
        _ => Operation::Reconcile,
    }
}

/// Type recorded in `status.lastOperation` for an operation
pub fn last_operation_type(cr: &ContainerRuntime, operation: Operation) -> LastOperationType {
    match operation {
        Operation::Delete | Operation::ForceDelete => LastOperationType::Delete,
        Operation::Migrate => LastOperationType::Migrate,
        Operation::Restore => LastOperationType::Restore,
        Operation::Reconcile => {
            let has_last_operation = cr
                .status
                .as_ref()
                .is_some_and(|s| s.last_operation.is_some());
            if has_last_operation {
                LastOperationType::Reconcile
            } else {
                LastOperationType::Create
            }
        }
    }
}

/// Whether the resource was handed over to another seed
pub fn is_migrated(cr: &ContainerRuntime) -> bool {
    last_operation(cr).is_some_and(|op| {
        op.type_ == LastOperationType::Migrate && op.state == LastOperationState::Succeeded
    })
}

/// Whether a reconcile is due.
///
/// The `reconcile` annotation and a last operation that did not succeed
/// always trigger one. With `ignore_operation_annotation` an unobserved
/// generation does too. Events caused by our own status, finalizer or
/// annotation writes leave the resource settled and are skipped.
pub fn should_reconcile(cr: &ContainerRuntime, ignore_operation_annotation: bool) -> bool {
    if cr.operation_annotation() == Some(OPERATION_RECONCILE) {
        return true;
    }
    if last_operation(cr).is_none_or(|op| op.state != LastOperationState::Succeeded) {
        return true;
    }
    let observed = cr.status.as_ref().and_then(|s| s.observed_generation);
    ignore_operation_annotation && observed != cr.metadata.generation
}

fn last_operation(cr: &ContainerRuntime) -> Option<&LastOperation> {
    cr.status.as_ref()?.last_operation.as_ref()
}

fn now() -> Time {
    Time(chrono::Utc::now())
}

fn describe(operation: Operation, state: LastOperationState) -> String {
    let noun = match operation {
        Operation::Reconcile => "Reconciliation",
        Operation::Delete | Operation::ForceDelete => "Deletion",
        Operation::Migrate => "Migration",
        Operation::Restore => "Restoration",
    };
    match state {
        LastOperationState::Processing => {
            format!("{} of the gVisor container runtime is in progress", noun)
        }
        LastOperationState::Succeeded => {
            format!("{} of the gVisor container runtime succeeded", noun)
        }
        LastOperationState::Error => {
            format!("{} of the gVisor container runtime failed", noun)
        }
    }
}

// Status builders leave `conditions` empty: they belong to the health check
// and are never written from here.

/// Status after starting an operation
pub fn processing_status(
    current: &ContainerRuntimeStatus,
    type_: LastOperationType,
    operation: Operation,
) -> ContainerRuntimeStatus {
    ContainerRuntimeStatus {
        last_operation: Some(LastOperation {
            description: describe(operation, LastOperationState::Processing),
            last_update_time: now(),
            progress: 1,
            state: LastOperationState::Processing,
            type_,
        }),
        last_error: current.last_error.clone(),
        observed_generation: current.observed_generation,
        conditions: Vec::new(),
    }
}

/// Status after a successful operation
pub fn succeeded_status(
    current: &ContainerRuntimeStatus,
    type_: LastOperationType,
    operation: Operation,
    generation: Option<i64>,
) -> ContainerRuntimeStatus {
    ContainerRuntimeStatus {
        last_operation: Some(LastOperation {
            description: describe(operation, LastOperationState::Succeeded),
            last_update_time: now(),
            progress: 100,
            state: LastOperationState::Succeeded,
            type_,
        }),
        last_error: None,
        observed_generation: generation.or(current.observed_generation),
        conditions: Vec::new(),
    }
}

/// Status after a failed operation
pub fn error_status(
    current: &ContainerRuntimeStatus,
    type_: LastOperationType,
    operation: Operation,
    error: &KubeError,
) -> ContainerRuntimeStatus {
    let description = format!("{}: {}", describe(operation, LastOperationState::Error), error);
    ContainerRuntimeStatus {
        last_operation: Some(LastOperation {
            description: description.clone(),
            last_update_time: now(),
            progress: 50,
            state: LastOperationState::Error,
            type_,
        }),
        last_error: Some(LastError {
            description,
            codes: error.codes(),
            last_update_time: Some(now()),
        }),
        observed_generation: current.observed_generation,
        conditions: Vec::new(),
    }
}

/// What handling an event amounted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The event required no work
    Skipped,
    /// An operation ran to completion
    Completed(Operation),
}

/// Handles ContainerRuntime events
pub struct ContainerRuntimeReconciler {
    client: Arc<dyn SeedClient>,
    actuator: Arc<dyn Actuator>,
    ignore_operation_annotation: bool,
}

impl ContainerRuntimeReconciler {
    pub fn new(client: Arc<dyn SeedClient>, actuator: Arc<dyn Actuator>) -> Self {
        Self {
            client,
            actuator,
            ignore_operation_annotation: true,
        }
    }

    /// Only reconcile on request, see [`should_reconcile`]
    pub fn with_ignore_operation_annotation(mut self, ignore: bool) -> Self {
        self.ignore_operation_annotation = ignore;
        self
    }

    /// Handle the current state of a ContainerRuntime
    pub async fn reconcile(&self, cr: &ContainerRuntime) -> Result<Outcome> {
        if !cr.is_gvisor() {
            debug!(container_runtime = %cr.name_any(), runtime_type = %cr.spec.type_, "ignoring runtime type");
            return Ok(Outcome::Skipped);
        }
        if cr.is_deleting() && !cr.finalizers().iter().any(|f| f == FINALIZER) {
            return Ok(Outcome::Skipped);
        }

        let namespace = cr.namespace().ok_or_else(|| {
            KubeError::InvalidResource(format!("ContainerRuntime '{}' has no namespace", cr.name_any()))
        })?;
        let cluster = self
            .client
            .get_cluster(&namespace)
            .await?
            .ok_or(KubeError::ClusterNotFound { name: namespace })?;

        let force_deletion = cluster
            .shoot()
            .map(|shoot| shoot.needs_force_deletion())
            .unwrap_or(false);
        let operation = select_operation(cr, force_deletion);

        match operation {
            Operation::Delete | Operation::ForceDelete => {
                self.run(cr, &cluster, operation).await?;
                self.client.remove_container_runtime_finalizer(cr, FINALIZER).await?;
            }
            Operation::Migrate => {
                self.run(cr, &cluster, operation).await?;
                self.client
                    .remove_container_runtime_annotation(cr, OPERATION_ANNOTATION)
                    .await?;
                self.client.remove_container_runtime_finalizer(cr, FINALIZER).await?;
            }
            Operation::Restore => {
                self.client.add_container_runtime_finalizer(cr, FINALIZER).await?;
                self.run(cr, &cluster, operation).await?;
                self.client
                    .remove_container_runtime_annotation(cr, OPERATION_ANNOTATION)
                    .await?;
            }
            Operation::Reconcile => {
                if is_migrated(cr) {
                    debug!(container_runtime = %cr.name_any(), "skipping migrated resource");
                    return Ok(Outcome::Skipped);
                }
                if !should_reconcile(cr, self.ignore_operation_annotation) {
                    return Ok(Outcome::Skipped);
                }
                self.client.add_container_runtime_finalizer(cr, FINALIZER).await?;
                self.run(cr, &cluster, operation).await?;
                if cr.operation_annotation().is_some() {
                    self.client
                        .remove_container_runtime_annotation(cr, OPERATION_ANNOTATION)
                        .await?;
                }
            }
        }

        Ok(Outcome::Completed(operation))
    }

    /// Run one actuator operation, recording it in the status
    async fn run(&self, cr: &ContainerRuntime, cluster: &Cluster, operation: Operation) -> Result<()> {
        let type_ = last_operation_type(cr, operation);
        let current = cr.status.clone().unwrap_or_default();

        info!(
            container_runtime = %cr.name_any(),
            namespace = %cr.namespace().unwrap_or_default(),
            %operation,
            "starting operation"
        );
        let processing = processing_status(&current, type_, operation);
        self.client.update_container_runtime_status(cr, &processing).await?;

        let result = match operation {
            Operation::Reconcile => self.actuator.reconcile(cr, cluster).await,
            Operation::Delete => self.actuator.delete(cr, cluster).await,
            Operation::ForceDelete => self.actuator.force_delete(cr, cluster).await,
            Operation::Migrate => self.actuator.migrate(cr, cluster).await,
            Operation::Restore => self.actuator.restore(cr, cluster).await,
        };

        match result {
            Ok(()) => {
                let generation = match operation {
                    Operation::Reconcile | Operation::Restore => cr.metadata.generation,
                    _ => None,
                };
                let status = succeeded_status(&processing, type_, operation, generation);
                self.client.update_container_runtime_status(cr, &status).await?;
                info!(container_runtime = %cr.name_any(), %operation, "operation succeeded");
                Ok(())
            }
            Err(e) => {
                let status = error_status(&processing, type_, operation, &e);
                if let Err(update) = self.client.update_container_runtime_status(cr, &status).await {
                    warn!(container_runtime = %cr.name_any(), error = %update, "cannot record failure");
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::tests::{NAMESPACE, actuator, cluster, deleting, force_deleted_cluster, runtime};
    use crate::client::MockSeedClient;
    use async_trait::async_trait;
    use runtime_gvisor_core::constants::GVISOR_MANAGED_RESOURCE_NAME;
    use runtime_gvisor_core::error::ERROR_CONFIGURATION_PROBLEM;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// Records calls instead of touching the seed
    #[derive(Default)]
    struct RecordingActuator {
        calls: Mutex<Vec<Operation>>,
        fail: bool,
    }

    impl RecordingActuator {
        fn record(&self, operation: Operation) -> Result<()> {
            self.calls.lock().unwrap().push(operation);
            if self.fail {
                return Err(KubeError::Timeout("still there".to_string()));
            }
            Ok(())
        }

        fn calls(&self) -> Vec<Operation> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Actuator for RecordingActuator {
        async fn reconcile(&self, _: &ContainerRuntime, _: &Cluster) -> Result<()> {
            self.record(Operation::Reconcile)
        }
        async fn delete(&self, _: &ContainerRuntime, _: &Cluster) -> Result<()> {
            self.record(Operation::Delete)
        }
        async fn force_delete(&self, _: &ContainerRuntime, _: &Cluster) -> Result<()> {
            self.record(Operation::ForceDelete)
        }
        async fn migrate(&self, _: &ContainerRuntime, _: &Cluster) -> Result<()> {
            self.record(Operation::Migrate)
        }
        async fn restore(&self, _: &ContainerRuntime, _: &Cluster) -> Result<()> {
            self.record(Operation::Restore)
        }
    }

    fn annotated(mut cr: ContainerRuntime, operation: &str) -> ContainerRuntime {
        cr.metadata.annotations = Some(BTreeMap::from([(
            OPERATION_ANNOTATION.to_string(),
            operation.to_string(),
        )]));
        cr
    }

    fn with_finalizer(mut cr: ContainerRuntime) -> ContainerRuntime {
        cr.metadata.finalizers = Some(vec![FINALIZER.to_string()]);
        cr
    }

    fn succeeded(mut cr: ContainerRuntime, type_: LastOperationType) -> ContainerRuntime {
        cr.status = Some(ContainerRuntimeStatus {
            last_operation: Some(LastOperation {
                description: String::new(),
                last_update_time: now(),
                progress: 100,
                state: LastOperationState::Succeeded,
                type_,
            }),
            observed_generation: cr.metadata.generation,
            ..Default::default()
        });
        cr
    }

    async fn setup(cr: &ContainerRuntime) -> (MockSeedClient, Arc<RecordingActuator>, ContainerRuntimeReconciler) {
        let client = MockSeedClient::new();
        client.insert_cluster(cluster("1.31.1")).await;
        client.insert_container_runtime(cr.clone()).await;
        let actuator = Arc::new(RecordingActuator::default());
        let reconciler = ContainerRuntimeReconciler::new(Arc::new(client.clone()), actuator.clone());
        (client, actuator, reconciler)
    }

    #[test]
    fn test_select_operation() {
        let cr = runtime("a", "wp1");
        assert_eq!(select_operation(&cr, false), Operation::Reconcile);
        assert_eq!(select_operation(&annotated(cr.clone(), "migrate"), false), Operation::Migrate);
        assert_eq!(select_operation(&annotated(cr.clone(), "restore"), false), Operation::Restore);
        assert_eq!(select_operation(&annotated(cr.clone(), "reconcile"), false), Operation::Reconcile);
        assert_eq!(select_operation(&deleting(cr.clone()), false), Operation::Delete);
        assert_eq!(select_operation(&deleting(cr.clone()), true), Operation::ForceDelete);
        // deletion wins over annotations
        assert_eq!(
            select_operation(&deleting(annotated(cr, "migrate")), false),
            Operation::Delete
        );
    }

    #[test]
    fn test_last_operation_type() {
        let cr = runtime("a", "wp1");
        assert_eq!(last_operation_type(&cr, Operation::Reconcile), LastOperationType::Create);
        let cr = succeeded(cr, LastOperationType::Create);
        assert_eq!(last_operation_type(&cr, Operation::Reconcile), LastOperationType::Reconcile);
        assert_eq!(last_operation_type(&cr, Operation::ForceDelete), LastOperationType::Delete);
    }

    #[test]
    fn test_should_reconcile() {
        let cr = runtime("a", "wp1");
        // never reconciled
        assert!(should_reconcile(&cr, true));
        assert!(should_reconcile(&cr, false));

        let done = succeeded(cr, LastOperationType::Reconcile);
        assert!(!should_reconcile(&done, false));
        assert!(!should_reconcile(&done, true));
        assert!(should_reconcile(&annotated(done.clone(), "reconcile"), false));
        assert!(should_reconcile(&annotated(done.clone(), "reconcile"), true));

        let mut newer = done.clone();
        newer.metadata.generation = Some(2);
        assert!(should_reconcile(&newer, true));
        assert!(!should_reconcile(&newer, false));

        let mut failed = done;
        if let Some(op) = failed.status.as_mut().and_then(|s| s.last_operation.as_mut()) {
            op.state = LastOperationState::Error;
        }
        assert!(should_reconcile(&failed, false));
        assert!(should_reconcile(&failed, true));
    }

    #[test]
    fn test_is_migrated() {
        let cr = runtime("a", "wp1");
        assert!(!is_migrated(&cr));
        assert!(is_migrated(&succeeded(cr.clone(), LastOperationType::Migrate)));
        assert!(!is_migrated(&succeeded(cr, LastOperationType::Reconcile)));
    }

    #[test]
    fn test_error_status_carries_codes() {
        let error = KubeError::ConfigurationProblem {
            message: "bad kind".to_string(),
        };
        let status = error_status(
            &ContainerRuntimeStatus::default(),
            LastOperationType::Create,
            Operation::Reconcile,
            &error,
        );

        let last_error = status.last_error.unwrap();
        assert_eq!(last_error.codes, vec![ERROR_CONFIGURATION_PROBLEM.to_string()]);
        assert!(last_error.description.contains("bad kind"));
        assert_eq!(status.last_operation.unwrap().state, LastOperationState::Error);
    }

    #[tokio::test]
    async fn test_other_runtime_type_is_ignored() {
        let mut cr = runtime("kata-wp1", "wp1");
        cr.spec.type_ = "kata".to_string();
        let (client, actuator, reconciler) = setup(&cr).await;

        assert_eq!(reconciler.reconcile(&cr).await.unwrap(), Outcome::Skipped);
        assert!(actuator.calls().is_empty());
        assert_eq!(client.operation_counts().await.patches, 0);
    }

    #[tokio::test]
    async fn test_reconcile_adds_finalizer_and_status() {
        let cr = runtime("gvisor-wp1", "wp1");
        let (client, actuator, reconciler) = setup(&cr).await;

        let outcome = reconciler.reconcile(&cr).await.unwrap();

        assert_eq!(outcome, Outcome::Completed(Operation::Reconcile));
        assert_eq!(actuator.calls(), vec![Operation::Reconcile]);
        let stored = client.container_runtime(NAMESPACE, "gvisor-wp1").await.unwrap();
        assert_eq!(stored.finalizers(), &[FINALIZER.to_string()]);
        let status = stored.status.unwrap();
        let op = status.last_operation.unwrap();
        assert_eq!(op.type_, LastOperationType::Create);
        assert_eq!(op.state, LastOperationState::Succeeded);
        assert_eq!(op.progress, 100);
        assert_eq!(status.observed_generation, Some(1));
        assert!(status.last_error.is_none());
    }

    #[tokio::test]
    async fn test_reconcile_removes_operation_annotation() {
        let cr = annotated(runtime("gvisor-wp1", "wp1"), "reconcile");
        let (client, _, reconciler) = setup(&cr).await;

        reconciler.reconcile(&cr).await.unwrap();

        let stored = client.container_runtime(NAMESPACE, "gvisor-wp1").await.unwrap();
        assert!(stored.operation_annotation().is_none());
    }

    #[tokio::test]
    async fn test_own_writes_do_not_trigger_reconcile() {
        let cr = runtime("gvisor-wp1", "wp1");
        let client = MockSeedClient::new();
        client.insert_cluster(cluster("1.31.1")).await;
        client.insert_container_runtime(cr.clone()).await;
        let reconciler = ContainerRuntimeReconciler::new(
            Arc::new(client.clone()),
            Arc::new(actuator(&client)),
        );

        reconciler.reconcile(&cr).await.unwrap();
        client.reset_counts().await;

        // every write above comes back as a watch event carrying the stored object
        for _ in 0..3 {
            let stored = client.container_runtime(NAMESPACE, "gvisor-wp1").await.unwrap();
            assert_eq!(reconciler.reconcile(&stored).await.unwrap(), Outcome::Skipped);
        }

        let counts = client.operation_counts().await;
        assert_eq!(counts.patches, 0);
        assert_eq!(counts.creates, 0);
        assert_eq!(counts.updates, 0);
        assert_eq!(counts.deletes, 0);
    }

    #[tokio::test]
    async fn test_settled_resource_reconciles_on_change() {
        let cr = runtime("gvisor-wp1", "wp1");
        let (client, actuator, reconciler) = setup(&cr).await;

        reconciler.reconcile(&cr).await.unwrap();
        let stored = client.container_runtime(NAMESPACE, "gvisor-wp1").await.unwrap();
        assert_eq!(reconciler.reconcile(&stored).await.unwrap(), Outcome::Skipped);

        let requested = annotated(stored.clone(), "reconcile");
        client.insert_container_runtime(requested.clone()).await;
        assert_eq!(
            reconciler.reconcile(&requested).await.unwrap(),
            Outcome::Completed(Operation::Reconcile)
        );

        let mut changed = client.container_runtime(NAMESPACE, "gvisor-wp1").await.unwrap();
        changed.metadata.generation = Some(2);
        client.insert_container_runtime(changed.clone()).await;
        assert_eq!(
            reconciler.reconcile(&changed).await.unwrap(),
            Outcome::Completed(Operation::Reconcile)
        );
        let stored = client.container_runtime(NAMESPACE, "gvisor-wp1").await.unwrap();
        assert_eq!(stored.status.unwrap().observed_generation, Some(2));

        assert_eq!(actuator.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_failed_operation_is_retried() {
        let cr = runtime("gvisor-wp1", "wp1");
        let client = MockSeedClient::new();
        client.insert_cluster(cluster("1.31.1")).await;
        client.insert_container_runtime(cr.clone()).await;
        let failing = ContainerRuntimeReconciler::new(
            Arc::new(client.clone()),
            Arc::new(RecordingActuator {
                fail: true,
                ..Default::default()
            }),
        );
        failing.reconcile(&cr).await.unwrap_err();

        let actuator = Arc::new(RecordingActuator::default());
        let reconciler = ContainerRuntimeReconciler::new(Arc::new(client.clone()), actuator.clone());
        let stored = client.container_runtime(NAMESPACE, "gvisor-wp1").await.unwrap();
        assert_eq!(
            reconciler.reconcile(&stored).await.unwrap(),
            Outcome::Completed(Operation::Reconcile)
        );
        assert_eq!(actuator.calls(), vec![Operation::Reconcile]);

        let stored = client.container_runtime(NAMESPACE, "gvisor-wp1").await.unwrap();
        assert!(stored.status.as_ref().unwrap().last_error.is_none());
        assert_eq!(reconciler.reconcile(&stored).await.unwrap(), Outcome::Skipped);
    }

    #[tokio::test]
    async fn test_reconcile_gated_by_annotation() {
        let cr = succeeded(runtime("gvisor-wp1", "wp1"), LastOperationType::Reconcile);
        let (_, actuator, reconciler) = setup(&cr).await;
        let reconciler = reconciler.with_ignore_operation_annotation(false);

        assert_eq!(reconciler.reconcile(&cr).await.unwrap(), Outcome::Skipped);
        assert!(actuator.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failure_is_recorded() {
        let cr = runtime("gvisor-wp1", "wp1");
        let client = MockSeedClient::new();
        client.insert_cluster(cluster("1.31.1")).await;
        client.insert_container_runtime(cr.clone()).await;
        let actuator = Arc::new(RecordingActuator {
            fail: true,
            ..Default::default()
        });
        let reconciler = ContainerRuntimeReconciler::new(Arc::new(client.clone()), actuator);

        let err = reconciler.reconcile(&cr).await.unwrap_err();
        assert!(matches!(err, KubeError::Timeout(_)));

        let status = client
            .container_runtime(NAMESPACE, "gvisor-wp1")
            .await
            .unwrap()
            .status
            .unwrap();
        assert_eq!(status.last_operation.unwrap().state, LastOperationState::Error);
        assert!(status.last_error.unwrap().description.contains("still there"));
        assert_eq!(status.observed_generation, None);
    }

    #[tokio::test]
    async fn test_missing_cluster() {
        let cr = runtime("gvisor-wp1", "wp1");
        let client = MockSeedClient::new();
        client.insert_container_runtime(cr.clone()).await;
        let reconciler = ContainerRuntimeReconciler::new(
            Arc::new(client),
            Arc::new(RecordingActuator::default()),
        );

        let err = reconciler.reconcile(&cr).await.unwrap_err();
        assert!(matches!(err, KubeError::ClusterNotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete_releases_finalizer() {
        let cr = deleting(with_finalizer(runtime("gvisor-wp1", "wp1")));
        let (client, actuator, reconciler) = setup(&cr).await;

        let outcome = reconciler.reconcile(&cr).await.unwrap();

        assert_eq!(outcome, Outcome::Completed(Operation::Delete));
        assert_eq!(actuator.calls(), vec![Operation::Delete]);
        assert!(client.container_runtime(NAMESPACE, "gvisor-wp1").await.is_none());
    }

    #[tokio::test]
    async fn test_delete_without_finalizer_is_skipped() {
        let cr = deleting(runtime("gvisor-wp1", "wp1"));
        let (_, actuator, reconciler) = setup(&cr).await;

        assert_eq!(reconciler.reconcile(&cr).await.unwrap(), Outcome::Skipped);
        assert!(actuator.calls().is_empty());
    }

    #[tokio::test]
    async fn test_force_delete() {
        let cr = deleting(with_finalizer(runtime("gvisor-wp1", "wp1")));
        let client = MockSeedClient::new();
        client.insert_cluster(force_deleted_cluster("1.31.1")).await;
        client.insert_container_runtime(cr.clone()).await;
        let actuator = Arc::new(RecordingActuator::default());
        let reconciler = ContainerRuntimeReconciler::new(Arc::new(client), actuator.clone());

        reconciler.reconcile(&cr).await.unwrap();
        assert_eq!(actuator.calls(), vec![Operation::ForceDelete]);
    }

    #[tokio::test]
    async fn test_migrate_then_skip() {
        let cr = annotated(with_finalizer(runtime("gvisor-wp1", "wp1")), "migrate");
        let (client, actuator, reconciler) = setup(&cr).await;

        reconciler.reconcile(&cr).await.unwrap();

        let stored = client.container_runtime(NAMESPACE, "gvisor-wp1").await.unwrap();
        assert!(stored.finalizers().is_empty());
        assert!(stored.operation_annotation().is_none());
        assert!(is_migrated(&stored));

        // later events leave the migrated resource alone
        assert_eq!(reconciler.reconcile(&stored).await.unwrap(), Outcome::Skipped);
        assert_eq!(actuator.calls(), vec![Operation::Migrate]);
    }

    #[tokio::test]
    async fn test_restore_after_migration() {
        let cr = annotated(
            succeeded(runtime("gvisor-wp1", "wp1"), LastOperationType::Migrate),
            "restore",
        );
        let (client, actuator, reconciler) = setup(&cr).await;

        reconciler.reconcile(&cr).await.unwrap();

        assert_eq!(actuator.calls(), vec![Operation::Restore]);
        let stored = client.container_runtime(NAMESPACE, "gvisor-wp1").await.unwrap();
        assert_eq!(stored.finalizers(), &[FINALIZER.to_string()]);
        assert!(!is_migrated(&stored));
        let op = stored.status.unwrap().last_operation.unwrap();
        assert_eq!(op.type_, LastOperationType::Restore);
    }

    #[tokio::test]
    async fn test_full_lifecycle_with_gvisor_actuator() {
        let cr = runtime("gvisor-wp1", "wp1");
        let client = MockSeedClient::new();
        client.insert_cluster(cluster("1.31.1")).await;
        client.insert_container_runtime(cr.clone()).await;
        let reconciler = ContainerRuntimeReconciler::new(
            Arc::new(client.clone()),
            Arc::new(actuator(&client)),
        );

        reconciler.reconcile(&cr).await.unwrap();
        assert!(
            client
                .managed_resource(NAMESPACE, GVISOR_MANAGED_RESOURCE_NAME)
                .await
                .is_some()
        );

        let stored = client.container_runtime(NAMESPACE, "gvisor-wp1").await.unwrap();
        let stored = deleting(stored);
        client.insert_container_runtime(stored.clone()).await;
        reconciler.reconcile(&stored).await.unwrap();

        assert!(client.managed_resource_names(NAMESPACE).await.is_empty());
        assert!(client.container_runtime(NAMESPACE, "gvisor-wp1").await.is_none());
    }

    #[tokio::test]
    async fn test_configuration_problem_reaches_status() {
        let mut cr = runtime("gvisor-wp1", "wp1");
        cr.spec.provider_config = Some(serde_json::json!({"apiVersion": "v1", "kind": "ConfigMap"}));
        let client = MockSeedClient::new();
        client.insert_cluster(cluster("1.31.1")).await;
        client.insert_container_runtime(cr.clone()).await;
        let reconciler = ContainerRuntimeReconciler::new(
            Arc::new(client.clone()),
            Arc::new(actuator(&client)),
        );

        let err = reconciler.reconcile(&cr).await.unwrap_err();
        assert!(err.is_configuration_problem());

        let status = client
            .container_runtime(NAMESPACE, "gvisor-wp1")
            .await
            .unwrap()
            .status
            .unwrap();
        assert_eq!(
            status.last_error.unwrap().codes,
            vec![ERROR_CONFIGURATION_PROBLEM.to_string()]
        );
    }
}
