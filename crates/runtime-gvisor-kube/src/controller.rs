//! Controller wiring
//!
//! Runs the ContainerRuntime controller together with the health check and
//! heartbeat tasks until a termination signal arrives.

use futures::StreamExt;
use kube::runtime::controller::{self, Action, Controller};
use kube::runtime::watcher::Config as WatcherConfig;
use kube::{Api, Client, ResourceExt};
use runtime_gvisor_charts::{ChartSource, EngineFactory};
use runtime_gvisor_core::{ContainerRuntime, ImageVector};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::actuator::GVisorActuator;
use crate::client::{KubeSeedClient, SeedClient};
use crate::config::ControllerConfig;
use crate::error::{KubeError, Result};
use crate::health::HealthChecker;
use crate::heartbeat::Heartbeat;
use crate::lifecycle::ContainerRuntimeReconciler;

/// Shared state of the controller
pub struct Context {
    reconciler: ContainerRuntimeReconciler,
    requeue_after_error: Duration,
}

impl Context {
    pub fn new(reconciler: ContainerRuntimeReconciler, requeue_after_error: Duration) -> Self {
        Self {
            reconciler,
            requeue_after_error,
        }
    }
}

/// Reconcile one ContainerRuntime
pub async fn reconcile(cr: Arc<ContainerRuntime>, ctx: Arc<Context>) -> Result<Action> {
    let outcome = ctx.reconciler.reconcile(&cr).await?;
    debug!(container_runtime = %cr.name_any(), ?outcome, "handled event");
    Ok(Action::await_change())
}

/// Requeue failed reconciles after the configured delay
pub fn error_policy(cr: Arc<ContainerRuntime>, error: &KubeError, ctx: Arc<Context>) -> Action {
    warn!(
        container_runtime = %cr.name_any(),
        namespace = %cr.namespace().unwrap_or_default(),
        error = %error,
        "reconcile failed"
    );
    Action::requeue(ctx.requeue_after_error)
}

/// Start all controllers and block until shutdown
pub async fn run(
    client: Client,
    config: ControllerConfig,
    images: ImageVector,
    chart_source: ChartSource,
) -> Result<()> {
    config.validate()?;

    let seed: Arc<dyn SeedClient> = Arc::new(KubeSeedClient::with_client(client.clone()));
    let actuator = GVisorActuator::new(seed.clone(), Arc::new(EngineFactory), &images)?
        .with_chart_source(chart_source)
        .with_deletion_options(config.deletion_options());
    info!(image = %actuator.installation_image(), "using installation image");

    let reconciler = ContainerRuntimeReconciler::new(seed.clone(), Arc::new(actuator))
        .with_ignore_operation_annotation(config.ignore_operation_annotation);
    let ctx = Arc::new(Context::new(reconciler, config.requeue_after_error));

    let health = HealthChecker::new(seed.clone())
        .with_concurrency(usize::from(config.health_check.max_concurrent_reconciles));
    let health_task = tokio::spawn(health.run(config.health_check.sync_period));

    let heartbeat_task = match (&config.heartbeat.namespace, config.heartbeat.enabled) {
        (Some(namespace), true) => {
            info!(namespace = %namespace, "starting heartbeat");
            let heartbeat = Heartbeat::new(seed.clone(), namespace.clone(), config.heartbeat.renew_interval);
            Some(tokio::spawn(heartbeat.run()))
        }
        _ => None,
    };

    info!(
        max_concurrent_reconciles = config.max_concurrent_reconciles,
        "starting ContainerRuntime controller"
    );
    let runtimes: Api<ContainerRuntime> = Api::all(client);
    Controller::new(runtimes, WatcherConfig::default())
        .with_config(controller::Config::default().concurrency(config.max_concurrent_reconciles))
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            match res {
                Ok((object, _)) => debug!(container_runtime = %object.name, "reconciled"),
                Err(e) => error!(error = %e, "controller error"),
            }
        })
        .await;

    health_task.abort();
    if let Some(task) = heartbeat_task {
        task.abort();
    }
    info!("controllers stopped");
    Ok(())
}
