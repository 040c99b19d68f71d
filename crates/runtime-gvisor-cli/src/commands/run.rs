//! Run command - start the controllers

use runtime_gvisor_charts::ChartSource;
use runtime_gvisor_core::ImageVector;
use runtime_gvisor_kube::{ControllerConfig, KubeError, controller};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::error::{CliError, Result};

pub struct RunArgs {
    pub config: Option<PathBuf>,
    pub max_concurrent_reconciles: Option<u16>,
    pub respect_operation_annotation: bool,
    pub heartbeat_namespace: Option<String>,
    pub heartbeat_renew_interval: Option<Duration>,
    pub chart_root: Option<PathBuf>,
}

/// Build the effective configuration: file first, flags on top
fn controller_config(args: &RunArgs) -> Result<ControllerConfig> {
    let mut config = match &args.config {
        Some(path) => ControllerConfig::load(path)?,
        None => ControllerConfig::default(),
    };

    if let Some(n) = args.max_concurrent_reconciles {
        config.max_concurrent_reconciles = n;
    }
    if args.respect_operation_annotation {
        config.ignore_operation_annotation = false;
    }
    if let Some(namespace) = &args.heartbeat_namespace {
        config.heartbeat.enabled = true;
        config.heartbeat.namespace = Some(namespace.clone());
    }
    if let Some(interval) = args.heartbeat_renew_interval {
        config.heartbeat.renew_interval = interval;
    }

    config.validate()?;
    Ok(config)
}

pub fn run(args: RunArgs) -> Result<()> {
    let config = controller_config(&args)?;
    let images = ImageVector::load()?;
    let chart_source = match &args.chart_root {
        Some(root) => ChartSource::Directory(root.clone()),
        None => ChartSource::Embedded,
    };

    info!(version = env!("CARGO_PKG_VERSION"), "starting gardener-extension-runtime-gvisor");

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::internal(format!("cannot start async runtime: {}", e)))?;
    runtime.block_on(async move {
        let client = kube::Client::try_default().await.map_err(KubeError::from)?;
        controller::run(client, config, images, chart_source).await
    })?;
    Ok(())
}
