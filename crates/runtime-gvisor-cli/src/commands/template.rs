//! Template command - render the gVisor charts locally

use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use runtime_gvisor_charts::{
    ChartRendererFactory, ChartSource, EngineFactory, render_gvisor_chart,
    render_gvisor_installation_chart,
};
use runtime_gvisor_core::constants::{NAMESPACE_SYSTEM, RUNTIME_GVISOR_INSTALLATION_IMAGE_NAME, TYPE};
use runtime_gvisor_core::{
    ContainerRuntime, ContainerRuntimeSpec, ContainerRuntimeWorkerPool, GVisorConfiguration,
    ImageVector, decode_provider_config_bytes,
};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;

use crate::error::{CliError, Result};

pub struct TemplateArgs {
    pub worker_pool: String,
    pub kubernetes_version: String,
    pub binary_path: String,
    pub match_labels: Vec<String>,
    pub provider_config: Option<PathBuf>,
    pub image: Option<String>,
    pub chart_root: Option<PathBuf>,
}

/// Parse `key=value` selector labels
fn parse_match_labels(labels: &[String]) -> Result<BTreeMap<String, String>> {
    let mut parsed = BTreeMap::new();
    for label in labels {
        match label.split_once('=') {
            Some((key, value)) if !key.is_empty() => {
                parsed.insert(key.to_string(), value.to_string());
            }
            _ => {
                return Err(CliError::usage_with_help(
                    format!("invalid match label '{}'", label),
                    "labels are given as key=value, e.g. -l worker.gardener.cloud/pool=gvisor",
                ));
            }
        }
    }
    Ok(parsed)
}

fn container_runtime(args: &TemplateArgs, labels: BTreeMap<String, String>) -> ContainerRuntime {
    let mut cr = ContainerRuntime::new(
        &format!("{}-{}", TYPE, args.worker_pool),
        ContainerRuntimeSpec {
            binary_path: args.binary_path.clone(),
            type_: TYPE.to_string(),
            provider_config: None,
            worker_pool: ContainerRuntimeWorkerPool {
                name: args.worker_pool.clone(),
                selector: LabelSelector {
                    match_labels: (!labels.is_empty()).then_some(labels),
                    ..Default::default()
                },
            },
        },
    );
    cr.metadata.namespace = Some(NAMESPACE_SYSTEM.to_string());
    cr
}

pub fn run(args: &TemplateArgs) -> Result<()> {
    let labels = parse_match_labels(&args.match_labels)?;

    let config = match &args.provider_config {
        Some(path) => decode_provider_config_bytes(&std::fs::read(path)?)?,
        None => GVisorConfiguration::default(),
    };

    let image = match &args.image {
        Some(image) => image.clone(),
        None => ImageVector::load()?.image(RUNTIME_GVISOR_INSTALLATION_IMAGE_NAME)?,
    };

    let source = match &args.chart_root {
        Some(root) => ChartSource::Directory(root.clone()),
        None => ChartSource::Embedded,
    };

    let cr = container_runtime(args, labels);
    let renderer = EngineFactory.new_for_shoot(&args.kubernetes_version)?;
    let gvisor = render_gvisor_chart(renderer.as_ref(), &source, &args.kubernetes_version)?;
    let installation =
        render_gvisor_installation_chart(renderer.as_ref(), &source, &cr, &config, &image)?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&gvisor)?;
    stdout.write_all(&installation)?;
    stdout.write_all(b"\n")?;
    stdout.flush()?;
    Ok(())
}
