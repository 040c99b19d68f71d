//! Chart values for the gVisor charts
//!
//! Everything here is a pure function of the ContainerRuntime, its decoded
//! provider configuration and the resolved installation image.

use runtime_gvisor_core::constants::{
    CHART_PATH, CRI_NAME_CONTAINERD, CRI_NAME_WORKER_LABEL, INSTALLATION_CHART_PATH,
    INSTALLATION_RELEASE_NAME, NAMESPACE_SYSTEM, RELEASE_NAME,
    RUNTIME_GVISOR_INSTALLATION_IMAGE_NAME,
};
use runtime_gvisor_core::{ContainerRuntime, GVisorConfiguration, Values};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::chart::INTERNAL_CHARTS;
use crate::engine::{ChartRenderer, RenderedChart};
use crate::error::Result;

const DEBUG_LOG_LINE: &str = "debug-log = \"/var/log/runsc/%ID%/gvisor-%COMMAND%.log\"";

/// Render the runsc flags understood by the installation.
///
/// Keys are emitted in alphabetical order, one `key = "value"` line each.
/// Unknown keys and unsupported values are skipped.
pub fn render_config_flags(flags: &BTreeMap<String, String>) -> String {
    let mut out = String::new();
    for (key, value) in flags {
        match (key.as_str(), value.as_str()) {
            ("net-raw", "true" | "false") | ("nvproxy", "true") => {
                out.push_str(&format!("{} = \"{}\"\n", key, value));
            }
            ("debug", "true") => {
                out.push_str("debug = \"true\"\n");
                out.push_str(DEBUG_LOG_LINE);
                out.push('\n');
            }
            _ => {}
        }
    }
    out
}

/// Values of the shared gVisor chart
pub fn gvisor_chart_values(kubernetes_version: &str) -> Values {
    Values::new().with(&["config", "kubernetesVersion"], kubernetes_version)
}

/// Values of the per worker pool installation chart
pub fn installation_chart_values(
    cr: &ContainerRuntime,
    config: &GVisorConfiguration,
    installation_image: &str,
) -> Values {
    let mut node_selector = Map::new();
    node_selector.insert(
        CRI_NAME_WORKER_LABEL.to_string(),
        JsonValue::from(CRI_NAME_CONTAINERD),
    );
    for (key, value) in cr.match_labels() {
        node_selector.insert(key, JsonValue::from(value));
    }

    Values::new()
        .with(&["config", "binFolder"], cr.spec.binary_path.as_str())
        .with(&["config", "nodeSelector"], JsonValue::Object(node_selector))
        .with(&["config", "workergroup"], cr.worker_pool_name())
        .with(&["config", "configFlags"], render_config_flags(&config.flags()))
        .with(
            &["images", RUNTIME_GVISOR_INSTALLATION_IMAGE_NAME],
            installation_image,
        )
}

/// Where chart sources are read from
#[derive(Debug, Clone, Default)]
pub enum ChartSource {
    /// Charts compiled into the binary
    #[default]
    Embedded,
    /// A directory holding `charts/internal/...`
    Directory(PathBuf),
}

impl ChartSource {
    fn render(
        &self,
        renderer: &dyn ChartRenderer,
        chart_path: &str,
        release_name: &str,
        values: &Values,
    ) -> Result<RenderedChart> {
        match self {
            Self::Embedded => renderer.render_embedded_fs(
                &INTERNAL_CHARTS,
                chart_path,
                release_name,
                NAMESPACE_SYSTEM,
                values,
            ),
            Self::Directory(root) => {
                renderer.render(&root.join(chart_path), release_name, NAMESPACE_SYSTEM, values)
            }
        }
    }
}

/// Render the shared gVisor chart into manifest bytes
pub fn render_gvisor_chart(
    renderer: &dyn ChartRenderer,
    source: &ChartSource,
    kubernetes_version: &str,
) -> Result<Vec<u8>> {
    let values = gvisor_chart_values(kubernetes_version);
    Ok(source
        .render(renderer, CHART_PATH, RELEASE_NAME, &values)?
        .manifest())
}

/// Render the installation chart of `cr`'s worker pool into manifest bytes
pub fn render_gvisor_installation_chart(
    renderer: &dyn ChartRenderer,
    source: &ChartSource,
    cr: &ContainerRuntime,
    config: &GVisorConfiguration,
    installation_image: &str,
) -> Result<Vec<u8>> {
    let values = installation_chart_values(cr, config, installation_image);
    Ok(source
        .render(renderer, INSTALLATION_CHART_PATH, INSTALLATION_RELEASE_NAME, &values)?
        .manifest())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ChartRendererFactory, EngineFactory};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
    use runtime_gvisor_core::{ContainerRuntimeSpec, ContainerRuntimeWorkerPool};
    use serde_json::json;

    fn flags(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn runtime(pool: &str) -> ContainerRuntime {
        ContainerRuntime {
            metadata: ObjectMeta {
                name: Some(format!("gvisor-{pool}")),
                namespace: Some("shoot--dev--test".to_string()),
                ..Default::default()
            },
            spec: ContainerRuntimeSpec {
                binary_path: "/var/bin/containerruntimes".to_string(),
                type_: "gvisor".to_string(),
                provider_config: None,
                worker_pool: ContainerRuntimeWorkerPool {
                    name: pool.to_string(),
                    selector: LabelSelector {
                        match_labels: Some(BTreeMap::from([(
                            "worker.gardener.cloud/pool".to_string(),
                            pool.to_string(),
                        )])),
                        ..Default::default()
                    },
                },
            },
            status: None,
        }
    }

    #[test]
    fn test_render_config_flags_sorted() {
        let rendered = render_config_flags(&flags(&[
            ("nvproxy", "true"),
            ("net-raw", "false"),
            ("debug", "true"),
        ]));
        insta::assert_snapshot!(rendered.trim_end(), @r#"
        debug = "true"
        debug-log = "/var/log/runsc/%ID%/gvisor-%COMMAND%.log"
        net-raw = "false"
        nvproxy = "true"
        "#);
    }

    #[test]
    fn test_render_config_flags_debug_adds_log_line() {
        let rendered = render_config_flags(&flags(&[("debug", "true")]));
        assert_eq!(
            rendered.lines().collect::<Vec<_>>(),
            vec![
                "debug = \"true\"",
                "debug-log = \"/var/log/runsc/%ID%/gvisor-%COMMAND%.log\""
            ]
        );
    }

    #[test]
    fn test_render_config_flags_ignores_unknown_and_invalid() {
        let rendered = render_config_flags(&flags(&[
            ("net-raw", "maybe"),
            ("debug", "false"),
            ("nvproxy", "false"),
            ("platform", "kvm"),
        ]));
        assert_eq!(rendered, "");
        assert_eq!(render_config_flags(&BTreeMap::new()), "");
    }

    #[test]
    fn test_installation_chart_values() {
        let config = GVisorConfiguration {
            config_flags: Some(flags(&[("net-raw", "true")])),
        };
        let values = installation_chart_values(&runtime("wp1"), &config, "registry/img:v1");

        assert_eq!(
            values.inner(),
            &json!({
                "config": {
                    "binFolder": "/var/bin/containerruntimes",
                    "nodeSelector": {
                        "worker.gardener.cloud/cri-name": "containerd",
                        "worker.gardener.cloud/pool": "wp1"
                    },
                    "workergroup": "wp1",
                    "configFlags": "net-raw = \"true\"\n"
                },
                "images": {"runtime-gvisor-installation": "registry/img:v1"}
            })
        );
    }

    #[test]
    fn test_match_labels_override_cri_label() {
        let mut cr = runtime("wp1");
        cr.spec.worker_pool.selector.match_labels = Some(BTreeMap::from([(
            CRI_NAME_WORKER_LABEL.to_string(),
            "custom".to_string(),
        )]));
        let values = installation_chart_values(&cr, &GVisorConfiguration::default(), "img");
        assert_eq!(
            values.get(&["config", "nodeSelector", CRI_NAME_WORKER_LABEL]),
            Some(&json!("custom"))
        );
    }

    #[test]
    fn test_render_gvisor_chart() {
        let renderer = EngineFactory.new_for_shoot("1.31.1").unwrap();
        let manifest =
            render_gvisor_chart(renderer.as_ref(), &ChartSource::Embedded, "1.31.1").unwrap();
        let manifest = String::from_utf8(manifest).unwrap();

        assert!(manifest.starts_with("\n---\n# Source: gvisor/templates/runtimeclass.yaml\n"));
        assert!(manifest.contains("apiVersion: node.k8s.io/v1\n"));
        assert!(manifest.contains("handler: runsc"));
        assert!(manifest.contains("containerruntime.worker.gardener.cloud/gvisor: \"true\""));
    }

    #[test]
    fn test_render_gvisor_chart_old_cluster() {
        let renderer = EngineFactory.new_for_shoot("1.19").unwrap();
        let manifest =
            render_gvisor_chart(renderer.as_ref(), &ChartSource::Embedded, "1.19").unwrap();
        let manifest = String::from_utf8(manifest).unwrap();
        assert!(manifest.contains("apiVersion: node.k8s.io/v1beta1\n"));
    }

    #[test]
    fn test_render_installation_chart() {
        let renderer = EngineFactory.new_for_shoot("1.31.1").unwrap();
        let config = GVisorConfiguration {
            config_flags: Some(flags(&[("debug", "true")])),
        };
        let manifest = render_gvisor_installation_chart(
            renderer.as_ref(),
            &ChartSource::Embedded,
            &runtime("wp1"),
            &config,
            "registry/runtime-gvisor-installation:v1",
        )
        .unwrap();
        let manifest = String::from_utf8(manifest).unwrap();

        let sources: Vec<_> = manifest
            .lines()
            .filter(|l| l.starts_with("# Source: "))
            .collect();
        assert_eq!(
            sources,
            vec![
                "# Source: gvisor-installation/templates/configmap.yaml",
                "# Source: gvisor-installation/templates/daemonset.yaml"
            ]
        );
        assert!(manifest.contains("name: gvisor-configuration-wp1"));
        assert!(manifest.contains("    debug = \"true\"\n    debug-log = "));
        assert!(manifest.contains("image: registry/runtime-gvisor-installation:v1"));
        assert!(manifest.contains("worker.gardener.cloud/pool: wp1"));
        assert!(manifest.contains("value: \"/var/bin/containerruntimes\""));
        assert!(manifest.contains("namespace: kube-system"));
    }

    #[test]
    fn test_render_installation_chart_documents_parse() {
        let renderer = EngineFactory.new_for_shoot("1.31.1").unwrap();
        let manifest = render_gvisor_installation_chart(
            renderer.as_ref(),
            &ChartSource::Embedded,
            &runtime("wp2"),
            &GVisorConfiguration::default(),
            "img:v1",
        )
        .unwrap();
        let manifest = String::from_utf8(manifest).unwrap();

        let kinds: Vec<String> = manifest
            .split("\n---\n")
            .filter(|doc| !doc.trim().is_empty())
            .map(|doc| {
                let value: serde_yaml::Value = serde_yaml::from_str(doc).unwrap();
                value["kind"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(kinds, vec!["ConfigMap", "DaemonSet"]);
    }

    #[test]
    fn test_render_from_directory_source() {
        let dir = tempfile::tempdir().unwrap();
        let chart_dir = dir.path().join(CHART_PATH);
        std::fs::create_dir_all(chart_dir.join("templates")).unwrap();
        std::fs::write(chart_dir.join("Chart.yaml"), "name: gvisor\nversion: 0.0.1\n").unwrap();
        std::fs::write(
            chart_dir.join("templates/version.yaml"),
            "version: {{ values.config.kubernetesVersion }}",
        )
        .unwrap();

        let renderer = EngineFactory.new_for_shoot("1.30.0").unwrap();
        let source = ChartSource::Directory(dir.path().to_path_buf());
        let manifest = render_gvisor_chart(renderer.as_ref(), &source, "1.30.0").unwrap();
        assert_eq!(
            String::from_utf8(manifest).unwrap(),
            "\n---\n# Source: gvisor/templates/version.yaml\nversion: 1.30.0"
        );
    }
}
