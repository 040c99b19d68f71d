//! Chart renderer based on MiniJinja

use minijinja::Environment;
use runtime_gvisor_core::Values;
use serde::Serialize;
use std::path::Path;

use crate::chart::{Chart, EmbeddedFs};
use crate::error::{RenderError, Result, TemplateError};
use crate::filters;

/// A single rendered template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    /// `<chart>/templates/<file>`
    pub name: String,
    pub content: String,
}

/// Result of rendering a chart
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedChart {
    pub chart_name: String,

    /// Non-empty manifests in template name order
    pub manifests: Vec<Manifest>,
}

impl RenderedChart {
    /// All manifests joined into one multi-document stream
    pub fn manifest(&self) -> Vec<u8> {
        let mut out = String::new();
        for m in &self.manifests {
            out.push_str("\n---\n# Source: ");
            out.push_str(&m.name);
            out.push('\n');
            out.push_str(&m.content);
        }
        out.into_bytes()
    }
}

/// Renders charts into Kubernetes manifests
pub trait ChartRenderer: Send + Sync {
    /// Render the chart in the directory `chart_path`
    fn render(
        &self,
        chart_path: &Path,
        release_name: &str,
        namespace: &str,
        values: &Values,
    ) -> Result<RenderedChart>;

    /// Render the chart at `chart_path` inside an embedded file system
    fn render_embedded_fs(
        &self,
        fs: &EmbeddedFs,
        chart_path: &str,
        release_name: &str,
        namespace: &str,
        values: &Values,
    ) -> Result<RenderedChart>;
}

/// Creates renderers bound to a target cluster version
pub trait ChartRendererFactory: Send + Sync {
    fn new_for_shoot(&self, kubernetes_version: &str) -> Result<Box<dyn ChartRenderer>>;
}

/// Parse a cluster version, accepting `v` prefixes and `major.minor` forms
pub fn parse_kubernetes_version(version: &str) -> Result<semver::Version> {
    let invalid = |message: &str| RenderError::InvalidKubernetesVersion {
        version: version.to_string(),
        message: message.to_string(),
    };

    let trimmed = version.trim().trim_start_matches('v');
    if trimmed.is_empty() {
        return Err(invalid("version is empty"));
    }

    let core = trimmed.split(['-', '+']).next().unwrap_or(trimmed);
    let normalized = match core.split('.').count() {
        1 => format!("{}.0.0{}", core, &trimmed[core.len()..]),
        2 => format!("{}.0{}", core, &trimmed[core.len()..]),
        _ => trimmed.to_string(),
    };

    semver::Version::parse(&normalized).map_err(|e| invalid(&e.to_string()))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct KubeVersion {
    version: String,
    git_version: String,
    major: u64,
    minor: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Capabilities {
    kube_version: KubeVersion,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReleaseInfo<'a> {
    name: &'a str,
    namespace: &'a str,
    service: &'static str,
}

/// Template engine builder
pub struct EngineBuilder {
    strict_mode: bool,
    kube_version: semver::Version,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            strict_mode: true,
            kube_version: semver::Version::new(1, 31, 0),
        }
    }

    /// Set strict mode (fail on undefined variables)
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict_mode = strict;
        self
    }

    /// Kubernetes version exposed as `capabilities.kubeVersion`
    pub fn kube_version(mut self, version: semver::Version) -> Self {
        self.kube_version = version;
        self
    }

    pub fn build(self) -> Engine {
        Engine {
            strict_mode: self.strict_mode,
            kube_version: self.kube_version,
        }
    }
}

/// The chart engine
#[derive(Debug, Clone)]
pub struct Engine {
    strict_mode: bool,
    kube_version: semver::Version,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Kubernetes version the engine renders for
    pub fn kube_version(&self) -> &semver::Version {
        &self.kube_version
    }

    fn create_environment(&self) -> Environment<'static> {
        let mut env = Environment::new();

        if self.strict_mode {
            env.set_undefined_behavior(minijinja::UndefinedBehavior::Strict);
        } else {
            env.set_undefined_behavior(minijinja::UndefinedBehavior::Lenient);
        }

        env.add_filter("toyaml", filters::toyaml);
        env.add_filter("tojson", filters::tojson);
        env.add_filter("quote", filters::quote);
        env.add_filter("nindent", filters::nindent);
        env.add_filter("indent", filters::indent);
        env.add_filter("required", filters::required);

        env
    }

    fn capabilities(&self) -> Capabilities {
        let v = &self.kube_version;
        Capabilities {
            kube_version: KubeVersion {
                version: format!("v{}", v),
                git_version: format!("v{}", v),
                major: v.major,
                minor: v.minor,
            },
        }
    }

    /// Render a loaded chart.
    ///
    /// `values` are deep-merged over the chart's defaults. Helper templates
    /// are available for imports but produce no manifest; templates rendering
    /// to nothing are dropped.
    pub fn render_chart(
        &self,
        chart: &Chart,
        release_name: &str,
        namespace: &str,
        values: &Values,
    ) -> Result<RenderedChart> {
        let mut merged = chart.values.clone();
        merged.merge(values);

        tracing::debug!(
            chart = chart.name(),
            release = release_name,
            namespace,
            "rendering chart"
        );

        let mut env = self.create_environment();
        for (name, source) in &chart.templates {
            env.add_template_owned(name.clone(), source.clone())
                .map_err(|e| {
                    TemplateError::from_minijinja(e, &self.source_name(chart, name), source, None)
                })?;
        }

        let ctx = minijinja::context! {
            values => merged.inner(),
            release => ReleaseInfo { name: release_name, namespace, service: "Helm" },
            chart => &chart.metadata,
            capabilities => self.capabilities(),
        };

        let mut manifests = Vec::new();
        for (name, source) in &chart.templates {
            if Chart::is_helper(name) {
                continue;
            }

            let source_name = self.source_name(chart, name);
            let rendered = env
                .get_template(name)
                .and_then(|tmpl| tmpl.render(&ctx))
                .map_err(|e| {
                    TemplateError::from_minijinja(e, &source_name, source, Some(merged.inner()))
                })?;

            let trimmed = rendered.trim();
            if trimmed.is_empty() || trimmed == "---" {
                continue;
            }

            manifests.push(Manifest {
                name: source_name,
                content: rendered.trim_start_matches('\n').to_string(),
            });
        }

        Ok(RenderedChart {
            chart_name: chart.name().to_string(),
            manifests,
        })
    }

    fn source_name(&self, chart: &Chart, template: &str) -> String {
        format!("{}/templates/{}", chart.name(), template)
    }
}

impl ChartRenderer for Engine {
    fn render(
        &self,
        chart_path: &Path,
        release_name: &str,
        namespace: &str,
        values: &Values,
    ) -> Result<RenderedChart> {
        let chart = Chart::load(chart_path)?;
        self.render_chart(&chart, release_name, namespace, values)
    }

    fn render_embedded_fs(
        &self,
        fs: &EmbeddedFs,
        chart_path: &str,
        release_name: &str,
        namespace: &str,
        values: &Values,
    ) -> Result<RenderedChart> {
        let chart = Chart::from_embedded(fs, chart_path)?;
        self.render_chart(&chart, release_name, namespace, values)
    }
}

/// Factory building an [`Engine`] per target cluster version
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineFactory;

impl ChartRendererFactory for EngineFactory {
    fn new_for_shoot(&self, kubernetes_version: &str) -> Result<Box<dyn ChartRenderer>> {
        let version = parse_kubernetes_version(kubernetes_version)?;
        Ok(Box::new(Engine::builder().kube_version(version).build()))
    }
}
