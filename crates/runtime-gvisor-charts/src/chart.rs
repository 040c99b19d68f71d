//! Chart loading from the embedded file system or a directory
//!
//! A chart is laid out the Helm way:
//!
//! ```text
//! <chart>/
//! ├── Chart.yaml
//! ├── values.yaml        (optional defaults)
//! └── templates/
//!     ├── _helpers.tpl   (helpers, never rendered on their own)
//!     └── *.yaml
//! ```

use runtime_gvisor_core::Values;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use walkdir::WalkDir;

use crate::error::{RenderError, Result};

const CHART_FILE: &str = "Chart.yaml";
const VALUES_FILE: &str = "values.yaml";
const TEMPLATES_DIR: &str = "templates";

/// Chart metadata from `Chart.yaml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMetadata {
    #[serde(default)]
    pub api_version: Option<String>,

    pub name: String,

    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
}

/// A loaded chart
#[derive(Debug, Clone)]
pub struct Chart {
    pub metadata: ChartMetadata,

    /// Default values from `values.yaml`
    pub values: Values,

    /// Template sources keyed by their path below `templates/`
    pub templates: BTreeMap<String, String>,
}

impl Chart {
    /// Load a chart from a directory
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let chart_file = path.join(CHART_FILE);
        if !chart_file.is_file() {
            return Err(RenderError::ChartNotFound {
                path: path.display().to_string(),
            });
        }

        let metadata = std::fs::read_to_string(&chart_file)?;
        let values_file = path.join(VALUES_FILE);
        let values = if values_file.is_file() {
            Some(std::fs::read_to_string(&values_file)?)
        } else {
            None
        };

        let templates_dir = path.join(TEMPLATES_DIR);
        let mut templates = BTreeMap::new();
        if templates_dir.is_dir() {
            for entry in WalkDir::new(&templates_dir)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                let rel = entry
                    .path()
                    .strip_prefix(&templates_dir)
                    .unwrap_or(entry.path());
                let name = rel.to_string_lossy().replace('\\', "/");
                templates.insert(name, std::fs::read_to_string(entry.path())?);
            }
        }

        Self::from_parts(&path.display().to_string(), &metadata, values.as_deref(), templates)
    }

    /// Load a chart from an embedded file system
    pub fn from_embedded(fs: &EmbeddedFs, chart_path: &str) -> Result<Self> {
        let chart_path = chart_path.trim_end_matches('/');
        let metadata = fs
            .read(&format!("{}/{}", chart_path, CHART_FILE))
            .ok_or_else(|| RenderError::ChartNotFound {
                path: chart_path.to_string(),
            })?;
        let values = fs.read(&format!("{}/{}", chart_path, VALUES_FILE));

        let prefix = format!("{}/{}/", chart_path, TEMPLATES_DIR);
        let templates = fs
            .files()
            .filter_map(|(path, content)| {
                path.strip_prefix(&prefix)
                    .map(|name| (name.to_string(), content.to_string()))
            })
            .collect();

        Self::from_parts(chart_path, metadata, values, templates)
    }

    fn from_parts(
        location: &str,
        metadata: &str,
        values: Option<&str>,
        templates: BTreeMap<String, String>,
    ) -> Result<Self> {
        let metadata: ChartMetadata = serde_yaml::from_str(metadata)
            .map_err(|e| RenderError::invalid_chart(location, format!("{}: {}", CHART_FILE, e)))?;
        if metadata.name.is_empty() {
            return Err(RenderError::invalid_chart(location, "chart name is empty"));
        }

        let values = match values {
            Some(values) => Values::from_yaml(values)?,
            None => Values::new(),
        };

        Ok(Self {
            metadata,
            values,
            templates,
        })
    }

    /// Chart name
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Whether a template is a helper, loaded for imports only
    pub fn is_helper(template_name: &str) -> bool {
        template_name
            .rsplit('/')
            .next()
            .is_some_and(|file| file.starts_with('_'))
    }
}

/// Read-only file system compiled into the binary
#[derive(Debug, Clone, Copy)]
pub struct EmbeddedFs {
    files: &'static [(&'static str, &'static str)],
}

impl EmbeddedFs {
    pub const fn new(files: &'static [(&'static str, &'static str)]) -> Self {
        Self { files }
    }

    /// Contents of the file at `path`
    pub fn read(&self, path: &str) -> Option<&'static str> {
        self.files
            .iter()
            .find(|(p, _)| *p == path)
            .map(|(_, content)| *content)
    }

    /// All files with their paths
    pub fn files(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.files.iter().copied()
    }
}

macro_rules! embed {
    ($($path:literal),* $(,)?) => {
        &[$(($path, include_str!(concat!("../", $path)))),*]
    };
}

/// The internal charts shipped with the extension
pub static INTERNAL_CHARTS: EmbeddedFs = EmbeddedFs::new(embed![
    "charts/internal/gvisor/Chart.yaml",
    "charts/internal/gvisor/values.yaml",
    "charts/internal/gvisor/templates/runtimeclass.yaml",
    "charts/internal/gvisor-installation/Chart.yaml",
    "charts/internal/gvisor-installation/values.yaml",
    "charts/internal/gvisor-installation/templates/_helpers.tpl",
    "charts/internal/gvisor-installation/templates/configmap.yaml",
    "charts/internal/gvisor-installation/templates/daemonset.yaml",
]);
