//! Runtime gVisor Charts - chart rendering for the gVisor extension
//!
//! This crate provides:
//! - A MiniJinja-based chart renderer with Helm-style filters
//! - The internal `gvisor` and `gvisor-installation` charts, embedded at build time
//! - The values builder mapping a ContainerRuntime onto chart values
//! - Template errors with source spans for diagnostics

pub mod chart;
pub mod engine;
pub mod error;
pub mod filters;
pub mod values;

pub use chart::{Chart, ChartMetadata, EmbeddedFs, INTERNAL_CHARTS};
pub use engine::{
    ChartRenderer, ChartRendererFactory, Engine, EngineBuilder, EngineFactory, Manifest,
    RenderedChart, parse_kubernetes_version,
};
pub use error::{RenderError, Result, TemplateError, TemplateErrorKind};
pub use values::{
    ChartSource, gvisor_chart_values, installation_chart_values, render_config_flags,
    render_gvisor_chart, render_gvisor_installation_chart,
};
