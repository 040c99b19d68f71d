//! Render error types

use miette::{Diagnostic, NamedSource, SourceSpan};
use runtime_gvisor_core::CoreError;
use thiserror::Error;

use crate::filters::AVAILABLE_FILTERS;

/// Main render error type
#[derive(Error, Debug, Diagnostic)]
pub enum RenderError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Template(#[from] TemplateError),

    #[error("chart not found: {path}")]
    #[diagnostic(code(gvisor::chart::not_found))]
    ChartNotFound { path: String },

    #[error("invalid chart '{chart}': {message}")]
    #[diagnostic(code(gvisor::chart::invalid))]
    InvalidChart { chart: String, message: String },

    #[error("invalid kubernetes version '{version}': {message}")]
    #[diagnostic(
        code(gvisor::chart::kubernetes_version),
        help("expected a version like 1.31 or v1.31.2")
    )]
    InvalidKubernetesVersion { version: String, message: String },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl RenderError {
    pub(crate) fn invalid_chart(chart: &str, message: impl Into<String>) -> Self {
        Self::InvalidChart {
            chart: chart.to_string(),
            message: message.into(),
        }
    }
}

/// Error kind for categorizing template errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum TemplateErrorKind {
    UndefinedVariable,
    UnknownFilter,
    SyntaxError,
    TypeError,
    InvalidOperation,
    Other,
}

/// Template-specific error with source information
#[derive(Error, Debug, Diagnostic, Clone)]
#[error("{message}")]
#[diagnostic(code(gvisor::template::render))]
pub struct TemplateError {
    /// Error message
    pub message: String,

    pub kind: TemplateErrorKind,

    /// Template source code
    #[source_code]
    pub src: NamedSource<String>,

    /// Error location in source
    #[label("error occurred here")]
    pub span: Option<SourceSpan>,

    #[help]
    pub suggestion: Option<String>,
}

impl TemplateError {
    /// Create a template error from a MiniJinja error.
    ///
    /// `values` are the merged chart values; they are used to point at the
    /// closest existing key when a `values.*` lookup fails.
    pub fn from_minijinja(
        err: minijinja::Error,
        template_name: &str,
        template_source: &str,
        values: Option<&serde_json::Value>,
    ) -> Self {
        let (kind, message) = categorize_minijinja_error(&err);
        let span = err
            .line()
            .and_then(|line_num| calculate_span(template_source, line_num));
        let suggestion = generate_suggestion(&err, kind, values);

        Self {
            message,
            kind,
            src: NamedSource::new(template_name, template_source.to_string()),
            span,
            suggestion,
        }
    }

    /// Get the error kind
    pub fn kind(&self) -> TemplateErrorKind {
        self.kind
    }
}

fn categorize_minijinja_error(err: &minijinja::Error) -> (TemplateErrorKind, String) {
    let msg = err.to_string();
    let detailed = format!("{:#}", err);

    let kind = match err.kind() {
        minijinja::ErrorKind::UndefinedError => TemplateErrorKind::UndefinedVariable,
        minijinja::ErrorKind::UnknownFilter => TemplateErrorKind::UnknownFilter,
        minijinja::ErrorKind::SyntaxError => TemplateErrorKind::SyntaxError,
        minijinja::ErrorKind::InvalidOperation => TemplateErrorKind::InvalidOperation,
        minijinja::ErrorKind::NonPrimitive | minijinja::ErrorKind::NonKey => {
            TemplateErrorKind::TypeError
        }
        _ => TemplateErrorKind::Other,
    };

    let message = match kind {
        TemplateErrorKind::UndefinedVariable => match extract_expression_from_display(&detailed) {
            Some(expr) => format!("undefined variable `{}`", expr),
            None => msg.replace("undefined value", "undefined variable"),
        },
        _ => msg
            .replace("invalid operation: ", "")
            .replace("syntax error: ", ""),
    };

    (kind, message)
}

/// Extract the failing `{{ ... }}` expression from MiniJinja's detailed display.
///
/// The display marks the error line with `>`:
///
/// ```text
///    8 >   name: {{ values.config.workgroup }}
///      i           ^^^^^^^^^^^^^^^^^^^^^^^^^ undefined value
/// ```
fn extract_expression_from_display(display: &str) -> Option<String> {
    for line in display.lines() {
        let trimmed = line.trim_start();
        if !(trimmed.contains(" > ") || trimmed.starts_with("> ")) {
            continue;
        }
        let Some(start) = line.find("{{") else {
            continue;
        };
        let Some(end) = line[start..].find("}}") else {
            continue;
        };
        let expr = line[start + 2..start + end].trim();
        let expr = expr.split('|').next().unwrap_or(expr).trim();
        if !expr.is_empty() {
            return Some(expr.to_string());
        }
    }
    None
}

/// Source span covering `line_num` (1-based)
fn calculate_span(source: &str, line_num: usize) -> Option<SourceSpan> {
    let mut offset = 0;
    for (idx, line) in source.lines().enumerate() {
        if idx + 1 == line_num {
            return Some(SourceSpan::new(offset.into(), line.len()));
        }
        offset += line.len() + 1;
    }
    None
}

fn generate_suggestion(
    err: &minijinja::Error,
    kind: TemplateErrorKind,
    values: Option<&serde_json::Value>,
) -> Option<String> {
    match kind {
        TemplateErrorKind::UndefinedVariable => {
            let expr = extract_expression_from_display(&format!("{:#}", err))?;
            let path = expr.strip_prefix("values.")?;
            suggest_values_key(path, values?)
        }
        TemplateErrorKind::UnknownFilter => Some(format!(
            "Available filters: {}",
            AVAILABLE_FILTERS.join(", ")
        )),
        _ => None,
    }
}

/// Walk `path` through `values` and describe where it stops resolving
fn suggest_values_key(path: &str, values: &serde_json::Value) -> Option<String> {
    let mut current = values;
    let mut valid = vec![];

    for part in path.split('.') {
        match current.get(part) {
            Some(next) => {
                valid.push(part);
                current = next;
            }
            None => {
                let obj = current.as_object()?;
                let available: Vec<&str> = obj.keys().map(String::as_str).collect();
                let prefix = if valid.is_empty() {
                    "values".to_string()
                } else {
                    format!("values.{}", valid.join("."))
                };
                return Some(format!(
                    "Key `{}` not found in `{}`. Available keys: {}",
                    part,
                    prefix,
                    available.join(", ")
                ));
            }
        }
    }
    None
}

pub type Result<T> = std::result::Result<T, RenderError>;
