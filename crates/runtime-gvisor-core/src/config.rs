//! Provider configuration of the gVisor runtime
//!
//! The configuration is embedded into `ContainerRuntime.spec.providerConfig`
//! as a typed envelope:
//!
//! ```yaml
//! apiVersion: gvisor.runtime.extensions.config.gardener.cloud/v1alpha1
//! kind: GVisorConfiguration
//! configFlags:
//!   net-raw: "true"
//! ```
//!
//! Only `v1alpha1` is served. Decoding maps the versioned type onto the
//! internal [`GVisorConfiguration`] field by field.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{CoreError, Result};

/// API group of the provider configuration
pub const API_GROUP: &str = "gvisor.runtime.extensions.config.gardener.cloud";

/// Served API version
pub const API_VERSION_V1ALPHA1: &str = "gvisor.runtime.extensions.config.gardener.cloud/v1alpha1";

/// Kind of the provider configuration
pub const KIND: &str = "GVisorConfiguration";

/// Internal representation of the provider configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GVisorConfiguration {
    /// Additional flags passed to the runsc binary
    pub config_flags: Option<BTreeMap<String, String>>,
}

/// `v1alpha1` wire representation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GVisorConfigurationV1Alpha1 {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_flags: Option<BTreeMap<String, String>>,
}

impl From<GVisorConfigurationV1Alpha1> for GVisorConfiguration {
    fn from(v: GVisorConfigurationV1Alpha1) -> Self {
        Self {
            config_flags: v.config_flags,
        }
    }
}

impl GVisorConfiguration {
    /// Configuration flags, empty when none were given
    pub fn flags(&self) -> BTreeMap<String, String> {
        self.config_flags.clone().unwrap_or_default()
    }
}

/// Decode an optional raw provider configuration.
///
/// An absent (or `null`) configuration yields the default configuration.
/// Anything that is not a `GVisorConfiguration` of a served version is a
/// configuration problem.
pub fn decode_provider_config(raw: Option<&serde_json::Value>) -> Result<GVisorConfiguration> {
    let raw = match raw {
        None | Some(serde_json::Value::Null) => return Ok(GVisorConfiguration::default()),
        Some(raw) => raw,
    };

    if !raw.is_object() {
        return Err(CoreError::configuration(
            "providerConfig must be an object",
        ));
    }

    let api_version = raw.get("apiVersion").and_then(|v| v.as_str());
    let kind = raw.get("kind").and_then(|v| v.as_str());

    match (api_version, kind) {
        (Some(API_VERSION_V1ALPHA1), Some(KIND)) => {}
        (None, _) | (_, None) => {
            return Err(CoreError::configuration(
                "providerConfig is missing apiVersion or kind",
            ));
        }
        (Some(api_version), Some(kind)) => {
            return Err(CoreError::configuration(format!(
                "no kind \"{}\" is registered for version \"{}\"",
                kind, api_version
            )));
        }
    }

    let versioned: GVisorConfigurationV1Alpha1 = serde_json::from_value(raw.clone())
        .map_err(|e| CoreError::configuration(format!("could not decode providerConfig: {}", e)))?;

    Ok(versioned.into())
}

/// Decode a provider configuration from raw YAML or JSON bytes
pub fn decode_provider_config_bytes(raw: &[u8]) -> Result<GVisorConfiguration> {
    let value: serde_json::Value = serde_yaml::from_slice(raw)
        .map_err(|e| CoreError::configuration(format!("could not parse providerConfig: {}", e)))?;
    decode_provider_config(Some(&value))
}
