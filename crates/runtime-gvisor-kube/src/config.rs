//! Controller configuration
//!
//! Loaded from an optional YAML file; every field has a default so an empty
//! document is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::actuator::DeletionOptions;
use crate::error::{KubeError, Result};

/// Configuration of the ContainerRuntime controllers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerConfig {
    /// Maximum number of ContainerRuntimes reconciled concurrently (default: 5)
    #[serde(default = "default_concurrency")]
    pub max_concurrent_reconciles: u16,

    /// Reconcile on every event instead of only on request (default: true)
    #[serde(default = "default_true")]
    pub ignore_operation_annotation: bool,

    /// How long deletions wait for the resource manager (default: 2m)
    #[serde(default = "default_deletion_timeout", with = "humantime_serde")]
    pub deletion_timeout: Duration,

    /// Interval between checks while waiting for deletions (default: 5s)
    #[serde(default = "default_deletion_poll_interval", with = "humantime_serde")]
    pub deletion_poll_interval: Duration,

    /// Requeue delay after a failed reconcile (default: 30s)
    #[serde(default = "default_requeue_after_error", with = "humantime_serde")]
    pub requeue_after_error: Duration,

    #[serde(default)]
    pub health_check: HealthCheckConfig,

    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_reconciles: default_concurrency(),
            ignore_operation_annotation: true,
            deletion_timeout: default_deletion_timeout(),
            deletion_poll_interval: default_deletion_poll_interval(),
            requeue_after_error: default_requeue_after_error(),
            health_check: HealthCheckConfig::default(),
            heartbeat: HeartbeatConfig::default(),
        }
    }
}

/// Health check controller configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckConfig {
    /// Maximum number of health checks run concurrently (default: 5)
    #[serde(default = "default_concurrency")]
    pub max_concurrent_reconciles: u16,

    /// Interval between two health checks of a resource (default: 30s)
    #[serde(default = "default_sync_period", with = "humantime_serde")]
    pub sync_period: Duration,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            max_concurrent_reconciles: default_concurrency(),
            sync_period: default_sync_period(),
        }
    }
}

/// Heartbeat controller configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Namespace of the heartbeat lease
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Interval between lease renewals (default: 30s)
    #[serde(default = "default_renew_interval", with = "humantime_serde")]
    pub renew_interval: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            namespace: None,
            renew_interval: default_renew_interval(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> u16 {
    5
}

fn default_deletion_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_deletion_poll_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_requeue_after_error() -> Duration {
    Duration::from_secs(30)
}

fn default_sync_period() -> Duration {
    Duration::from_secs(30)
}

fn default_renew_interval() -> Duration {
    Duration::from_secs(30)
}

impl ControllerConfig {
    /// Parse a configuration document
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read a configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            KubeError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    /// Check value ranges and required fields
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_reconciles == 0 {
            return Err(KubeError::InvalidConfig(
                "maxConcurrentReconciles must be greater than 0".to_string(),
            ));
        }
        if self.health_check.max_concurrent_reconciles == 0 {
            return Err(KubeError::InvalidConfig(
                "healthCheck.maxConcurrentReconciles must be greater than 0".to_string(),
            ));
        }
        if self.deletion_poll_interval.is_zero() || self.health_check.sync_period.is_zero() {
            return Err(KubeError::InvalidConfig(
                "intervals must be greater than 0".to_string(),
            ));
        }
        if self.heartbeat.enabled {
            if self.heartbeat.renew_interval.is_zero() {
                return Err(KubeError::InvalidConfig(
                    "heartbeat.renewInterval must be greater than 0".to_string(),
                ));
            }
            if self.heartbeat.namespace.as_deref().is_none_or(str::is_empty) {
                return Err(KubeError::InvalidConfig(
                    "heartbeat.namespace is required when the heartbeat is enabled".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Deletion behaviour of the actuator
    pub fn deletion_options(&self) -> DeletionOptions {
        DeletionOptions {
            timeout: self.deletion_timeout,
            poll_interval: self.deletion_poll_interval,
        }
    }
}
