//! Runtime gVisor Core - shared types for the gVisor container runtime extension
//!
//! This crate provides the foundational types used throughout the extension:
//! - `ContainerRuntime`: The custom resource requesting gVisor for a worker pool
//! - `Cluster`: The per-shoot cluster resource and its `Shoot` view
//! - `GVisorConfiguration`: The decoded provider configuration
//! - `ImageVector`: Image lookup over the embedded `images.yaml`
//! - `Values`: Chart values with deep merge support

pub mod cluster;
pub mod config;
pub mod constants;
pub mod container_runtime;
pub mod error;
pub mod imagevector;
pub mod values;

pub use cluster::{Cluster, ClusterSpec, Shoot};
pub use config::{GVisorConfiguration, decode_provider_config, decode_provider_config_bytes};
pub use container_runtime::{
    ContainerRuntime, ContainerRuntimeSpec, ContainerRuntimeStatus, ContainerRuntimeWorkerPool,
    ExtensionCondition, LastError, LastOperation, LastOperationState, LastOperationType,
};
pub use error::{CoreError, Result};
pub use imagevector::{ImageSource, ImageVector};
pub use values::Values;
