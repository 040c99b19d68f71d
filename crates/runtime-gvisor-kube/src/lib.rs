//! Runtime gVisor Kube - Kubernetes controllers of the gVisor extension
//!
//! This crate provides:
//! - **Actuator**: Reconcile, delete, migrate and restore the gVisor installation of a worker pool
//! - **Lifecycle**: Operation selection, finalizer handling and status bookkeeping
//! - **Seed Client**: Kubernetes access behind a trait, with an in-memory mock for tests
//! - **ManagedResources**: Upsert, keep-objects and wait-for-deletion helpers
//! - **Health Checks**: `SystemComponentsHealthy` condition from the installation ManagedResource
//! - **Heartbeat**: Liveness lease of the extension

pub mod actuator;
pub mod builder;
pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod health;
pub mod heartbeat;
pub mod lifecycle;
pub mod managed_resource;

pub use actuator::{Actuator, DeletionOptions, GVisorActuator, is_installation_still_required};
pub use builder::{ManagedResourceBuilder, SecretBuilder};
pub use client::{KubeSeedClient, MockSeedClient, OperationCounts, SeedClient};
pub use config::{ControllerConfig, HealthCheckConfig, HeartbeatConfig};
pub use error::{KubeError, Result};
pub use health::{HealthChecker, HealthStatus, check_managed_resource};
pub use heartbeat::{HEARTBEAT_HOLDER, Heartbeat, build_lease};
pub use lifecycle::{ContainerRuntimeReconciler, Operation, Outcome, select_operation};
pub use managed_resource::{ManagedResource, ManagedResourceSpec, ManagedResourceStatus};
