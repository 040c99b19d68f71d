//! ContainerRuntime actuator
//!
//! The actuator maps lifecycle events of a gVisor ContainerRuntime onto the
//! objects it owns in the shoot's control-plane namespace:
//!
//! | object | name |
//! |---|---|
//! | shared Secret / ManagedResource | `extension-runtime-gvisor` |
//! | per pool Secret / ManagedResource | `extension-runtime-gvisor-installation-<pool>` |
//!
//! All operations are idempotent; failed calls are retried by the controller.

mod delete;
mod migrate;
mod reconcile;

pub use delete::is_installation_still_required;

use async_trait::async_trait;
use kube::ResourceExt;
use runtime_gvisor_charts::{ChartRendererFactory, ChartSource};
use runtime_gvisor_core::constants::RUNTIME_GVISOR_INSTALLATION_IMAGE_NAME;
use runtime_gvisor_core::{Cluster, ContainerRuntime, ImageVector};
use std::sync::Arc;
use std::time::Duration;

use crate::client::SeedClient;
use crate::error::{KubeError, Result};

/// Lifecycle operations of a ContainerRuntime
#[async_trait]
pub trait Actuator: Send + Sync {
    /// Create or update all objects required by the runtime
    async fn reconcile(&self, cr: &ContainerRuntime, cluster: &Cluster) -> Result<()>;

    /// Remove the objects of the runtime's worker pool, and the shared ones
    /// once no other worker pool needs them
    async fn delete(&self, cr: &ContainerRuntime, cluster: &Cluster) -> Result<()>;

    /// Same as [`Actuator::delete`]
    async fn force_delete(&self, cr: &ContainerRuntime, cluster: &Cluster) -> Result<()>;

    /// Re-create the objects after a control-plane migration
    async fn restore(&self, cr: &ContainerRuntime, cluster: &Cluster) -> Result<()>;

    /// Release the objects to the destination seed, leaving the workload running
    async fn migrate(&self, cr: &ContainerRuntime, cluster: &Cluster) -> Result<()>;
}

/// How deletions wait for the resource manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeletionOptions {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for DeletionOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            poll_interval: Duration::from_secs(5),
        }
    }
}

/// Actuator installing gVisor through ManagedResources
pub struct GVisorActuator {
    client: Arc<dyn SeedClient>,
    renderer_factory: Arc<dyn ChartRendererFactory>,
    installation_image: String,
    chart_source: ChartSource,
    deletion: DeletionOptions,
}

impl GVisorActuator {
    /// Create an actuator; the installation image is resolved from `images` once
    pub fn new(
        client: Arc<dyn SeedClient>,
        renderer_factory: Arc<dyn ChartRendererFactory>,
        images: &ImageVector,
    ) -> Result<Self> {
        Ok(Self {
            client,
            renderer_factory,
            installation_image: images.image(RUNTIME_GVISOR_INSTALLATION_IMAGE_NAME)?,
            chart_source: ChartSource::Embedded,
            deletion: DeletionOptions::default(),
        })
    }

    /// Read charts from another source
    pub fn with_chart_source(mut self, source: ChartSource) -> Self {
        self.chart_source = source;
        self
    }

    pub fn with_deletion_options(mut self, options: DeletionOptions) -> Self {
        self.deletion = options;
        self
    }

    /// Image deployed by the installation chart
    pub fn installation_image(&self) -> &str {
        &self.installation_image
    }

    fn client(&self) -> &dyn SeedClient {
        self.client.as_ref()
    }
}

fn namespace_of(cr: &ContainerRuntime) -> Result<String> {
    cr.namespace().ok_or_else(|| {
        KubeError::InvalidResource(format!("ContainerRuntime '{}' has no namespace", cr.name_any()))
    })
}

#[async_trait]
impl Actuator for GVisorActuator {
    async fn reconcile(&self, cr: &ContainerRuntime, cluster: &Cluster) -> Result<()> {
        self.reconcile_installation(cr, cluster).await
    }

    async fn delete(&self, cr: &ContainerRuntime, cluster: &Cluster) -> Result<()> {
        self.delete_installation(cr, cluster).await
    }

    async fn force_delete(&self, cr: &ContainerRuntime, cluster: &Cluster) -> Result<()> {
        self.delete_installation(cr, cluster).await
    }

    async fn restore(&self, cr: &ContainerRuntime, cluster: &Cluster) -> Result<()> {
        self.reconcile_installation(cr, cluster).await
    }

    async fn migrate(&self, cr: &ContainerRuntime, _cluster: &Cluster) -> Result<()> {
        self.migrate_installation(cr).await
    }
}
