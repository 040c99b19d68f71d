use kube::ResourceExt;
use runtime_gvisor_charts::{render_gvisor_chart, render_gvisor_installation_chart};
use runtime_gvisor_core::constants::{
    GVISOR_CONFIG_KEY, GVISOR_MANAGED_RESOURCE_NAME, GVISOR_SECRET_NAME,
};
use runtime_gvisor_core::{Cluster, ContainerRuntime, decode_provider_config};
use tracing::info;

use super::{GVisorActuator, namespace_of};
use crate::builder::{ManagedResourceBuilder, SecretBuilder};
use crate::error::Result;

impl GVisorActuator {
    pub(super) async fn reconcile_installation(
        &self,
        cr: &ContainerRuntime,
        cluster: &Cluster,
    ) -> Result<()> {
        let namespace = namespace_of(cr)?;

        // Nothing is written for an unusable provider config.
        let config = decode_provider_config(cr.spec.provider_config.as_ref())?;

        let shoot = cluster.shoot()?;
        let version = shoot.kubernetes_version();
        let renderer = self.renderer_factory.new_for_shoot(version)?;

        info!(
            container_runtime = %cr.name_any(),
            namespace = %namespace,
            kubernetes_version = %version,
            "reconciling gVisor prerequisites"
        );
        let chart = render_gvisor_chart(renderer.as_ref(), &self.chart_source, version)?;
        SecretBuilder::new(&namespace, GVISOR_SECRET_NAME)
            .with_key_value(GVISOR_CONFIG_KEY, chart)
            .reconcile(self.client())
            .await?;
        ManagedResourceBuilder::new(&namespace, GVISOR_MANAGED_RESOURCE_NAME)
            .with_secret_refs([GVISOR_SECRET_NAME])
            .reconcile(self.client())
            .await?;

        info!(
            container_runtime = %cr.name_any(),
            worker_pool = %cr.worker_pool_name(),
            "reconciling gVisor installation"
        );
        let installation = render_gvisor_installation_chart(
            renderer.as_ref(),
            &self.chart_source,
            cr,
            &config,
            &self.installation_image,
        )?;
        let secret_name = cr.installation_secret_name();
        SecretBuilder::new(&namespace, &secret_name)
            .with_key_value(GVISOR_CONFIG_KEY, installation)
            .reconcile(self.client())
            .await?;
        ManagedResourceBuilder::new(&namespace, cr.installation_managed_resource_name())
            .with_secret_refs([secret_name])
            .reconcile(self.client())
            .await
    }
}
