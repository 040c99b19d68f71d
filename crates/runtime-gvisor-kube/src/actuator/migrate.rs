use kube::ResourceExt;
use runtime_gvisor_core::ContainerRuntime;
use runtime_gvisor_core::constants::{GVISOR_MANAGED_RESOURCE_NAME, GVISOR_SECRET_NAME};
use tracing::info;

use super::{GVisorActuator, namespace_of};
use crate::error::Result;
use crate::managed_resource::{delete_managed_resource, set_keep_objects};

impl GVisorActuator {
    /// Orphan the deployed objects and drop the ManagedResources.
    ///
    /// The shared ManagedResource is released as well, even if other worker
    /// pools still use it: all ContainerRuntimes of the shoot migrate together.
    pub(super) async fn migrate_installation(&self, cr: &ContainerRuntime) -> Result<()> {
        let namespace = namespace_of(cr)?;
        info!(
            container_runtime = %cr.name_any(),
            namespace = %namespace,
            "releasing gVisor objects for migration"
        );

        let name = cr.installation_managed_resource_name();
        set_keep_objects(self.client(), &namespace, &name, true).await?;
        delete_managed_resource(self.client(), &namespace, &name, &cr.installation_secret_name())
            .await?;

        set_keep_objects(self.client(), &namespace, GVISOR_MANAGED_RESOURCE_NAME, true).await?;
        delete_managed_resource(
            self.client(),
            &namespace,
            GVISOR_MANAGED_RESOURCE_NAME,
            GVISOR_SECRET_NAME,
        )
        .await
    }
}
