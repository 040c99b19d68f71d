use kube::ResourceExt;
use runtime_gvisor_core::constants::{GVISOR_MANAGED_RESOURCE_NAME, GVISOR_SECRET_NAME};
use runtime_gvisor_core::{Cluster, ContainerRuntime};
use tracing::{debug, info, warn};

use super::{GVisorActuator, namespace_of};
use crate::error::Result;
use crate::managed_resource::{delete_managed_resource, wait_until_managed_resource_deleted};

/// Whether another live gVisor ContainerRuntime still needs the shared objects.
///
/// `siblings` are the ContainerRuntimes of the same namespace; the one named
/// `exclude_name` is the one being deleted.
pub fn is_installation_still_required(exclude_name: &str, siblings: &[ContainerRuntime]) -> bool {
    siblings
        .iter()
        .any(|cr| cr.name_any() != exclude_name && cr.is_gvisor() && !cr.is_deleting())
}

impl GVisorActuator {
    pub(super) async fn delete_installation(
        &self,
        cr: &ContainerRuntime,
        cluster: &Cluster,
    ) -> Result<()> {
        let namespace = namespace_of(cr)?;
        let wait = match cluster.shoot() {
            Ok(shoot) => !shoot.needs_force_deletion(),
            Err(e) => {
                warn!(cluster = %cluster.name_any(), error = %e, "cannot decode shoot, waiting for deletions");
                true
            }
        };

        info!(
            container_runtime = %cr.name_any(),
            worker_pool = %cr.worker_pool_name(),
            "deleting gVisor installation"
        );
        self.delete_and_wait(
            &namespace,
            &cr.installation_managed_resource_name(),
            &cr.installation_secret_name(),
            wait,
        )
        .await?;

        let siblings = self.client().list_container_runtimes(Some(&namespace)).await?;
        if is_installation_still_required(&cr.name_any(), &siblings) {
            debug!(namespace = %namespace, "gVisor prerequisites still in use");
            return Ok(());
        }

        info!(namespace = %namespace, "deleting gVisor prerequisites");
        self.delete_and_wait(&namespace, GVISOR_MANAGED_RESOURCE_NAME, GVISOR_SECRET_NAME, wait)
            .await
    }

    async fn delete_and_wait(
        &self,
        namespace: &str,
        name: &str,
        secret_name: &str,
        wait: bool,
    ) -> Result<()> {
        delete_managed_resource(self.client(), namespace, name, secret_name).await?;
        if !wait {
            return Ok(());
        }
        wait_until_managed_resource_deleted(
            self.client(),
            namespace,
            name,
            self.deletion.poll_interval,
            self.deletion.timeout,
        )
        .await
    }
}
