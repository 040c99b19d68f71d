//! Names shared by the controller, the charts and the deployed objects
//!
//! Object names must stay byte-for-byte stable: shoots reconciled by earlier
//! releases of the extension already carry them.

/// Name of the extension
pub const NAME: &str = "runtime-gvisor";

/// ContainerRuntime type handled by this extension
pub const TYPE: &str = "gvisor";

/// Image name of the installation image in the image vector
pub const RUNTIME_GVISOR_INSTALLATION_IMAGE_NAME: &str = "runtime-gvisor-installation";

/// Release name of the gVisor installation chart
pub const INSTALLATION_RELEASE_NAME: &str = "gvisor-installation";

/// Release name of the gVisor chart
pub const RELEASE_NAME: &str = "gvisor";

/// Path to the internal gVisor chart
pub const CHART_PATH: &str = "charts/internal/gvisor";

/// Path to the internal gVisor installation chart
pub const INSTALLATION_CHART_PATH: &str = "charts/internal/gvisor-installation";

/// Secret holding the shared prerequisites
pub const GVISOR_SECRET_NAME: &str = "extension-runtime-gvisor";

/// ManagedResource holding the shared prerequisites
pub const GVISOR_MANAGED_RESOURCE_NAME: &str = "extension-runtime-gvisor";

/// Prefix of the per worker pool installation secret
pub const GVISOR_INSTALLATION_SECRET_NAME: &str = "extension-runtime-gvisor-installation";

/// Prefix of the per worker pool installation ManagedResource
pub const GVISOR_INSTALLATION_MANAGED_RESOURCE_NAME: &str = "extension-runtime-gvisor-installation";

/// Key of the rendered chart inside the secrets
pub const GVISOR_CONFIG_KEY: &str = "config.yaml";

/// Namespace the charts are rendered into
pub const NAMESPACE_SYSTEM: &str = "kube-system";

/// Node label carrying the CRI name
pub const CRI_NAME_WORKER_LABEL: &str = "worker.gardener.cloud/cri-name";

/// CRI name of containerd
pub const CRI_NAME_CONTAINERD: &str = "containerd";

/// Prefix of the node label marking an enabled container runtime
pub const CONTAINER_RUNTIME_NAME_WORKER_LABEL_PREFIX: &str = "containerruntime.worker.gardener.cloud/";

/// Annotation requesting an operation on an extension resource
pub const OPERATION_ANNOTATION: &str = "gardener.cloud/operation";

pub const OPERATION_RECONCILE: &str = "reconcile";
pub const OPERATION_MIGRATE: &str = "migrate";
pub const OPERATION_RESTORE: &str = "restore";

/// Shoot annotation confirming a forced deletion
pub const FORCE_DELETION_ANNOTATION: &str = "confirmation.gardener.cloud/force-deletion";

/// Finalizer placed on handled ContainerRuntime resources
pub const FINALIZER: &str = "extensions.gardener.cloud/gvisor";

/// Lease renewed by the heartbeat
pub const HEARTBEAT_LEASE_NAME: &str = "gardener-extension-heartbeat";

/// Name of the installation ManagedResource for a worker pool
pub fn installation_managed_resource_name(worker_pool: &str) -> String {
    format!("{}-{}", GVISOR_INSTALLATION_MANAGED_RESOURCE_NAME, worker_pool)
}

/// Name of the installation secret for a worker pool
pub fn installation_secret_name(worker_pool: &str) -> String {
    format!("{}-{}", GVISOR_INSTALLATION_SECRET_NAME, worker_pool)
}

/// Node label marking that a container runtime is enabled on a worker
pub fn container_runtime_worker_label(runtime_type: &str) -> String {
    format!("{}{}", CONTAINER_RUNTIME_NAME_WORKER_LABEL_PREFIX, runtime_type)
}

/// Parse a boolean the way Kubernetes tooling does (`1`, `t`, `true`, ...)
pub fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}
