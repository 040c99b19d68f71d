//! Create-or-update builders for the objects the actuator owns

use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;

use crate::client::SeedClient;
use crate::error::Result;
use crate::managed_resource::{ManagedResource, ManagedResourceSpec, SecretRef};

const SECRET_TYPE_OPAQUE: &str = "Opaque";

/// Builds an `Opaque` secret and upserts it
#[derive(Debug, Clone)]
pub struct SecretBuilder {
    namespace: String,
    name: String,
    data: BTreeMap<String, Vec<u8>>,
}

impl SecretBuilder {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            data: BTreeMap::new(),
        }
    }

    /// Set a data key
    pub fn with_key_value(mut self, key: impl Into<String>, value: Vec<u8>) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    fn data(&self) -> BTreeMap<String, ByteString> {
        self.data
            .iter()
            .map(|(k, v)| (k.clone(), ByteString(v.clone())))
            .collect()
    }

    /// Create the secret, or replace type and data of an existing one.
    ///
    /// Labels, annotations and other metadata of an existing secret are kept.
    pub async fn reconcile(&self, client: &dyn SeedClient) -> Result<()> {
        match client.get_secret(&self.namespace, &self.name).await? {
            Some(mut existing) => {
                existing.type_ = Some(SECRET_TYPE_OPAQUE.to_string());
                existing.data = Some(self.data());
                existing.string_data = None;
                tracing::debug!(namespace = %self.namespace, secret = %self.name, "updating secret");
                client.update_secret(&existing).await
            }
            None => {
                let secret = Secret {
                    metadata: ObjectMeta {
                        name: Some(self.name.clone()),
                        namespace: Some(self.namespace.clone()),
                        ..Default::default()
                    },
                    type_: Some(SECRET_TYPE_OPAQUE.to_string()),
                    data: Some(self.data()),
                    ..Default::default()
                };
                tracing::debug!(namespace = %self.namespace, secret = %self.name, "creating secret");
                client.create_secret(&secret).await
            }
        }
    }
}

/// Builds a ManagedResource referencing secrets and upserts it
#[derive(Debug, Clone)]
pub struct ManagedResourceBuilder {
    namespace: String,
    name: String,
    secret_refs: Vec<String>,
}

impl ManagedResourceBuilder {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            secret_refs: Vec::new(),
        }
    }

    /// Reference secrets by name
    pub fn with_secret_refs<I, S>(mut self, refs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.secret_refs = refs.into_iter().map(Into::into).collect();
        self
    }

    fn spec(&self, class: Option<String>) -> ManagedResourceSpec {
        ManagedResourceSpec {
            class,
            secret_refs: self
                .secret_refs
                .iter()
                .map(|name| SecretRef { name: name.clone() })
                .collect(),
            keep_objects: None,
        }
    }

    /// Create the ManagedResource, or replace the spec of an existing one.
    ///
    /// The resource class of an existing ManagedResource is kept.
    pub async fn reconcile(&self, client: &dyn SeedClient) -> Result<()> {
        match client.get_managed_resource(&self.namespace, &self.name).await? {
            Some(mut existing) => {
                existing.spec = self.spec(existing.spec.class.take());
                tracing::debug!(
                    namespace = %self.namespace,
                    managed_resource = %self.name,
                    "updating managed resource"
                );
                client.update_managed_resource(&existing).await
            }
            None => {
                let mut mr = ManagedResource::new(&self.name, self.spec(None));
                mr.metadata.namespace = Some(self.namespace.clone());
                tracing::debug!(
                    namespace = %self.namespace,
                    managed_resource = %self.name,
                    "creating managed resource"
                );
                client.create_managed_resource(&mr).await
            }
        }
    }
}
