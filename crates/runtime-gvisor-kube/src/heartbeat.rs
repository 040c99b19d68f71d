//! Heartbeat lease
//!
//! The extension proves liveness by renewing a Lease in its own namespace.
//! The lease duration equals the renew interval, so a lease whose renew time
//! is older than its duration belongs to a dead extension.

use chrono::{DateTime, Utc};
use k8s_openapi::api::coordination::v1::{Lease, LeaseSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{MicroTime, ObjectMeta};
use runtime_gvisor_core::constants::HEARTBEAT_LEASE_NAME;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::client::SeedClient;
use crate::error::Result;

/// Holder identity written into the lease
pub const HEARTBEAT_HOLDER: &str = "gardener-extension-runtime-gvisor";

/// Build the heartbeat lease as of `now`
pub fn build_lease(namespace: &str, renew_interval: Duration, now: DateTime<Utc>) -> Lease {
    Lease {
        metadata: ObjectMeta {
            name: Some(HEARTBEAT_LEASE_NAME.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: Some(lease_spec(renew_interval, now)),
    }
}

fn lease_spec(renew_interval: Duration, now: DateTime<Utc>) -> LeaseSpec {
    LeaseSpec {
        holder_identity: Some(HEARTBEAT_HOLDER.to_string()),
        lease_duration_seconds: Some(i32::try_from(renew_interval.as_secs()).unwrap_or(i32::MAX)),
        renew_time: Some(MicroTime(now)),
        ..Default::default()
    }
}

/// Renews the heartbeat lease
pub struct Heartbeat {
    client: Arc<dyn SeedClient>,
    namespace: String,
    renew_interval: Duration,
}

impl Heartbeat {
    pub fn new(client: Arc<dyn SeedClient>, namespace: impl Into<String>, renew_interval: Duration) -> Self {
        Self {
            client,
            namespace: namespace.into(),
            renew_interval,
        }
    }

    /// Create the lease or move its renew time forward
    pub async fn renew(&self) -> Result<()> {
        let now = Utc::now();
        match self
            .client
            .get_lease(&self.namespace, HEARTBEAT_LEASE_NAME)
            .await?
        {
            Some(mut lease) => {
                lease.spec = Some(lease_spec(self.renew_interval, now));
                self.client.update_lease(&lease).await
            }
            None => {
                let lease = build_lease(&self.namespace, self.renew_interval, now);
                self.client.create_lease(&lease).await
            }
        }
    }

    /// Renew the lease every renew interval until the task is dropped.
    ///
    /// Failed renewals are logged and retried on the next tick.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.renew_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match self.renew().await {
                Ok(()) => debug!(namespace = %self.namespace, "renewed heartbeat lease"),
                Err(e) => warn!(namespace = %self.namespace, error = %e, "cannot renew heartbeat lease"),
            }
        }
    }
}
