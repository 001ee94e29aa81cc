//! Instance heartbeats in the shared store.
use std::cmp::Ordering;

use relay_model::{InstanceStatus, instance_key, instance_prefix};
use semver::Version;
use tracing::{debug, warn};

use crate::{
    error::StoreError,
    store::{self, StoreHandle},
};

/// Reads and writes the heartbeat records of one cluster.
#[derive(Clone)]
pub struct InstanceRegistry {
    store: StoreHandle,
    cluster_id: String,
    max_age_secs: i64,
}

impl InstanceRegistry {
    pub fn new(store: StoreHandle, cluster_id: impl Into<String>, max_age_secs: i64) -> Self {
        Self {
            store,
            cluster_id: cluster_id.into(),
            max_age_secs,
        }
    }

    pub fn cluster_id(&self) -> &str {
        &self.cluster_id
    }

    pub fn max_age_secs(&self) -> i64 {
        self.max_age_secs
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    /// Write (or overwrite) the heartbeat of `status.instance_id`.
    pub async fn publish(&self, status: &InstanceStatus) -> Result<(), StoreError> {
        let key = status.key(&self.cluster_id);
        store::put_json(self.store.as_ref(), &key, status).await?;
        debug!(instance = %status.instance_id, load = status.load, accept = status.accept, "heartbeat published");
        Ok(())
    }

    /// Every heartbeat record, stale ones included. Undecodable records are skipped.
    pub async fn all_instances(&self) -> Result<Vec<InstanceStatus>, StoreError> {
        let records = self.store.scan(&instance_prefix(&self.cluster_id)).await?;
        Ok(records
            .into_iter()
            .filter_map(|(key, raw)| match store::decode::<InstanceStatus>(&key, &raw) {
                Ok(status) => Some(status),
                Err(e) => {
                    warn!(error = %e, "skipping unreadable heartbeat");
                    None
                }
            })
            .collect())
    }

    /// Instances whose heartbeat is recent at `now`.
    pub async fn live_instances(&self, now: i64) -> Result<Vec<InstanceStatus>, StoreError> {
        let mut all = self.all_instances().await?;
        all.retain(|s| !s.is_stale(now, self.max_age_secs));
        Ok(all)
    }

    /// Live instances that currently accept new work.
    pub async fn available_instances(&self, now: i64) -> Result<Vec<InstanceStatus>, StoreError> {
        let mut live = self.live_instances(now).await?;
        live.retain(|s| s.accept);
        Ok(live)
    }

    pub async fn stale_instances(&self, now: i64) -> Result<Vec<InstanceStatus>, StoreError> {
        let mut all = self.all_instances().await?;
        all.retain(|s| s.is_stale(now, self.max_age_secs));
        Ok(all)
    }

    /// Delete stale heartbeats. Returns how many were removed.
    pub async fn purge_stale(&self, now: i64) -> Result<usize, StoreError> {
        let stale = self.stale_instances(now).await?;
        for status in &stale {
            self.store
                .delete(&instance_key(&self.cluster_id, &status.instance_id))
                .await?;
            debug!(instance = %status.instance_id, published = status.publish_time, "stale heartbeat removed");
        }
        Ok(stale.len())
    }

    /// How `own` compares with the images of the live fleet.
    ///
    /// `Less` when some live instance runs a newer image, `Greater` when some
    /// runs an older one (and none a newer), `Equal` otherwise. An unknown own
    /// version (`0.0.0`) or an empty fleet is `Equal`.
    pub async fn image_recentness(&self, own: &Version, now: i64) -> Result<Ordering, StoreError> {
        if *own == Version::new(0, 0, 0) {
            return Ok(Ordering::Equal);
        }
        let live = self.live_instances(now).await?;
        let newest = live.iter().map(|s| &s.image_version).max();
        let oldest = live.iter().map(|s| &s.image_version).min();

        Ok(match (newest, oldest) {
            (Some(max), _) if max > own => Ordering::Less,
            (_, Some(min)) if min < own => Ordering::Greater,
            _ => Ordering::Equal,
        })
    }
}

impl std::fmt::Debug for InstanceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceRegistry")
            .field("cluster_id", &self.cluster_id)
            .field("max_age_secs", &self.max_age_secs)
            .finish_non_exhaustive()
    }
}
