use std::collections::BTreeMap;

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::{
    cluster::ApiStatus,
    domain::{ApiName, INSTANCE_KEY_INFIX, InstanceId},
};

/// Heartbeat record an instance publishes into the shared store every cycle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceStatus {
    pub instance_id: InstanceId,
    /// Load indicator in `0.0..=1.0` (or above when overcommitted).
    pub load: f64,
    /// Whether the instance currently accepts new work.
    pub accept: bool,
    #[serde(default)]
    pub api_status: BTreeMap<ApiName, ApiStatus>,
    /// Unix timestamp (seconds) of the publish.
    pub publish_time: i64,
    pub image_version: Version,
}

impl InstanceStatus {
    pub fn new(instance_id: impl Into<InstanceId>, image_version: Version, publish_time: i64) -> Self {
        Self {
            instance_id: instance_id.into(),
            load: 0.0,
            accept: true,
            api_status: BTreeMap::new(),
            publish_time,
            image_version,
        }
    }

    /// Stale once `publish_time` is more than `max_age_secs` before `now`.
    pub fn is_stale(&self, now: i64, max_age_secs: i64) -> bool {
        now.saturating_sub(self.publish_time) > max_age_secs
    }

    pub fn key(&self, cluster_id: &str) -> String {
        instance_key(cluster_id, &self.instance_id)
    }
}

/// Store key of an instance heartbeat: `"<cluster>.instance.<id>"`.
pub fn instance_key(cluster_id: &str, instance_id: &str) -> String {
    format!("{}{}", instance_prefix(cluster_id), instance_id)
}

/// Common prefix of every heartbeat key in a cluster.
pub fn instance_prefix(cluster_id: &str) -> String {
    format!("{cluster_id}.{INSTANCE_KEY_INFIX}.")
}
