use serde::{Deserialize, Serialize};

use crate::domain::{InstanceId, LEADER_KEY_SUFFIX};

/// The recorded leader of a cluster. Last writer wins.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderRecord {
    pub cluster_id: String,
    pub leader_instance_id: InstanceId,
}

impl LeaderRecord {
    pub fn new(cluster_id: impl Into<String>, leader: impl Into<InstanceId>) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            leader_instance_id: leader.into(),
        }
    }

    pub fn key(&self) -> String {
        leader_key(&self.cluster_id)
    }

    pub fn is_leader(&self, instance_id: &str) -> bool {
        self.leader_instance_id == instance_id
    }
}

/// Store key of the leader record: `"<cluster>.leader"`.
pub fn leader_key(cluster_id: &str) -> String {
    format!("{cluster_id}.{LEADER_KEY_SUFFIX}")
}
