//! Once-per-cycle leader election over the shared store.
//!
//! There is no lock and no lease. A candidate writes itself as leader and only
//! acts as leader from the next cycle on, after reading its own record back;
//! concurrent writers converge because the last write wins.
use std::cmp::Ordering;

use relay_model::{InstanceId, LeaderRecord, leader_key};
use semver::Version;
use tracing::{debug, error, info, instrument};

use crate::{
    error::StoreError,
    registry::InstanceRegistry,
    store::{self, ConfigStore},
};

/// Outcome of one election cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Election {
    /// Wrote self as leader; takes effect next cycle.
    ProposedSelf,
    /// Was leader but runs an outdated image; the record was removed.
    SteppedDown,
    Leader,
    Follower,
}

impl Election {
    pub fn is_leader(self) -> bool {
        matches!(self, Election::Leader)
    }
}

#[derive(Debug, Clone)]
pub struct LeaderElector {
    registry: InstanceRegistry,
    instance_id: InstanceId,
    image_version: Version,
}

impl LeaderElector {
    pub fn new(
        registry: InstanceRegistry,
        instance_id: impl Into<InstanceId>,
        image_version: Version,
    ) -> Self {
        Self {
            registry,
            instance_id: instance_id.into(),
            image_version,
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Run one election at the current time.
    pub async fn cycle(&self) -> Election {
        self.cycle_at(crate::unix_now()).await
    }

    /// Run one election with `now` as the liveness reference.
    ///
    /// Store failures are logged and count as [`Election::Follower`].
    #[instrument(level = "debug", skip(self), fields(instance = %self.instance_id))]
    pub async fn cycle_at(&self, now: i64) -> Election {
        match self.elect(now).await {
            Ok(outcome) => {
                debug!(?outcome, "election finished");
                outcome
            }
            Err(e) => {
                error!(error = %e, "leader election failed, acting as follower");
                Election::Follower
            }
        }
    }

    async fn elect(&self, now: i64) -> Result<Election, StoreError> {
        let store = self.store();
        let key = leader_key(self.registry.cluster_id());
        let record: Option<LeaderRecord> = store::get_json(store, &key).await?;
        let live = self.registry.live_instances(now).await?;
        let recentness = self.registry.image_recentness(&self.image_version, now).await?;
        let outdated = recentness == Ordering::Less;

        let leader_live = |rec: &LeaderRecord| {
            live.iter()
                .any(|s| s.instance_id == rec.leader_instance_id)
        };

        match record {
            None => {
                self.propose(&key).await?;
                Ok(Election::ProposedSelf)
            }
            Some(rec) if !leader_live(&rec) && !outdated => {
                info!(previous = %rec.leader_instance_id, "recorded leader is gone");
                self.propose(&key).await?;
                Ok(Election::ProposedSelf)
            }
            Some(rec) if rec.is_leader(&self.instance_id) => {
                if outdated {
                    store.delete(&key).await?;
                    info!(image = %self.image_version, "newer image in the fleet, stepping down");
                    Ok(Election::SteppedDown)
                } else {
                    Ok(Election::Leader)
                }
            }
            Some(_) => Ok(Election::Follower),
        }
    }

    async fn propose(&self, key: &str) -> Result<(), StoreError> {
        let rec = LeaderRecord::new(self.registry.cluster_id(), self.instance_id.clone());
        store::put_json(self.store(), key, &rec).await?;
        info!("proposed self as cluster leader");
        Ok(())
    }

    /// Whether the recorded leader is this instance. Read-only.
    pub async fn is_proposed_leader(&self) -> bool {
        match self.current_leader().await {
            Ok(Some(rec)) => rec.is_leader(&self.instance_id),
            Ok(None) => false,
            Err(e) => {
                error!(error = %e, "failed to read leader record");
                false
            }
        }
    }

    pub async fn current_leader(&self) -> Result<Option<LeaderRecord>, StoreError> {
        store::get_json(self.store(), &leader_key(self.registry.cluster_id())).await
    }

    fn store(&self) -> &dyn ConfigStore {
        self.registry.store().as_ref()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use relay_model::InstanceStatus;

    use super::*;
    use crate::store::{FaultyStore, MemoryStore};

    const NOW: i64 = 10_000;

    fn elector(store: &Arc<MemoryStore>, id: &str, v: u64) -> LeaderElector {
        let reg = InstanceRegistry::new(store.clone(), "c", 450);
        LeaderElector::new(reg, id, Version::new(v, 0, 0))
    }

    async fn heartbeat(e: &LeaderElector, at: i64) {
        let status = InstanceStatus::new(e.instance_id(), e.image_version.clone(), at);
        e.registry.publish(&status).await.unwrap();
    }

    #[tokio::test]
    async fn two_instances_converge_on_one_leader() {
        let store = Arc::new(MemoryStore::new());
        let a = elector(&store, "a", 1);
        let b = elector(&store, "b", 1);
        heartbeat(&a, NOW).await;
        heartbeat(&b, NOW).await;

        // A finds no record and proposes itself; B then sees a live leader.
        assert_eq!(a.cycle_at(NOW).await, Election::ProposedSelf);
        assert_eq!(b.cycle_at(NOW).await, Election::Follower);
        assert!(a.is_proposed_leader().await);

        // Next cycle: the record names A, which is live.
        assert_eq!(a.cycle_at(NOW).await, Election::Leader);
        assert_eq!(b.cycle_at(NOW).await, Election::Follower);

        for _ in 0..3 {
            let outcomes = [a.cycle_at(NOW).await, b.cycle_at(NOW).await];
            assert_eq!(outcomes.iter().filter(|o| o.is_leader()).count(), 1);
        }
    }

    #[tokio::test]
    async fn simultaneous_proposals_last_writer_wins() {
        let store = Arc::new(MemoryStore::new());
        let a = elector(&store, "a", 1);
        let b = elector(&store, "b", 1);
        heartbeat(&a, NOW).await;
        heartbeat(&b, NOW).await;

        a.propose("c.leader").await.unwrap();
        b.propose("c.leader").await.unwrap();

        assert_eq!(a.cycle_at(NOW).await, Election::Follower);
        assert_eq!(b.cycle_at(NOW).await, Election::Leader);
    }

    #[tokio::test]
    async fn dead_leader_is_replaced() {
        let store = Arc::new(MemoryStore::new());
        let a = elector(&store, "a", 1);
        let b = elector(&store, "b", 1);
        heartbeat(&a, NOW - 1_000).await;
        heartbeat(&b, NOW).await;
        a.propose("c.leader").await.unwrap();

        assert_eq!(b.cycle_at(NOW).await, Election::ProposedSelf);
        assert_eq!(b.cycle_at(NOW).await, Election::Leader);
        assert_eq!(
            b.current_leader().await.unwrap().unwrap().leader_instance_id,
            "b"
        );
    }

    #[tokio::test]
    async fn outdated_leader_steps_down() {
        let store = Arc::new(MemoryStore::new());
        let old = elector(&store, "old", 1);
        let new = elector(&store, "new", 2);
        heartbeat(&old, NOW).await;
        old.propose("c.leader").await.unwrap();
        assert_eq!(old.cycle_at(NOW).await, Election::Leader);

        heartbeat(&new, NOW).await;
        assert_eq!(old.cycle_at(NOW).await, Election::SteppedDown);
        assert!(old.current_leader().await.unwrap().is_none());

        // The newer instance takes over; the old one never re-proposes itself
        // while the recorded leader is live.
        assert_eq!(new.cycle_at(NOW).await, Election::ProposedSelf);
        assert_eq!(old.cycle_at(NOW).await, Election::Follower);
        assert_eq!(new.cycle_at(NOW).await, Election::Leader);
    }

    #[tokio::test]
    async fn outdated_instance_does_not_replace_dead_leader() {
        let store = Arc::new(MemoryStore::new());
        let old = elector(&store, "old", 1);
        let new = elector(&store, "new", 2);
        heartbeat(&old, NOW).await;
        heartbeat(&new, NOW).await;
        store::put_json(store.as_ref(), "c.leader", &LeaderRecord::new("c", "gone"))
            .await
            .unwrap();

        assert_eq!(old.cycle_at(NOW).await, Election::Follower);
        assert_eq!(new.cycle_at(NOW).await, Election::ProposedSelf);
    }

    #[tokio::test]
    async fn failed_proposal_counts_as_follower() {
        let store = Arc::new(FaultyStore::new());
        let reg = InstanceRegistry::new(store.clone(), "c", 450);
        let a = LeaderElector::new(reg, "a", Version::new(1, 0, 0));
        heartbeat(&a, NOW).await;

        store.fail_puts(true);
        assert_eq!(a.cycle_at(NOW).await, Election::Follower);
        assert!(a.current_leader().await.unwrap().is_none());
        assert!(!a.is_proposed_leader().await);

        store.fail_puts(false);
        assert_eq!(a.cycle_at(NOW).await, Election::ProposedSelf);
    }

    #[tokio::test]
    async fn unreadable_fleet_demotes_recorded_leader() {
        let store = Arc::new(FaultyStore::new());
        let reg = InstanceRegistry::new(store.clone(), "c", 450);
        let a = LeaderElector::new(reg, "a", Version::new(1, 0, 0));
        heartbeat(&a, NOW).await;
        a.propose("c.leader").await.unwrap();
        assert_eq!(a.cycle_at(NOW).await, Election::Leader);

        store.fail_scans(true);
        assert_eq!(a.cycle_at(NOW).await, Election::Follower);
        // The record is left alone; the next readable cycle leads again.
        assert!(a.is_proposed_leader().await);
        store.fail_scans(false);
        assert_eq!(a.cycle_at(NOW).await, Election::Leader);
    }
}
