use std::{cmp::Ordering, sync::Arc};

use relay_model::InstanceStatus;
use tracing::{debug, info, instrument, warn};

use super::{CycleContext, MaintenanceHook, StatusProvider, should_accept};
use crate::{
    config::MaintenanceConfig,
    error::StoreError,
    leader::{Election, LeaderElector},
    registry::InstanceRegistry,
    store::StoreHandle,
};

/// What one cycle did.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub election: Election,
    /// Accept flag published in the heartbeat.
    pub accept: bool,
    /// Stale heartbeats removed (leader only).
    pub purged: usize,
    /// Names of hooks that returned an error.
    pub failed_hooks: Vec<String>,
}

/// One instance's maintenance loop body.
pub struct MaintenanceCycle {
    cfg: MaintenanceConfig,
    registry: InstanceRegistry,
    elector: LeaderElector,
    status: Arc<dyn StatusProvider>,
    hooks: Vec<Arc<dyn MaintenanceHook>>,
}

impl MaintenanceCycle {
    pub fn new(cfg: MaintenanceConfig, store: StoreHandle, status: Arc<dyn StatusProvider>) -> Self {
        let registry = InstanceRegistry::new(store, cfg.cluster_id.clone(), cfg.max_age_secs());
        let elector = LeaderElector::new(
            registry.clone(),
            cfg.instance_id.clone(),
            cfg.image_version.clone(),
        );
        Self {
            cfg,
            registry,
            elector,
            status,
            hooks: Vec::new(),
        }
    }

    pub fn with_hook(mut self, hook: Arc<dyn MaintenanceHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn config(&self) -> &MaintenanceConfig {
        &self.cfg
    }

    pub fn registry(&self) -> &InstanceRegistry {
        &self.registry
    }

    pub fn elector(&self) -> &LeaderElector {
        &self.elector
    }

    pub async fn run_once(&self) -> Result<CycleReport, StoreError> {
        self.run_at(crate::unix_now()).await
    }

    /// Run one cycle with `now` as the clock.
    ///
    /// Only a failed heartbeat publish fails the cycle. Failed store reads
    /// fall back to an empty fleet; election, hook and purge failures are
    /// logged.
    #[instrument(level = "debug", skip(self), fields(instance = %self.cfg.instance_id))]
    pub async fn run_at(&self, now: i64) -> Result<CycleReport, StoreError> {
        let snap = self.status.snapshot();
        let live = self.live_or_empty(now).await;
        let recentness = self
            .registry
            .image_recentness(&self.cfg.image_version, now)
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "failed to compare image versions");
                Ordering::Equal
            });
        let proposed = self.elector.is_proposed_leader().await;
        let accept = should_accept(&self.cfg.instance_id, snap.load, proposed, recentness, &live);

        let mut heartbeat = InstanceStatus::new(
            self.cfg.instance_id.clone(),
            self.cfg.image_version.clone(),
            now,
        );
        heartbeat.load = snap.load;
        heartbeat.accept = accept;
        heartbeat.api_status = snap.api_status;
        self.registry.publish(&heartbeat).await?;

        let election = self.elector.cycle_at(now).await;
        let ctx = CycleContext {
            instance_id: self.cfg.instance_id.clone(),
            election,
            now,
            live: self.live_or_empty(now).await,
        };

        let mut failed_hooks = Vec::new();
        for hook in &self.hooks {
            match hook.run(&ctx).await {
                Ok(()) => debug!(hook = hook.name(), "hook finished"),
                Err(e) => {
                    warn!(hook = hook.name(), error = %e, "maintenance hook failed");
                    failed_hooks.push(hook.name().to_string());
                }
            }
        }

        let purged = if election.is_leader() {
            self.registry.purge_stale(now).await.unwrap_or_else(|e| {
                warn!(error = %e, "failed to purge stale heartbeats");
                0
            })
        } else {
            0
        };

        info!(?election, accept, load = snap.load, purged, "maintenance cycle done");
        Ok(CycleReport {
            election,
            accept,
            purged,
            failed_hooks,
        })
    }

    async fn live_or_empty(&self, now: i64) -> Vec<InstanceStatus> {
        self.registry.live_instances(now).await.unwrap_or_else(|e| {
            warn!(error = %e, "failed to read live instances");
            Vec::new()
        })
    }
}

impl std::fmt::Debug for MaintenanceCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaintenanceCycle")
            .field("cfg", &self.cfg)
            .field("hooks", &self.hooks.iter().map(|h| h.name()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
