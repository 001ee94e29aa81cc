//! Periodic cluster maintenance.
//!
//! Each cycle publishes this instance's heartbeat, runs the leader election
//! and hands the result to the registered hooks. Singleton work belongs in
//! hooks that check [`CycleContext::is_leader`].
mod admission;
mod cycle;
mod supervisor;

use std::collections::BTreeMap;

use async_trait::async_trait;
use relay_core::Dispatcher;
use relay_model::{ApiName, ApiStatus, InstanceStatus};

use crate::{error::HookError, leader::Election};

pub use admission::should_accept;
pub use cycle::{CycleReport, MaintenanceCycle};
pub use supervisor::{MaintenanceSupervisor, maintenance_task};

/// Load figures a cycle publishes in the heartbeat.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadSnapshot {
    /// `1.0` means fully loaded.
    pub load: f64,
    pub api_status: BTreeMap<ApiName, ApiStatus>,
}

/// Source of the local load figures.
pub trait StatusProvider: Send + Sync + 'static {
    fn snapshot(&self) -> LoadSnapshot;
}

/// Load of the busiest queue relative to the overload threshold.
impl StatusProvider for Dispatcher {
    fn snapshot(&self) -> LoadSnapshot {
        let api_status = self.all_stats();
        let threshold = self.config().buffer_size;
        let load = api_status
            .values()
            .map(|s| if threshold > 0.0 { s.mean_outstanding / threshold } else { 0.0 })
            .fold(0.0, f64::max);
        LoadSnapshot { load, api_status }
    }
}

/// What a hook learns about the current cycle.
#[derive(Debug, Clone)]
pub struct CycleContext {
    pub instance_id: String,
    pub election: Election,
    pub now: i64,
    /// Live heartbeats, this instance's included.
    pub live: Vec<InstanceStatus>,
}

impl CycleContext {
    pub fn is_leader(&self) -> bool {
        self.election.is_leader()
    }
}

/// Work run once per maintenance cycle.
#[async_trait]
pub trait MaintenanceHook: Send + Sync + 'static {
    fn name(&self) -> &str;

    async fn run(&self, ctx: &CycleContext) -> Result<(), HookError>;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use relay_core::{config::DispatchConfig, context::DispatchContext};

    use super::*;

    #[tokio::test]
    async fn dispatcher_load_is_busiest_queue() {
        let d = Dispatcher::new(DispatchConfig::default())
            .with_context(DispatchContext::default());
        assert_eq!(d.snapshot(), LoadSnapshot::default());

        let catalog = Arc::clone(d.context().catalog());
        let queue = d.router().get_or_create("calc", catalog.as_ref()).await.unwrap();
        let _busy = (0..4).map(|_| queue.begin()).collect::<Vec<_>>();

        let snap = d.snapshot();
        let mean = snap.api_status["calc"].mean_outstanding;
        assert!(mean > 0.0);
        assert!((snap.load - mean / 20.0).abs() < 1e-9);
    }
}
