//! Runs the maintenance cycle as a periodic taskvisor task.
use std::{sync::Arc, time::Duration};

use relay_observe::EventLogger;
use taskvisor::{
    BackoffPolicy, Config as SupervisorConfig, ControllerConfig, ControllerSpec, JitterPolicy,
    RestartPolicy::Always, Subscribe, Supervisor, TaskError, TaskFn, TaskRef, TaskSpec,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::MaintenanceCycle;
use crate::error::MaintenanceError;

/// First retry delay after a failed cycle.
const RETRY_FIRST: Duration = Duration::from_secs(10);

/// Periodic task running `cycle` once per interval.
///
/// A successful cycle waits one full interval; a failed one (heartbeat not
/// published) retries with exponential backoff capped at the interval.
pub fn maintenance_task(cycle: Arc<MaintenanceCycle>) -> ControllerSpec {
    let interval = cycle.config().interval();
    let task: TaskRef = TaskFn::arc("relay-maintenance", move |ctx: CancellationToken| {
        let cycle = Arc::clone(&cycle);
        async move {
            if ctx.is_cancelled() {
                return Err(TaskError::Canceled);
            }
            match cycle.run_once().await {
                Ok(_) => Ok(()),
                Err(e) => Err(TaskError::Fail {
                    reason: format!("maintenance cycle failed: {e}"),
                }),
            }
        }
    });

    let backoff = BackoffPolicy {
        success_delay: Some(interval),
        jitter: JitterPolicy::Equal,
        factor: 2.0,
        first: RETRY_FIRST.min(interval),
        max: interval,
    };
    ControllerSpec::replace(TaskSpec::new(task, Always, backoff, Some(interval)))
}

/// Owns the taskvisor supervisor that drives background maintenance.
pub struct MaintenanceSupervisor {
    sup: Arc<Supervisor>,
}

impl MaintenanceSupervisor {
    /// Build the supervisor with the event logger plus `subscribers` and start it.
    pub async fn start(subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        let mut subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(EventLogger)];
        subs.extend(subscribers);

        let sup = Supervisor::builder(SupervisorConfig::default())
            .with_subscribers(subs)
            .with_controller(ControllerConfig::default())
            .build();

        let runner = Arc::clone(&sup);
        tokio::spawn(async move {
            if let Err(e) = runner.run(Vec::new()).await {
                error!(error = %e, "supervisor run loop exited");
            }
        });
        sup.wait_ready().await;
        info!("maintenance supervisor ready");
        Self { sup }
    }

    pub fn supervisor(&self) -> Arc<Supervisor> {
        Arc::clone(&self.sup)
    }

    /// Schedule `cycle` to run every configured interval.
    pub async fn submit(&self, cycle: Arc<MaintenanceCycle>) -> Result<(), MaintenanceError> {
        self.sup
            .submit(maintenance_task(cycle))
            .await
            .map_err(|e| MaintenanceError::Supervisor(e.to_string()))
    }
}
