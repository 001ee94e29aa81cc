//! Worker pool provisioning.
//!
//! The dispatcher asks its launcher to make sure an API has workers before
//! every call. Launchers attach workers to [`ApiQueue::endpoint_out`].
use std::sync::Arc;

use crate::router::ApiQueue;

/// Starts workers for API queues on demand.
///
/// Called on every call, so implementations must be cheap when the pool is
/// already up. Never blocks on the workers themselves.
pub trait WorkerLauncher: Send + Sync + 'static {
    fn ensure_workers(&self, queue: &ApiQueue);
}

pub type LauncherHandle = Arc<dyn WorkerLauncher>;

/// Launcher for deployments where workers attach by themselves.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExternalWorkers;

impl WorkerLauncher for ExternalWorkers {
    #[inline]
    fn ensure_workers(&self, _: &ApiQueue) {}
}

pub fn external_workers() -> LauncherHandle {
    Arc::new(ExternalWorkers)
}
