//! Local worker processes for APIs whose catalog entry names a command.
use std::{
    collections::HashMap,
    process::Stdio,
    sync::atomic::{AtomicUsize, Ordering},
};

use parking_lot::Mutex;
use relay_core::{launcher::WorkerLauncher, router::ApiQueue};
use relay_model::ApiName;
use tokio::process::{Child, Command};
use tracing::{debug, info, trace, warn};

pub const ENV_API_NAME: &str = "RELAY_API_NAME";
pub const ENV_API_QUEUE: &str = "RELAY_API_QUEUE";
pub const ENV_API_CMD: &str = "RELAY_API_CMD";
pub const ENV_WORKER_ID: &str = "RELAY_WORKER_ID";

/// Keeps one worker process alive per API.
///
/// The worker runs `sh -c <command>` and learns where to attach from
/// [`ENV_API_QUEUE`]. A worker that exited is replaced on the next call.
/// Children are killed when the launcher drops.
#[derive(Debug, Default)]
pub struct ProcessLauncher {
    children: Mutex<HashMap<ApiName, Child>>,
    spawned: AtomicUsize,
}

impl ProcessLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Processes started so far, including replaced ones.
    pub fn spawned(&self) -> usize {
        self.spawned.load(Ordering::Relaxed)
    }

    fn spawn(&self, queue: &ApiQueue, command: &str) -> Option<Child> {
        let seq = self.spawned.fetch_add(1, Ordering::Relaxed) + 1;
        let worker_id = format!("{}-{seq}", queue.name());

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd.env(ENV_API_NAME, queue.name())
            .env(ENV_API_QUEUE, queue.endpoint_out().to_string())
            .env(ENV_API_CMD, command)
            .env(ENV_WORKER_ID, &worker_id);
        cmd.stdin(Stdio::null());
        cmd.stderr(Stdio::inherit());
        cmd.kill_on_drop(true);

        match cmd.spawn() {
            Ok(child) => {
                info!(
                    api = queue.name(),
                    worker = %worker_id,
                    endpoint_out = %queue.endpoint_out(),
                    "worker launched"
                );
                Some(child)
            }
            Err(e) => {
                warn!(api = queue.name(), error = %e, "failed to launch worker");
                None
            }
        }
    }
}

impl WorkerLauncher for ProcessLauncher {
    fn ensure_workers(&self, queue: &ApiQueue) {
        let Some(command) = queue.spec().command.as_deref() else {
            trace!(api = queue.name(), "no worker command, expecting external workers");
            return;
        };

        let mut children = self.children.lock();
        if let Some(child) = children.get_mut(queue.name()) {
            match child.try_wait() {
                Ok(None) => return,
                Ok(Some(status)) => debug!(api = queue.name(), %status, "worker exited"),
                Err(e) => warn!(api = queue.name(), error = %e, "failed to poll worker"),
            }
            children.remove(queue.name());
        }
        if let Some(image) = queue.spec().image_name.as_deref() {
            debug!(api = queue.name(), image, "image is not used by local workers");
        }
        if let Some(child) = self.spawn(queue, command) {
            children.insert(queue.name().to_string(), child);
        }
    }
}
