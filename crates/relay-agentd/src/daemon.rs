//! Command-channel side of the agent.
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use relay_cluster::channel::CommandHandler;
use relay_model::Command;
use serde_json::{Value, json};
use tracing::{debug, info};

/// Answers channel requests about this host.
///
/// Pushed commands are acknowledged in the log only; the session and disk
/// work they name is done by external tooling.
#[derive(Debug, Default)]
pub struct DaemonHandler {
    terminating: Arc<AtomicBool>,
}

impl DaemonHandler {
    /// Shared flag reported to `IsTerminating` requests.
    pub fn terminating_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.terminating)
    }
}

#[async_trait]
impl CommandHandler for DaemonHandler {
    async fn on_command(&self, cmd: Command, data: Value) {
        info!(%cmd, %data, "command received");
    }

    async fn on_request(&self, cmd: Command, data: Value) -> Value {
        debug!(%cmd, "request received");
        match cmd {
            Command::IsTerminating => {
                json!({"code": 0, "data": self.terminating.load(Ordering::SeqCst)})
            }
            Command::SessionStatus => json!({"code": 0, "data": {}}),
            Command::ReqResp => json!({"code": 0, "data": data}),
            other => json!({"code": 1, "data": format!("{other} is not a request")}),
        }
    }
}
