//! Maintenance work the front end runs every cycle.
use std::sync::Arc;

use async_trait::async_trait;
use relay_cluster::{
    HookError,
    channel::CommandPublisher,
    maintenance::{CycleContext, MaintenanceHook},
};
use serde_json::Value;
use tracing::{error, info, warn};

/// Pushes the periodic daemon commands.
///
/// The leader also triggers stats collection. Followers first ask their
/// local daemon whether it is shutting down and skip the cycle if so.
pub struct HousekeepingHook {
    publisher: Arc<CommandPublisher>,
}

impl HousekeepingHook {
    pub fn new(publisher: Arc<CommandPublisher>) -> Self {
        Self { publisher }
    }

    async fn daemon_terminating(&self) -> bool {
        match self.publisher.is_terminating(None).await {
            Ok(reply) => parse_terminating(&reply),
            Err(e) => {
                error!(error = %e, "could not ask daemon about termination, assuming it is not");
                false
            }
        }
    }
}

#[async_trait]
impl MaintenanceHook for HousekeepingHook {
    fn name(&self) -> &str {
        "housekeeping"
    }

    async fn run(&self, ctx: &CycleContext) -> Result<(), HookError> {
        let terminating = if ctx.is_leader() {
            info!(instance = %ctx.instance_id, "acting as cluster leader");
            self.publisher.collect_stats()?;
            false
        } else {
            self.daemon_terminating().await
        };

        if terminating {
            warn!("daemon is terminating to scale down, skipping maintenance commands");
            return Ok(());
        }
        self.publisher.update_user_home_image()?;
        self.publisher.plugin_maintenance(ctx.is_leader())?;
        Ok(())
    }
}

/// Daemon replies `{"code": 0, "data": <bool>}`; anything else counts as not terminating.
fn parse_terminating(reply: &Value) -> bool {
    if reply.get("code").and_then(Value::as_i64) != Some(0) {
        error!(%reply, "daemon failed to report termination state");
        return false;
    }
    reply.get("data").and_then(Value::as_bool).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use relay_cluster::{
        ChannelConfig,
        channel::{CommandHandler, CommandSubscriber},
        leader::Election,
    };
    use relay_model::Command;
    use serde_json::json;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::daemon::DaemonHandler;

    #[test]
    fn terminating_reply_shapes() {
        assert!(parse_terminating(&json!({"code": 0, "data": true})));
        assert!(!parse_terminating(&json!({"code": 0, "data": false})));
        assert!(!parse_terminating(&json!({"code": 1, "data": true})));
        assert!(!parse_terminating(&json!("garbage")));
    }

    /// Records pushed commands, answers requests like the daemon.
    struct Probe {
        inner: DaemonHandler,
        pushed: mpsc::UnboundedSender<Command>,
    }

    #[async_trait]
    impl CommandHandler for Probe {
        async fn on_command(&self, cmd: Command, data: Value) {
            self.inner.on_command(cmd, data).await;
            let _ = self.pushed.send(cmd);
        }

        async fn on_request(&self, cmd: Command, data: Value) -> Value {
            self.inner.on_request(cmd, data).await
        }
    }

    async fn setup(
        terminating: bool,
    ) -> (HousekeepingHook, mpsc::UnboundedReceiver<Command>, CancellationToken) {
        // Publisher and subscriber must agree on the reply port up front.
        let reply_port = std::net::TcpListener::bind("127.0.0.1:0")
            .and_then(|l| l.local_addr())
            .unwrap()
            .port();
        let base = ChannelConfig {
            push_port: 0,
            reply_port,
            secret: "k".into(),
            ..ChannelConfig::default()
        };

        let publisher = CommandPublisher::bind(base.clone()).await.unwrap();
        let subscriber = CommandSubscriber::bind(&ChannelConfig {
            push_port: publisher.push_addr().port(),
            ..base
        })
        .await
        .unwrap();

        let inner = DaemonHandler::default();
        inner.terminating_flag().store(terminating, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        tokio::spawn(subscriber.serve(Arc::new(Probe { inner, pushed: tx }), cancel.clone()));

        for _ in 0..200 {
            if publisher.subscriber_count() == 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        (HousekeepingHook::new(Arc::new(publisher)), rx, cancel)
    }

    fn ctx(election: Election) -> CycleContext {
        CycleContext {
            instance_id: "i-1".into(),
            election,
            now: 0,
            live: Vec::new(),
        }
    }

    #[tokio::test]
    async fn leader_collects_stats() {
        let (hook, mut rx, cancel) = setup(false).await;
        hook.run(&ctx(Election::Leader)).await.unwrap();

        assert_eq!(rx.recv().await, Some(Command::CollectStats));
        assert_eq!(rx.recv().await, Some(Command::UpdateUserHomeImage));
        assert_eq!(rx.recv().await, Some(Command::PluginMaintenance));
        cancel.cancel();
    }

    #[tokio::test]
    async fn terminating_follower_skips_commands() {
        let (hook, mut rx, cancel) = setup(true).await;
        hook.run(&ctx(Election::Follower)).await.unwrap();

        hook.publisher.refresh_disks().unwrap();
        // Only the marker arrives: the follower pushed nothing.
        assert_eq!(rx.recv().await, Some(Command::RefreshDisks));
        cancel.cancel();
    }
}
