use std::{future::Future, net::SocketAddr, time::Duration};

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use relay_core::transport::{self, FrameStream};
use relay_model::{Command, SignedMessage};
use serde_json::{Value, json};
use tokio::{net::TcpListener, sync::broadcast, time::timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::resolve_host;
use crate::{config::ChannelConfig, error::ChannelError};

/// Pushed commands buffered per subscriber before it starts lagging.
const FANOUT_CAPACITY: usize = 256;

/// Sending side of the command channel.
#[derive(Debug)]
pub struct CommandPublisher {
    cfg: ChannelConfig,
    tx: broadcast::Sender<Bytes>,
    push_addr: SocketAddr,
    cancel: CancellationToken,
}

impl CommandPublisher {
    /// Bind the push endpoint on `cfg.host:cfg.push_port` and start accepting subscribers.
    pub async fn bind(cfg: ChannelConfig) -> Result<Self, ChannelError> {
        let addr = format!("{}:{}", cfg.host, cfg.push_port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ChannelError::Bind {
                addr: addr.clone(),
                reason: e.to_string(),
            })?;
        let push_addr = listener.local_addr().map_err(|e| ChannelError::Bind {
            addr,
            reason: e.to_string(),
        })?;

        let (tx, _) = broadcast::channel(FANOUT_CAPACITY);
        let cancel = CancellationToken::new();
        tokio::spawn(accept_subscribers(listener, tx.clone(), cancel.clone()));
        info!(%push_addr, "command publisher bound");

        Ok(Self {
            cfg,
            tx,
            push_addr,
            cancel,
        })
    }

    pub fn push_addr(&self) -> SocketAddr {
        self.push_addr
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.cfg
    }

    /// Subscribers currently connected.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Push a signed command to every connected subscriber.
    ///
    /// Returns how many subscribers it was queued for; zero is not an error.
    pub fn send(&self, cmd: Command, data: Value) -> Result<usize, ChannelError> {
        let msg = SignedMessage::sign(cmd, data, self.cfg.secret_bytes())?;
        let frame = Bytes::from(msg.encode()?);
        let delivered = self.tx.send(frame).unwrap_or(0);
        debug!(%cmd, delivered, "command pushed");
        Ok(delivered)
    }

    /// Signed request to one subscriber's reply endpoint, waiting for its reply.
    ///
    /// `dest` defaults to the local host and `port` to the configured reply
    /// port. Connecting plus sending and receiving are each bounded by the
    /// configured timeouts; expiry is reported as [`ChannelError::Io`].
    #[instrument(level = "debug", skip(self, data))]
    pub async fn send_recv(
        &self,
        cmd: Command,
        data: Value,
        dest: Option<&str>,
        port: Option<u16>,
    ) -> Result<Value, ChannelError> {
        let target = format!(
            "{}:{}",
            resolve_host(dest),
            port.unwrap_or(self.cfg.reply_port)
        );
        let secret = self.cfg.secret_bytes();
        let request = Bytes::from(SignedMessage::sign(cmd, data, secret)?.encode()?);

        let mut link = bounded(self.cfg.send_timeout(), &target, "could not connect", async {
            let mut link = transport::connect_to(&target).await?;
            link.send(request).await?;
            Ok::<FrameStream, std::io::Error>(link)
        })
        .await?;

        let frame = bounded(self.cfg.recv_timeout(), &target, "nothing received", async {
            match link.next().await {
                Some(frame) => frame,
                None => Err(std::io::ErrorKind::UnexpectedEof.into()),
            }
        })
        .await?;

        let reply = SignedMessage::decode_verified(&frame, secret).map_err(ChannelError::from_verify)?;
        debug!(%target, "reply received");
        Ok(reply.data)
    }

    pub fn refresh_disks(&self) -> Result<usize, ChannelError> {
        self.send(Command::RefreshDisks, json!(""))
    }

    pub fn collect_stats(&self) -> Result<usize, ChannelError> {
        self.send(Command::CollectStats, json!(""))
    }

    pub fn update_disk_states(&self) -> Result<usize, ChannelError> {
        self.send(Command::UpdateDiskStates, json!(""))
    }

    pub fn schedule_activations(&self) -> Result<usize, ChannelError> {
        self.send(Command::AutoActivate, json!(""))
    }

    pub fn update_user_home_image(&self) -> Result<usize, ChannelError> {
        self.send(Command::UpdateUserHomeImage, json!(""))
    }

    pub fn launch_session(&self, name: &str, email: &str, reuse: bool) -> Result<usize, ChannelError> {
        self.send(Command::LaunchSession, json!([name, email, reuse]))
    }

    pub fn backup_and_cleanup(&self, session_id: &str) -> Result<usize, ChannelError> {
        self.send(Command::BackupCleanup, json!(session_id))
    }

    pub fn terminate_or_delete_cluster(&self, cluster_id: &str) -> Result<usize, ChannelError> {
        self.send(Command::TerminateOrDeleteCluster, json!(cluster_id))
    }

    pub fn plugin_maintenance(&self, is_leader: bool) -> Result<usize, ChannelError> {
        self.send(Command::PluginMaintenance, json!(is_leader))
    }

    /// Session status reported by the daemon on `target`.
    pub async fn session_status(&self, target: Option<&str>) -> Result<Value, ChannelError> {
        self.send_recv(Command::SessionStatus, json!({}), target, None)
            .await
    }

    pub async fn is_terminating(&self, target: Option<&str>) -> Result<Value, ChannelError> {
        self.send_recv(Command::IsTerminating, json!({}), target, None)
            .await
    }

    /// Stop accepting subscribers and close every push link.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for CommandPublisher {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn bounded<T, F>(
    limit: Duration,
    target: &str,
    what: &str,
    fut: F,
) -> Result<T, ChannelError>
where
    F: Future<Output = std::io::Result<T>>,
{
    match timeout(limit, fut).await {
        Ok(Ok(v)) => Ok(v),
        Ok(Err(e)) => Err(ChannelError::io(target, format!("{what}: {e}"))),
        Err(_) => Err(ChannelError::io(
            target,
            format!("{what} within {}ms", limit.as_millis()),
        )),
    }
}

async fn accept_subscribers(
    listener: TcpListener,
    tx: broadcast::Sender<Bytes>,
    cancel: CancellationToken,
) {
    loop {
        let accepted = tokio::select! {
            _ = cancel.cancelled() => return,
            accepted = listener.accept() => accepted,
        };
        match accepted {
            Ok((stream, peer)) => {
                debug!(%peer, "subscriber connected");
                let rx = tx.subscribe();
                tokio::spawn(push_to(transport::frame(stream), rx, peer, cancel.clone()));
            }
            Err(e) => warn!(error = %e, "accept on push endpoint failed"),
        }
    }
}

async fn push_to(
    mut link: FrameStream,
    mut rx: broadcast::Receiver<Bytes>,
    peer: SocketAddr,
    cancel: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => return,
            // The subscriber never writes; a read result means it went away.
            _ = link.next() => {
                debug!(%peer, "subscriber disconnected");
                return;
            }
            frame = rx.recv() => frame,
        };
        match frame {
            Ok(frame) => {
                if let Err(e) = link.send(frame).await {
                    debug!(%peer, error = %e, "push link broken");
                    return;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(%peer, skipped, "slow subscriber, commands dropped");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}
