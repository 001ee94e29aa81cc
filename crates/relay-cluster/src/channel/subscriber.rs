use std::{future::Future, net::SocketAddr, sync::Arc, time::Duration};

use bytes::{Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use relay_core::transport::{self, FrameStream};
use relay_model::{Command, SignedMessage};
use serde_json::Value;
use tokio::{
    net::{TcpListener, TcpStream},
    time::timeout,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{CommandHandler, resolve_host};
use crate::{config::ChannelConfig, error::ChannelError};

/// Pause before reconnecting a lost push link.
const RECONNECT_DELAY: Duration = Duration::from_millis(500);

/// Something the subscriber has to act on.
#[derive(Debug)]
pub enum ChannelEvent {
    /// A verified pushed command.
    Command { cmd: Command, data: Value },
    /// A verified point-to-point request that must be answered exactly once.
    Request(PendingRequest),
}

/// A verified request holding the link its reply goes back on.
pub struct PendingRequest {
    pub cmd: Command,
    pub data: Value,
    peer: SocketAddr,
    link: FrameStream,
    secret: Arc<[u8]>,
}

impl PendingRequest {
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Sign `data` and send it as the single reply.
    pub async fn reply(mut self, data: Value) -> Result<(), ChannelError> {
        let msg = SignedMessage::sign(self.cmd, data, &self.secret)?;
        self.link
            .send(Bytes::from(msg.encode()?))
            .await
            .map_err(|e| ChannelError::io(self.peer.to_string(), e))?;
        debug!(peer = %self.peer, cmd = %self.cmd, "reply sent");
        Ok(())
    }
}

impl std::fmt::Debug for PendingRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRequest")
            .field("cmd", &self.cmd)
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}

enum Pushed {
    Frame(BytesMut),
    Retry,
}

/// Receiving side of the command channel.
///
/// Connects its pull link to the publisher (reconnecting when it drops) and
/// binds the reply endpoint that point-to-point requests arrive on.
pub struct CommandSubscriber {
    secret: Arc<[u8]>,
    push_target: String,
    pull: Option<FrameStream>,
    replies: TcpListener,
    reply_addr: SocketAddr,
    recv_timeout: Duration,
}

impl CommandSubscriber {
    pub async fn bind(cfg: &ChannelConfig) -> Result<Self, ChannelError> {
        let addr = format!("{}:{}", cfg.host, cfg.reply_port);
        let replies = TcpListener::bind(&addr)
            .await
            .map_err(|e| ChannelError::Bind {
                addr: addr.clone(),
                reason: e.to_string(),
            })?;
        let reply_addr = replies.local_addr().map_err(|e| ChannelError::Bind {
            addr,
            reason: e.to_string(),
        })?;
        let push_target = format!("{}:{}", resolve_host(Some(&cfg.host)), cfg.push_port);
        info!(%reply_addr, push = %push_target, "command subscriber bound");

        Ok(Self {
            secret: Arc::from(cfg.secret_bytes()),
            push_target,
            pull: None,
            replies,
            reply_addr,
            recv_timeout: cfg.recv_timeout(),
        })
    }

    pub fn reply_addr(&self) -> SocketAddr {
        self.reply_addr
    }

    /// Next verified pushed command. Invalid envelopes are logged and skipped.
    pub async fn recv(&mut self) -> (Command, Value) {
        loop {
            if let Pushed::Frame(frame) = next_pushed(&mut self.pull, &self.push_target).await {
                if let Some(msg) = verify(&frame, &self.secret, "push link") {
                    return (msg.cmd, msg.data);
                }
            }
        }
    }

    /// Next verified point-to-point request.
    pub async fn accept_request(&mut self) -> PendingRequest {
        loop {
            let accepted = self.replies.accept().await;
            if let Some(req) = read_request(accepted, &self.secret, self.recv_timeout).await {
                return req;
            }
        }
    }

    /// Answer exactly one request with `callback`.
    pub async fn respond<F, Fut>(&mut self, callback: F) -> Result<(), ChannelError>
    where
        F: FnOnce(Command, Value) -> Fut,
        Fut: Future<Output = Value>,
    {
        let mut req = self.accept_request().await;
        let data = std::mem::take(&mut req.data);
        let reply = callback(req.cmd, data).await;
        req.reply(reply).await
    }

    /// Wait on both links and return whichever has something first.
    pub async fn next_event(&mut self) -> ChannelEvent {
        loop {
            tokio::select! {
                pushed = next_pushed(&mut self.pull, &self.push_target) => {
                    if let Pushed::Frame(frame) = pushed {
                        if let Some(msg) = verify(&frame, &self.secret, "push link") {
                            return ChannelEvent::Command { cmd: msg.cmd, data: msg.data };
                        }
                    }
                }
                accepted = self.replies.accept() => {
                    if let Some(req) = read_request(accepted, &self.secret, self.recv_timeout).await {
                        return ChannelEvent::Request(req);
                    }
                }
            }
        }
    }

    /// Feed every event to `handler` until `cancel` fires.
    pub async fn serve(mut self, handler: Arc<dyn CommandHandler>, cancel: CancellationToken) {
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => return,
                event = self.next_event() => event,
            };
            match event {
                ChannelEvent::Command { cmd, data } => handler.on_command(cmd, data).await,
                ChannelEvent::Request(mut req) => {
                    let data = std::mem::take(&mut req.data);
                    let reply = handler.on_request(req.cmd, data).await;
                    if let Err(e) = req.reply(reply).await {
                        warn!(error = %e, "failed to answer request");
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for CommandSubscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSubscriber")
            .field("push_target", &self.push_target)
            .field("reply_addr", &self.reply_addr)
            .field("connected", &self.pull.is_some())
            .finish_non_exhaustive()
    }
}

/// Next frame on the push link, connecting it first when needed.
async fn next_pushed(pull: &mut Option<FrameStream>, target: &str) -> Pushed {
    if pull.is_none() {
        match transport::connect_to(target).await {
            Ok(link) => {
                debug!(%target, "push link connected");
                *pull = Some(link);
            }
            Err(e) => {
                debug!(%target, error = %e, "push link unavailable");
                tokio::time::sleep(RECONNECT_DELAY).await;
                return Pushed::Retry;
            }
        }
    }
    let Some(link) = pull.as_mut() else {
        return Pushed::Retry;
    };
    let next = link.next().await;
    match next {
        Some(Ok(frame)) => Pushed::Frame(frame),
        Some(Err(e)) => {
            warn!(%target, error = %e, "push link failed");
            *pull = None;
            Pushed::Retry
        }
        None => {
            debug!(%target, "push link closed by publisher");
            *pull = None;
            tokio::time::sleep(RECONNECT_DELAY).await;
            Pushed::Retry
        }
    }
}

/// Read and verify the single request of an accepted reply link.
///
/// Accept failures, silent peers and bad envelopes drop the link and yield `None`.
async fn read_request(
    accepted: std::io::Result<(TcpStream, SocketAddr)>,
    secret: &Arc<[u8]>,
    limit: Duration,
) -> Option<PendingRequest> {
    let (stream, peer) = match accepted {
        Ok(pair) => pair,
        Err(e) => {
            warn!(error = %e, "accept on reply endpoint failed");
            return None;
        }
    };
    let mut link = transport::frame(stream);
    let frame = match timeout(limit, link.next()).await {
        Ok(Some(Ok(frame))) => frame,
        Ok(Some(Err(e))) => {
            debug!(%peer, error = %e, "request link failed");
            return None;
        }
        Ok(None) => return None,
        Err(_) => {
            debug!(%peer, "no request within timeout");
            return None;
        }
    };
    let msg = verify(&frame, secret, &peer.to_string())?;
    debug!(%peer, cmd = %msg.cmd, "request received");
    Some(PendingRequest {
        cmd: msg.cmd,
        data: msg.data,
        peer,
        link,
        secret: Arc::clone(secret),
    })
}

fn verify(frame: &[u8], secret: &[u8], source: &str) -> Option<SignedMessage> {
    match SignedMessage::decode_verified(frame, secret) {
        Ok(msg) => Some(msg),
        Err(e) => {
            error!(source, error = %e, "dropping message that failed verification");
            None
        }
    }
}
