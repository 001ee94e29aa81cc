use std::{io, net::SocketAddr, sync::Arc};

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::{
    net::TcpListener,
    sync::{Mutex, mpsc, oneshot},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::{
    router::RouterError,
    transport::{self, FrameStream},
};

/// One request travelling from a producer link to a worker link.
struct Routed {
    body: Bytes,
    reply: oneshot::Sender<Bytes>,
}

/// Requests waiting for an idle worker. Idle workers queue on the mutex in arrival order.
type Backlog = Arc<Mutex<mpsc::Receiver<Routed>>>;

/// Transparent relay between an inbound endpoint (connectors) and an outbound
/// endpoint (workers).
///
/// Each request is handed to the next idle worker connection; its reply goes back
/// to the producer link it came from. At most `hwm` requests are buffered; further
/// producers wait. Dropping the device stops every task and frees both ports.
#[derive(Debug)]
pub struct ForwardingDevice {
    endpoint_in: SocketAddr,
    endpoint_out: SocketAddr,
    hwm: usize,
    cancel: CancellationToken,
}

impl ForwardingDevice {
    /// Bind both endpoints on unused ports of `host` and start relaying.
    ///
    /// Fails with [`RouterError::EndpointAllocation`] when either port cannot be bound.
    pub async fn bind(host: &str, hwm: usize) -> Result<Self, RouterError> {
        let front = TcpListener::bind((host, 0))
            .await
            .map_err(|e| alloc_err(host, e))?;
        let back = TcpListener::bind((host, 0))
            .await
            .map_err(|e| alloc_err(host, e))?;
        let endpoint_in = front.local_addr().map_err(|e| alloc_err(host, e))?;
        let endpoint_out = back.local_addr().map_err(|e| alloc_err(host, e))?;

        let hwm = hwm.max(1);
        let (tx, rx) = mpsc::channel(hwm);
        let backlog: Backlog = Arc::new(Mutex::new(rx));
        let cancel = CancellationToken::new();

        tokio::spawn(accept_producers(front, tx, cancel.clone()));
        tokio::spawn(accept_workers(back, backlog, cancel.clone()));

        debug!(%endpoint_in, %endpoint_out, hwm, "forwarding device started");
        Ok(Self {
            endpoint_in,
            endpoint_out,
            hwm,
            cancel,
        })
    }

    /// Endpoint connectors send requests to.
    pub fn endpoint_in(&self) -> SocketAddr {
        self.endpoint_in
    }

    /// Endpoint workers connect to.
    pub fn endpoint_out(&self) -> SocketAddr {
        self.endpoint_out
    }

    pub fn high_water_mark(&self) -> usize {
        self.hwm
    }

    /// Stop relaying. Pending requests are dropped.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for ForwardingDevice {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn alloc_err(host: &str, e: io::Error) -> RouterError {
    RouterError::EndpointAllocation {
        host: host.to_string(),
        reason: e.to_string(),
    }
}

async fn accept_producers(
    listener: TcpListener,
    tx: mpsc::Sender<Routed>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    trace!(%peer, "producer connected");
                    tokio::spawn(serve_producer(
                        transport::frame(stream),
                        tx.clone(),
                        cancel.child_token(),
                    ));
                }
                Err(e) => warn!(error = %e, "accept failed on inbound endpoint"),
            }
        }
    }
}

async fn accept_workers(listener: TcpListener, backlog: Backlog, cancel: CancellationToken) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    trace!(%peer, "worker connected");
                    tokio::spawn(serve_worker_link(
                        transport::frame(stream),
                        backlog.clone(),
                        cancel.child_token(),
                    ));
                }
                Err(e) => warn!(error = %e, "accept failed on outbound endpoint"),
            }
        }
    }
}

/// Relay strictly alternating request/reply frames of one producer link.
async fn serve_producer(
    mut link: FrameStream,
    tx: mpsc::Sender<Routed>,
    cancel: CancellationToken,
) {
    loop {
        let body = tokio::select! {
            _ = cancel.cancelled() => return,
            frame = link.next() => match frame {
                Some(Ok(buf)) => buf.freeze(),
                Some(Err(e)) => {
                    debug!(error = %e, "producer link failed");
                    return;
                }
                None => return,
            },
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        let routed = Routed {
            body,
            reply: reply_tx,
        };
        tokio::select! {
            _ = cancel.cancelled() => return,
            sent = tx.send(routed) => {
                if sent.is_err() {
                    return;
                }
            }
        }

        // A lost worker drops the reply sender; closing the link surfaces it to the connector.
        let reply = tokio::select! {
            _ = cancel.cancelled() => return,
            reply = reply_rx => match reply {
                Ok(reply) => reply,
                Err(_) => {
                    debug!("worker lost before replying");
                    return;
                }
            },
        };

        if link.send(reply).await.is_err() {
            return;
        }
    }
}

/// Feed one worker link with requests, one at a time.
async fn serve_worker_link(mut link: FrameStream, backlog: Backlog, cancel: CancellationToken) {
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => return,
            // Workers never speak first; anything here means the link is gone.
            _ = link.next() => {
                trace!("worker disconnected while idle");
                return;
            }
            next = async { backlog.lock().await.recv().await } => next,
        };
        let Some(Routed { body, reply }) = next else {
            return;
        };

        if let Err(e) = link.send(body).await {
            debug!(error = %e, "worker link failed on send");
            return;
        }

        let frame = tokio::select! {
            _ = cancel.cancelled() => return,
            frame = link.next() => frame,
        };
        match frame {
            Some(Ok(buf)) => {
                // The producer may have timed out; its reply is dropped.
                if reply.send(buf.freeze()).is_err() {
                    trace!("reply discarded, producer gone");
                }
            }
            Some(Err(e)) => {
                debug!(error = %e, "worker link failed on receive");
                return;
            }
            None => return,
        }
    }
}
