//! In-process worker endpoint.
//!
//! Connects to the outbound endpoint of a forwarding device and answers one
//! request at a time with a handler. Used by local worker pools and by tests.
use std::{future::Future, net::SocketAddr};

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use relay_model::{ApiReply, ApiRequest, ReplyData};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{error::DispatchError, transport};

/// Why a worker loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// Received the reserved terminate command.
    Terminated,
    /// The device closed the link.
    Disconnected,
    Cancelled,
}

/// Serve requests from `endpoint` until terminated, disconnected or cancelled.
///
/// Undecodable requests are answered with code 400; the terminate command is
/// acknowledged before the loop ends.
pub async fn serve_worker<F, Fut>(
    endpoint: SocketAddr,
    handler: F,
    cancel: CancellationToken,
) -> Result<WorkerExit, DispatchError>
where
    F: Fn(ApiRequest) -> Fut + Send + Sync,
    Fut: Future<Output = ApiReply> + Send,
{
    let mut link = transport::connect(endpoint).await?;
    debug!(%endpoint, "worker connected");

    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => return Ok(WorkerExit::Cancelled),
            frame = link.next() => frame,
        };
        let buf = match frame {
            Some(Ok(buf)) => buf,
            Some(Err(e)) => return Err(e.into()),
            None => return Ok(WorkerExit::Disconnected),
        };

        let reply = match ApiRequest::decode(&buf) {
            Ok(req) if req.is_terminate() => {
                info!(%endpoint, "worker terminating on request");
                let ack = ApiReply::text("terminating").encode()?;
                link.send(Bytes::from(ack)).await?;
                return Ok(WorkerExit::Terminated);
            }
            Ok(req) => handler(req).await,
            Err(e) => {
                warn!(error = %e, "undecodable request");
                ApiReply::new(400, ReplyData::Text(e.to_string()))
            }
        };
        link.send(Bytes::from(reply.encode()?)).await?;
    }
}
