//! Pooled request/response connections to a forwarding device.
mod id;
pub use id::next_connector_id;

mod pool;
pub use pool::ConnectorPool;

use std::{net::SocketAddr, time::Duration};

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use relay_model::{ApiName, ApiReply, ApiRequest};
use tracing::{debug, instrument, warn};

use crate::{
    error::DispatchError,
    transport::{self, FrameStream},
};

/// One request/response link to the inbound endpoint of an API's device.
///
/// Carries at most one request at a time. Once `has_errors` is set the
/// connector must not be reused.
#[derive(Debug)]
pub struct Connector {
    id: u64,
    api_name: ApiName,
    endpoint: SocketAddr,
    link: FrameStream,
    has_errors: bool,
}

impl Connector {
    pub async fn connect(api: &str, endpoint: SocketAddr) -> Result<Self, DispatchError> {
        let link = transport::connect(endpoint)
            .await
            .map_err(|e| DispatchError::Transport(format!("connect {endpoint}: {e}")))?;
        let id = next_connector_id();
        debug!(api, connector = id, %endpoint, "connector opened");
        Ok(Self {
            id,
            api_name: api.to_string(),
            endpoint,
            link,
            has_errors: false,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn api_name(&self) -> &str {
        &self.api_name
    }

    pub fn endpoint(&self) -> SocketAddr {
        self.endpoint
    }

    pub fn has_errors(&self) -> bool {
        self.has_errors
    }

    pub fn mark_errored(&mut self) {
        self.has_errors = true;
    }

    /// Send `req` and wait for its reply, at most `timeout`.
    ///
    /// Any failure, a timeout included, marks the connector errored.
    #[instrument(level = "debug", skip(self, req), fields(api = %self.api_name, connector = self.id, cmd = %req.cmd))]
    pub async fn send_recv(
        &mut self,
        req: &ApiRequest,
        timeout: Duration,
    ) -> Result<ApiReply, DispatchError> {
        let body = req.encode()?;
        if let Err(e) = self.link.send(Bytes::from(body)).await {
            self.has_errors = true;
            return Err(DispatchError::Transport(e.to_string()));
        }

        let frame = tokio::select! {
            frame = self.link.next() => frame,
            _ = tokio::time::sleep(timeout) => {
                self.has_errors = true;
                warn!(timeout_ms = timeout.as_millis() as u64, "call timed out");
                return Err(DispatchError::Timeout {
                    api: self.api_name.clone(),
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
        };

        let result = match frame {
            Some(Ok(buf)) => ApiReply::decode(&buf).map_err(DispatchError::from),
            Some(Err(e)) => Err(DispatchError::Transport(e.to_string())),
            None => Err(DispatchError::Transport("link closed by device".to_string())),
        };
        if result.is_err() {
            self.has_errors = true;
        }
        result
    }
}
