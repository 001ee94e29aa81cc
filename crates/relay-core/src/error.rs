use relay_model::{ApiReply, ModelError};
use thiserror::Error;

use crate::router::RouterError;

/// Failure of a single dispatched call.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Mean outstanding requests reached the buffer threshold; nothing was sent.
    #[error("api '{api}' overloaded (mean outstanding {mean:.2})")]
    Overload { api: String, mean: f64 },

    #[error("api '{api}' timed out after {timeout_ms}ms")]
    Timeout { api: String, timeout_ms: u64 },

    /// Worker replied with a non-success code.
    #[error("worker replied with code {code}")]
    Worker { code: u16, reply: Box<ApiReply> },

    /// Connect failure or broken link to the forwarding device.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("codec error: {0}")]
    Codec(#[from] ModelError),

    #[error("router error: {0}")]
    Router(#[from] RouterError),
}

impl DispatchError {
    /// Errors that leave the connector unusable.
    pub fn taints_connector(&self) -> bool {
        matches!(
            self,
            DispatchError::Timeout { .. } | DispatchError::Transport(_) | DispatchError::Codec(_)
        )
    }
}

impl From<std::io::Error> for DispatchError {
    fn from(e: std::io::Error) -> Self {
        DispatchError::Transport(e.to_string())
    }
}
