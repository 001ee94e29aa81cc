use relay_model::ModelError;
use thiserror::Error;

/// Failures of the shared configuration store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),

    #[error("bad record under {key}: {reason}")]
    Serde { key: String, reason: String },
}

/// Failures of the command channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// A bounded connect, send or receive did not complete.
    #[error("i/o with {target} failed: {reason}")]
    Io { target: String, reason: String },

    #[error("failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },

    #[error("signature check failed: {0}")]
    Signature(ModelError),

    #[error("codec error: {0}")]
    Codec(#[from] ModelError),
}

impl ChannelError {
    pub(crate) fn io(target: impl Into<String>, reason: impl ToString) -> Self {
        Self::Io {
            target: target.into(),
            reason: reason.to_string(),
        }
    }

    /// Sort a model error into signature vs codec failures.
    pub(crate) fn from_verify(err: ModelError) -> Self {
        match err {
            ModelError::Signature { .. } | ModelError::MalformedSignature(_) => {
                Self::Signature(err)
            }
            other => Self::Codec(other),
        }
    }
}

/// Error returned by a maintenance hook; logged by the cycle, never fatal.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct HookError(pub String);

impl From<ChannelError> for HookError {
    fn from(e: ChannelError) -> Self {
        Self(e.to_string())
    }
}

impl From<StoreError> for HookError {
    fn from(e: StoreError) -> Self {
        Self(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum MaintenanceError {
    #[error("supervisor error: {0}")]
    Supervisor(String),
}
