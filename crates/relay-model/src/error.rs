use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("unknown command code: {0}")]
    UnknownCommand(u64),

    #[error("unknown command name: {0}")]
    UnknownCommandName(String),

    #[error("invalid signature for cmd {cmd}")]
    Signature { cmd: u8 },

    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("invalid model: {0}")]
    Invalid(String),
}

pub type ModelResult<T> = Result<T, ModelError>;
