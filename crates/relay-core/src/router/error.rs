use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouterError {
    /// No local endpoint could be bound for a new forwarding device.
    #[error("endpoint allocation failed on '{host}': {reason}")]
    EndpointAllocation { host: String, reason: String },

    #[error("api '{0}' has no live queue")]
    NotFound(String),
}
