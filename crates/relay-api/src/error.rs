use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use relay_core::error::DispatchError;
use thiserror::Error;

/// Failure of an API call as seen by the HTTP client.
///
/// Rendered as a bare status code; failures never carry a body.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("api {0} is overloaded")]
    Overloaded(String),

    #[error("api call timed out")]
    Timeout,

    /// Worker replied with a non-success code, passed through as the status.
    #[error("worker replied with code {code}")]
    Worker { code: u16, nid: Option<String> },

    #[error("bad gateway: {0}")]
    BadGateway(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl HttpError {
    pub fn status(&self) -> StatusCode {
        match self {
            HttpError::Overloaded(_) => StatusCode::SERVICE_UNAVAILABLE,
            HttpError::Timeout => StatusCode::REQUEST_TIMEOUT,
            HttpError::Worker { code, .. } => {
                StatusCode::from_u16(*code).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            HttpError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            HttpError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Node that produced the failing reply, when a worker answered.
    pub fn nid(&self) -> Option<&str> {
        match self {
            HttpError::Worker { nid, .. } => nid.as_deref(),
            _ => None,
        }
    }
}

impl From<DispatchError> for HttpError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::Overload { api, .. } => HttpError::Overloaded(api),
            DispatchError::Timeout { .. } => HttpError::Timeout,
            DispatchError::Worker { code, reply } => HttpError::Worker {
                code,
                nid: reply.nid,
            },
            DispatchError::Transport(reason) => HttpError::BadGateway(reason),
            DispatchError::Codec(e) => HttpError::BadGateway(e.to_string()),
            DispatchError::Router(e) => HttpError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        self.status().into_response()
    }
}
