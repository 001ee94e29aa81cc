use std::sync::Arc;

/// Call outcome for metrics classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Worker replied with a success code.
    Success,
    /// Worker replied with an error code.
    WorkerError,
    /// Rejected before sending.
    Overload,
    Timeout,
    /// Link or codec failure.
    Failure,
}

impl RequestOutcome {
    /// Return label value for metrics.
    #[inline]
    pub fn as_label(&self) -> &'static str {
        match self {
            RequestOutcome::Success => "success",
            RequestOutcome::WorkerError => "worker_error",
            RequestOutcome::Overload => "overload",
            RequestOutcome::Timeout => "timeout",
            RequestOutcome::Failure => "failure",
        }
    }
}

/// Backend metrics collection interface.
///
/// Implementations are injected via [`crate::DispatchContext`] and shared by every queue.
pub trait MetricsBackend: Send + Sync + 'static {
    /// Record a call accepted for sending.
    ///
    /// # Arguments
    /// - `api`: API name
    fn record_request_started(&self, api: &str);
    /// Record call completion with outcome and duration.
    ///
    /// Called for every call, including those rejected as overloaded.
    ///
    /// # Arguments
    /// - `api`: API name
    /// - `outcome`: How the call ended
    /// - `duration_ms`: Wall time in milliseconds
    fn record_request_completed(&self, api: &str, outcome: RequestOutcome, duration_ms: u64);
    /// Record the current mean of outstanding requests of a queue.
    fn record_queue_depth(&self, api: &str, mean: f64);
}

/// Shared handle to metrics backend.
pub type MetricsHandle = Arc<dyn MetricsBackend>;
