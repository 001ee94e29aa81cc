use crate::metrics::backend::{MetricsBackend, RequestOutcome};

/// Default backend of a [`crate::DispatchContext`].
///
/// Dispatchers built without a metrics exporter (tests, embedded use) still
/// report every call outcome and queue depth; the reports go nowhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpMetrics;

impl MetricsBackend for NoOpMetrics {
    #[inline(always)]
    fn record_request_started(&self, _: &str) {}

    #[inline(always)]
    fn record_request_completed(&self, _: &str, _: RequestOutcome, _: u64) {}

    #[inline(always)]
    fn record_queue_depth(&self, _: &str, _: f64) {}
}
