use std::sync::Arc;

use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
    proto::MetricFamily,
};
use relay_core::metrics::{MetricsBackend, RequestOutcome};

/// Prometheus implementation of [`MetricsBackend`].
///
/// Label cardinality is bounded by the API catalog (`api`) and by
/// [`RequestOutcome`] (`outcome`).
#[derive(Clone)]
pub struct PrometheusMetrics {
    started: CounterVec,
    completed: CounterVec,
    duration: HistogramVec,
    queue_mean: GaugeVec,
    registry: Arc<Registry>,
}

impl PrometheusMetrics {
    /// Register the relay metrics in `registry`.
    pub fn new_with_registry(registry: Arc<Registry>) -> Result<Self, prometheus::Error> {
        let started = CounterVec::new(
            Opts::new("requests_started_total", "Calls sent to a worker").namespace("relay"),
            &["api"],
        )?;
        registry.register(Box::new(started.clone()))?;

        let completed = CounterVec::new(
            Opts::new("requests_completed_total", "Calls finished, by outcome").namespace("relay"),
            &["api", "outcome"],
        )?;
        registry.register(Box::new(completed.clone()))?;

        let duration = HistogramVec::new(
            HistogramOpts::new("request_duration_seconds", "Call wall time in seconds")
                .namespace("relay")
                .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0]),
            &["api"],
        )?;
        registry.register(Box::new(duration.clone()))?;

        let queue_mean = GaugeVec::new(
            Opts::new(
                "queue_mean_outstanding",
                "Weighted mean of outstanding calls per API",
            )
            .namespace("relay"),
            &["api"],
        )?;
        registry.register(Box::new(queue_mean.clone()))?;

        Ok(Self {
            started,
            completed,
            duration,
            queue_mean,
            registry,
        })
    }

    pub fn new() -> Result<Self, prometheus::Error> {
        Self::new_with_registry(Arc::new(Registry::new()))
    }

    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Render every metric in the text exposition format.
    ///
    /// Returns the content type and the body of a `/metrics` response.
    pub fn encode_text(&self) -> Result<(String, Vec<u8>), prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut body = Vec::new();
        encoder.encode(&self.gather(), &mut body)?;
        Ok((encoder.format_type().to_string(), body))
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }
}

impl MetricsBackend for PrometheusMetrics {
    fn record_request_started(&self, api: &str) {
        self.started.with_label_values(&[api]).inc();
    }

    fn record_request_completed(&self, api: &str, outcome: RequestOutcome, duration_ms: u64) {
        self.completed
            .with_label_values(&[api, outcome.as_label()])
            .inc();
        self.duration
            .with_label_values(&[api])
            .observe(duration_ms as f64 / 1000.0);
    }

    fn record_queue_depth(&self, api: &str, mean: f64) {
        self.queue_mean.with_label_values(&[api]).set(mean);
    }
}
