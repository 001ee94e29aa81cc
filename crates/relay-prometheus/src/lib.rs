//! Prometheus backend for the relay dispatch metrics.
//!
//! ```rust
//! use std::sync::Arc;
//! use relay_core::DispatchContext;
//! use relay_prometheus::PrometheusMetrics;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let metrics = PrometheusMetrics::new()?;
//! let ctx = DispatchContext::default().with_metrics(Arc::new(metrics.clone()));
//! # let _ = ctx;
//! let (_content_type, _body) = metrics.encode_text()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Metrics
//! - `relay_requests_started_total{api}` - Counter
//! - `relay_requests_completed_total{api, outcome}` - Counter
//! - `relay_request_duration_seconds{api}` - Histogram
//! - `relay_queue_mean_outstanding{api}` - Gauge
mod backend;
pub use backend::PrometheusMetrics;
