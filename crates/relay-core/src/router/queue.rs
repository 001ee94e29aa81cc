use std::{net::SocketAddr, sync::Arc, time::Duration};

use parking_lot::Mutex;
use relay_model::{ApiSpec, ApiStatus};

use crate::router::ForwardingDevice;

/// Outstanding-request counter and its exponentially weighted mean.
///
/// After every change: `mean = (W * mean + num) / (1 + W)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutstandingStats {
    num: u64,
    mean: f64,
    weight: f64,
}

impl OutstandingStats {
    pub fn new(weight: f64) -> Self {
        Self {
            num: 0,
            mean: 0.0,
            weight,
        }
    }

    pub fn num(&self) -> u64 {
        self.num
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// A request was sent.
    pub fn record_send(&mut self) {
        self.num += 1;
        self.update();
    }

    /// A request finished (reply, error or timeout). Never goes below zero.
    pub fn record_release(&mut self) {
        self.num = self.num.saturating_sub(1);
        self.update();
    }

    fn update(&mut self) {
        self.mean = (self.weight * self.mean + self.num as f64) / (1.0 + self.weight);
    }
}

/// Live queue of one API: its catalog settings, its forwarding device and load stats.
#[derive(Debug)]
pub struct ApiQueue {
    spec: ApiSpec,
    device: Arc<ForwardingDevice>,
    stats: Mutex<OutstandingStats>,
}

impl ApiQueue {
    pub(crate) fn new(spec: ApiSpec, device: Arc<ForwardingDevice>, weight: f64) -> Self {
        Self {
            spec,
            device,
            stats: Mutex::new(OutstandingStats::new(weight)),
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn spec(&self) -> &ApiSpec {
        &self.spec
    }

    /// Catalog timeout of the API, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.spec.timeout()
    }

    pub fn endpoint_in(&self) -> SocketAddr {
        self.device.endpoint_in()
    }

    pub fn endpoint_out(&self) -> SocketAddr {
        self.device.endpoint_out()
    }

    pub(crate) fn device(&self) -> &Arc<ForwardingDevice> {
        &self.device
    }

    pub fn num_outstanding(&self) -> u64 {
        self.stats.lock().num()
    }

    pub fn mean_outstanding(&self) -> f64 {
        self.stats.lock().mean()
    }

    pub fn status(&self) -> ApiStatus {
        let stats = *self.stats.lock();
        ApiStatus {
            num_outstanding: stats.num(),
            mean_outstanding: stats.mean(),
            endpoint_in: Some(self.endpoint_in()),
            endpoint_out: Some(self.endpoint_out()),
        }
    }

    /// Count one request as outstanding until the returned guard drops.
    pub fn begin(self: &Arc<Self>) -> OutstandingGuard {
        self.stats.lock().record_send();
        OutstandingGuard {
            queue: Arc::clone(self),
        }
    }

    /// Like [`ApiQueue::begin`], unless the mean is already at `threshold`.
    ///
    /// The check and the increment happen under one lock, so a burst of
    /// callers cannot all pass on the same stale mean. On rejection the
    /// stats are untouched and the observed mean is returned.
    pub fn try_begin(self: &Arc<Self>, threshold: f64) -> Result<OutstandingGuard, f64> {
        let mut stats = self.stats.lock();
        if stats.mean() >= threshold {
            return Err(stats.mean());
        }
        stats.record_send();
        drop(stats);
        Ok(OutstandingGuard {
            queue: Arc::clone(self),
        })
    }
}

/// Decrements the outstanding count of its queue exactly once, on drop.
#[derive(Debug)]
pub struct OutstandingGuard {
    queue: Arc<ApiQueue>,
}

impl Drop for OutstandingGuard {
    fn drop(&mut self) {
        self.queue.stats.lock().record_release();
    }
}
