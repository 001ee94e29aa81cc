//! Registry of per-API forwarding devices.
//!
//! One live [`ApiQueue`] exists per API name. Releasing a queue parks its device
//! in a LIFO reuse cache: the device stays bound and is handed to the next API
//! that needs one.
mod device;
pub use device::ForwardingDevice;

mod error;
pub use error::RouterError;

mod queue;
pub use queue::{ApiQueue, OutstandingGuard, OutstandingStats};

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use parking_lot::Mutex;
use relay_model::{ApiName, ApiSpec, ApiStatus};
use tracing::{debug, info, instrument};

use crate::{catalog::ApiCatalog, config::DispatchConfig};

#[derive(Debug, Default)]
struct RouterState {
    live: HashMap<ApiName, Arc<ApiQueue>>,
    cache: Vec<Arc<ForwardingDevice>>,
}

/// Owner of every live API queue and of the device reuse cache.
#[derive(Debug)]
pub struct QueueRouter {
    host: String,
    hwm: usize,
    weight: f64,
    state: Mutex<RouterState>,
}

impl QueueRouter {
    pub fn new(cfg: &DispatchConfig) -> Self {
        Self {
            host: cfg.bind_host.clone(),
            hwm: cfg.high_water_mark,
            weight: cfg.ewma_weight,
            state: Mutex::new(RouterState::default()),
        }
    }

    /// Bind a fresh device for `spec` and register it.
    ///
    /// On allocation failure nothing is registered.
    #[instrument(level = "debug", skip(self, spec), fields(api = %spec.name))]
    pub async fn create(&self, spec: ApiSpec) -> Result<Arc<ApiQueue>, RouterError> {
        let device = ForwardingDevice::bind(&self.host, self.hwm).await?;
        Ok(self.register(spec, Arc::new(device)))
    }

    /// Live queue of `api`, else a cached device re-initialized from the catalog,
    /// else a newly bound device.
    #[instrument(level = "debug", skip(self, catalog))]
    pub async fn get_or_create(
        &self,
        api: &str,
        catalog: &dyn ApiCatalog,
    ) -> Result<Arc<ApiQueue>, RouterError> {
        if let Some(queue) = self.get(api) {
            return Ok(queue);
        }

        let mut spec = catalog.lookup(api).unwrap_or_else(|| {
            debug!("api not in catalog, using defaults");
            ApiSpec::new(api)
        });
        spec.name = api.to_string();

        let cached = self.state.lock().cache.pop();
        match cached {
            Some(device) => {
                debug!(endpoint_in = %device.endpoint_in(), "reusing cached device");
                Ok(self.register(spec, device))
            }
            None => self.create(spec).await,
        }
    }

    /// Live queue of `api` without allocating.
    pub fn get(&self, api: &str) -> Option<Arc<ApiQueue>> {
        self.state.lock().live.get(api).cloned()
    }

    /// Unregister `api` and park its device for reuse. Returns `false` if it was not live.
    pub fn release(&self, api: &str) -> bool {
        let mut state = self.state.lock();
        match state.live.remove(api) {
            Some(queue) => {
                state.cache.push(Arc::clone(queue.device()));
                info!(api, cached = state.cache.len(), "queue released");
                true
            }
            None => false,
        }
    }

    /// Names of live APIs, sorted.
    pub fn live_apis(&self) -> Vec<ApiName> {
        let mut names: Vec<_> = self.state.lock().live.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of parked devices.
    pub fn cached_count(&self) -> usize {
        self.state.lock().cache.len()
    }

    /// Load snapshot of every live queue.
    pub fn statuses(&self) -> BTreeMap<ApiName, ApiStatus> {
        self.state
            .lock()
            .live
            .iter()
            .map(|(name, q)| (name.clone(), q.status()))
            .collect()
    }

    fn register(&self, spec: ApiSpec, device: Arc<ForwardingDevice>) -> Arc<ApiQueue> {
        let mut state = self.state.lock();

        // Lost a creation race: keep the winner, park our device.
        if let Some(existing) = state.live.get(&spec.name) {
            let existing = Arc::clone(existing);
            state.cache.push(device);
            return existing;
        }

        let queue = Arc::new(ApiQueue::new(spec, device, self.weight));
        info!(
            api = queue.name(),
            endpoint_in = %queue.endpoint_in(),
            endpoint_out = %queue.endpoint_out(),
            "queue registered"
        );
        state
            .live
            .insert(queue.name().to_string(), Arc::clone(&queue));
        queue
    }
}
