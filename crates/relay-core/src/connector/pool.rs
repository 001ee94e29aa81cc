use std::{collections::HashMap, net::SocketAddr};

use parking_lot::Mutex;
use relay_model::ApiName;
use tracing::{debug, trace};

use crate::{connector::Connector, error::DispatchError};

/// Per-API stacks of idle connectors.
///
/// Holds at most `capacity` idle connectors per API and never an errored one.
#[derive(Debug)]
pub struct ConnectorPool {
    capacity: usize,
    idle: Mutex<HashMap<ApiName, Vec<Connector>>>,
}

impl ConnectorPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            idle: Mutex::new(HashMap::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recently released idle connector of `api` bound to `endpoint`,
    /// else a newly connected one.
    pub async fn acquire(&self, api: &str, endpoint: SocketAddr) -> Result<Connector, DispatchError> {
        while let Some(conn) = self.take(api) {
            if conn.endpoint() == endpoint {
                trace!(api, connector = conn.id(), "reusing idle connector");
                return Ok(conn);
            }
            debug!(api, connector = conn.id(), "dropping connector bound to a retired endpoint");
        }
        Connector::connect(api, endpoint).await
    }

    /// Pop the most recently released idle connector of `api`.
    pub fn take(&self, api: &str) -> Option<Connector> {
        self.idle.lock().get_mut(api).and_then(Vec::pop)
    }

    /// Return a connector after use.
    ///
    /// Errored connectors and connectors beyond capacity are dropped, which closes
    /// their socket. Returns `true` if the connector was kept.
    pub fn release(&self, conn: Connector) -> bool {
        if conn.has_errors() {
            debug!(api = conn.api_name(), connector = conn.id(), "discarding errored connector");
            return false;
        }

        let mut idle = self.idle.lock();
        let stack = idle.entry(conn.api_name().to_string()).or_default();
        if stack.len() >= self.capacity {
            trace!(api = conn.api_name(), connector = conn.id(), "pool full, closing connector");
            return false;
        }
        stack.push(conn);
        true
    }

    pub fn idle_count(&self, api: &str) -> usize {
        self.idle.lock().get(api).map_or(0, Vec::len)
    }

    /// Ids of the idle connectors of `api`, oldest first.
    pub fn idle_ids(&self, api: &str) -> Vec<u64> {
        self.idle
            .lock()
            .get(api)
            .map(|stack| stack.iter().map(Connector::id).collect())
            .unwrap_or_default()
    }

    /// Drop every idle connector of `api`. Returns how many were closed.
    pub fn release_connectors(&self, api: &str) -> usize {
        let closed = self.idle.lock().remove(api).map_or(0, |stack| stack.len());
        if closed > 0 {
            debug!(api, closed, "idle connectors released");
        }
        closed
    }
}
