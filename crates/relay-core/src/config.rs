use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tuning of the dispatch layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DispatchConfig {
    /// Host the forwarding devices bind their endpoints on.
    pub bind_host: String,
    /// Mean outstanding requests at which a queue starts rejecting calls.
    pub buffer_size: f64,
    /// Weight `W` of the previous mean in `mean = (W*mean + num) / (1 + W)`.
    pub ewma_weight: f64,
    /// Idle connectors kept per API.
    pub max_idle_connectors: usize,
    /// Requests a device buffers before producers wait.
    pub high_water_mark: usize,
    /// Call timeout when neither the call nor the catalog gives one.
    pub default_timeout_ms: u64,
}

impl DispatchConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            bind_host: "127.0.0.1".to_string(),
            buffer_size: 20.0,
            ewma_weight: 0.25,
            max_idle_connectors: 2,
            high_water_mark: 20,
            default_timeout_ms: 30_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: DispatchConfig = serde_json::from_str(r#"{"bufferSize": 5}"#).unwrap();
        assert_eq!(cfg.buffer_size, 5.0);
        assert_eq!(cfg.max_idle_connectors, 2);
        assert_eq!(cfg.default_timeout(), Duration::from_secs(30));
    }
}
