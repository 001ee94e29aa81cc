use std::time::Duration;

use semver::Version;
use serde::{Deserialize, Serialize};

/// Endpoints and signing secret of the command channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChannelConfig {
    /// Host the publisher binds and subscribers connect to.
    pub host: String,
    pub push_port: u16,
    /// Port every subscriber answers point-to-point requests on.
    pub reply_port: u16,
    pub secret: String,
    pub send_timeout_ms: u64,
    pub recv_timeout_ms: u64,
}

impl ChannelConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn recv_timeout(&self) -> Duration {
        Duration::from_millis(self.recv_timeout_ms)
    }

    pub fn secret_bytes(&self) -> &[u8] {
        self.secret.as_bytes()
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            push_port: 8887,
            reply_port: 8888,
            secret: String::new(),
            send_timeout_ms: 10_000,
            recv_timeout_ms: 10_000,
        }
    }
}

/// Identity of this instance and pacing of the maintenance cycle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MaintenanceConfig {
    pub cluster_id: String,
    pub instance_id: String,
    /// Version of the image this instance runs; `0.0.0` means unknown.
    pub image_version: Version,
    pub interval_secs: u64,
}

impl MaintenanceConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Heartbeats older than one and a half intervals are stale.
    pub fn max_age_secs(&self) -> i64 {
        (self.interval_secs as i64).saturating_mul(3) / 2
    }
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            cluster_id: "relay".to_string(),
            instance_id: "localhost".to_string(),
            image_version: Version::new(0, 0, 0),
            interval_secs: 300,
        }
    }
}
