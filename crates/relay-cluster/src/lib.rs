//! Cluster coordination for relay front ends.
//!
//! Everything here shares state through a [`ConfigStore`] only: instances
//! publish heartbeats into an [`InstanceRegistry`], a [`LeaderElector`] picks
//! the instance that runs singleton maintenance, and the command channel
//! carries signed control commands between front ends and daemons.
pub mod channel;
pub mod config;
pub mod error;
pub mod leader;
pub mod maintenance;
pub mod registry;
pub mod store;

pub use config::{ChannelConfig, MaintenanceConfig};
pub use error::{ChannelError, HookError, MaintenanceError, StoreError};
pub use leader::{Election, LeaderElector};
pub use registry::InstanceRegistry;
pub use store::{ConfigStore, MemoryStore, StoreHandle};

/// Current unix time in seconds.
pub fn unix_now() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}
