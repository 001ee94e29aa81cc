//! Records shared between instances through the configuration store.
mod instance;
mod leader;
mod status;

pub use instance::{InstanceStatus, instance_key, instance_prefix};
pub use leader::{LeaderRecord, leader_key};
pub use status::ApiStatus;
