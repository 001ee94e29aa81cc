mod domain;
pub use domain::{ApiName, Headers, InstanceId, TimeoutMs, VArgs};
pub use domain::{CMD_TERMINATE, CODE_MISSING, CODE_OK, INSTANCE_KEY_INFIX, LEADER_KEY_SUFFIX};

mod error;
pub use error::{ModelError, ModelResult};

mod command;
pub use command::Command;

mod signed;
pub use signed::SignedMessage;

mod spec;
pub use spec::ApiSpec;

mod wire;
pub use wire::{ApiReply, ApiRequest, ReplyBody, ReplyData};

mod cluster;
pub use cluster::{ApiStatus, InstanceStatus, LeaderRecord, instance_key, instance_prefix, leader_key};
