mod headers;
pub use headers::Headers;

mod vargs;
pub use vargs::VArgs;

mod constants;
pub use constants::{CMD_TERMINATE, CODE_MISSING, CODE_OK, INSTANCE_KEY_INFIX, LEADER_KEY_SUFFIX};

/// Name of a routable API (first URL path component).
pub type ApiName = String;

/// Identifier of a front-end or worker host instance.
pub type InstanceId = String;

/// Timeout value in milliseconds.
pub type TimeoutMs = u64;
