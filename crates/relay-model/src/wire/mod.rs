//! JSON envelopes exchanged between connectors, the forwarding device and workers.
mod reply;
mod request;

pub use reply::{ApiReply, ReplyBody, ReplyData};
pub use request::ApiRequest;
