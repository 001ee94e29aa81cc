//! Signed command channel between front ends and daemons.
//!
//! A [`CommandPublisher`] binds a push endpoint; every [`CommandSubscriber`]
//! connected to it receives each pushed command at most once. Point-to-point
//! calls go the other way: the publisher connects to one subscriber's reply
//! endpoint, sends a signed request and waits for one signed reply.
mod publisher;
mod subscriber;

use async_trait::async_trait;
use relay_model::Command;
use serde_json::Value;

pub use publisher::CommandPublisher;
pub use subscriber::{ChannelEvent, CommandSubscriber, PendingRequest};

/// Maps a host name given to point-to-point calls onto a connectable address.
pub(crate) fn resolve_host(dest: Option<&str>) -> &str {
    match dest {
        None | Some("localhost") => "127.0.0.1",
        Some(host) => host,
    }
}

/// Receiver side of the channel, driven by [`CommandSubscriber::serve`].
#[async_trait]
pub trait CommandHandler: Send + Sync + 'static {
    /// A pushed command. No reply is possible.
    async fn on_command(&self, cmd: Command, data: Value);

    /// A point-to-point request; the returned value is signed and sent back.
    async fn on_request(&self, cmd: Command, data: Value) -> Value;
}
