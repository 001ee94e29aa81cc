//! HTTP boundary of the relay: maps `/{api}/{cmd}/{args..}` calls onto the
//! dispatch layer and renders worker replies.
pub mod adapter;
pub mod error;
pub mod handler;
pub mod http;

pub use adapter::DispatcherAdapter;
pub use error::HttpError;
pub use handler::{DispatchHandler, PingRecorder};
pub use http::HttpApi;
