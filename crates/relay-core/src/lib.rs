pub mod catalog;
pub mod config;
pub mod connector;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod launcher;
pub mod metrics;
pub mod router;
pub mod transport;
pub mod worker;

pub use context::DispatchContext;
pub use dispatch::Dispatcher;

pub mod prelude {
    pub use crate::catalog::{ApiCatalog, CatalogHandle, StaticCatalog};
    pub use crate::config::DispatchConfig;
    pub use crate::context::DispatchContext;
    pub use crate::dispatch::Dispatcher;
    pub use crate::error::DispatchError;
    pub use crate::launcher::{LauncherHandle, WorkerLauncher};
    pub use crate::metrics::{MetricsBackend, MetricsHandle, RequestOutcome};
    pub use crate::router::{QueueRouter, RouterError};
}
