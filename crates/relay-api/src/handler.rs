use std::collections::BTreeMap;

use async_trait::async_trait;
use relay_model::{ApiName, ApiReply, ApiRequest, ApiStatus};

use crate::error::HttpError;

/// Backend of the HTTP boundary.
///
/// [`DispatcherAdapter`](crate::DispatcherAdapter) forwards to the dispatch
/// layer; tests and embedders can plug in their own.
#[async_trait]
pub trait DispatchHandler: Send + Sync + 'static {
    /// Forward `req` to a worker of `api` and return its successful reply.
    async fn call(&self, api: &str, req: ApiRequest) -> Result<ApiReply, HttpError>;

    /// Queue snapshot of every live API.
    fn statuses(&self) -> BTreeMap<ApiName, ApiStatus>;
}

/// Told which worker node served a call, when the reply names one.
pub trait PingRecorder: Send + Sync + 'static {
    fn record(&self, api: &str, nid: &str);
}
