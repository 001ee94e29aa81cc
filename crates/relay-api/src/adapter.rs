use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use relay_core::Dispatcher;
use relay_model::{ApiName, ApiReply, ApiRequest, ApiStatus};

use crate::{error::HttpError, handler::DispatchHandler};

/// [`DispatchHandler`] backed by a [`Dispatcher`].
pub struct DispatcherAdapter {
    dispatcher: Arc<Dispatcher>,
}

impl DispatcherAdapter {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl DispatchHandler for DispatcherAdapter {
    async fn call(&self, api: &str, req: ApiRequest) -> Result<ApiReply, HttpError> {
        self.dispatcher
            .send_recv(api, req, None)
            .await
            .map_err(HttpError::from)
    }

    fn statuses(&self) -> BTreeMap<ApiName, ApiStatus> {
        self.dispatcher.all_stats()
    }
}
