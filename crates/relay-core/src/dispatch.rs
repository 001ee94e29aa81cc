//! Entry point of the dispatch layer: overload check, pooled connector, timed exchange.
use std::{
    collections::BTreeMap,
    time::{Duration, Instant},
};

use relay_model::{ApiName, ApiReply, ApiRequest, ApiStatus};
use tracing::{debug, instrument, warn};

use crate::{
    config::DispatchConfig,
    connector::ConnectorPool,
    context::DispatchContext,
    error::DispatchError,
    metrics::RequestOutcome,
    router::QueueRouter,
};

/// Owns the queue registry and the connector pools of one process.
#[derive(Debug)]
pub struct Dispatcher {
    cfg: DispatchConfig,
    ctx: DispatchContext,
    router: QueueRouter,
    pool: ConnectorPool,
}

impl Dispatcher {
    pub fn new(cfg: DispatchConfig) -> Self {
        let router = QueueRouter::new(&cfg);
        let pool = ConnectorPool::new(cfg.max_idle_connectors);
        Self {
            cfg,
            ctx: DispatchContext::default(),
            router,
            pool,
        }
    }

    /// Set catalog and metrics used by every call.
    pub fn with_context(mut self, ctx: DispatchContext) -> Self {
        self.ctx = ctx;
        self
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.cfg
    }

    pub fn context(&self) -> &DispatchContext {
        &self.ctx
    }

    pub fn router(&self) -> &QueueRouter {
        &self.router
    }

    pub fn pool(&self) -> &ConnectorPool {
        &self.pool
    }

    /// Send `req` to a worker of `api` and wait for its reply.
    ///
    /// The timeout is `timeout`, else the catalog timeout of the API, else the
    /// configured default. A reply with a non-success code is returned as
    /// [`DispatchError::Worker`].
    pub async fn send_recv(
        &self,
        api: &str,
        req: ApiRequest,
        timeout: Option<Duration>,
    ) -> Result<ApiReply, DispatchError> {
        let started = Instant::now();
        let result = self.exchange(api, &req, timeout).await;

        let outcome = match &result {
            Ok(_) => RequestOutcome::Success,
            Err(DispatchError::Worker { .. }) => RequestOutcome::WorkerError,
            Err(DispatchError::Overload { .. }) => RequestOutcome::Overload,
            Err(DispatchError::Timeout { .. }) => RequestOutcome::Timeout,
            Err(_) => RequestOutcome::Failure,
        };
        self.ctx.metrics().record_request_completed(
            api,
            outcome,
            started.elapsed().as_millis() as u64,
        );
        result
    }

    #[instrument(level = "debug", skip(self, req, timeout), fields(cmd = %req.cmd))]
    async fn exchange(
        &self,
        api: &str,
        req: &ApiRequest,
        timeout: Option<Duration>,
    ) -> Result<ApiReply, DispatchError> {
        let queue = self
            .router
            .get_or_create(api, self.ctx.catalog().as_ref())
            .await?;

        self.ctx.launcher().ensure_workers(&queue);

        let guard = match queue.try_begin(self.cfg.buffer_size) {
            Ok(guard) => guard,
            Err(mean) => {
                warn!(mean, threshold = self.cfg.buffer_size, "queue overloaded, rejecting call");
                return Err(DispatchError::Overload {
                    api: api.to_string(),
                    mean,
                });
            }
        };
        let metrics = self.ctx.metrics();
        metrics.record_queue_depth(api, queue.mean_outstanding());

        let mut connector = self.pool.acquire(api, queue.endpoint_in()).await?;
        metrics.record_request_started(api);

        let timeout = timeout
            .or_else(|| queue.timeout())
            .unwrap_or_else(|| self.cfg.default_timeout());
        let result = connector.send_recv(req, timeout).await;

        drop(guard);
        metrics.record_queue_depth(api, queue.mean_outstanding());
        self.pool.release(connector);

        let reply = result?;
        if !reply.is_success() {
            debug!(code = reply.code, "worker replied with error");
            return Err(DispatchError::Worker {
                code: reply.code,
                reply: Box::new(reply),
            });
        }
        Ok(reply)
    }

    /// Ask one worker of `api` to shut down.
    pub async fn send_terminate(&self, api: &str) -> Result<ApiReply, DispatchError> {
        self.send_recv(api, ApiRequest::terminate(), None).await
    }

    /// Close the idle connectors of `api`. Returns how many were closed.
    pub fn release_connectors(&self, api: &str) -> usize {
        self.pool.release_connectors(api)
    }

    /// Close idle connectors and park the queue of `api`.
    pub fn release_api(&self, api: &str) -> bool {
        self.pool.release_connectors(api);
        self.router.release(api)
    }

    /// Load snapshot of one live queue.
    pub fn queue_stats(&self, api: &str) -> Option<ApiStatus> {
        self.router.get(api).map(|q| q.status())
    }

    /// Load snapshot of every live queue.
    pub fn all_stats(&self) -> BTreeMap<ApiName, ApiStatus> {
        self.router.statuses()
    }
}
