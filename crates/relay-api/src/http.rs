use std::{collections::HashMap, sync::Arc};

use axum::{
    Form, Json, Router,
    extract::{Path, Query, State, rejection::FormRejection},
    http::{HeaderName, HeaderValue, Method, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::get,
};
use relay_model::{ApiReply, ApiRequest, VArgs};
use tracing::{debug, warn};

use crate::{
    error::HttpError,
    handler::{DispatchHandler, PingRecorder},
};

/// HTTP API service builder.
pub struct HttpApi<H> {
    handler: Arc<H>,
    ping: Option<Arc<dyn PingRecorder>>,
}

struct AppState<H> {
    handler: Arc<H>,
    ping: Option<Arc<dyn PingRecorder>>,
}

impl<H> Clone for AppState<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            ping: self.ping.clone(),
        }
    }
}

impl<H> HttpApi<H>
where
    H: DispatchHandler,
{
    pub fn new(handler: Arc<H>) -> Self {
        Self {
            handler,
            ping: None,
        }
    }

    /// Report the serving node of every reply that carries one.
    pub fn with_ping_recorder(mut self, ping: Arc<dyn PingRecorder>) -> Self {
        self.ping = Some(ping);
        self
    }

    /// Build the axum router.
    ///
    /// Routes:
    /// - GET / - queue statistics of every live API
    /// - GET|POST /{api}/{cmd} - call `cmd` on `api`
    /// - GET|POST /{api}/{cmd}/{*args} - same, with positional arguments
    pub fn router(self) -> Router {
        let state = AppState {
            handler: self.handler,
            ping: self.ping,
        };
        Router::new()
            .route("/", get(list_apis::<H>))
            .route("/{api}/{cmd}", get(call_api::<H>).post(call_api::<H>))
            .route("/{api}/{cmd}/{*args}", get(call_api::<H>).post(call_api::<H>))
            .with_state(state)
    }
}

/// GET /
async fn list_apis<H>(State(state): State<AppState<H>>) -> impl IntoResponse
where
    H: DispatchHandler,
{
    Json(state.handler.statuses())
}

/// GET|POST /{api}/{cmd}[/{*args}]
///
/// Path segments after `cmd` become positional args. Query parameters and the
/// fields of a urlencoded POST body are grouped by name into vargs, query first.
async fn call_api<H>(
    State(state): State<AppState<H>>,
    method: Method,
    Path(params): Path<HashMap<String, String>>,
    Query(query): Query<Vec<(String, String)>>,
    form: Result<Form<Vec<(String, String)>>, FormRejection>,
) -> Result<Response, HttpError>
where
    H: DispatchHandler,
{
    let (Some(api), Some(cmd)) = (params.get("api"), params.get("cmd")) else {
        return Err(HttpError::Internal("route without api or cmd".into()));
    };
    let args = params
        .get("args")
        .map(|raw| split_args(raw))
        .unwrap_or_default();
    // For GET the form extractor re-reads the query string.
    let body_fields = match form {
        Ok(Form(fields)) if method != Method::GET && method != Method::HEAD => fields,
        _ => Vec::new(),
    };
    let vargs: VArgs = query.into_iter().chain(body_fields).collect();

    let req = ApiRequest::new(cmd.as_str())
        .with_args(args)
        .with_vargs(vargs);
    let result = state.handler.call(api, req).await;

    // Any reply proves its node alive, whatever its code.
    let nid = match &result {
        Ok(reply) => reply.nid.as_deref(),
        Err(e) => e.nid(),
    };
    if let (Some(nid), Some(ping)) = (nid, state.ping.as_ref()) {
        ping.record(api, nid);
    }

    let reply = result.inspect_err(|e| debug!(%api, %cmd, error = %e, "api call failed"))?;
    render_reply(&reply)
}

fn split_args(raw: &str) -> Vec<String> {
    raw.split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Success response: rendered payload plus the headers the worker asked for.
fn render_reply(reply: &ApiReply) -> Result<Response, HttpError> {
    let body = reply
        .data
        .render()
        .map_err(|e| HttpError::BadGateway(e.to_string()))?;

    let mut resp = (
        StatusCode::OK,
        [(CONTENT_TYPE, HeaderValue::from_static(body.content_type))],
        body.bytes,
    )
        .into_response();

    for (name, value) in reply.hdrs.iter() {
        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => {
                resp.headers_mut().insert(name, value);
            }
            _ => warn!(header = name, "skipping invalid worker header"),
        }
    }
    Ok(resp)
}
