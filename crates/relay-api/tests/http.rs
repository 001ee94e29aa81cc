use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use parking_lot::Mutex;
use relay_api::{DispatchHandler, DispatcherAdapter, HttpApi, HttpError, PingRecorder};
use relay_core::{
    catalog::StaticCatalog, config::DispatchConfig, context::DispatchContext, dispatch::Dispatcher,
    worker::serve_worker,
};
use relay_model::{ApiName, ApiReply, ApiRequest, ApiSpec, ApiStatus, ReplyData};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

/// Echoes the request back as a JSON object.
struct EchoHandler;

#[async_trait]
impl DispatchHandler for EchoHandler {
    async fn call(&self, api: &str, req: ApiRequest) -> Result<ApiReply, HttpError> {
        match req.cmd.as_str() {
            "busy" => Err(HttpError::Overloaded(api.to_string())),
            "missing" => Err(HttpError::Worker {
                code: 404,
                nid: Some("node-2".into()),
            }),
            "bytes" => Ok(ApiReply::ok(ReplyData::Binary(vec![0, 159, 255]))),
            _ => {
                let data = json!({"api": api, "cmd": req.cmd, "args": req.args, "vargs": req.vargs});
                let Value::Object(map) = data else { unreachable!() };
                Ok(ApiReply::ok(ReplyData::Object(map))
                    .with_header("X-Served-By", "echo")
                    .with_nid("node-1"))
            }
        }
    }

    fn statuses(&self) -> BTreeMap<ApiName, ApiStatus> {
        BTreeMap::from([(
            "calc".to_string(),
            ApiStatus {
                num_outstanding: 2,
                mean_outstanding: 1.5,
                ..ApiStatus::default()
            },
        )])
    }
}

#[derive(Default)]
struct Pings(Mutex<Vec<(String, String)>>);

impl PingRecorder for Pings {
    fn record(&self, api: &str, nid: &str) {
        self.0.lock().push((api.to_string(), nid.to_string()));
    }
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn call_maps_path_and_query() {
    let pings = Arc::new(Pings::default());
    let app = HttpApi::new(Arc::new(EchoHandler))
        .with_ping_recorder(pings.clone())
        .router();

    let resp = app.oneshot(get("/calc/sum/a/b?n=1&n=2&x=y")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["content-type"], "application/json");
    assert_eq!(resp.headers()["x-served-by"], "echo");

    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let v: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        v,
        json!({"api": "calc", "cmd": "sum", "args": ["a", "b"], "vargs": {"n": ["1", "2"], "x": ["y"]}})
    );
    assert_eq!(*pings.0.lock(), vec![("calc".to_string(), "node-1".to_string())]);
}

#[tokio::test]
async fn post_without_args() {
    let app = HttpApi::new(Arc::new(EchoHandler)).router();
    let req = Request::builder()
        .method("POST")
        .uri("/calc/ping")
        .body(Body::empty())
        .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let v: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(v["args"], json!([]));
}

#[tokio::test]
async fn post_form_fields_join_query_vargs() {
    let app = HttpApi::new(Arc::new(EchoHandler)).router();
    let req = Request::builder()
        .method("POST")
        .uri("/calc/sum?n=1")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from("n=2&x=y"))
        .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let v: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(v["vargs"], json!({"n": ["1", "2"], "x": ["y"]}));
}

#[tokio::test]
async fn failed_reply_still_records_its_node() {
    let pings = Arc::new(Pings::default());
    let app = HttpApi::new(Arc::new(EchoHandler))
        .with_ping_recorder(pings.clone())
        .router();

    let resp = app.clone().oneshot(get("/calc/missing")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let resp = app.oneshot(get("/calc/busy")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

    assert_eq!(*pings.0.lock(), vec![("calc".to_string(), "node-2".to_string())]);
}

#[tokio::test]
async fn failures_have_status_and_no_body() {
    for (uri, status) in [
        ("/calc/busy", StatusCode::SERVICE_UNAVAILABLE),
        ("/calc/missing", StatusCode::NOT_FOUND),
    ] {
        let app = HttpApi::new(Arc::new(EchoHandler)).router();
        let resp = app.oneshot(get(uri)).await.unwrap();
        assert_eq!(resp.status(), status);
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());
    }
}

#[tokio::test]
async fn binary_reply_is_raw_bytes() {
    let app = HttpApi::new(Arc::new(EchoHandler)).router();
    let resp = app.oneshot(get("/calc/bytes")).await.unwrap();
    assert_eq!(resp.headers()["content-type"], "application/octet-stream");
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], &[0, 159, 255]);
}

#[tokio::test]
async fn root_lists_queue_stats() {
    let app = HttpApi::new(Arc::new(EchoHandler)).router();
    let resp = app.oneshot(get("/")).await.unwrap();
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let v: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(v, json!({"calc": {"numOutstanding": 2, "meanOutstanding": 1.5}}));
}

async fn worker(req: ApiRequest) -> ApiReply {
    match req.cmd.as_str() {
        "upper" => ApiReply::text(req.args.join(" ").to_uppercase()),
        "crash" => ApiReply::new(500, ReplyData::Text("boom".into())).with_nid("w-9"),
        _ => ApiReply::new(501, ReplyData::Text("unsupported".into())),
    }
}

#[tokio::test]
async fn end_to_end_through_dispatcher() {
    let catalog = StaticCatalog::new().with_api(ApiSpec::new("text"));
    let dispatcher = Arc::new(
        Dispatcher::new(DispatchConfig::default())
            .with_context(DispatchContext::default().with_catalog(Arc::new(catalog))),
    );
    let queue = dispatcher
        .router()
        .get_or_create("text", dispatcher.context().catalog().as_ref())
        .await
        .unwrap();
    let cancel = CancellationToken::new();
    tokio::spawn(serve_worker(queue.endpoint_out(), worker, cancel.clone()));

    let app = HttpApi::new(Arc::new(DispatcherAdapter::new(Arc::clone(&dispatcher)))).router();

    let resp = app.clone().oneshot(get("/text/upper/hello/world")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["content-type"], "text/plain; charset=utf-8");
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"HELLO WORLD");

    let resp = app.oneshot(get("/text/nope")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_IMPLEMENTED);
    cancel.cancel();
}

#[tokio::test]
async fn worker_error_through_dispatcher_records_ping() {
    let catalog = StaticCatalog::new().with_api(ApiSpec::new("text"));
    let dispatcher = Arc::new(
        Dispatcher::new(DispatchConfig::default())
            .with_context(DispatchContext::default().with_catalog(Arc::new(catalog))),
    );
    let queue = dispatcher
        .router()
        .get_or_create("text", dispatcher.context().catalog().as_ref())
        .await
        .unwrap();
    let cancel = CancellationToken::new();
    tokio::spawn(serve_worker(queue.endpoint_out(), worker, cancel.clone()));

    let pings = Arc::new(Pings::default());
    let app = HttpApi::new(Arc::new(DispatcherAdapter::new(Arc::clone(&dispatcher))))
        .with_ping_recorder(pings.clone())
        .router();

    let resp = app.oneshot(get("/text/crash")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(*pings.0.lock(), vec![("text".to_string(), "w-9".to_string())]);
    cancel.cancel();
}
