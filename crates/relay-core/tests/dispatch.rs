use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use relay_core::{
    catalog::StaticCatalog, config::DispatchConfig, connector::Connector, context::DispatchContext,
    dispatch::Dispatcher, error::DispatchError, launcher::WorkerLauncher, router::ApiQueue,
    worker::{WorkerExit, serve_worker},
};
use relay_model::{ApiReply, ApiRequest, ApiSpec, ReplyData, VArgs};
use tokio_util::sync::CancellationToken;

async fn handle(req: ApiRequest) -> ApiReply {
    match req.cmd.as_str() {
        "echo" => ApiReply::text(req.args.join(",")),
        "sum" => {
            let total: i64 = req
                .vargs
                .get("n")
                .unwrap_or_default()
                .iter()
                .filter_map(|v| v.parse::<i64>().ok())
                .sum();
            ApiReply::text(total.to_string()).with_nid("w-1")
        }
        "slow" => {
            tokio::time::sleep(Duration::from_millis(400)).await;
            ApiReply::text("late")
        }
        "fail" => ApiReply::new(418, ReplyData::Text("teapot".into())),
        _ => ApiReply::new(404, ReplyData::Text("unknown".into())),
    }
}

/// Dispatcher with `workers` in-process workers attached to the `calc` queue.
async fn setup(cfg: DispatchConfig, workers: usize) -> (Arc<Dispatcher>, CancellationToken) {
    let catalog = StaticCatalog::new().with_api(ApiSpec::new("calc"));
    let dispatcher = Arc::new(
        Dispatcher::new(cfg).with_context(DispatchContext::default().with_catalog(Arc::new(catalog))),
    );
    let queue = dispatcher
        .router()
        .get_or_create("calc", dispatcher.context().catalog().as_ref())
        .await
        .unwrap();

    let cancel = CancellationToken::new();
    for _ in 0..workers {
        tokio::spawn(serve_worker(queue.endpoint_out(), handle, cancel.clone()));
    }
    (dispatcher, cancel)
}

#[tokio::test]
async fn round_trip_through_device() {
    let (d, cancel) = setup(DispatchConfig::default(), 1).await;

    let reply = d
        .send_recv(
            "calc",
            ApiRequest::new("echo").with_args(vec!["a".into(), "b".into()]),
            None,
        )
        .await
        .unwrap();
    assert_eq!(reply.data, ReplyData::Text("a,b".into()));

    let vargs: VArgs = [("n", "2"), ("n", "40")].into_iter().collect();
    let reply = d
        .send_recv("calc", ApiRequest::new("sum").with_vargs(vargs), None)
        .await
        .unwrap();
    assert_eq!(reply.data, ReplyData::Text("42".into()));
    assert_eq!(reply.nid.as_deref(), Some("w-1"));

    let stats = d.queue_stats("calc").unwrap();
    assert_eq!(stats.num_outstanding, 0);
    cancel.cancel();
}

#[tokio::test]
async fn worker_error_code_is_passed_through() {
    let (d, cancel) = setup(DispatchConfig::default(), 1).await;

    let err = d
        .send_recv("calc", ApiRequest::new("fail"), None)
        .await
        .unwrap_err();
    match err {
        DispatchError::Worker { code, reply } => {
            assert_eq!(code, 418);
            assert_eq!(reply.data, ReplyData::Text("teapot".into()));
        }
        other => panic!("expected worker error, got {other:?}"),
    }
    // A worker error leaves the connector healthy.
    assert_eq!(d.pool().idle_count("calc"), 1);
    cancel.cancel();
}

#[tokio::test]
async fn timed_out_connector_never_returns_to_pool() {
    let (d, cancel) = setup(DispatchConfig::default(), 2).await;

    let err = d
        .send_recv(
            "calc",
            ApiRequest::new("slow"),
            Some(Duration::from_millis(50)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Timeout { .. }));
    assert_eq!(d.pool().idle_count("calc"), 0);
    assert_eq!(d.queue_stats("calc").unwrap().num_outstanding, 0);

    d.send_recv("calc", ApiRequest::new("echo"), None)
        .await
        .unwrap();
    let ids = d.pool().idle_ids("calc");
    assert_eq!(ids.len(), 1);

    // Wait for the late reply to be discarded by the device; the pool is unaffected.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(d.pool().idle_ids("calc"), ids);
    cancel.cancel();
}

#[tokio::test]
async fn idle_pool_never_exceeds_capacity() {
    let (d, cancel) = setup(DispatchConfig::default(), 4).await;

    for _ in 0..10 {
        d.send_recv("calc", ApiRequest::new("echo"), None)
            .await
            .unwrap();
        assert!(d.pool().idle_count("calc") <= 2);
    }

    let mut calls = Vec::new();
    for _ in 0..8 {
        let d = Arc::clone(&d);
        calls.push(tokio::spawn(async move {
            d.send_recv("calc", ApiRequest::new("echo"), None).await
        }));
    }
    for call in calls {
        call.await.unwrap().unwrap();
    }
    assert_eq!(d.pool().idle_count("calc"), 2);
    cancel.cancel();
}

/// Fire `calls` concurrent calls at a worker-less `calc` queue.
///
/// Returns the still-pending calls and the errors of the finished ones,
/// once no further call finishes.
async fn burst(
    d: &Arc<Dispatcher>,
    calls: usize,
) -> (Vec<tokio::task::JoinHandle<Result<ApiReply, DispatchError>>>, Vec<DispatchError>) {
    let handles: Vec<_> = (0..calls)
        .map(|_| {
            let d = Arc::clone(d);
            tokio::spawn(async move {
                d.send_recv("calc", ApiRequest::new("echo"), Some(Duration::from_secs(30)))
                    .await
            })
        })
        .collect();

    let mut settled = 0;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let done = handles.iter().filter(|h| h.is_finished()).count();
        if done == settled && done > 0 {
            break;
        }
        settled = done;
    }

    let mut pending = Vec::new();
    let mut errors = Vec::new();
    for h in handles {
        if h.is_finished() {
            errors.push(h.await.unwrap().unwrap_err());
        } else {
            pending.push(h);
        }
    }
    (pending, errors)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_burst_is_rejected_at_threshold() {
    let cfg = DispatchConfig {
        buffer_size: 3.0,
        ..DispatchConfig::default()
    };
    // No workers: every admitted call stays outstanding.
    let (d, _cancel) = setup(cfg, 0).await;

    // means after 1..=4 admitted calls: 0.8, 1.76, 2.752, 3.7504
    let (pending, errors) = burst(&d, 40).await;
    assert_eq!(pending.len(), 4);
    assert_eq!(errors.len(), 36);
    assert!(errors.iter().all(|e| matches!(e, DispatchError::Overload { .. })));

    let queue = d.router().get("calc").unwrap();
    assert_eq!(queue.num_outstanding(), 4);
    assert!(queue.mean_outstanding() >= 3.0);

    let err = d
        .send_recv("calc", ApiRequest::new("echo"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Overload { .. }));
    assert_eq!(queue.num_outstanding(), 4);

    for call in pending {
        call.abort();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn default_buffer_rejects_once_mean_reaches_twenty() {
    let (d, _cancel) = setup(DispatchConfig::default(), 0).await;
    assert_eq!(d.config().buffer_size, 20.0);

    // The mean trails the count by a quarter: 20 admitted calls give 19.75,
    // the 21st lifts it past the threshold.
    let (pending, errors) = burst(&d, 30).await;
    assert_eq!(pending.len(), 21);
    assert_eq!(errors.len(), 9);
    assert!(errors.iter().all(|e| matches!(e, DispatchError::Overload { .. })));

    let queue = d.router().get("calc").unwrap();
    assert_eq!(queue.num_outstanding(), 21);
    assert!(queue.mean_outstanding() >= 20.0);

    for call in pending {
        call.abort();
    }
}

#[tokio::test]
async fn cancelled_caller_still_releases_outstanding() {
    let (d, cancel) = setup(DispatchConfig::default(), 1).await;

    let call = {
        let d = Arc::clone(&d);
        tokio::spawn(async move { d.send_recv("calc", ApiRequest::new("slow"), None).await })
    };
    let queue = d.router().get("calc").unwrap();
    for _ in 0..100 {
        if queue.num_outstanding() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    call.abort();
    let _ = call.await;

    assert_eq!(queue.num_outstanding(), 0);
    assert_eq!(d.pool().idle_count("calc"), 0);
    cancel.cancel();
}

#[tokio::test]
async fn terminate_stops_one_worker() {
    let catalog = StaticCatalog::new();
    let d = Dispatcher::new(DispatchConfig::default())
        .with_context(DispatchContext::default().with_catalog(Arc::new(catalog)));
    let queue = d
        .router()
        .get_or_create("calc", d.context().catalog().as_ref())
        .await
        .unwrap();
    let worker = tokio::spawn(serve_worker(
        queue.endpoint_out(),
        handle,
        CancellationToken::new(),
    ));

    let reply = d.send_terminate("calc").await.unwrap();
    assert!(reply.is_success());
    assert_eq!(worker.await.unwrap().unwrap(), WorkerExit::Terminated);
}

#[tokio::test]
async fn release_api_parks_device_and_drops_idle_connectors() {
    let (d, cancel) = setup(DispatchConfig::default(), 1).await;
    d.send_recv("calc", ApiRequest::new("echo"), None)
        .await
        .unwrap();
    assert_eq!(d.pool().idle_count("calc"), 1);

    assert!(d.release_api("calc"));
    assert_eq!(d.pool().idle_count("calc"), 0);
    assert_eq!(d.router().cached_count(), 1);
    assert!(d.queue_stats("calc").is_none());
    cancel.cancel();
}

#[tokio::test]
async fn errored_connector_is_not_pooled() {
    let (d, cancel) = setup(DispatchConfig::default(), 0).await;
    let queue = d.router().get("calc").unwrap();

    let mut conn = Connector::connect("calc", queue.endpoint_in()).await.unwrap();
    conn.mark_errored();
    assert!(!d.pool().release(conn));

    let conn = Connector::connect("calc", queue.endpoint_in()).await.unwrap();
    assert!(d.pool().release(conn));
    assert_eq!(d.pool().idle_count("calc"), 1);
    cancel.cancel();
}

/// Starts one in-process worker per API the first time it is asked.
#[derive(Default)]
struct InProcessLauncher {
    started: Mutex<Vec<String>>,
    cancel: CancellationToken,
}

impl WorkerLauncher for InProcessLauncher {
    fn ensure_workers(&self, queue: &ApiQueue) {
        let mut started = self.started.lock();
        if started.iter().any(|name| name == queue.name()) {
            return;
        }
        started.push(queue.name().to_string());
        tokio::spawn(serve_worker(queue.endpoint_out(), handle, self.cancel.clone()));
    }
}

#[tokio::test]
async fn launcher_provides_workers_on_first_call() {
    let launcher = Arc::new(InProcessLauncher::default());
    let catalog = StaticCatalog::new().with_api(ApiSpec::new("calc"));
    let d = Dispatcher::new(DispatchConfig::default()).with_context(
        DispatchContext::default()
            .with_catalog(Arc::new(catalog))
            .with_launcher(launcher.clone()),
    );

    for _ in 0..3 {
        let reply = d
            .send_recv("calc", ApiRequest::new("echo").with_args(vec!["x".into()]), None)
            .await
            .unwrap();
        assert_eq!(reply.data, ReplyData::Text("x".into()));
    }
    assert_eq!(*launcher.started.lock(), vec!["calc".to_string()]);

    let status = d.queue_stats("calc").unwrap();
    assert_eq!(status.endpoint_out, Some(d.router().get("calc").unwrap().endpoint_out()));
    launcher.cancel.cancel();
}
