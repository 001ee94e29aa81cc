mod cli;
mod config;
mod daemon;
mod hooks;
mod launcher;
mod metrics;

use std::{
    sync::{Arc, atomic::Ordering},
    time::Duration,
};

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use relay_api::{DispatcherAdapter, HttpApi};
use relay_cluster::{
    MemoryStore, StoreHandle,
    channel::{CommandPublisher, CommandSubscriber},
    maintenance::{MaintenanceCycle, MaintenanceSupervisor},
};
use relay_core::{DispatchContext, Dispatcher};
use relay_observe::{init_local_offset, init_logger};
use relay_prometheus::PrometheusMetrics;

use crate::{
    cli::{Cli, Role},
    config::AgentConfig,
    daemon::DaemonHandler,
    hooks::HousekeepingHook,
    launcher::ProcessLauncher,
};

fn main() -> anyhow::Result<()> {
    // Must run before any thread is spawned.
    init_local_offset();

    let cli = Cli::parse();
    let cfg = AgentConfig::load(cli.config.as_deref())?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(cli.role, cfg))
}

async fn run(role: Role, cfg: AgentConfig) -> anyhow::Result<()> {
    init_logger(&cfg.logger)?;
    info!(?role, "logger initialized");

    match role {
        Role::Frontend => frontend(cfg).await,
        Role::Daemon => daemon(cfg).await,
    }
}

async fn frontend(cfg: AgentConfig) -> anyhow::Result<()> {
    // 1) metrics + dispatcher; APIs with a command get a local worker process
    let metrics = Arc::new(PrometheusMetrics::new()?);
    let ctx = DispatchContext::default()
        .with_catalog(Arc::new(cfg.catalog()))
        .with_metrics(metrics.clone())
        .with_launcher(Arc::new(ProcessLauncher::new()));
    let dispatcher = Arc::new(Dispatcher::new(cfg.dispatch.clone()).with_context(ctx));

    // 2) command channel + maintenance
    let publisher = Arc::new(CommandPublisher::bind(cfg.channel.clone()).await?);
    let store: StoreHandle = Arc::new(MemoryStore::new());
    let cycle = MaintenanceCycle::new(cfg.maintenance.clone(), store, dispatcher.clone())
        .with_hook(Arc::new(HousekeepingHook::new(publisher.clone())));

    let sup = MaintenanceSupervisor::start(Vec::new()).await;
    sup.submit(Arc::new(cycle)).await?;

    // 3) http
    let app = HttpApi::new(Arc::new(DispatcherAdapter::new(dispatcher.clone())))
        .router()
        .merge(metrics::router(metrics));
    let listener = TcpListener::bind(&cfg.listen)
        .await
        .with_context(|| format!("binding {}", cfg.listen))?;
    info!(addr = %listener.local_addr()?, "http front end listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    publisher.shutdown();
    info!("front end stopped");
    Ok(())
}

async fn daemon(cfg: AgentConfig) -> anyhow::Result<()> {
    let handler = Arc::new(DaemonHandler::default());
    let terminating = handler.terminating_flag();
    let subscriber = CommandSubscriber::bind(&cfg.channel).await?;

    let cancel = CancellationToken::new();
    let serving = tokio::spawn(subscriber.serve(handler, cancel.clone()));

    shutdown_signal().await;
    // Let front ends see the termination flag for one request window.
    terminating.store(true, Ordering::SeqCst);
    tokio::time::sleep(cfg.channel.recv_timeout().min(Duration::from_secs(5))).await;

    cancel.cancel();
    serving.await?;
    info!("daemon stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
