use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;

use metrics_agent::collectors::{runtime::RuntimeCollector, system};
use metrics_agent::config::AgentConfig;
use metrics_agent::dispatcher::Dispatcher;
use metrics_agent::store::SharedStore;

#[cfg(feature = "jemalloc")]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() {
    let cfg = AgentConfig::load();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store = SharedStore::new();
    let shutdown = CancellationToken::new();

    let runtime_task = tokio::spawn(run_runtime_collector(
        store.clone(),
        cfg.metrics.clone(),
        cfg.poll_interval,
        shutdown.clone(),
    ));

    let system_task = tokio::spawn(run_system_collector(
        store.clone(),
        cfg.poll_interval,
        shutdown.clone(),
    ));

    let dispatcher = Dispatcher::new(
        cfg.server_address.clone(),
        cfg.key.clone(),
        cfg.public_key.as_deref(),
    );
    let dispatch_task = tokio::spawn(run_dispatcher(
        store,
        dispatcher,
        cfg.report_interval,
        shutdown.clone(),
    ));

    wait_for_shutdown_signal().await;
    tracing::info!("shutdown signal received");
    shutdown.cancel();

    let _ = tokio::try_join!(runtime_task, system_task, dispatch_task);
    tracing::info!("shutdown complete");
}

async fn run_runtime_collector(
    store: SharedStore,
    catalog: std::collections::HashMap<String, String>,
    interval: std::time::Duration,
    shutdown: CancellationToken,
) {
    let mut collector = RuntimeCollector::new();
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                store.write_all(collector.tick(&catalog));
            }
            _ = shutdown.cancelled() => break,
        }
    }
}

async fn run_system_collector(
    store: SharedStore,
    interval: std::time::Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                store.write_all(system::collect());
            }
            _ = shutdown.cancelled() => break,
        }
    }
}

async fn run_dispatcher(
    store: SharedStore,
    dispatcher: Dispatcher,
    interval: std::time::Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                dispatcher.dispatch(&store).await;
            }
            _ = shutdown.cancelled() => break,
        }
    }
}

async fn wait_for_shutdown_signal() {
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sigquit = signal(SignalKind::quit()).expect("failed to install SIGQUIT handler");
    tokio::select! {
        _ = sigint.recv() => {}
        _ = sigterm.recv() => {}
        _ = sigquit.recv() => {}
    }
}
