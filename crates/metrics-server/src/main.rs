use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;

use metrics_server::config::ServerConfig;
use metrics_server::grpc::proto::metrics_server::MetricsServer;
use metrics_server::grpc::MetricsGrpcService;
use metrics_server::state::AppState;
use metrics_server::storage::create_repo;
use metrics_server::{router, storage};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    let cfg = ServerConfig::load();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let repo: Arc<dyn storage::Repository> = match create_repo(&cfg).await {
        Ok(repo) => Arc::from(repo),
        Err(e) => {
            tracing::error!(error = %e, "failed to initialize repository");
            std::process::exit(1);
        }
    };

    let cfg = Arc::new(cfg);
    let state = AppState {
        repo: repo.clone(),
        cfg: cfg.clone(),
    };

    let shutdown = CancellationToken::new();

    let http_task = tokio::spawn(run_http(
        state.clone(),
        cfg.server_address.clone(),
        shutdown.clone(),
    ));

    let grpc_task = if cfg.grpc_enabled {
        Some(tokio::spawn(run_grpc(state.clone(), shutdown.clone())))
    } else {
        None
    };

    let snapshot_task = if !cfg.store_interval.is_zero() {
        Some(tokio::spawn(run_snapshot_ticker(
            repo.clone(),
            cfg.store_interval,
            shutdown.clone(),
        )))
    } else {
        None
    };

    wait_for_shutdown_signal().await;
    tracing::info!("shutdown signal received, draining");
    shutdown.cancel();

    if tokio::time::timeout(SHUTDOWN_GRACE, http_task).await.is_err() {
        tracing::warn!("HTTP listener did not drain within the grace period");
    }
    if let Some(task) = grpc_task {
        let _ = tokio::time::timeout(SHUTDOWN_GRACE, task).await;
    }
    if let Some(task) = snapshot_task {
        let _ = task.await;
    }

    if let Err(e) = repo.dump_metrics().await {
        tracing::warn!(error = %e, "final snapshot failed");
    }
    repo.close().await;
    tracing::info!("shutdown complete");
}

async fn run_http(state: AppState, address: String, shutdown: CancellationToken) {
    let app = router::build(state);
    let listener = match TcpListener::bind(&address).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(error = %e, %address, "failed to bind HTTP listener");
            return;
        }
    };
    tracing::info!(addr = %listener.local_addr().unwrap(), "HTTP listener started");

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
        })
        .await;
    if let Err(e) = result {
        tracing::error!(error = %e, "HTTP server exited with error");
    }
}

async fn run_grpc(state: AppState, shutdown: CancellationToken) {
    let addr = match state.cfg.grpc_address.parse() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!(error = %e, address = %state.cfg.grpc_address, "invalid gRPC address");
            return;
        }
    };
    tracing::info!(%addr, "gRPC listener started");
    let service = MetricsGrpcService::new(state);
    let result = tonic::transport::Server::builder()
        .add_service(MetricsServer::new(service))
        .serve_with_shutdown(addr, async move {
            shutdown.cancelled().await;
        })
        .await;
    if let Err(e) = result {
        tracing::error!(error = %e, "gRPC server exited with error");
    }
}

async fn run_snapshot_ticker(
    repo: Arc<dyn storage::Repository>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = repo.dump_metrics().await {
                    tracing::warn!(error = %e, "periodic snapshot failed");
                }
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
