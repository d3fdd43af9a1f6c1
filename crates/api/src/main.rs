use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use provisioner_clients::http::HttpClient;
use provisioner_clients::{IqServerApi, NexusApi};
use provisioner_core::job::JobStore;
use provisioner_pipeline::BatchManager;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use provisioner_api::config::ServerConfig;
use provisioner_api::router::build_app_router;
use provisioner_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::from_path("config/.env").ok();
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "provisioner_api=debug,provisioner_pipeline=debug,provisioner_clients=info,tower_http=debug"
                    .into()
            }),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(tracing_subscriber::fmt::layer))
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env().expect("Invalid configuration");
    let settings = Arc::new(config.load_settings().expect("Invalid provisioning settings"));
    tracing::info!(
        host = %config.host,
        port = config.port,
        organizations = settings.organizations.len(),
        package_managers = settings.package_managers.len(),
        "Loaded server configuration"
    );

    // --- Upstream clients ---
    let upstream_timeout = Duration::from_secs(config.upstream_timeout_secs);
    let nexus = NexusApi::new(
        HttpClient::new(config.nexus.clone(), upstream_timeout)
            .expect("Failed to build repository manager client"),
        Arc::clone(&settings),
    );
    let iq = IqServerApi::new(
        HttpClient::new(config.iq.clone(), upstream_timeout)
            .expect("Failed to build policy server client"),
    );

    // --- App state ---
    let batches = BatchManager::new(
        settings,
        Arc::new(JobStore::new()),
        Arc::new(nexus),
        Arc::new(iq),
    );
    let state = AppState {
        config: Arc::new(config.clone()),
        batches,
    };

    let app = build_app_router(state);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid API_HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    let shutdown = CancellationToken::new();
    let mut server = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
        }
    });

    tokio::select! {
        result = &mut server => {
            match result {
                Ok(Ok(())) => tracing::info!("Server stopped"),
                Ok(Err(e)) => tracing::error!(error = %e, "Server error"),
                Err(e) => tracing::error!(error = %e, "Server task failed"),
            }
            return;
        }
        () = shutdown_signal() => {}
    }

    // --- Graceful shutdown ---
    // Background batches are not awaited; in-flight jobs are abandoned.
    shutdown.cancel();
    let grace = Duration::from_secs(config.shutdown_timeout_secs);
    match tokio::time::timeout(grace, server).await {
        Ok(Ok(Ok(()))) => tracing::info!("Graceful shutdown complete"),
        Ok(Ok(Err(e))) => tracing::error!(error = %e, "Server error during shutdown"),
        Ok(Err(e)) => tracing::error!(error = %e, "Server task failed during shutdown"),
        Err(_) => tracing::warn!(
            grace_secs = config.shutdown_timeout_secs,
            "In-flight requests did not finish in time, exiting"
        ),
    }
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
