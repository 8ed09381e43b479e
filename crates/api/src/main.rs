use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tandem_api::config::{LogFormat, ServerConfig, StorageBackend};
use tandem_api::router::build_app_router;
use tandem_api::state::AppState;
use tandem_api::{background, bootstrap, ws};
use tandem_db::{Gateway, MemoryGateway, PgGateway};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Configuration ---
    let config = ServerConfig::from_env();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tandem_api=debug,tandem_db=info,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
    tracing::info!(
        host = %config.host,
        port = %config.port,
        storage = ?config.storage,
        "Loaded server configuration"
    );

    // --- Storage ---
    let gateway: Arc<dyn Gateway> = match config.storage {
        StorageBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .expect("DATABASE_URL must be set");

            let pool = tandem_db::create_pool(database_url)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connection pool created");

            tandem_db::health_check(&pool)
                .await
                .expect("Database health check failed");
            tracing::info!("Database health check passed");

            tandem_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");

            Arc::new(PgGateway::new(pool))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; all data is lost on shutdown");
            Arc::new(MemoryGateway::new())
        }
    };

    bootstrap::run(gateway.as_ref(), &config)
        .await
        .expect("Failed to seed initial data");

    // --- App state ---
    let state = AppState::new(Arc::clone(&gateway), config.clone());
    let hub = Arc::clone(&state.hub);

    // --- Heartbeat ---
    let heartbeat_handle = ws::start_heartbeat(
        Arc::clone(&hub),
        Duration::from_secs(config.collab.heartbeat_interval_secs),
    );

    // --- Session janitor ---
    let janitor_cancel = CancellationToken::new();
    let janitor_handle = tokio::spawn(background::session_janitor::run(
        state.collab.presence().clone(),
        Duration::from_secs(config.collab.janitor_interval_secs),
        chrono::Duration::seconds(config.collab.session_stale_secs),
        janitor_cancel.clone(),
    ));

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    janitor_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), janitor_handle).await;
    tracing::info!("Session janitor stopped");

    let ws_count = hub.connection_count().await;
    tracing::info!(ws_count, "Closing remaining collab connections");
    hub.shutdown_all().await;

    heartbeat_handle.abort();
    tracing::info!("Heartbeat task stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM (on Unix).
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
