use std::net::SocketAddr;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use axum::{error_handling::HandleErrorLayer, http::StatusCode};
use tower::{BoxError, ServiceBuilder};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use timetable_reconciler::{
    create_router, AppState, HttpTimetableStore, MemoryTimetableStore, Settings, StorageMode,
    TimetableStore,
};

// Error handler
async fn handle_error(error: BoxError) -> (StatusCode, String) {
    if error.is::<tokio::time::error::Elapsed>() {
        (
            StatusCode::REQUEST_TIMEOUT,
            "Request took too long".to_string(),
        )
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Unhandled internal error: {}", error),
        )
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received interrupt signal, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing for logging, RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(err) => {
            error!("Invalid configuration: {}", err);
            process::exit(1);
        }
    };
    settings.log_summary();

    // Initialize the storage backend
    let store: Arc<dyn TimetableStore> = match &settings.storage {
        StorageMode::Http(api) => match HttpTimetableStore::new(api) {
            Ok(store) => Arc::new(store),
            Err(err) => {
                error!("Failed to initialize storage API client: {}", err);
                process::exit(1);
            }
        },
        StorageMode::Memory => Arc::new(MemoryTimetableStore::new()),
    };
    info!("Storage backend initialized");

    // Create shared application state
    let app_state = Arc::new(AppState::new(
        store,
        settings.reconciler,
        settings.refresh_after_save,
    ));

    if let Some(ttl) = settings.session_idle_ttl {
        app_state.spawn_session_sweeper(ttl, ttl.min(Duration::from_secs(60)));
    }

    let app = create_router(app_state).layer(
        ServiceBuilder::new()
            .layer(HandleErrorLayer::new(handle_error))
            .load_shed()
            .concurrency_limit(64)
            // saves run in their own task, so a timeout only drops the response
            .timeout(Duration::from_secs(30))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::new().allow_origin(Any)),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("Failed to bind to {}: {}", addr, err);
            process::exit(1);
        }
    };
    info!("Server listening on {}", addr);

    // Start server with graceful shutdown
    info!("Server is ready to accept connections");
    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", err);
        process::exit(1);
    }

    info!("Server has been gracefully shut down");
}
