use axum::{
    routing::{delete, get, post},
    Router,
};
use std::net::SocketAddr;
use tokio::signal;

use netscan_backend::{config, handlers, middleware, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration first
    let config = config::Settings::new()?;

    // Initialize structured logging with configuration
    middleware::init_logging(&config.log_level, &config.log_format)?;

    tracing::info!("Starting Nmap Scanner API v{}", env!("CARGO_PKG_VERSION"));

    // Create application state with dependency injection
    let app_state = AppState::new(config.clone()).await?;

    // Scans fail fast without the binary, so surface the problem at startup
    if !app_state.scanner.is_available().await {
        tracing::warn!("nmap binary not found in PATH; scans will fail until it is installed");
    }

    // Create CORS layer with configuration
    let cors_layer = middleware::create_cors_layer(config.cors_allow_origins.clone());

    // Build our application with routes
    let app = Router::new()
        // Service info endpoints
        .route("/", get(handlers::root))
        .route("/api/health", get(handlers::health_check))
        // Scan endpoints
        .route("/api/scans", post(handlers::scan_handlers::create_scan))
        .route("/api/scans", get(handlers::scan_handlers::list_scans))
        .route("/api/scans/:id", get(handlers::scan_handlers::get_scan))
        .route("/api/scans/:id", delete(handlers::scan_handlers::delete_scan))
        .route("/api/scans/:id/cancel", post(handlers::scan_handlers::cancel_scan))
        .route("/api/scans/:id/results", get(handlers::scan_handlers::get_scan_results))
        .route("/api/scans/:id/logs", get(handlers::scan_handlers::get_scan_logs))
        // Template endpoints
        .route("/api/templates", post(handlers::template_handlers::create_template))
        .route("/api/templates", get(handlers::template_handlers::list_templates))
        .route("/api/templates/builtin", get(handlers::template_handlers::get_builtin_templates))
        .route("/api/templates/:id", get(handlers::template_handlers::get_template))
        .route("/api/templates/:id", delete(handlers::template_handlers::delete_template))
        // Report endpoints
        .route("/api/reports/:scan_id/json", get(handlers::report_handlers::get_json_report))
        .route("/api/reports/:scan_id/html", get(handlers::report_handlers::get_html_report))
        .route("/api/reports/:scan_id/csv", get(handlers::report_handlers::get_csv_report))
        .with_state(app_state.clone())
        // Apply middleware layers (global)
        .layer(axum::middleware::from_fn(middleware::request_logging_middleware))
        .layer(middleware::create_logging_layer())
        .layer(cors_layer);

    // Run the server with graceful shutdown
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Start server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop any scans still running before the process exits
    if let Err(e) = app_state.task_manager.shutdown().await {
        tracing::error!("Task manager shutdown failed: {}", e);
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Handle graceful shutdown signals
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
