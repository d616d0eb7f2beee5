//! Commerce Service entry point.

use commerce_service::startup::Application;
use service_core::config::Settings;
use service_core::observability::{init_tracing, init_tracing_with_otlp};
use tokio::signal;

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load configuration
    let settings = Settings::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        std::io::Error::other(format!("Configuration error: {}", e))
    })?;

    // Initialize tracing, with OTLP export when an endpoint is configured
    match settings.otlp_endpoint.as_deref() {
        Some(endpoint) => {
            init_tracing_with_otlp(&settings.service_name, &settings.log_level, endpoint)
        }
        None => init_tracing(&settings.log_level),
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        port = %settings.port,
        db_max_connections = %settings.database.max_connections,
        db_min_connections = %settings.database.min_connections,
        "Starting commerce-service"
    );

    // Build and run application
    let app = Application::build(settings).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to build application");
        std::io::Error::other(format!("Application build error: {}", e))
    })?;

    // Run with graceful shutdown
    tokio::select! {
        result = app.run_until_stopped() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Application error");
                return Err(e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("Graceful shutdown initiated");
        }
    }

    tracing::info!("Service shutdown complete");
    Ok(())
}
