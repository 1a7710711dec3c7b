//! # Tally Server Entry Point
//!
//! ## Startup Sequence
//! 1. Initialize tracing (logging)
//! 2. Load configuration (env > file > defaults)
//! 3. Connect to database & run migrations
//! 4. Create state (Database, ChangeNotifier, SettlementPolicy)
//! 5. Serve until Ctrl+C / SIGTERM
//! 6. Close the database pool

use tally_db::{Database, DbConfig};
use tally_server::{app, init_tracing, AppState, ServerConfig};
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = ServerConfig::load()?;
    info!(
        bind_addr = %config.bind_addr,
        database = %config.database_path.display(),
        tax_rate_bps = config.tax_rate_bps,
        points_unit_cents = config.points_unit_cents,
        "Configuration loaded"
    );

    if let Some(dir) = config.database_path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }

    let db = Database::new(
        DbConfig::new(&config.database_path).max_connections(config.max_connections),
    )
    .await?;
    info!("Database connected and migrations applied");

    let bind_addr = config.bind_addr;
    let state = AppState::new(db.clone(), config);

    let listener = TcpListener::bind(bind_addr).await?;
    info!(addr = %bind_addr, "Tally server listening");

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
