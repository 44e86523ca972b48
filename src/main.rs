use std::{net::SocketAddr, time::Duration};

use axum::{extract::Request, ServiceExt};
use crudbase::{build_app, load_config, AppState, Database};
use tokio::{net::TcpListener, signal};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("crudbase=info,tower_http=info")),
        )
        .init();

    let config = load_config()?;
    tracing::debug!("Loaded configuration:\n{}", config);

    let db = Database::new(&config);
    db.initialize(
        config.database.connect_retries,
        Duration::from_secs(config.database.connect_retry_delay_secs),
    )
    .await?;

    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&db.pool()?).await?;
        tracing::info!("Migrations applied.");
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let app = build_app(AppState::new(db.clone(), config));

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Application started for process {} on {}", std::process::id(), addr);

    axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    tracing::info!("Application shutdown complete.");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl-C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received.");
}
