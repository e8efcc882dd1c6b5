//! Application entry point.

use std::sync::Arc;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use secrecy::ExposeSecret;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use credit_ledger::api::create_router;
use credit_ledger::app::AppState;
use credit_ledger::config::{Config, LogFormat};
use credit_ledger::infra::{PostgresClient, PostgresConfig};

fn init_tracing(log_level: &str, format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{log_level},tower_http=debug,sqlx=warn"))
    });

    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let config = Config::from_env().context("Failed to load configuration")?;
    init_tracing(&config.log_level, config.log_format);

    info!("Credit Ledger v{}", env!("CARGO_PKG_VERSION"));

    let db_config = PostgresConfig {
        max_connections: config.db_max_connections,
        ..PostgresConfig::default()
    };
    let postgres_client = PostgresClient::new(config.database_url.expose_secret(), db_config)
        .await
        .context("Failed to connect to PostgreSQL")?;
    if config.run_migrations {
        postgres_client.run_migrations().await?;
        info!("Database connected and migrations applied");
    } else {
        warn!("Database connected, migrations skipped (RUN_MIGRATIONS=false)");
    }
    let postgres_client = Arc::new(postgres_client);

    info!(
        max_attempts = config.retry_policy.max_attempts,
        deadline_secs = config.retry_policy.deadline.as_secs(),
        "Write-conflict retry policy"
    );
    let app_state = AppState::new(Arc::clone(&postgres_client) as _)
        .with_retry_policy(config.retry_policy)
        .with_max_body_bytes(config.max_body_bytes);
    let router = create_router(Arc::new(app_state));

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("Server starting on http://{}", addr);
    info!("OpenAPI spec at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    postgres_client.close().await;
    info!("Server shutdown complete");
    Ok(())
}
