use std::sync::Arc;

use anyhow::Context;

use vista_api::app::services::{self, Backends};
use vista_api::config::AppConfig;
use vista_infra::{CreditPricing, db};

const DB_MAX_CONNECTIONS: u32 = 10;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    vista_observability::init(&config.tracing());

    let backends = match config.database_url.as_deref() {
        Some(url) => {
            let pool = db::connect(url, DB_MAX_CONNECTIONS)
                .await
                .context("failed to connect to Postgres")?;
            db::ensure_schema(&pool)
                .await
                .context("failed to apply schema")?;
            Backends::postgres(pool, config.ledger)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory stores");
            Backends::in_memory(config.ledger)
        }
    };

    let services = Arc::new(services::build_services(
        backends,
        services::provider_registry(&config),
        CreditPricing::default(),
    ));
    services
        .jobs
        .recover_interrupted()
        .await
        .context("failed to recover interrupted jobs")?;
    let app = vista_api::app::build_app(services.clone());

    let listener = tokio::net::TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr()))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!(in_flight = services.dispatcher.in_flight(), "draining jobs");
    services.dispatcher.close_and_drain().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
