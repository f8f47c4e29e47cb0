use anyhow::Context;
use powerbill::config::{Config, StorageBackend};
use powerbill::domain::auth::ApiKeyAuthenticator;
use powerbill::domain::shared::SystemClock;
use powerbill::infrastructure::persistence::InMemoryStore;
use powerbill::interface::api::{build_router, init_metrics, AppState, Repositories};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "postgres")]
use powerbill::infrastructure::persistence::{
    create_pool, run_migrations, PgBillRepository, PgCustomerRepository, PgPaymentRepository,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!("Starting Powerbill billing service");
    info!("Storage backend: {:?}", config.storage);

    let repositories = build_repositories(&config).await?;

    if config.auth.api_keys.is_empty() {
        warn!("No API keys configured; authenticated routes will reject every request");
    }
    let authenticator = Arc::new(ApiKeyAuthenticator::from_entries(&config.auth.api_keys));

    let state = AppState::new(
        repositories,
        authenticator,
        config.billing.tariff.clone(),
        config.billing.filters.clone(),
        Arc::new(SystemClock),
    );

    let prometheus_handle = init_metrics().context("failed to install metrics recorder")?;
    let app = build_router(state, prometheus_handle);

    let address = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {}", address))?;
    info!("REST API listening on http://{}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Powerbill stopped");
    Ok(())
}

async fn build_repositories(config: &Config) -> anyhow::Result<Repositories> {
    match config.storage {
        StorageBackend::Memory => {
            info!("Using in-memory storage");
            let store = Arc::new(InMemoryStore::new());
            Ok(Repositories {
                customers: store.clone(),
                bills: store.clone(),
                payments: store,
            })
        }
        #[cfg(feature = "postgres")]
        StorageBackend::Postgres => {
            info!("Initializing database connection...");
            let pool = create_pool(&config.database).await?;
            run_migrations(&pool).await?;

            Ok(Repositories {
                customers: Arc::new(PgCustomerRepository::new(pool.clone())),
                bills: Arc::new(PgBillRepository::new(pool.clone())),
                payments: Arc::new(PgPaymentRepository::new(pool)),
            })
        }
        #[cfg(not(feature = "postgres"))]
        StorageBackend::Postgres => {
            anyhow::bail!("postgres storage requested but the `postgres` feature is disabled")
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
