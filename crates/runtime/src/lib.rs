use anyhow::{Context, Result};
use sqlx::SqlitePool;
use teamhub_config::AppConfig;
use teamhub_database::initialize_database;
use teamhub_gateway::{create_router, GatewayState};
use tokio::net::TcpListener;
use tracing::info;

pub mod telemetry {
    use anyhow::Result;
    use tracing::Level;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    pub fn init_tracing() -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = SubscriberBuilder::default()
            .with_max_level(Level::DEBUG)
            .with_env_filter(env_filter)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

#[derive(Clone)]
pub struct BackendServices {
    pub db_pool: SqlitePool,
    pub state: GatewayState,
}

impl BackendServices {
    /// Open the store, apply migrations and wire the gateway state.
    pub async fn initialise(config: &AppConfig) -> Result<Self> {
        let db_pool = initialize_database(&config.database)
            .await
            .context("failed to initialise database")?;

        tokio::fs::create_dir_all(&config.uploads.dir)
            .await
            .with_context(|| format!("failed to create upload directory {}", config.uploads.dir))?;

        let state = GatewayState::new(db_pool.clone(), config.uploads.clone(), &config.realtime);

        info!(upload_dir = %config.uploads.dir, "backend services ready");

        Ok(Self { db_pool, state })
    }
}

/// Serve the gateway on `listener` until `shutdown` resolves.
///
/// Realtime connections are closed as soon as the signal fires so that
/// upgraded sockets do not hold the graceful drain open.
pub async fn serve<F>(listener: TcpListener, services: BackendServices, shutdown: F) -> Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let hub = services.state.hub.clone();
    let app = create_router(services.state);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            hub.shutdown();
        })
        .await
        .context("http server error")?;

    info!("backend shut down");
    Ok(())
}

pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
