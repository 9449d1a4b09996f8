use std::sync::Arc;

use anyhow::Context;

use conference_mapper::config::Config;
use conference_mapper::http::routes::{self, AppState};
use conference_mapper::mapper::{ConferenceMapper, Sweeper};
use conference_mapper::registry::SqliteRegistry;
use conference_mapper::telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init()?;

    let config = Config::from_env().context("invalid configuration")?;
    let registry = SqliteRegistry::open(&config.db_path)
        .with_context(|| format!("cannot initialize database {}", config.db_path.display()))?;
    let registry = Arc::new(registry);

    let sweeper = Sweeper::new(Arc::clone(&registry), &config).spawn();
    let state = AppState { mapper: Arc::new(ConferenceMapper::new(registry, &config)) };
    let app = routes::router(state);

    let addr = config.server_addr();
    tracing::info!(
        %addr,
        db = %config.db_path.display(),
        digits = config.id_space.digits(),
        "listening"
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
