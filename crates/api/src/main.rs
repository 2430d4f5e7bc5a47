use std::sync::Arc;

use anyhow::Context;

use stockline_api::app::{self, AppServices};
use stockline_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("loading configuration")?;
    stockline_observability::init(&config.log);

    let bind_addr = config.server.bind_addr.clone();
    let services = Arc::new(AppServices::from_config(config)?);
    let workers = services.start_workers().context("starting background workers")?;

    let app = app::build_app(services);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    tracing::info!(addr = %listener.local_addr()?, workers = ?workers.names(), "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("shutting down workers");
    tokio::task::spawn_blocking(move || workers.shutdown()).await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
