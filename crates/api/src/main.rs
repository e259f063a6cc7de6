use std::sync::Arc;

use anyhow::Context;

use stockflow_infra::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stockflow_observability::init();

    let config = Config::from_env().context("invalid configuration")?;
    let services = stockflow_api::app::services::build_services(&config)
        .await
        .context("failed to initialize stores")?;

    let app = stockflow_api::app::build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
