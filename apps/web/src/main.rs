use anyhow::{Context, Result};
use shelfmark_platform_client::{PlatformClient, PlatformConfig};
use shelfmark_web::build_router;
use shelfmark_web::config::Config;
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let mut platform_config = PlatformConfig::new(&config.platform_url, &config.platform_key);
    platform_config.timeout_ms = config.platform_timeout_ms;
    let platform = PlatformClient::new(platform_config).context("building platform client")?;

    let bind_addr = config.bind_addr;
    let app = build_router(config, platform);

    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("binding {bind_addr}"))?;
    info!(%bind_addr, "shelfmark web listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        error!(%error, "failed to install shutdown handler");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
