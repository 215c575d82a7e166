use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use oidc_provider_core::config::Config;
use oidc_provider_core::create_app;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.logging.level.clone())))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let app = create_app(&config).await?;

    let listener = tokio::net::TcpListener::bind(&config.server_addr()).await?;
    tracing::info!(issuer = %config.oauth.issuer, addr = %config.server_addr(), "oidc provider listening");

    axum::serve(listener, app).await?;

    Ok(())
}
