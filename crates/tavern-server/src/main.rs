use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use tavern_core::Settings;
use tavern_server::{router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::from_env()?;
    if settings.api_key.is_none() && settings.provider == tavern_core::Provider::OpenAI {
        tracing::warn!("OPENAI_API_KEY is not set; requests will be sent without credentials");
    }

    let app = router(AppState::from_settings(&settings));

    let listener = tokio::net::TcpListener::bind(&settings.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", settings.bind_address))?;

    tracing::info!(
        address = %settings.bind_address,
        provider = settings.provider.display_name(),
        model = %settings.model,
        "tavern server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("shutting down");
}
