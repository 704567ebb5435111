//! apiprobe Run API server - binary entry point

use apiprobe_core::ProbeConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "apiprobe=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ProbeConfig::load(None)?;
    tracing::info!(
        provider = %config.llm.provider,
        port = config.server.port,
        "Starting apiprobe Run API"
    );

    apiprobe_web::serve(&config).await?;

    Ok(())
}
