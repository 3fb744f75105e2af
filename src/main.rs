use std::env;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ktpscan::config::Config;
use ktpscan::handlers::{create_router, AppState};
use ktpscan::services::{IdentityService, OcrSpaceClient};

const DEFAULT_LOG_FILTER: &str = "ktpscan=debug,tower_http=debug,axum::rejection=trace";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    init_tracing();

    let config = Config::from_env()?;

    tracing::info!("Starting ktpscan identity card service");
    tracing::info!("Compression ceiling: {} bytes", config.max_image_bytes);
    tracing::info!("OCR endpoint: {} (timeout {}s)", config.ocr_api_url, config.ocr_timeout_seconds);

    let ocr = OcrSpaceClient::new(&config).context("Failed to create OCR client")?;
    let identity = IdentityService::new(&config, Arc::new(ocr));

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let app = create_router(AppState::new(config, identity));

    tracing::info!("Server listening on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

    let json = env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init();
    }
}
