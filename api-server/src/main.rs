//! Cardio XAI API Server - entry point
//!
//! Loads the model bundle once, then serves predictions and explanations.

use std::net::SocketAddr;
use std::path::Path;

use anyhow::Context;
use cardio_xai_api::{create_router, AppState, Config};
use cardio_xai_core::load_bundle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    // Initialize logging (core `log` records are bridged)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cardio_xai_api=debug,cardio_xai_core=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Cardio XAI API starting ({})...", config.environment);
    tracing::info!("Model bundle: {}", config.bundle_path);

    let artifacts = load_bundle(
        Path::new(&config.bundle_path),
        config.bundle_sha256.as_deref(),
        config.explain_config(),
    )
    .with_context(|| format!("failed to load model bundle {}", config.bundle_path))?;

    if config.is_production() && config.bundle_sha256.is_none() {
        tracing::warn!("MODEL_BUNDLE_SHA256 not set, bundle integrity is unchecked");
    }

    // Build router
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let app = create_router(AppState::new(artifacts, config));

    // Start server
    tracing::info!("Server listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
