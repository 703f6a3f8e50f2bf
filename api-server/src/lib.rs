//! Cardio XAI API Server
//!
//! Thin HTTP surface over `cardio-xai-core`.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     CARDIO XAI API                       │
//! ├──────────────────────────────────────────────────────────┤
//! │  /predict ──► assemble ► transform ► forest ► threshold  │
//! │  /explain ──► assemble ► transform ┬► TreeSHAP  ─┐       │
//! │                                    └► LIME      ─┴► agg  │
//! │  /assess  ──► predict, then explain (timeout per engine) │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::{
    extract::Request,
    routing::{get, post},
    Router,
};
use cardio_xai_core::FittedArtifacts;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use config::Config;
pub use error::{AppError, AppResult};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub artifacts: Arc<FittedArtifacts>,
    pub config: Config,
}

impl AppState {
    pub fn new(artifacts: FittedArtifacts, config: Config) -> Self {
        Self { artifacts: Arc::new(artifacts), config }
    }
}

/// Create the main router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::check))
        .route("/predict", post(handlers::assess::predict_risk))
        .route("/explain", post(handlers::assess::explain_risk))
        .route("/assess", post(handlers::assess::assess_risk))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            let request_id = uuid::Uuid::new_v4();
            tracing::info_span!(
                "request",
                %request_id,
                method = %request.method(),
                uri = %request.uri()
            )
        }))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
