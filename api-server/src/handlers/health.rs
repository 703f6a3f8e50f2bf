//! Health check handler

use axum::{extract::State, Json};
use cardio_xai_core::logic::features::LayoutInfo;
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    model_loaded: bool,
    model_name: String,
    features: Vec<String>,
    layout: LayoutInfo,
    timestamp: i64,
}

pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        model_loaded: true,
        model_name: state.artifacts.metadata().model_name.clone(),
        features: state.artifacts.schema().names().to_vec(),
        layout: LayoutInfo::from(state.artifacts.schema()),
        timestamp: chrono::Utc::now().timestamp(),
    })
}
