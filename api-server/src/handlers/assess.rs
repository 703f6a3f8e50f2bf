//! Prediction and explanation handlers

use std::sync::Arc;

use axum::{extract::State, Json};
use cardio_xai_core::logic::explain::explain_concurrent;
use cardio_xai_core::logic::prepare;
use cardio_xai_core::{
    assess_concurrent, predict, AttributeMap, Assessment, ExplanationResponse, GaussianSampler,
    PredictionResponse,
};
use serde::Deserialize;

use crate::{AppResult, AppState};

/// `{"payload": {...attribute map...}}`
#[derive(Debug, Deserialize)]
pub struct AssessRequest {
    pub payload: AttributeMap,
}

/// Probability and thresholded decision
pub async fn predict_risk(
    State(state): State<AppState>,
    Json(req): Json<AssessRequest>,
) -> AppResult<Json<PredictionResponse>> {
    let artifacts = Arc::clone(&state.artifacts);
    let prediction = tokio::task::spawn_blocking(move || predict(&artifacts, &req.payload)).await??;

    tracing::info!(
        probability = prediction.probability,
        decision = prediction.decision,
        "Prediction served"
    );
    Ok(Json(prediction))
}

/// Both attribution lists; engine failures are reported in the body
pub async fn explain_risk(
    State(state): State<AppState>,
    Json(req): Json<AssessRequest>,
) -> AppResult<Json<ExplanationResponse>> {
    let row = prepare(&state.artifacts, &req.payload)?;
    let explanation = explain_concurrent(
        Arc::clone(&state.artifacts),
        Arc::new(row),
        Arc::new(GaussianSampler),
        state.config.explain_timeout(),
    )
    .await;

    for notice in explanation.unavailable_notices() {
        tracing::warn!("{}", notice);
    }
    Ok(Json(explanation))
}

/// Prediction plus explanation in one response
pub async fn assess_risk(
    State(state): State<AppState>,
    Json(req): Json<AssessRequest>,
) -> AppResult<Json<Assessment>> {
    let assessment = assess_concurrent(
        Arc::clone(&state.artifacts),
        &req.payload,
        state.config.explain_timeout(),
    )
    .await?;

    tracing::info!(
        probability = assessment.prediction.probability,
        decision = assessment.prediction.decision,
        failed_engines = assessment.explanation.failed_engines().len(),
        "Assessment served"
    );
    Ok(Json(assessment))
}
