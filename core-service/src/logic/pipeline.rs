//! Pipeline - attribute map in, prediction and explanation out
//!
//! Every call takes the fitted artifacts explicitly. Prediction failures are
//! fatal and returned as [`PredictionFailure`]; explanation failures never
//! are, they land in the response's per-engine error slots.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::logic::artifacts::FittedArtifacts;
use crate::logic::explain::{
    explain_concurrent, explain_row, ExplanationResponse, GaussianSampler, NeighborhoodSampler,
};
use crate::logic::features::{assemble, unknown_keys, AttributeMap};
use crate::logic::model::{InferenceError, PredictionResult};
use crate::logic::preprocess::{TransformError, TransformedRow};

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum PredictionFailure {
    #[error("preprocessing failed: {0}")]
    Transform(#[from] TransformError),

    #[error("prediction failed: {0}")]
    Inference(#[from] InferenceError),
}

// ============================================================================
// RESPONSES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub probability: f64,
    pub decision: u8,
    pub threshold: f64,
    /// Schema identifiers, in schema order
    pub features_used: Vec<String>,
}

impl PredictionResponse {
    pub fn result(&self) -> PredictionResult {
        PredictionResult {
            probability: self.probability,
            decision: self.decision,
            threshold: self.threshold,
        }
    }

    pub fn is_high_risk(&self) -> bool {
        self.decision == 1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub prediction: PredictionResponse,
    pub explanation: ExplanationResponse,
}

// ============================================================================
// OPERATIONS
// ============================================================================

/// Assemble against the schema and transform into model space
pub fn prepare(
    artifacts: &FittedArtifacts,
    attributes: &AttributeMap,
) -> Result<TransformedRow, PredictionFailure> {
    let schema = artifacts.schema();

    let ignored = unknown_keys(schema, attributes);
    if !ignored.is_empty() {
        log::debug!("Ignoring {} unknown attribute(s): {}", ignored.len(), ignored.join(", "));
    }

    let assembled = assemble(schema, attributes);
    log::info!("Assembled row: {} of {} attributes missing", assembled.missing_count(), schema.len());
    log::debug!("Assembled row: {}", assembled.to_log_entry(schema));

    Ok(artifacts.transform().transform(&assembled)?)
}

fn predict_prepared(
    artifacts: &FittedArtifacts,
    row: &TransformedRow,
) -> Result<PredictionResponse, PredictionFailure> {
    let instance = row
        .instance()
        .ok_or(InferenceError::OutputShape { rows: 0, cols: row.width(), expected_rows: 1 })?;
    let probability = artifacts.model().predict_positive(instance)?;
    let result = PredictionResult::from_probability(probability, &artifacts.config().threshold);

    log::debug!("Prediction: p={:.4} decision={}", result.probability, result.decision);

    Ok(PredictionResponse {
        probability: result.probability,
        decision: result.decision,
        threshold: result.threshold,
        features_used: artifacts.schema().names().to_vec(),
    })
}

pub fn predict(
    artifacts: &FittedArtifacts,
    attributes: &AttributeMap,
) -> Result<PredictionResponse, PredictionFailure> {
    let row = prepare(artifacts, attributes)?;
    predict_prepared(artifacts, &row)
}

/// Only a transform failure is fatal here; engine failures are recorded
pub fn explain(
    artifacts: &FittedArtifacts,
    attributes: &AttributeMap,
) -> Result<ExplanationResponse, PredictionFailure> {
    explain_with(artifacts, attributes, &GaussianSampler)
}

pub fn explain_with(
    artifacts: &FittedArtifacts,
    attributes: &AttributeMap,
    sampler: &dyn NeighborhoodSampler,
) -> Result<ExplanationResponse, PredictionFailure> {
    let row = prepare(artifacts, attributes)?;
    Ok(explain_row(artifacts, &row, sampler))
}

/// Prediction first; no explanation is attempted without one
pub fn assess(artifacts: &FittedArtifacts, attributes: &AttributeMap) -> Result<Assessment, PredictionFailure> {
    assess_with(artifacts, attributes, &GaussianSampler)
}

pub fn assess_with(
    artifacts: &FittedArtifacts,
    attributes: &AttributeMap,
    sampler: &dyn NeighborhoodSampler,
) -> Result<Assessment, PredictionFailure> {
    let row = prepare(artifacts, attributes)?;
    let prediction = predict_prepared(artifacts, &row)?;
    let explanation = explain_row(artifacts, &row, sampler);
    log_unavailable(&explanation);
    Ok(Assessment { prediction, explanation })
}

/// Like [`assess`], with both engines on blocking workers under `timeout`
pub async fn assess_concurrent(
    artifacts: Arc<FittedArtifacts>,
    attributes: &AttributeMap,
    timeout: Duration,
) -> Result<Assessment, PredictionFailure> {
    assess_concurrent_with(artifacts, attributes, timeout, Arc::new(GaussianSampler)).await
}

pub async fn assess_concurrent_with(
    artifacts: Arc<FittedArtifacts>,
    attributes: &AttributeMap,
    timeout: Duration,
    sampler: Arc<dyn NeighborhoodSampler>,
) -> Result<Assessment, PredictionFailure> {
    let row = prepare(&artifacts, attributes)?;
    let prediction = predict_prepared(&artifacts, &row)?;
    let explanation = explain_concurrent(artifacts, Arc::new(row), sampler, timeout).await;
    log_unavailable(&explanation);
    Ok(Assessment { prediction, explanation })
}

fn log_unavailable(explanation: &ExplanationResponse) {
    for notice in explanation.unavailable_notices() {
        log::info!("{}", notice);
    }
}
