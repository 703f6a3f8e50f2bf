//! Explanation Aggregator - runs both attribution engines, isolates failures
//!
//! Never fails as a whole: each engine's error, panic or timeout becomes a
//! reason string in its own response slot.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::lime::{explain_lime, NeighborhoodSampler};
use super::tree_shap::explain_tree;
use super::types::{EngineKind, ExplainError, ExplanationResponse, FeatureContribution, SurrogateWeight};
use crate::logic::artifacts::FittedArtifacts;
use crate::logic::preprocess::TransformedRow;

// ============================================================================
// ENGINE RUNNERS
// ============================================================================

pub fn run_tree_engine(
    artifacts: &FittedArtifacts,
    row: &TransformedRow,
) -> Result<Vec<FeatureContribution>, ExplainError> {
    let top_k = artifacts.config().top_k;
    guarded(EngineKind::Tree, || {
        explain_tree(artifacts, row, top_k).map(|attribution| attribution.contributions)
    })
}

pub fn run_surrogate_engine(
    artifacts: &FittedArtifacts,
    row: &TransformedRow,
    sampler: &dyn NeighborhoodSampler,
) -> Result<Vec<SurrogateWeight>, ExplainError> {
    guarded(EngineKind::Surrogate, || {
        explain_lime(artifacts, row, sampler).map(|explanation| explanation.weights)
    })
}

/// Time an engine and turn a panic into that engine's failure
fn guarded<T, F>(kind: EngineKind, engine: F) -> Result<T, ExplainError>
where
    F: FnOnce() -> Result<T, ExplainError>,
{
    let started = Instant::now();
    let outcome = catch_unwind(AssertUnwindSafe(engine))
        .unwrap_or_else(|payload| Err(ExplainError::Panicked(panic_message(payload.as_ref()))));

    log::debug!("{} engine finished in {:?}", kind, started.elapsed());
    if let Err(e) = &outcome {
        log::warn!("{} explanation unavailable: {}", kind, e);
    }
    outcome
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// ============================================================================
// AGGREGATION
// ============================================================================

/// Run both engines in sequence on the calling thread
pub fn explain_row(
    artifacts: &FittedArtifacts,
    row: &TransformedRow,
    sampler: &dyn NeighborhoodSampler,
) -> ExplanationResponse {
    ExplanationResponse::from_outcomes(
        run_tree_engine(artifacts, row),
        run_surrogate_engine(artifacts, row, sampler),
    )
}

/// Run both engines on blocking workers, each bounded by `timeout`
///
/// A timed-out worker is abandoned, not cancelled; its result is dropped.
pub async fn explain_concurrent(
    artifacts: Arc<FittedArtifacts>,
    row: Arc<TransformedRow>,
    sampler: Arc<dyn NeighborhoodSampler>,
    timeout: Duration,
) -> ExplanationResponse {
    let tree = {
        let artifacts = Arc::clone(&artifacts);
        let row = Arc::clone(&row);
        tokio::task::spawn_blocking(move || run_tree_engine(&artifacts, &row))
    };
    let surrogate =
        tokio::task::spawn_blocking(move || run_surrogate_engine(&artifacts, &row, sampler.as_ref()));

    let (tree, surrogate) = tokio::join!(
        await_engine(EngineKind::Tree, tree, timeout),
        await_engine(EngineKind::Surrogate, surrogate, timeout),
    );
    ExplanationResponse::from_outcomes(tree, surrogate)
}

async fn await_engine<T>(
    kind: EngineKind,
    handle: tokio::task::JoinHandle<Result<T, ExplainError>>,
    timeout: Duration,
) -> Result<T, ExplainError> {
    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(join_err)) => {
            let err = if join_err.is_panic() {
                ExplainError::Panicked(panic_message(join_err.into_panic().as_ref()))
            } else {
                ExplainError::Worker(join_err.to_string())
            };
            log::warn!("{} explanation unavailable: {}", kind, err);
            Err(err)
        }
        Err(_) => {
            let err = ExplainError::Timeout(timeout.as_millis() as u64);
            log::warn!("{} explanation unavailable: {}", kind, err);
            Err(err)
        }
    }
}
