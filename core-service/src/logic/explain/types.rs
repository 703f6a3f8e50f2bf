use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::logic::model::InferenceError;

// ============================================================================
// ATTRIBUTION ENTRIES
// ============================================================================

/// One tree-attribution entry (signed contribution to the positive class)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureContribution {
    pub feature: String,
    pub contribution: f64,
}

/// One local-surrogate entry (signed weight of the local linear model)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurrogateWeight {
    pub feature: String,
    pub weight: f64,
}

/// Which attribution engine produced (or failed to produce) a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    Tree,
    Surrogate,
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineKind::Tree => write!(f, "shap"),
            EngineKind::Surrogate => write!(f, "lime"),
        }
    }
}

// ============================================================================
// RESPONSE
// ============================================================================

/// Per-request explanation; each engine slot holds data or a failure reason
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExplanationResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shap: Option<Vec<FeatureContribution>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shap_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lime: Option<Vec<SurrogateWeight>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lime_error: Option<String>,
}

impl ExplanationResponse {
    /// Exactly one of data / error is set per engine
    pub fn from_outcomes(
        tree: Result<Vec<FeatureContribution>, ExplainError>,
        surrogate: Result<Vec<SurrogateWeight>, ExplainError>,
    ) -> Self {
        let (shap, shap_error) = split_outcome(tree);
        let (lime, lime_error) = split_outcome(surrogate);
        Self { shap, shap_error, lime, lime_error }
    }

    pub fn failed_engines(&self) -> Vec<EngineKind> {
        let mut failed = Vec::new();
        if self.shap_error.is_some() {
            failed.push(EngineKind::Tree);
        }
        if self.lime_error.is_some() {
            failed.push(EngineKind::Surrogate);
        }
        failed
    }

    /// "explanation unavailable for method X, reason: ..." lines
    pub fn unavailable_notices(&self) -> Vec<String> {
        [(EngineKind::Tree, &self.shap_error), (EngineKind::Surrogate, &self.lime_error)]
            .into_iter()
            .filter_map(|(kind, err)| {
                err.as_ref()
                    .map(|e| format!("explanation unavailable for method {}, reason: {}", kind, e))
            })
            .collect()
    }
}

fn split_outcome<T>(outcome: Result<T, ExplainError>) -> (Option<T>, Option<String>) {
    match outcome {
        Ok(value) => (Some(value), None),
        Err(err) => (None, Some(err.to_string())),
    }
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum ExplainError {
    #[error("model does not expose a tree ensemble")]
    NotTreeModel,

    #[error("model introspection failed: {0}")]
    Model(#[from] InferenceError),

    #[error("transformed row is empty")]
    EmptyInstance,

    #[error("neighborhood sampling failed: {0}")]
    Sampler(String),

    #[error("surrogate fit failed: {0}")]
    Numerical(String),

    #[error("timed out after {0} ms")]
    Timeout(u64),

    #[error("engine panicked: {0}")]
    Panicked(String),

    #[error("engine worker failed: {0}")]
    Worker(String),
}

// ============================================================================
// RANKING
// ============================================================================

/// Magnitude used for ranking; NaN sorts after every real value
fn magnitude(v: f64) -> f64 {
    if v.is_nan() {
        f64::NEG_INFINITY
    } else {
        v.abs()
    }
}

/// Keep the `k` largest-magnitude pairs, descending, ties in input order
pub fn rank_top_k(mut pairs: Vec<(String, f64)>, k: usize) -> Vec<(String, f64)> {
    // stable sort keeps input order among equal magnitudes
    pairs.sort_by(|a, b| magnitude(b.1).total_cmp(&magnitude(a.1)));
    pairs.truncate(k);
    pairs
}

pub fn compare_magnitude(a: f64, b: f64) -> Ordering {
    magnitude(a).total_cmp(&magnitude(b))
}
