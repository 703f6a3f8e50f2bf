//! Model Module - Risk predictor and fitted artifact loading
//!
//! - `inference` - forest classifier behind the [`RiskModel`] trait
//! - `threshold` - decision cutoff applied by the caller
//! - `bundle` - JSON bundle loading + validation

pub mod bundle;
pub mod inference;
pub mod threshold;

// Re-export common types
pub use bundle::{bundle_digest, load_bundle, BundleError, ModelBundle};
pub use inference::{Forest, ForestClassifier, InferenceError, Node, RiskModel, Tree};
pub use threshold::{PredictionResult, ThresholdConfig, DECISION_THRESHOLD};
