//! Explain Module - Attribution engines and the explanation aggregator
//!
//! - `tree_shap` - exact Shapley attributions over the forest's paths
//! - `lime` - local weighted-ridge surrogate over a sampled neighborhood
//! - `engine` - runs both, isolating each engine's failure

pub mod engine;
pub mod lime;
pub mod ridge;
pub mod tensor;
pub mod tree_shap;
pub mod types;

// Re-export common types
pub use engine::{explain_concurrent, explain_row, run_surrogate_engine, run_tree_engine};
pub use lime::{explain_lime, GaussianSampler, LimeConfig, LimeExplanation, NeighborhoodSampler};
pub use tensor::AttributionTensor;
pub use tree_shap::{explain_tree, TreeAttribution, TreeExplainer};
pub use types::{
    EngineKind, ExplainError, ExplanationResponse, FeatureContribution, SurrogateWeight,
};
