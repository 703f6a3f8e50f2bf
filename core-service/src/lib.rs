//! Cardio XAI Core - heart-disease risk prediction with explanations
//!
//! Load a model bundle once into [`FittedArtifacts`], then call
//! [`predict`], [`explain`] or [`assess`] per request.

pub mod constants;
pub mod logic;

pub use logic::explain::{
    EngineKind, ExplainError, ExplanationResponse, FeatureContribution, GaussianSampler,
    LimeConfig, NeighborhoodSampler, SurrogateWeight,
};
pub use logic::features::{AttributeMap, AttributeValue, FeatureSchema};
pub use logic::model::{load_bundle, BundleError, ModelBundle, PredictionResult};
pub use logic::{
    assess, assess_concurrent, explain, predict, Assessment, ExplainConfig, FittedArtifacts,
    PredictionFailure, PredictionResponse,
};
