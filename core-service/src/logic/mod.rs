//! Logic Module - Prediction pipeline & explanation engines
//!
//! ## Layout
//! - `features/` - Schema + attribute map assembly
//! - `preprocess/` - Fitted column transform
//! - `model/` - Forest predictor, threshold, bundle loading
//! - `explain/` - Tree attribution, local surrogate, aggregator
//! - `pipeline` - predict / explain / assess over [`FittedArtifacts`]

pub mod artifacts;
pub mod config;
pub mod explain;
pub mod features;
pub mod model;
pub mod pipeline;
pub mod preprocess;

#[cfg(test)]
mod tests;

pub use artifacts::{FittedArtifacts, ModelMetadata};
pub use config::ExplainConfig;
pub use pipeline::{
    assess, assess_concurrent, assess_concurrent_with, assess_with, explain, explain_with, predict,
    prepare, Assessment, PredictionFailure, PredictionResponse,
};
