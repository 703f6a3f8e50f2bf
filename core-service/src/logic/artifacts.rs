//! Fitted artifacts passed explicitly into every pipeline call
//!
//! Schema, transform, predictor, background rows and config are loaded once
//! and never mutated; share them across requests behind an `Arc`.

use chrono::{DateTime, Utc};
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::logic::config::ExplainConfig;
use crate::logic::features::FeatureSchema;
use crate::logic::model::RiskModel;
use crate::logic::preprocess::FeatureTransform;

/// Model metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_name: String,
    pub source: String,
    pub sha256: Option<String>,
    pub trained_at: Option<String>,
    pub loaded_at: DateTime<Utc>,
}

impl Default for ModelMetadata {
    fn default() -> Self {
        Self {
            model_name: "unnamed".to_string(),
            source: "<memory>".to_string(),
            sha256: None,
            trained_at: None,
            loaded_at: Utc::now(),
        }
    }
}

pub struct FittedArtifacts {
    schema: FeatureSchema,
    transform: Box<dyn FeatureTransform>,
    model: Box<dyn RiskModel>,
    background: Option<Array2<f64>>,
    config: ExplainConfig,
    metadata: ModelMetadata,
}

impl FittedArtifacts {
    pub fn new<T, M>(schema: FeatureSchema, transform: T, model: M) -> Self
    where
        T: FeatureTransform + 'static,
        M: RiskModel + 'static,
    {
        Self {
            schema,
            transform: Box::new(transform),
            model: Box::new(model),
            background: None,
            config: ExplainConfig::default(),
            metadata: ModelMetadata::default(),
        }
    }

    /// Background rows in transformed space (empty matrices are ignored)
    pub fn with_background(mut self, background: Array2<f64>) -> Self {
        self.background = (background.nrows() > 0).then_some(background);
        self
    }

    pub fn with_config(mut self, config: ExplainConfig) -> Self {
        self.config = config.normalized();
        self
    }

    pub fn with_metadata(mut self, metadata: ModelMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn transform(&self) -> &dyn FeatureTransform {
        self.transform.as_ref()
    }

    pub fn model(&self) -> &dyn RiskModel {
        self.model.as_ref()
    }

    pub fn background(&self) -> Option<ArrayView2<'_, f64>> {
        self.background.as_ref().map(|b| b.view())
    }

    pub fn config(&self) -> &ExplainConfig {
        &self.config
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }
}

impl std::fmt::Debug for FittedArtifacts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FittedArtifacts")
            .field("schema", &self.schema)
            .field("output_features", &self.transform.feature_names_out().len())
            .field("tree_model", &self.model.tree_ensemble().is_some())
            .field("background_rows", &self.background.as_ref().map(|b| b.nrows()))
            .field("config", &self.config)
            .field("metadata", &self.metadata)
            .finish()
    }
}
