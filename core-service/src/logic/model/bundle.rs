//! Model bundle - single JSON artifact holding every fitted piece
//!
//! Schema, preprocessor, forest and background rows are validated against
//! each other before a [`FittedArtifacts`] is handed out.

use std::fs;
use std::path::Path;

use chrono::Utc;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::inference::{Forest, ForestClassifier, InferenceError};
use crate::constants::BUNDLE_FORMAT_VERSION;
use crate::logic::artifacts::{FittedArtifacts, ModelMetadata};
use crate::logic::config::ExplainConfig;
use crate::logic::features::{FeatureSchema, LayoutMismatchError};
use crate::logic::preprocess::{ColumnTransformer, FeatureTransform, PreprocessorSpec, TransformError};

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("cannot read bundle: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse bundle: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("bundle checksum mismatch: expected {expected}, got {actual}")]
    Checksum { expected: String, actual: String },

    #[error("unsupported bundle format version {0}")]
    UnsupportedFormat(u8),

    #[error("feature schema is empty")]
    EmptySchema,

    #[error("feature '{0}' appears twice in the schema")]
    DuplicateFeature(String),

    #[error(transparent)]
    Layout(#[from] LayoutMismatchError),

    #[error("invalid preprocessor: {0}")]
    Transform(#[from] TransformError),

    #[error("invalid forest: {0}")]
    Model(#[from] InferenceError),

    #[error("background row {row} has {actual} values, expected {expected}")]
    Background { row: usize, expected: usize, actual: usize },
}

// ============================================================================
// BUNDLE FORMAT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaSection {
    pub features: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout_hash: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BundleMetadata {
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub trained_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelBundle {
    pub format_version: u8,
    pub schema: SchemaSection,
    pub preprocessor: PreprocessorSpec,
    pub forest: Forest,
    #[serde(default)]
    pub background: Option<Vec<Vec<f64>>>,
    #[serde(default)]
    pub metadata: BundleMetadata,
}

impl ModelBundle {
    pub fn from_json_str(json: &str) -> Result<Self, BundleError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, BundleError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Validate every section and build the immutable artifacts
    pub fn into_artifacts(self, config: ExplainConfig) -> Result<FittedArtifacts, BundleError> {
        self.into_artifacts_with(config, "<memory>".to_string(), None)
    }

    fn into_artifacts_with(
        self,
        config: ExplainConfig,
        source: String,
        sha256: Option<String>,
    ) -> Result<FittedArtifacts, BundleError> {
        if self.format_version != BUNDLE_FORMAT_VERSION {
            return Err(BundleError::UnsupportedFormat(self.format_version));
        }

        let schema = FeatureSchema::new(self.schema.features);
        if schema.is_empty() {
            return Err(BundleError::EmptySchema);
        }
        if let Some(dup) = schema.first_duplicate() {
            return Err(BundleError::DuplicateFeature(dup.to_string()));
        }
        if let Some(recorded) = self.schema.layout_hash {
            schema.validate_hash(recorded)?;
        }

        let transform = ColumnTransformer::new(&schema, self.preprocessor)?;
        let width = transform.feature_names_out().len();
        let model = ForestClassifier::new(self.forest, width)?;

        let background = match self.background {
            Some(rows) => Some(background_matrix(rows, width)?),
            None => None,
        };

        let metadata = ModelMetadata {
            model_name: self.metadata.model_name.unwrap_or_else(|| "random_forest".to_string()),
            source,
            sha256,
            trained_at: self.metadata.trained_at,
            loaded_at: Utc::now(),
        };

        log::info!(
            "Model bundle ready: {} ({} schema features -> {} model features, {} trees, background: {})",
            metadata.model_name,
            schema.len(),
            width,
            model.tree_count(),
            background.as_ref().map(|b: &Array2<f64>| b.nrows()).unwrap_or(0),
        );

        let mut artifacts = FittedArtifacts::new(schema, transform, model)
            .with_config(config)
            .with_metadata(metadata);
        if let Some(bg) = background {
            artifacts = artifacts.with_background(bg);
        }
        Ok(artifacts)
    }
}

fn background_matrix(rows: Vec<Vec<f64>>, width: usize) -> Result<Array2<f64>, BundleError> {
    let n = rows.len();
    let mut flat = Vec::with_capacity(n * width);
    for (i, row) in rows.into_iter().enumerate() {
        if row.len() != width || row.iter().any(|v| !v.is_finite()) {
            return Err(BundleError::Background { row: i, expected: width, actual: row.len() });
        }
        flat.extend(row);
    }
    Array2::from_shape_vec((n, width), flat)
        .map_err(|_| BundleError::Background { row: 0, expected: width, actual: 0 })
}

/// Hex SHA-256 of the raw bundle bytes
pub fn bundle_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Load bundle from disk, verifying the digest when one is expected
pub fn load_bundle(
    path: &Path,
    expected_sha256: Option<&str>,
    config: ExplainConfig,
) -> Result<FittedArtifacts, BundleError> {
    log::info!("Loading model bundle from: {}", path.display());

    let bytes = fs::read(path)?;
    let digest = bundle_digest(&bytes);

    if let Some(expected) = expected_sha256 {
        if !expected.trim().eq_ignore_ascii_case(&digest) {
            return Err(BundleError::Checksum {
                expected: expected.trim().to_string(),
                actual: digest,
            });
        }
    }

    ModelBundle::from_json_slice(&bytes)?.into_artifacts_with(
        config,
        path.display().to_string(),
        Some(digest),
    )
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const DEMO: &str = include_str!("../../../models/demo_bundle.json");

    #[test]
    fn test_demo_bundle_loads() {
        let artifacts = ModelBundle::from_json_str(DEMO)
            .unwrap()
            .into_artifacts(ExplainConfig::default())
            .unwrap();
        assert_eq!(artifacts.schema().len(), 8);
        assert_eq!(artifacts.transform().feature_names_out().len(), 12);
        assert!(artifacts.model().tree_ensemble().is_some());
        assert!(artifacts.background().is_some());
    }

    #[test]
    fn test_layout_hash_mismatch() {
        let mut bundle = ModelBundle::from_json_str(DEMO).unwrap();
        bundle.schema.layout_hash = Some(0xdead_beef);
        let err = bundle.into_artifacts(ExplainConfig::default()).unwrap_err();
        assert!(matches!(err, BundleError::Layout(_)));
    }

    #[test]
    fn test_layout_hash_recorded_matches() {
        let mut bundle = ModelBundle::from_json_str(DEMO).unwrap();
        let hash = FeatureSchema::new(bundle.schema.features.clone()).layout_hash();
        bundle.schema.layout_hash = Some(hash);
        assert!(bundle.into_artifacts(ExplainConfig::default()).is_ok());
    }

    #[test]
    fn test_rejects_unknown_format() {
        let mut bundle = ModelBundle::from_json_str(DEMO).unwrap();
        bundle.format_version = 9;
        assert!(matches!(
            bundle.into_artifacts(ExplainConfig::default()),
            Err(BundleError::UnsupportedFormat(9))
        ));
    }

    #[test]
    fn test_rejects_duplicate_feature() {
        let mut bundle = ModelBundle::from_json_str(DEMO).unwrap();
        bundle.schema.features.push("age".to_string());
        assert!(matches!(
            bundle.into_artifacts(ExplainConfig::default()),
            Err(BundleError::DuplicateFeature(name)) if name == "age"
        ));
    }

    #[test]
    fn test_rejects_short_background_row() {
        let mut bundle = ModelBundle::from_json_str(DEMO).unwrap();
        bundle.background = Some(vec![vec![0.0; 3]]);
        assert!(matches!(
            bundle.into_artifacts(ExplainConfig::default()),
            Err(BundleError::Background { row: 0, expected: 12, actual: 3 })
        ));
    }

    #[test]
    fn test_load_from_disk_with_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.json");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(DEMO.as_bytes()).unwrap();
        drop(file);

        let digest = bundle_digest(DEMO.as_bytes());
        let artifacts = load_bundle(&path, Some(&digest.to_uppercase()), ExplainConfig::default()).unwrap();
        assert_eq!(artifacts.metadata().sha256.as_deref(), Some(digest.as_str()));
        assert!(artifacts.metadata().source.ends_with("bundle.json"));

        let err = load_bundle(&path, Some("00ff"), ExplainConfig::default()).unwrap_err();
        assert!(matches!(err, BundleError::Checksum { .. }));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_bundle(&dir.path().join("nope.json"), None, ExplainConfig::default()).unwrap_err();
        assert!(matches!(err, BundleError::Io(_)));
    }
}
