//! Feature Schema - Ordered training-time feature layout
//!
//! **This type controls column order for every downstream step.**
//!
//! ## Rules:
//! 1. The schema is fixed when the model is trained.
//! 2. Order and cardinality never change for the lifetime of a process.
//! 3. Any change to names or order changes the layout hash.

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};

// ============================================================================
// SCHEMA VERSION
// ============================================================================

/// Current schema layout format version.
/// Included in the layout hash so bundles from other formats never validate.
pub const SCHEMA_FORMAT_VERSION: u8 = 1;

// ============================================================================
// FEATURE SCHEMA
// ============================================================================

/// Ordered sequence of feature identifiers fixed at training time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    features: Vec<String>,
}

impl FeatureSchema {
    pub fn new<I, S>(features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            features: features.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.features
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.features.iter().map(String::as_str)
    }

    /// Get feature index by name (O(n) but schemas are small)
    pub fn feature_index(&self, name: &str) -> Option<usize> {
        self.features.iter().position(|n| n == name)
    }

    /// Get feature name by index
    pub fn feature_name(&self, index: usize) -> Option<&str> {
        self.features.get(index).map(String::as_str)
    }

    /// CRC32 over format version + names, used to detect layout drift
    pub fn layout_hash(&self) -> u32 {
        let mut hasher = Hasher::new();
        hasher.update(&[SCHEMA_FORMAT_VERSION]);

        for name in &self.features {
            hasher.update(name.as_bytes());
            hasher.update(&[0]); // Separator
        }

        hasher.finalize()
    }

    /// Validate an externally recorded hash against this schema
    pub fn validate_hash(&self, recorded: u32) -> Result<(), LayoutMismatchError> {
        let actual = self.layout_hash();
        if actual != recorded {
            return Err(LayoutMismatchError {
                expected_hash: recorded,
                actual_hash: actual,
                feature_count: self.len(),
            });
        }
        Ok(())
    }

    /// Duplicate names would make assembly ambiguous
    pub fn first_duplicate(&self) -> Option<&str> {
        self.features
            .iter()
            .enumerate()
            .find(|(i, name)| self.features[..*i].contains(name))
            .map(|(_, name)| name.as_str())
    }
}

// ============================================================================
// LAYOUT INFO
// ============================================================================

/// Layout summary for logging and the health endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutInfo {
    pub version: u8,
    pub hash: u32,
    pub feature_count: usize,
    pub feature_names: Vec<String>,
}

impl From<&FeatureSchema> for LayoutInfo {
    fn from(schema: &FeatureSchema) -> Self {
        Self {
            version: SCHEMA_FORMAT_VERSION,
            hash: schema.layout_hash(),
            feature_count: schema.len(),
            feature_names: schema.names().to_vec(),
        }
    }
}

/// Error when a recorded layout hash doesn't match the schema
#[derive(Debug, Clone, thiserror::Error)]
#[error("Feature layout mismatch: bundle recorded hash {expected_hash:08x}, schema of {feature_count} features hashes to {actual_hash:08x}")]
pub struct LayoutMismatchError {
    pub expected_hash: u32,
    pub actual_hash: u32,
    pub feature_count: usize,
}

// ============================================================================
// TESTS
// ============================================================================
