//! Configuration module

use std::env;
use std::time::Duration;

use cardio_xai_core::constants::{DEFAULT_LIME_SAMPLES, DEFAULT_LIME_SEED};
use cardio_xai_core::{ExplainConfig, LimeConfig};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Model bundle JSON
    pub bundle_path: String,

    /// Expected hex SHA-256 of the bundle (verified at startup when set)
    pub bundle_sha256: Option<String>,

    /// Server port
    pub port: u16,

    /// Per-engine explanation budget in milliseconds
    pub explain_timeout_ms: u64,

    /// Local surrogate neighborhood size
    pub lime_num_samples: usize,

    /// Local surrogate sampling seed
    pub lime_seed: u64,

    /// Environment (development, production)
    pub environment: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bundle_path: "core-service/models/demo_bundle.json".to_string(),
            bundle_sha256: None,
            port: 8000,
            explain_timeout_ms: 5000,
            lime_num_samples: DEFAULT_LIME_SAMPLES,
            lime_seed: DEFAULT_LIME_SEED,
            environment: "development".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            bundle_path: env::var("MODEL_BUNDLE_PATH").unwrap_or(defaults.bundle_path),

            bundle_sha256: env::var("MODEL_BUNDLE_SHA256")
                .ok()
                .filter(|s| !s.trim().is_empty()),

            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),

            explain_timeout_ms: env::var("EXPLAIN_TIMEOUT_MS")
                .ok()
                .and_then(|t| t.parse().ok())
                .unwrap_or(defaults.explain_timeout_ms),

            lime_num_samples: env::var("LIME_NUM_SAMPLES")
                .ok()
                .and_then(|n| n.parse().ok())
                .unwrap_or(defaults.lime_num_samples),

            lime_seed: env::var("LIME_SEED")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.lime_seed),

            environment: env::var("ENVIRONMENT").unwrap_or(defaults.environment),
        }
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn explain_timeout(&self) -> Duration {
        Duration::from_millis(self.explain_timeout_ms)
    }

    /// Core pipeline settings derived from the environment
    pub fn explain_config(&self) -> ExplainConfig {
        ExplainConfig {
            lime: LimeConfig {
                num_samples: self.lime_num_samples,
                seed: self.lime_seed,
                ..LimeConfig::default()
            },
            ..ExplainConfig::default()
        }
        .normalized()
    }
}
