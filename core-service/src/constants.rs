//! Central Configuration Constants
//!
//! Single source of truth for pipeline defaults.

pub use crate::logic::model::threshold::DECISION_THRESHOLD;

/// Maximum entries in an attribution list
pub const TOP_K_ATTRIBUTIONS: usize = 10;

/// Default neighborhood size for the local surrogate
pub const DEFAULT_LIME_SAMPLES: usize = 100;

/// Neighborhood size bounds (latency budget for interactive use)
pub const MIN_LIME_SAMPLES: usize = 10;
pub const MAX_LIME_SAMPLES: usize = 500;

/// Default sampling seed (fixed so repeated requests agree)
pub const DEFAULT_LIME_SEED: u64 = 42;

/// Supported model bundle format
pub const BUNDLE_FORMAT_VERSION: u8 = 1;

/// Crate version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "Cardio XAI";
