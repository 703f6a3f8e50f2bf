//! Explanation pipeline configuration
//!
//! Immutable for the lifetime of the loaded artifacts; serde so it can be
//! read from a file or overridden by the server's environment.

use serde::{Deserialize, Serialize};

use crate::constants::TOP_K_ATTRIBUTIONS;
use crate::logic::explain::lime::LimeConfig;
use crate::logic::model::ThresholdConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplainConfig {
    /// Decision threshold applied by the caller of the predictor; fixed at
    /// 0.5 and never read from configuration input
    #[serde(skip)]
    pub threshold: ThresholdConfig,

    /// Maximum entries per attribution list
    pub top_k: usize,

    /// Local surrogate settings
    pub lime: LimeConfig,
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self {
            threshold: ThresholdConfig::default(),
            top_k: TOP_K_ATTRIBUTIONS,
            lime: LimeConfig::default(),
        }
    }
}

impl ExplainConfig {
    /// Clamp user-supplied values into their supported ranges
    pub fn normalized(mut self) -> Self {
        self.top_k = self.top_k.clamp(1, TOP_K_ATTRIBUTIONS);
        self.lime = self.lime.normalized();
        self
    }
}
