//! Local surrogate explanations (LIME, Ribeiro et al. 2016)
//!
//! Samples a Gaussian neighborhood around the instance, weights each sample
//! by proximity, and fits a weighted ridge model to the positive-class
//! probability. The surrogate's coefficients are the explanation.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};

use super::ridge::{fit_weighted_ridge, RidgeFit};
use super::types::{compare_magnitude, rank_top_k, ExplainError, SurrogateWeight};
use crate::constants::{DEFAULT_LIME_SAMPLES, DEFAULT_LIME_SEED, MAX_LIME_SAMPLES, MIN_LIME_SAMPLES};
use crate::logic::artifacts::FittedArtifacts;
use crate::logic::preprocess::TransformedRow;

// ============================================================================
// CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimeConfig {
    /// Neighborhood size, instance included
    pub num_samples: usize,
    /// Features kept in the surrogate
    pub num_features: usize,
    /// Kernel width; None means 0.75 * sqrt(width)
    pub kernel_width: Option<f64>,
    pub seed: u64,
    /// Ridge penalty of the selection fit
    pub selection_alpha: f64,
    /// Ridge penalty of the final surrogate
    pub ridge_alpha: f64,
}

impl Default for LimeConfig {
    fn default() -> Self {
        Self {
            num_samples: DEFAULT_LIME_SAMPLES,
            num_features: 10,
            kernel_width: None,
            seed: DEFAULT_LIME_SEED,
            selection_alpha: 0.01,
            ridge_alpha: 1.0,
        }
    }
}

impl LimeConfig {
    pub fn normalized(mut self) -> Self {
        self.num_samples = self.num_samples.clamp(MIN_LIME_SAMPLES, MAX_LIME_SAMPLES);
        self.num_features = self.num_features.max(1);
        self.kernel_width = self.kernel_width.filter(|w| w.is_finite() && *w > 0.0);
        if !(self.selection_alpha.is_finite() && self.selection_alpha >= 0.0) {
            self.selection_alpha = 0.01;
        }
        if !(self.ridge_alpha.is_finite() && self.ridge_alpha >= 0.0) {
            self.ridge_alpha = 1.0;
        }
        self
    }

    pub fn kernel_width_for(&self, width: usize) -> f64 {
        self.kernel_width.unwrap_or_else(|| 0.75 * (width as f64).sqrt())
    }
}

// ============================================================================
// NEIGHBORHOOD SAMPLING
// ============================================================================

/// Produces the perturbed neighborhood of an instance
///
/// Row 0 of the returned matrix must be the instance itself.
pub trait NeighborhoodSampler: Send + Sync {
    fn sample(
        &self,
        instance: ArrayView1<'_, f64>,
        scale: ArrayView1<'_, f64>,
        num_samples: usize,
        seed: u64,
    ) -> Result<Array2<f64>, ExplainError>;
}

/// instance + N(0, 1) * scale, per feature
#[derive(Debug, Clone, Copy, Default)]
pub struct GaussianSampler;

impl NeighborhoodSampler for GaussianSampler {
    fn sample(
        &self,
        instance: ArrayView1<'_, f64>,
        scale: ArrayView1<'_, f64>,
        num_samples: usize,
        seed: u64,
    ) -> Result<Array2<f64>, ExplainError> {
        if scale.len() != instance.len() {
            return Err(ExplainError::Sampler(format!(
                "scale has {} entries for {} features",
                scale.len(),
                instance.len()
            )));
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut data = Array2::zeros((num_samples.max(1), instance.len()));
        data.row_mut(0).assign(&instance);
        for mut row in data.outer_iter_mut().skip(1) {
            for (j, value) in row.iter_mut().enumerate() {
                let z: f64 = StandardNormal.sample(&mut rng);
                *value = instance[j] + z * scale[j];
            }
        }
        Ok(data)
    }
}

/// Per-feature standard deviation of the background (zero becomes 1)
pub fn neighborhood_scale(background: Option<ArrayView2<'_, f64>>, width: usize) -> Array1<f64> {
    match background {
        Some(bg) if bg.nrows() > 0 && bg.ncols() == width => bg
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s.is_finite() && s > 0.0 { s } else { 1.0 }),
        Some(bg) if bg.nrows() > 0 => {
            log::warn!(
                "Background width {} differs from row width {}, using unit scale",
                bg.ncols(),
                width
            );
            Array1::ones(width)
        }
        _ => Array1::ones(width),
    }
}

// ============================================================================
// EXPLANATION
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct LimeExplanation {
    /// Top weights by magnitude, descending
    pub weights: Vec<SurrogateWeight>,
    pub intercept: f64,
    /// Surrogate output at the instance
    pub local_prediction: f64,
    /// Weighted R² of the surrogate on its neighborhood
    pub score: f64,
}

pub fn explain_lime(
    artifacts: &FittedArtifacts,
    row: &TransformedRow,
    sampler: &dyn NeighborhoodSampler,
) -> Result<LimeExplanation, ExplainError> {
    let instance = row.instance().ok_or(ExplainError::EmptyInstance)?;
    let width = instance.len();
    if width == 0 {
        return Err(ExplainError::EmptyInstance);
    }
    let config = &artifacts.config().lime;

    let scale = neighborhood_scale(artifacts.background(), width);
    let data = sampler.sample(instance, scale.view(), config.num_samples, config.seed)?;
    if data.ncols() != width || data.nrows() == 0 {
        return Err(ExplainError::Sampler(format!(
            "neighborhood has shape {}x{}, expected rows of width {}",
            data.nrows(),
            data.ncols(),
            width
        )));
    }

    let proba = artifacts.model().predict_proba(data.view())?;
    if proba.dim() != (data.nrows(), 2) {
        return Err(ExplainError::Numerical(format!(
            "probability output has shape {}x{}, expected {}x2",
            proba.nrows(),
            proba.ncols(),
            data.nrows()
        )));
    }
    let labels = proba.column(1);

    // distances in scaled space, measured from the instance
    let scaled = (&data - &instance.insert_axis(Axis(0))) / &scale.view().insert_axis(Axis(0));
    let kernel_width = config.kernel_width_for(width);
    let weights = scaled.map_axis(Axis(1), |r| {
        let d2 = r.dot(&r);
        (-d2 / (kernel_width * kernel_width)).exp().sqrt()
    });

    let selected = select_features(scaled.view(), labels, weights.view(), config)?;
    let subset = scaled.select(Axis(1), &selected);
    let fit = fit_weighted_ridge(subset.view(), labels, weights.view(), config.ridge_alpha)?;
    let local_prediction = fit.predict(subset.row(0));

    log::debug!(
        "Surrogate fit: {} samples, {} features, score {:.4}",
        data.nrows(),
        selected.len(),
        fit.score
    );

    Ok(LimeExplanation {
        weights: surrogate_weights(row.feature_names(), &selected, &fit, config.num_features),
        intercept: fit.intercept,
        local_prediction,
        score: fit.score,
    })
}

/// Column indices kept for the final fit, in ascending order
fn select_features(
    scaled: ArrayView2<'_, f64>,
    labels: ArrayView1<'_, f64>,
    weights: ArrayView1<'_, f64>,
    config: &LimeConfig,
) -> Result<Vec<usize>, ExplainError> {
    let width = scaled.ncols();
    if width <= config.num_features {
        return Ok((0..width).collect());
    }

    let full = fit_weighted_ridge(scaled, labels, weights, config.selection_alpha)?;
    let mut order: Vec<usize> = (0..width).collect();
    // stable: equal magnitudes keep column order
    order.sort_by(|&a, &b| compare_magnitude(full.coefficients[b], full.coefficients[a]));
    let mut selected: Vec<usize> = order.into_iter().take(config.num_features).collect();
    selected.sort_unstable();
    Ok(selected)
}

fn surrogate_weights(
    names: &[String],
    selected: &[usize],
    fit: &RidgeFit,
    k: usize,
) -> Vec<SurrogateWeight> {
    let pairs = selected
        .iter()
        .zip(fit.coefficients.iter())
        .map(|(&j, &w)| {
            let name = names.get(j).cloned().unwrap_or_else(|| format!("x{}", j));
            (name, w)
        })
        .collect();

    rank_top_k(pairs, k)
        .into_iter()
        .map(|(feature, weight)| SurrogateWeight { feature, weight })
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
