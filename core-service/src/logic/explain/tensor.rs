//! Attribution tensor shapes and their normalization
//!
//! Attribution backends disagree on output layout. Every supported layout is
//! a variant here, with one normalization rule each, so the reduction to a
//! single positive-class vector stays exhaustive.

use ndarray::{s, Array1, Array2, Array3, ArrayD, Axis};

/// Index of the positive class in two-class outputs
const POSITIVE_CLASS: usize = 1;

#[derive(Debug, Clone, PartialEq)]
pub enum AttributionTensor {
    /// One instances × features matrix per class
    PerClass(Vec<Array2<f64>>),
    /// instances × features × classes
    InstanceFeatureClass(Array3<f64>),
    /// instances × features (single output)
    InstanceFeature(Array2<f64>),
    /// Anything else, assumed already aligned once flattened
    Other(ArrayD<f64>),
}

impl AttributionTensor {
    /// Reduce to a 1-D contribution vector for the first instance and the
    /// positive class. Never fails; degenerate inputs give short or empty
    /// vectors.
    pub fn positive_class(&self) -> Array1<f64> {
        match self {
            AttributionTensor::PerClass(per_class) if per_class.len() == 2 => {
                first_row(&per_class[POSITIVE_CLASS])
            }
            AttributionTensor::PerClass(per_class) => per_class
                .iter()
                .flat_map(|m| m.iter().copied())
                .collect(),
            AttributionTensor::InstanceFeatureClass(t) => {
                let (instances, _, classes) = t.dim();
                if instances == 0 || classes == 0 {
                    return Array1::zeros(0);
                }
                let class = POSITIVE_CLASS.min(classes - 1);
                t.slice(s![0, .., class]).to_owned()
            }
            AttributionTensor::InstanceFeature(m) => first_row(m),
            AttributionTensor::Other(t) => t.iter().copied().collect(),
        }
    }

    pub fn shape_label(&self) -> &'static str {
        match self {
            AttributionTensor::PerClass(_) => "per-class",
            AttributionTensor::InstanceFeatureClass(_) => "instance×feature×class",
            AttributionTensor::InstanceFeature(_) => "instance×feature",
            AttributionTensor::Other(_) => "other",
        }
    }
}

fn first_row(m: &Array2<f64>) -> Array1<f64> {
    if m.nrows() == 0 {
        return Array1::zeros(0);
    }
    m.index_axis(Axis(0), 0).to_owned()
}

/// Pair names with values positionally, truncating both to the shorter one
pub fn pair_with_names(names: &[String], values: &[f64]) -> Vec<(String, f64)> {
    if names.len() != values.len() {
        log::warn!(
            "Attribution width mismatch: {} names vs {} values, truncating to {}",
            names.len(),
            values.len(),
            names.len().min(values.len())
        );
    }
    names
        .iter()
        .zip(values.iter())
        .map(|(n, v)| (n.clone(), *v))
        .collect()
}
