//! TreeSHAP explainer for the forest classifier.
//!
//! Path-dependent TreeSHAP (Lundberg et al., 2020): exact Shapley values over
//! decision paths in polynomial time. Child fractions come from node covers;
//! the same fractions define the expected value, so for every class
//! `expected + sum(contributions) == forest probability`.

use ndarray::{Array2, Array3, ArrayView1, ArrayView2};

use super::tensor::{pair_with_names, AttributionTensor};
use super::types::{rank_top_k, ExplainError, FeatureContribution};
use crate::logic::artifacts::FittedArtifacts;
use crate::logic::model::{Forest, Node};
use crate::logic::preprocess::TransformedRow;

// ============================================================================
// PATH BOOKKEEPING
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct PathElement {
    feature: Option<usize>,
    zero_fraction: f64,
    one_fraction: f64,
    pweight: f64,
}

fn extend_path(path: &mut Vec<PathElement>, zero_fraction: f64, one_fraction: f64, feature: Option<usize>) {
    let depth = path.len();
    path.push(PathElement {
        feature,
        zero_fraction,
        one_fraction,
        pweight: if depth == 0 { 1.0 } else { 0.0 },
    });

    let denom = (depth + 1) as f64;
    for i in (0..depth).rev() {
        path[i + 1].pweight += one_fraction * path[i].pweight * (i + 1) as f64 / denom;
        path[i].pweight = zero_fraction * path[i].pweight * (depth - i) as f64 / denom;
    }
}

/// Undo the extension of `path[index]`, removing it from the path
fn unwind_path(path: &mut Vec<PathElement>, index: usize) {
    let depth = path.len() - 1;
    let one_fraction = path[index].one_fraction;
    let zero_fraction = path[index].zero_fraction;
    let denom = (depth + 1) as f64;
    let mut next_one_portion = path[depth].pweight;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = path[i].pweight;
            path[i].pweight = next_one_portion * denom / ((i + 1) as f64 * one_fraction);
            next_one_portion = tmp - path[i].pweight * zero_fraction * (depth - i) as f64 / denom;
        } else {
            path[i].pweight = path[i].pweight * denom / (zero_fraction * (depth - i) as f64);
        }
    }

    for i in index..depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
    path.pop();
}

/// Total permutation weight of the path with `path[index]` unwound
fn unwound_path_sum(path: &[PathElement], index: usize) -> f64 {
    let depth = path.len() - 1;
    let one_fraction = path[index].one_fraction;
    let zero_fraction = path[index].zero_fraction;
    let mut next_one_portion = path[depth].pweight;
    let mut total = 0.0;

    if one_fraction != 0.0 {
        for i in (0..depth).rev() {
            let tmp = next_one_portion / ((i + 1) as f64 * one_fraction);
            total += tmp;
            next_one_portion = path[i].pweight - tmp * zero_fraction * (depth - i) as f64;
        }
    } else {
        for i in (0..depth).rev() {
            total += path[i].pweight / (zero_fraction * (depth - i) as f64);
        }
    }

    total * (depth + 1) as f64
}

// ============================================================================
// EXPLAINER
// ============================================================================

/// TreeSHAP explainer bound to one forest and one set of cover statistics
pub struct TreeExplainer<'a> {
    forest: &'a Forest,
    /// Per tree, per node
    covers: Vec<Vec<f64>>,
    /// Per class
    expected: Vec<f64>,
}

impl<'a> TreeExplainer<'a> {
    /// Covers come from `background` when given (rows routed through every
    /// tree), otherwise from the covers stored in the forest.
    pub fn new(forest: &'a Forest, background: Option<ArrayView2<'_, f64>>) -> Self {
        let covers = match background {
            Some(bg) if bg.nrows() > 0 => background_covers(forest, bg),
            _ => forest
                .trees
                .iter()
                .map(|t| t.nodes.iter().map(Node::cover).collect())
                .collect(),
        };

        let mut explainer = Self { forest, covers, expected: Vec::new() };
        explainer.expected = explainer.compute_expected();
        explainer
    }

    /// Expected forest output per class (the baseline)
    pub fn expected_value(&self) -> &[f64] {
        &self.expected
    }

    /// (left, right) mass split at a node; zero-cover nodes split evenly
    fn child_fractions(&self, tree: usize, left: usize, right: usize) -> (f64, f64) {
        let covers = &self.covers[tree];
        let (l, r) = (covers[left], covers[right]);
        let total = l + r;
        if total > 0.0 {
            (l / total, r / total)
        } else {
            (0.5, 0.5)
        }
    }

    fn compute_expected(&self) -> Vec<f64> {
        let n_classes = self.forest.n_classes;
        let mut expected = vec![0.0; n_classes];
        if self.forest.trees.is_empty() {
            return expected;
        }

        for t in 0..self.forest.trees.len() {
            self.expected_node(t, 0, 1.0, &mut expected);
        }
        let n = self.forest.trees.len() as f64;
        expected.iter_mut().for_each(|v| *v /= n);
        expected
    }

    fn expected_node(&self, tree: usize, node: usize, weight: f64, acc: &mut [f64]) {
        match &self.forest.trees[tree].nodes[node] {
            Node::Leaf { value, .. } => {
                for (a, v) in acc.iter_mut().zip(value) {
                    *a += weight * v;
                }
            }
            Node::Split { left, right, .. } => {
                let (fl, fr) = self.child_fractions(tree, *left, *right);
                self.expected_node(tree, *left, weight * fl, acc);
                self.expected_node(tree, *right, weight * fr, acc);
            }
        }
    }

    /// Contributions as an instances × features × classes tensor
    pub fn shap_values(&self, rows: ArrayView2<'_, f64>) -> AttributionTensor {
        let (n_rows, n_features) = rows.dim();
        let n_classes = self.forest.n_classes;
        let mut out = Array3::zeros((n_rows, n_features, n_classes));

        for (i, row) in rows.outer_iter().enumerate() {
            let phi = self.shap_for_row(row);
            out.slice_mut(ndarray::s![i, .., ..]).assign(&phi);
        }

        AttributionTensor::InstanceFeatureClass(out)
    }

    fn shap_for_row(&self, row: ArrayView1<'_, f64>) -> Array2<f64> {
        let mut phi = Array2::zeros((row.len(), self.forest.n_classes));
        if self.forest.trees.is_empty() {
            return phi;
        }

        let mut path = Vec::with_capacity(self.forest.max_depth() + 2);
        for t in 0..self.forest.trees.len() {
            path.clear();
            self.recurse(t, 0, row, &mut phi, &path, 1.0, 1.0, None);
        }

        phi /= self.forest.trees.len() as f64;
        phi
    }

    #[allow(clippy::too_many_arguments)]
    fn recurse(
        &self,
        tree: usize,
        node: usize,
        row: ArrayView1<'_, f64>,
        phi: &mut Array2<f64>,
        parent_path: &[PathElement],
        zero_fraction: f64,
        one_fraction: f64,
        feature: Option<usize>,
    ) {
        let mut path = parent_path.to_vec();
        extend_path(&mut path, zero_fraction, one_fraction, feature);

        match &self.forest.trees[tree].nodes[node] {
            Node::Leaf { value, .. } => {
                for i in 1..path.len() {
                    let el = path[i];
                    let Some(f) = el.feature.filter(|f| *f < phi.nrows()) else {
                        continue;
                    };
                    let scale = unwound_path_sum(&path, i) * (el.one_fraction - el.zero_fraction);
                    for (c, v) in value.iter().enumerate().take(phi.ncols()) {
                        phi[[f, c]] += scale * v;
                    }
                }
            }
            Node::Split { feature: split, threshold, left, right, .. } => {
                let x = row.get(*split).copied().unwrap_or(f64::NAN);
                let goes_left = x <= *threshold;
                let (hot, cold) = if goes_left { (*left, *right) } else { (*right, *left) };
                let (fl, fr) = self.child_fractions(tree, *left, *right);
                let (hot_fraction, cold_fraction) = if goes_left { (fl, fr) } else { (fr, fl) };

                // a feature already on the path is merged, not repeated
                let mut incoming_zero = 1.0;
                let mut incoming_one = 1.0;
                if let Some(k) = (1..path.len()).find(|&k| path[k].feature == Some(*split)) {
                    incoming_zero = path[k].zero_fraction;
                    incoming_one = path[k].one_fraction;
                    unwind_path(&mut path, k);
                }

                // branches with no mass contribute nothing
                let hot_zero = hot_fraction * incoming_zero;
                if hot_zero > 0.0 || incoming_one > 0.0 {
                    self.recurse(tree, hot, row, phi, &path, hot_zero, incoming_one, Some(*split));
                }
                let cold_zero = cold_fraction * incoming_zero;
                if cold_zero > 0.0 {
                    self.recurse(tree, cold, row, phi, &path, cold_zero, 0.0, Some(*split));
                }
            }
        }
    }
}

/// Route every background row through every tree, counting node visits
fn background_covers(forest: &Forest, background: ArrayView2<'_, f64>) -> Vec<Vec<f64>> {
    forest
        .trees
        .iter()
        .map(|tree| {
            let mut covers = vec![0.0; tree.nodes.len()];
            for row in background.outer_iter() {
                let mut idx = 0;
                for _ in 0..tree.nodes.len() {
                    covers[idx] += 1.0;
                    match &tree.nodes[idx] {
                        Node::Split { feature, threshold, left, right, .. } => {
                            let x = row.get(*feature).copied().unwrap_or(f64::NAN);
                            idx = if x <= *threshold { *left } else { *right };
                        }
                        Node::Leaf { .. } => break,
                    }
                }
            }
            covers
        })
        .collect()
}

// ============================================================================
// ENGINE ENTRY POINT
// ============================================================================

/// Tree attribution result with its baseline
#[derive(Debug, Clone, PartialEq)]
pub struct TreeAttribution {
    pub contributions: Vec<FeatureContribution>,
    pub base_value: f64,
}

/// Exact attribution for one transformed row, top `top_k` by magnitude
pub fn explain_tree(
    artifacts: &FittedArtifacts,
    row: &TransformedRow,
    top_k: usize,
) -> Result<TreeAttribution, ExplainError> {
    let forest = artifacts.model().tree_ensemble().ok_or(ExplainError::NotTreeModel)?;
    if row.instance().is_none() {
        return Err(ExplainError::EmptyInstance);
    }
    forest.validate(row.width())?;

    let explainer = TreeExplainer::new(forest, artifacts.background());
    let tensor = explainer.shap_values(row.matrix());
    let values = tensor.positive_class().to_vec();
    log::debug!("Tree attribution: {} tensor, {} values", tensor.shape_label(), values.len());

    let ranked = rank_top_k(pair_with_names(row.feature_names(), &values), top_k);
    let base_value = explainer.expected_value().get(1).copied().unwrap_or(0.0);

    Ok(TreeAttribution {
        contributions: ranked
            .into_iter()
            .map(|(feature, contribution)| FeatureContribution { feature, contribution })
            .collect(),
        base_value,
    })
}

// ============================================================================
// TESTS
// ============================================================================
