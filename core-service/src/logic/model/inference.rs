//! Inference Engine - Random forest classifier
//!
//! Forest stored as flat per-tree node arrays (pre-order, children always
//! after their parent). Probability = mean of leaf class distributions.

use ndarray::{Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum InferenceError {
    #[error("forest has no trees")]
    EmptyForest,

    #[error("forest must have at least two classes, got {0}")]
    ClassCount(usize),

    #[error("tree {tree}: {reason}")]
    MalformedTree { tree: usize, reason: String },

    #[error("row has {actual} features, model expects {expected}")]
    Width { expected: usize, actual: usize },

    #[error("model produced an invalid probability: {0}")]
    InvalidProbability(f64),

    #[error("probability output has shape {rows}x{cols}, expected {expected_rows}x2")]
    OutputShape { rows: usize, cols: usize, expected_rows: usize },
}

// ============================================================================
// MODEL TRAIT
// ============================================================================

/// Fitted binary classifier as seen by the pipeline
pub trait RiskModel: Send + Sync {
    /// Probability of the positive class for one transformed row
    fn predict_positive(&self, row: ArrayView1<'_, f64>) -> Result<f64, InferenceError>;

    /// Two-column class-probability rows for a batch
    fn predict_proba(&self, rows: ArrayView2<'_, f64>) -> Result<Array2<f64>, InferenceError>;

    /// Tree structure for exact attribution (None if the model is opaque)
    fn tree_ensemble(&self) -> Option<&Forest> {
        None
    }
}

// ============================================================================
// TREE STRUCTURE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        #[serde(default)]
        cover: f64,
    },
    Leaf {
        value: Vec<f64>,
        #[serde(default)]
        cover: f64,
    },
}

impl Node {
    pub fn cover(&self) -> f64 {
        match self {
            Node::Split { cover, .. } | Node::Leaf { cover, .. } => *cover,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    /// Leaf index reached by `row` (`x <= threshold` goes left, NaN goes right)
    pub fn leaf_index(&self, row: ArrayView1<'_, f64>) -> usize {
        let mut idx = 0;
        // bounded walk: an unvalidated tree must not spin forever
        for _ in 0..self.nodes.len() {
            match self.nodes.get(idx) {
                Some(Node::Split { feature, threshold, left, right, .. }) => {
                    let x = row.get(*feature).copied().unwrap_or(f64::NAN);
                    idx = if x <= *threshold { *left } else { *right };
                }
                _ => break,
            }
        }
        idx
    }

    pub fn leaf_value(&self, row: ArrayView1<'_, f64>) -> &[f64] {
        match self.nodes.get(self.leaf_index(row)) {
            Some(Node::Leaf { value, .. }) => value,
            _ => &[],
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize, budget: usize) -> usize {
            match nodes.get(idx) {
                Some(Node::Split { left, right, .. }) if budget > 0 => {
                    1 + walk(nodes, *left, budget - 1).max(walk(nodes, *right, budget - 1))
                }
                _ => 1,
            }
        }
        walk(&self.nodes, 0, self.nodes.len())
    }

    fn validate(&self, tree: usize, n_features: usize, n_classes: usize) -> Result<(), InferenceError> {
        let malformed = |reason: String| InferenceError::MalformedTree { tree, reason };

        if self.nodes.is_empty() {
            return Err(malformed("no nodes".to_string()));
        }

        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Split { feature, threshold, left, right, cover } => {
                    if *feature >= n_features {
                        return Err(malformed(format!(
                            "node {} splits on feature {} of {}",
                            idx, feature, n_features
                        )));
                    }
                    if threshold.is_nan() {
                        return Err(malformed(format!("node {} has NaN threshold", idx)));
                    }
                    // pre-order layout guarantees termination
                    for child in [left, right] {
                        if *child <= idx || *child >= self.nodes.len() {
                            return Err(malformed(format!("node {} has invalid child {}", idx, child)));
                        }
                    }
                    if !(cover.is_finite() && *cover >= 0.0) {
                        return Err(malformed(format!("node {} has invalid cover", idx)));
                    }
                }
                Node::Leaf { value, cover } => {
                    if value.len() != n_classes {
                        return Err(malformed(format!(
                            "leaf {} has {} class values, expected {}",
                            idx,
                            value.len(),
                            n_classes
                        )));
                    }
                    if value.iter().any(|v| !v.is_finite()) {
                        return Err(malformed(format!("leaf {} has non-finite value", idx)));
                    }
                    if !(cover.is_finite() && *cover >= 0.0) {
                        return Err(malformed(format!("leaf {} has invalid cover", idx)));
                    }
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forest {
    pub n_classes: usize,
    pub trees: Vec<Tree>,
}

impl Forest {
    /// Structural checks against the transformed feature width
    pub fn validate(&self, n_features: usize) -> Result<(), InferenceError> {
        if self.n_classes < 2 {
            return Err(InferenceError::ClassCount(self.n_classes));
        }
        if self.trees.is_empty() {
            return Err(InferenceError::EmptyForest);
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(i, n_features, self.n_classes)?;
        }
        Ok(())
    }

    pub fn max_depth(&self) -> usize {
        self.trees.iter().map(Tree::depth).max().unwrap_or(0)
    }

    /// Mean of leaf class distributions over all trees
    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> Vec<f64> {
        let mut out = vec![0.0; self.n_classes];
        if self.trees.is_empty() {
            return out;
        }
        for tree in &self.trees {
            for (acc, v) in out.iter_mut().zip(tree.leaf_value(row)) {
                *acc += v;
            }
        }
        let n = self.trees.len() as f64;
        out.iter_mut().for_each(|v| *v /= n);
        out
    }
}

// ============================================================================
// FOREST CLASSIFIER
// ============================================================================

/// Validated forest bound to a transformed feature width
#[derive(Debug, Clone)]
pub struct ForestClassifier {
    forest: Forest,
    n_features: usize,
}

impl ForestClassifier {
    pub fn new(forest: Forest, n_features: usize) -> Result<Self, InferenceError> {
        forest.validate(n_features)?;
        Ok(Self { forest, n_features })
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn tree_count(&self) -> usize {
        self.forest.trees.len()
    }

    fn check_width(&self, width: usize) -> Result<(), InferenceError> {
        if width != self.n_features {
            return Err(InferenceError::Width { expected: self.n_features, actual: width });
        }
        Ok(())
    }

    fn positive(&self, row: ArrayView1<'_, f64>) -> Result<f64, InferenceError> {
        let p = self.forest.predict_row(row).get(1).copied().unwrap_or(f64::NAN);
        if !p.is_finite() || !(-1e-9..=1.0 + 1e-9).contains(&p) {
            return Err(InferenceError::InvalidProbability(p));
        }
        Ok(p.clamp(0.0, 1.0))
    }
}

impl RiskModel for ForestClassifier {
    fn predict_positive(&self, row: ArrayView1<'_, f64>) -> Result<f64, InferenceError> {
        self.check_width(row.len())?;
        self.positive(row)
    }

    fn predict_proba(&self, rows: ArrayView2<'_, f64>) -> Result<Array2<f64>, InferenceError> {
        self.check_width(rows.ncols())?;
        let mut out = Array2::zeros((rows.nrows(), 2));
        for (i, row) in rows.outer_iter().enumerate() {
            let p = self.positive(row)?;
            out[[i, 0]] = 1.0 - p;
            out[[i, 1]] = p;
        }
        Ok(out)
    }

    fn tree_ensemble(&self) -> Option<&Forest> {
        Some(&self.forest)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn stump(feature: usize, threshold: f64, low: f64, high: f64) -> Tree {
        Tree {
            nodes: vec![
                Node::Split { feature, threshold, left: 1, right: 2, cover: 10.0 },
                Node::Leaf { value: vec![1.0 - low, low], cover: 5.0 },
                Node::Leaf { value: vec![1.0 - high, high], cover: 5.0 },
            ],
        }
    }

    fn forest() -> Forest {
        Forest {
            n_classes: 2,
            trees: vec![stump(0, 0.5, 0.2, 0.8), stump(1, 0.0, 0.1, 0.9)],
        }
    }

    #[test]
    fn test_routing() {
        let t = stump(0, 0.5, 0.2, 0.8);
        assert_eq!(t.leaf_index(array![0.5, 0.0].view()), 1);
        assert_eq!(t.leaf_index(array![0.6, 0.0].view()), 2);
        assert_eq!(t.leaf_index(array![f64::NAN, 0.0].view()), 2);
        assert_eq!(t.depth(), 2);
    }

    #[test]
    fn test_forest_probability_is_tree_mean() {
        let clf = ForestClassifier::new(forest(), 2).unwrap();
        let p = clf.predict_positive(array![1.0, -1.0].view()).unwrap();
        assert!((p - 0.45).abs() < 1e-12);
    }

    #[test]
    fn test_predict_proba_two_columns() {
        let clf = ForestClassifier::new(forest(), 2).unwrap();
        let out = clf.predict_proba(array![[0.0, 0.0], [1.0, 1.0]].view()).unwrap();
        assert_eq!(out.dim(), (2, 2));
        assert!((out[[0, 1]] - 0.15).abs() < 1e-12);
        assert!((out[[1, 1]] - 0.85).abs() < 1e-12);
        assert!((out[[1, 0]] + out[[1, 1]] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_width_mismatch() {
        let clf = ForestClassifier::new(forest(), 2).unwrap();
        let err = clf.predict_positive(array![1.0].view()).unwrap_err();
        assert!(matches!(err, InferenceError::Width { expected: 2, actual: 1 }));
    }

    #[test]
    fn test_validate_rejects_back_edges() {
        let mut f = forest();
        f.trees[0].nodes[0] = Node::Split { feature: 0, threshold: 0.5, left: 0, right: 2, cover: 1.0 };
        assert!(matches!(f.validate(2), Err(InferenceError::MalformedTree { tree: 0, .. })));
    }

    #[test]
    fn test_validate_rejects_feature_out_of_range() {
        assert!(matches!(forest().validate(1), Err(InferenceError::MalformedTree { tree: 1, .. })));
    }

    #[test]
    fn test_validate_rejects_bad_leaf() {
        let mut f = forest();
        f.trees[1].nodes[2] = Node::Leaf { value: vec![1.0], cover: 1.0 };
        assert!(f.validate(2).is_err());
        assert!(matches!(
            Forest { n_classes: 2, trees: vec![] }.validate(2),
            Err(InferenceError::EmptyForest)
        ));
    }

    #[test]
    fn test_invalid_probability() {
        let f = Forest { n_classes: 2, trees: vec![stump(0, 0.5, 1.5, 1.5)] };
        let clf = ForestClassifier::new(f, 1).unwrap();
        assert!(matches!(
            clf.predict_positive(array![0.0].view()),
            Err(InferenceError::InvalidProbability(_))
        ));
    }

    #[test]
    fn test_node_serde_shape() {
        let json = r#"[{"type":"split","feature":0,"threshold":0.5,"left":1,"right":2,"cover":4},
                       {"type":"leaf","value":[0.9,0.1],"cover":2}]"#;
        let nodes: Vec<Node> = serde_json::from_str(json).unwrap();
        assert_eq!(nodes[0].cover(), 4.0);
        assert!(matches!(&nodes[1], Node::Leaf { value, .. } if value == &vec![0.9, 0.1]));
    }
}
