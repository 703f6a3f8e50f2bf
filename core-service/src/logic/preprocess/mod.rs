//! Preprocess Module - Fitted transform from assembled rows to model space
//!
//! The core only depends on [`FeatureTransform`]; [`ColumnTransformer`] is
//! the concrete fitted transform shipped inside the model bundle.

pub mod transform;

pub use transform::{
    CategoricalColumn, ColumnTransformer, FeatureTransform, NumericColumn, PreprocessorSpec,
    TransformError, TransformedRow,
};
