//! Column transform: imputation, scaling and one-hot expansion
//!
//! Output layout follows the fitted column transformer:
//! all numeric columns first (`num__<name>`), then every category of every
//! categorical column (`cat__<name>_<category>`).

use ndarray::{Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::logic::features::{AssembledRow, AttributeValue, FeatureSchema, Slot};

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransformError {
    #[error("preprocessor column '{0}' is not part of the feature schema")]
    UnknownColumn(String),

    #[error("column '{column}' expects a number, got {value}")]
    NotNumeric { column: String, value: String },

    #[error("column '{column}' has non-finite fitted statistics")]
    InvalidStatistics { column: String },

    #[error("categorical column '{0}' has no categories")]
    EmptyVocabulary(String),

    #[error("row has {actual} slots, transform was fitted on {expected}")]
    RowWidth { expected: usize, actual: usize },
}

// ============================================================================
// TRANSFORM TRAIT
// ============================================================================

/// Fitted preprocessing transform (deterministic for a fixed fitted state)
pub trait FeatureTransform: Send + Sync {
    /// Assembled row → 1×n dense matrix plus output feature names
    fn transform(&self, row: &AssembledRow) -> Result<TransformedRow, TransformError>;

    /// Output feature names, obtainable without transforming anything
    fn feature_names_out(&self) -> Vec<String>;
}

/// Dense transformed row with its ordered output names
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedRow {
    matrix: Array2<f64>,
    feature_names: Vec<String>,
}

impl TransformedRow {
    pub fn new(matrix: Array2<f64>, feature_names: Vec<String>) -> Self {
        Self { matrix, feature_names }
    }

    pub fn matrix(&self) -> ArrayView2<'_, f64> {
        self.matrix.view()
    }

    /// First (and normally only) instance
    pub fn instance(&self) -> Option<ArrayView1<'_, f64>> {
        (self.matrix.nrows() > 0).then(|| self.matrix.row(0))
    }

    pub fn width(&self) -> usize {
        self.matrix.ncols()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }
}

// ============================================================================
// FITTED STATE
// ============================================================================

/// Median imputation + standard scaling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericColumn {
    pub name: String,
    pub median: f64,
    pub mean: f64,
    pub scale: f64,
}

/// Most-frequent imputation + one-hot with unknown categories ignored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalColumn {
    pub name: String,
    pub most_frequent: String,
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreprocessorSpec {
    #[serde(default)]
    pub numeric: Vec<NumericColumn>,
    #[serde(default)]
    pub categorical: Vec<CategoricalColumn>,
}

#[derive(Debug, Clone)]
struct Bound<C> {
    column: C,
    slot: usize,
}

/// Concrete fitted transform bound to a schema
#[derive(Debug, Clone)]
pub struct ColumnTransformer {
    schema_len: usize,
    numeric: Vec<Bound<NumericColumn>>,
    categorical: Vec<Bound<CategoricalColumn>>,
    feature_names: Vec<String>,
}

impl ColumnTransformer {
    /// Resolve every fitted column against the schema
    pub fn new(schema: &FeatureSchema, spec: PreprocessorSpec) -> Result<Self, TransformError> {
        let resolve = |name: &str| {
            schema
                .feature_index(name)
                .ok_or_else(|| TransformError::UnknownColumn(name.to_string()))
        };

        let mut numeric = Vec::with_capacity(spec.numeric.len());
        for column in spec.numeric {
            if !(column.median.is_finite() && column.mean.is_finite() && column.scale.is_finite()) {
                return Err(TransformError::InvalidStatistics { column: column.name });
            }
            let slot = resolve(&column.name)?;
            numeric.push(Bound { column, slot });
        }

        let mut categorical = Vec::with_capacity(spec.categorical.len());
        for column in spec.categorical {
            if column.categories.is_empty() {
                return Err(TransformError::EmptyVocabulary(column.name));
            }
            let slot = resolve(&column.name)?;
            categorical.push(Bound { column, slot });
        }

        let feature_names = numeric
            .iter()
            .map(|b| format!("num__{}", b.column.name))
            .chain(categorical.iter().flat_map(|b| {
                b.column
                    .categories
                    .iter()
                    .map(move |c| format!("cat__{}_{}", b.column.name, c))
            }))
            .collect();

        Ok(Self {
            schema_len: schema.len(),
            numeric,
            categorical,
            feature_names,
        })
    }

    pub fn output_width(&self) -> usize {
        self.feature_names.len()
    }

    fn numeric_value(bound: &Bound<NumericColumn>, slot: Option<&Slot>) -> Result<f64, TransformError> {
        let col = &bound.column;
        let raw = match slot.and_then(Slot::value) {
            None => None,
            Some(value) => match value.as_number() {
                Some(v) => Some(v),
                None => {
                    return Err(TransformError::NotNumeric {
                        column: col.name.clone(),
                        value: match value {
                            AttributeValue::Text(s) => format!("'{}'", s),
                            other => format!("{:?}", other),
                        },
                    })
                }
            },
        };

        // NaN counts as missing, same as the imputer it mirrors
        let imputed = raw.filter(|v| !v.is_nan()).unwrap_or(col.median);
        let scale = if col.scale == 0.0 { 1.0 } else { col.scale };
        Ok((imputed - col.mean) / scale)
    }
}

impl FeatureTransform for ColumnTransformer {
    fn transform(&self, row: &AssembledRow) -> Result<TransformedRow, TransformError> {
        if row.len() != self.schema_len {
            return Err(TransformError::RowWidth {
                expected: self.schema_len,
                actual: row.len(),
            });
        }

        let mut values = Vec::with_capacity(self.output_width());

        for bound in &self.numeric {
            values.push(Self::numeric_value(bound, row.get(bound.slot))?);
        }

        for bound in &self.categorical {
            let col = &bound.column;
            let category = row
                .get(bound.slot)
                .and_then(Slot::value)
                .and_then(|v| v.as_category())
                .unwrap_or_else(|| col.most_frequent.clone());

            // Unknown categories expand to all zeros
            values.extend(
                col.categories
                    .iter()
                    .map(|c| if *c == category { 1.0 } else { 0.0 }),
            );
        }

        let width = values.len();
        let matrix = Array2::from_shape_vec((1, width), values)
            .map_err(|_| TransformError::RowWidth { expected: self.output_width(), actual: width })?;

        Ok(TransformedRow::new(matrix, self.feature_names.clone()))
    }

    fn feature_names_out(&self) -> Vec<String> {
        self.feature_names.clone()
    }
}

// ============================================================================
// TESTS
// ============================================================================
