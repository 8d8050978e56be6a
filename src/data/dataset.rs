//! Per-role training data: targets, per-instance state, packed columns.

use crate::data::bitpack::BinnedColumn;
use crate::error::{try_alloc, EngineError};
use crate::objective::Objective;

/// Which side of the boosting loop a dataset feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetRole {
    Training,
    Validation,
}

impl DatasetRole {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            DatasetRole::Training => "training",
            DatasetRole::Validation => "validation",
        }
    }
}

/// Targets, stored per the objective.
#[derive(Debug, Clone)]
pub enum TargetValues {
    /// Regression targets.
    Continuous(Vec<f64>),
    /// Class indices, each below the objective's class count.
    ClassIndices(Vec<u32>),
}

impl TargetValues {
    fn len(&self) -> usize {
        match self {
            TargetValues::Continuous(v) => v.len(),
            TargetValues::ClassIndices(v) => v.len(),
        }
    }
}

/// One dataset: immutable structure plus the numeric buffers the update
/// applier mutates round by round.
///
/// Regression keeps residuals only; classification keeps predictor scores
/// only (its residuals are derived on the fly where needed). One packed
/// column is held per feature combination the engine was created with, plus
/// one per single feature so interaction candidates can be assembled without
/// re-binning.
#[derive(Debug, Clone)]
pub struct DataSet {
    n_instances: usize,
    vector_length: usize,
    targets: TargetValues,
    scores: Vec<f64>,
    residuals: Vec<f64>,
    columns: Vec<BinnedColumn>,
    feature_columns: Vec<BinnedColumn>,
}

impl DataSet {
    /// Assemble and validate a dataset.
    ///
    /// `initial_scores` is the caller's warm-start predictor state, length
    /// `N * vector_length`, or empty for all-zero scores. For regression the
    /// scores are folded into residuals (`target - score`) and not retained.
    pub fn new(
        objective: Objective,
        targets: TargetValues,
        initial_scores: &[f64],
        columns: Vec<BinnedColumn>,
        feature_columns: Vec<BinnedColumn>,
    ) -> Result<Self, EngineError> {
        let n_instances = targets.len();
        let vector_length = objective.vector_length();

        let score_len = n_instances * vector_length;
        if !initial_scores.is_empty() && initial_scores.len() != score_len {
            return Err(EngineError::LengthMismatch {
                what: "initial scores",
                expected: score_len,
                got: initial_scores.len(),
            });
        }
        for column in columns.iter().chain(feature_columns.iter()) {
            if column.len() != n_instances {
                return Err(EngineError::LengthMismatch {
                    what: "binned column",
                    expected: n_instances,
                    got: column.len(),
                });
            }
        }

        match (&targets, objective) {
            (TargetValues::Continuous(_), Objective::Regression) => {}
            (TargetValues::ClassIndices(classes), _) if objective.is_classification() => {
                let n_classes = objective.class_count().expect("classification has classes");
                for (instance, &class) in classes.iter().enumerate() {
                    if class as usize >= n_classes {
                        return Err(EngineError::TargetOutOfRange {
                            instance,
                            value: class as usize,
                            n_classes,
                        });
                    }
                }
            }
            _ => {
                return Err(EngineError::LengthMismatch {
                    what: "target kind for objective",
                    expected: vector_length,
                    got: 0,
                });
            }
        }

        let (scores, residuals) = match (&targets, objective) {
            (TargetValues::Continuous(values), Objective::Regression) => {
                let mut residuals = try_alloc(n_instances, 0.0)?;
                if initial_scores.is_empty() {
                    residuals.copy_from_slice(values);
                } else {
                    for i in 0..n_instances {
                        residuals[i] = values[i] - initial_scores[i];
                    }
                }
                (Vec::new(), residuals)
            }
            _ => {
                let mut scores = try_alloc(score_len, 0.0)?;
                if !initial_scores.is_empty() {
                    scores.copy_from_slice(initial_scores);
                }
                (scores, Vec::new())
            }
        };

        Ok(Self {
            n_instances,
            vector_length,
            targets,
            scores,
            residuals,
            columns,
            feature_columns,
        })
    }

    #[inline]
    pub fn n_instances(&self) -> usize {
        self.n_instances
    }

    #[inline]
    pub fn vector_length(&self) -> usize {
        self.vector_length
    }

    /// Class indices; empty slice for regression.
    #[inline]
    pub fn class_targets(&self) -> &[u32] {
        match &self.targets {
            TargetValues::ClassIndices(v) => v,
            TargetValues::Continuous(_) => &[],
        }
    }

    /// Continuous targets; empty slice for classification.
    #[inline]
    pub fn continuous_targets(&self) -> &[f64] {
        match &self.targets {
            TargetValues::Continuous(v) => v,
            TargetValues::ClassIndices(_) => &[],
        }
    }

    /// Predictor scores, `N * vector_length`; empty for regression.
    #[inline]
    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    #[inline]
    pub fn scores_mut(&mut self) -> &mut [f64] {
        &mut self.scores
    }

    /// Residuals, length `N`; empty for classification.
    #[inline]
    pub fn residuals(&self) -> &[f64] {
        &self.residuals
    }

    #[inline]
    pub fn residuals_mut(&mut self) -> &mut [f64] {
        &mut self.residuals
    }

    /// Packed column for one feature combination.
    #[inline]
    pub fn column(&self, combination_index: usize) -> &BinnedColumn {
        &self.columns[combination_index]
    }

    /// Packed column for one single feature (interaction candidates).
    #[inline]
    pub fn feature_column(&self, feature_index: usize) -> &BinnedColumn {
        &self.feature_columns[feature_index]
    }

    /// Split borrow used by the update kernels: mutable state plus the
    /// column and targets they read.
    pub(crate) fn update_views(&mut self, combination_index: usize) -> UpdateViews<'_> {
        UpdateViews {
            column: &self.columns[combination_index],
            targets: &self.targets,
            scores: &mut self.scores,
            residuals: &mut self.residuals,
        }
    }
}

/// Disjoint borrows of one dataset for a single update pass.
pub(crate) struct UpdateViews<'a> {
    pub column: &'a BinnedColumn,
    pub targets: &'a TargetValues,
    pub scores: &'a mut [f64],
    pub residuals: &'a mut [f64],
}

impl<'a> UpdateViews<'a> {
    /// Class indices with the dataset's lifetime, so callers can keep the
    /// slice while mutating scores.
    #[inline]
    pub fn class_targets(&self) -> &'a [u32] {
        match self.targets {
            TargetValues::ClassIndices(v) => v,
            TargetValues::Continuous(_) => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::bitpack::{BinnedColumn, PackLayout};

    fn column(bins: &[usize], bin_count: usize) -> BinnedColumn {
        BinnedColumn::pack(bins, bin_count, PackLayout::for_bin_count(bin_count)).unwrap()
    }

    #[test]
    fn regression_folds_scores_into_residuals() {
        let ds = DataSet::new(
            Objective::Regression,
            TargetValues::Continuous(vec![3.0, 1.0]),
            &[0.5, -0.5],
            vec![column(&[0, 1], 2)],
            vec![],
        )
        .unwrap();
        assert_eq!(ds.residuals(), &[2.5, 1.5]);
        assert_eq!(ds.continuous_targets(), &[3.0, 1.0]);
        assert!(ds.scores().is_empty());
        assert!(ds.class_targets().is_empty());
    }

    #[test]
    fn classification_keeps_scores() {
        let ds = DataSet::new(
            Objective::Multiclass { n_classes: 3 },
            TargetValues::ClassIndices(vec![2, 0]),
            &[],
            vec![],
            vec![],
        )
        .unwrap();
        assert_eq!(ds.scores().len(), 6);
        assert!(ds.residuals().is_empty());
    }

    #[test]
    fn rejects_out_of_range_class() {
        let err = DataSet::new(
            Objective::BinaryClassification,
            TargetValues::ClassIndices(vec![0, 2]),
            &[],
            vec![],
            vec![],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            EngineError::TargetOutOfRange { instance: 1, value: 2, n_classes: 2 }
        ));
    }

    #[test]
    fn rejects_short_column() {
        let err = DataSet::new(
            Objective::Regression,
            TargetValues::Continuous(vec![0.0; 3]),
            &[],
            vec![column(&[0, 1], 2)],
            vec![],
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::LengthMismatch { expected: 3, got: 2, .. }));
    }

    #[test]
    fn rejects_mismatched_target_kind() {
        let err = DataSet::new(
            Objective::Regression,
            TargetValues::ClassIndices(vec![0]),
            &[],
            vec![],
            vec![],
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::LengthMismatch { .. }));
    }

    #[test]
    fn empty_dataset_is_valid() {
        let ds = DataSet::new(
            Objective::Regression,
            TargetValues::Continuous(vec![]),
            &[],
            vec![],
            vec![],
        )
        .unwrap();
        assert_eq!(ds.n_instances(), 0);
    }
}
