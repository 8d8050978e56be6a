//! The engine: creation, dataset attachment, update entry points.
//!
//! Construction is two-phase: [`Engine::new`] fixes the immutable structure
//! (objective, features, combinations) and can only fail on validation or
//! allocation; [`Engine::attach_dataset`] binds the numeric buffers. The
//! per-round entry points borrow everything for the duration of one call
//! and run to completion on the caller's thread.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::config::EngineConfig;
use crate::data::bitpack::BinnedColumn;
use crate::data::dataset::{DataSet, DatasetRole, TargetValues};
use crate::data::feature::{Feature, FeatureCombination, MAX_DIMENSIONS};
use crate::data::tensor::SegmentedTensor;
use crate::error::{try_alloc, EngineError};
use crate::interaction;
use crate::objective::{LogitConvention, Objective};
use crate::update;

/// How many interaction-scorer entries log at debug before dropping to
/// trace. Process-wide and advisory: a race costs one extra line, never a
/// numerical difference.
const INTERACTION_LOG_BUDGET: u32 = 10;

static INTERACTION_ENTRY_LOGS: AtomicU32 = AtomicU32::new(INTERACTION_LOG_BUDGET);

/// One boosting engine instance.
///
/// Distinct instances are independent and may run on distinct threads; a
/// single instance is single-threaded by construction (`&mut self` on every
/// mutating call).
#[derive(Debug)]
pub struct Engine {
    objective: Objective,
    config: EngineConfig,
    features: Vec<Feature>,
    combinations: Vec<FeatureCombination>,
    training: Option<DataSet>,
    validation: Option<DataSet>,
    seed: u64,
}

impl Engine {
    /// Create an engine over a fixed feature table and combination list.
    ///
    /// `combination_features` gives, per combination, the ordered feature
    /// indices spanning its tensor; an empty list is the intercept
    /// combination. The seed is stored for the outer collaborator's
    /// sampling-set construction; the engine itself draws no randomness.
    pub fn new(
        objective: Objective,
        features: Vec<Feature>,
        combination_features: &[&[usize]],
        seed: u64,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        if let Objective::Multiclass { n_classes } = objective {
            if n_classes < 3 {
                return Err(EngineError::LengthMismatch {
                    what: "multiclass class count",
                    expected: 3,
                    got: n_classes,
                });
            }
        }
        for (index, feature) in features.iter().enumerate() {
            if feature.bin_count() == 0 {
                return Err(EngineError::BinCountZero { feature_idx: index });
            }
        }

        let mut combinations = Vec::with_capacity(combination_features.len());
        for indices in combination_features {
            combinations.push(FeatureCombination::new(&features, indices)?);
        }

        tracing::trace!(
            ?objective,
            n_features = features.len(),
            n_combinations = combinations.len(),
            "engine created"
        );
        Ok(Self {
            objective,
            config,
            features,
            combinations,
            training: None,
            validation: None,
            seed,
        })
    }

    #[inline]
    pub fn objective(&self) -> Objective {
        self.objective
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// The two-class score representation of this engine.
    #[inline]
    pub fn logit_convention(&self) -> LogitConvention {
        self.objective.logit_convention()
    }

    #[inline]
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    #[inline]
    pub fn combinations(&self) -> &[FeatureCombination] {
        &self.combinations
    }

    /// The attached training dataset, if any.
    #[inline]
    pub fn training(&self) -> Option<&DataSet> {
        self.training.as_ref()
    }

    /// The attached validation dataset, if any.
    #[inline]
    pub fn validation(&self) -> Option<&DataSet> {
        self.validation.as_ref()
    }

    /// Bind a dataset to one role, replacing any previous one.
    ///
    /// `feature_bins` holds one slice of per-instance bin indices per
    /// feature in the engine's table. The engine derives and packs each
    /// combination's linearized column from them, so callers never compute
    /// tensor indices themselves.
    pub fn attach_dataset(
        &mut self,
        role: DatasetRole,
        targets: TargetValues,
        initial_scores: &[f64],
        feature_bins: &[&[usize]],
    ) -> Result<(), EngineError> {
        if feature_bins.len() != self.features.len() {
            return Err(EngineError::LengthMismatch {
                what: "per-feature bin columns",
                expected: self.features.len(),
                got: feature_bins.len(),
            });
        }
        let n_instances = match &targets {
            TargetValues::Continuous(v) => v.len(),
            TargetValues::ClassIndices(v) => v.len(),
        };
        for bins in feature_bins {
            if bins.len() != n_instances {
                return Err(EngineError::LengthMismatch {
                    what: "feature bin column",
                    expected: n_instances,
                    got: bins.len(),
                });
            }
        }

        let mut feature_columns = Vec::with_capacity(self.features.len());
        for (feature, bins) in self.features.iter().zip(feature_bins) {
            feature_columns.push(BinnedColumn::pack(
                bins,
                feature.bin_count(),
                crate::data::bitpack::PackLayout::for_bin_count(feature.bin_count()),
            )?);
        }

        let mut columns = Vec::with_capacity(self.combinations.len());
        let mut scratch = try_alloc(n_instances, 0usize)?;
        for combination in &self.combinations {
            for (instance, slot) in scratch.iter_mut().enumerate() {
                let mut cell = 0usize;
                let mut stride = 1usize;
                for (axis, &feature) in combination.feature_indices().iter().enumerate() {
                    cell += feature_bins[feature][instance] * stride;
                    stride *= combination.bin_counts()[axis];
                }
                *slot = cell;
            }
            columns.push(BinnedColumn::pack(
                &scratch,
                combination.total_bins(),
                combination.layout(),
            )?);
        }

        let dataset = DataSet::new(self.objective, targets, initial_scores, columns, feature_columns)?;
        tracing::trace!(role = role.name(), n_instances, "dataset attached");
        match role {
            DatasetRole::Training => self.training = Some(dataset),
            DatasetRole::Validation => self.validation = Some(dataset),
        }
        Ok(())
    }

    /// Apply one round's update tensor to the training set.
    ///
    /// Residuals (regression) or predictor scores (classification) move by
    /// the cell values; no metric is computed.
    pub fn apply_training_update(
        &mut self,
        combination_index: usize,
        update: &SegmentedTensor,
    ) -> Result<(), EngineError> {
        let combination = self.checked_combination(combination_index)?;
        Self::check_update_shape(self.objective, combination, update)?;
        let is_intercept = combination.dimension_count() == 0;

        let dataset = self
            .training
            .as_mut()
            .ok_or(EngineError::DatasetMissing { role: "training" })?;
        if dataset.n_instances() == 0 {
            return Ok(());
        }

        let mut views = dataset.update_views(combination_index);
        update::training_pass(self.objective, &mut views, update.values(), is_intercept);
        Ok(())
    }

    /// Apply one round's update tensor to the validation set and report the
    /// round metric (mean squared error or mean log-loss).
    ///
    /// A non-finite accumulation reports `+inf`; the pass is not rolled
    /// back, the caller discards the dataset after rejecting the round.
    pub fn apply_validation_update(
        &mut self,
        combination_index: usize,
        update: &SegmentedTensor,
    ) -> Result<f64, EngineError> {
        let combination = self.checked_combination(combination_index)?;
        Self::check_update_shape(self.objective, combination, update)?;
        let is_intercept = combination.dimension_count() == 0;

        let dataset = self
            .validation
            .as_mut()
            .ok_or(EngineError::DatasetMissing { role: "validation" })?;
        let n_instances = dataset.n_instances();
        if n_instances == 0 {
            return Ok(0.0);
        }

        let mut views = dataset.update_views(combination_index);
        Ok(update::validation_pass(
            self.objective,
            &mut views,
            update.values(),
            is_intercept,
            n_instances,
            &self.config,
        ))
    }

    /// Score a candidate feature combination on the training set.
    ///
    /// Degenerate inputs (no features, a one-bin feature, no instances)
    /// silently score 0; model state is never touched.
    pub fn score_interaction(
        &self,
        feature_indices: &[usize],
        min_instances_per_cell: u64,
    ) -> Result<f64, EngineError> {
        log_interaction_entry(feature_indices.len());

        if feature_indices.is_empty() {
            tracing::debug!("empty candidate combination scores 0");
            return Ok(0.0);
        }
        for &index in feature_indices {
            let feature = self
                .features
                .get(index)
                .ok_or(EngineError::UnknownFeature {
                    index,
                    count: self.features.len(),
                })?;
            if feature.is_degenerate() {
                tracing::debug!(feature = index, "degenerate feature scores 0");
                return Ok(0.0);
            }
        }
        if feature_indices.len() > MAX_DIMENSIONS {
            return Err(EngineError::TooManyDimensions {
                got: feature_indices.len(),
                max: MAX_DIMENSIONS,
            });
        }

        let dataset = self
            .training
            .as_ref()
            .ok_or(EngineError::DatasetMissing { role: "training" })?;
        if dataset.n_instances() == 0 {
            tracing::debug!("no instances, interaction scores 0");
            return Ok(0.0);
        }

        let combination = FeatureCombination::new(&self.features, feature_indices)?;
        let score = interaction::score(
            self.objective,
            dataset,
            &combination,
            min_instances_per_cell,
            &self.config,
        )?;
        debug_assert!(score >= 0.0);
        Ok(score)
    }
}

fn log_interaction_entry(n_features: usize) {
    let remaining = INTERACTION_ENTRY_LOGS.load(Ordering::Relaxed);
    if remaining > 0 {
        INTERACTION_ENTRY_LOGS.store(remaining - 1, Ordering::Relaxed);
        tracing::debug!(n_features, "scoring interaction candidate");
    } else {
        tracing::trace!(n_features, "scoring interaction candidate");
    }
}

impl Engine {
    fn checked_combination(&self, index: usize) -> Result<&FeatureCombination, EngineError> {
        self.combinations
            .get(index)
            .ok_or(EngineError::UnknownCombination {
                index,
                count: self.combinations.len(),
            })
    }

    fn check_update_shape(
        objective: Objective,
        combination: &FeatureCombination,
        update: &SegmentedTensor,
    ) -> Result<(), EngineError> {
        let expected = combination.total_bins() * objective.vector_length();
        let got = update.total_bins() * update.vector_length();
        if got != expected || update.vector_length() != objective.vector_length() {
            return Err(EngineError::UpdateShapeMismatch { expected, got });
        }
        Ok(())
    }
}
