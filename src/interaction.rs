//! Interaction-strength scoring for candidate feature combinations.
//!
//! One pass over the training set fills a per-cell histogram of gradient and
//! hessian sums for the candidate combination, then the histogram collapses
//! to a single nonnegative score: how much gain the partition buys over
//! treating all instances as one cell. Model state is never touched.

// Range loops index the parallel grad/hess arrays in lockstep.
#![allow(clippy::needless_range_loop)]

use crate::config::EngineConfig;
use crate::data::dataset::DataSet;
use crate::data::feature::FeatureCombination;
use crate::error::{try_alloc, EngineError};
use crate::objective::{sigmoid, Objective};

/// Class count marker for the dynamic-class fill kernels.
const DYNAMIC_CLASSES: usize = 0;

/// Per-cell gradient/hessian sums in structure-of-arrays layout, one value
/// per class for multiclass.
struct InteractionHistogram {
    grads: Vec<f64>,
    hess: Vec<f64>,
    counts: Vec<u64>,
    vector_length: usize,
}

impl InteractionHistogram {
    fn allocate(cells: usize, vector_length: usize) -> Result<Self, EngineError> {
        let len = cells
            .checked_mul(vector_length)
            .ok_or(EngineError::CapacityExceeded)?;
        Ok(Self {
            grads: try_alloc(len, 0.0)?,
            hess: try_alloc(len, 0.0)?,
            counts: try_alloc(cells, 0u64)?,
            vector_length,
        })
    }

    fn cells(&self) -> usize {
        self.counts.len()
    }
}

/// Score one candidate combination against the dataset.
///
/// The caller has already rejected degenerate features, empty combinations,
/// and empty datasets; this builds the histogram and reduces it.
pub(crate) fn score(
    objective: Objective,
    dataset: &DataSet,
    combination: &FeatureCombination,
    min_instances_per_cell: u64,
    config: &EngineConfig,
) -> Result<f64, EngineError> {
    debug_assert!(combination.dimension_count() >= 1);
    debug_assert!(dataset.n_instances() > 0);

    let mut histogram =
        InteractionHistogram::allocate(combination.total_bins(), objective.vector_length())?;
    fill(objective, dataset, combination, config, &mut histogram);
    Ok(reduce(&histogram, min_instances_per_cell, config.interaction_smoothing))
}

/// Combined cell index of one instance, from the per-feature columns.
#[inline]
fn cell_of(dataset: &DataSet, combination: &FeatureCombination, instance: usize) -> usize {
    let mut cell = 0usize;
    let mut stride = 1usize;
    for (axis, &feature) in combination.feature_indices().iter().enumerate() {
        cell += dataset.feature_column(feature).get(instance) * stride;
        stride *= combination.bin_counts()[axis];
    }
    cell
}

fn fill(
    objective: Objective,
    dataset: &DataSet,
    combination: &FeatureCombination,
    config: &EngineConfig,
    histogram: &mut InteractionHistogram,
) {
    match objective {
        Objective::Regression => fill_regression(dataset, combination, histogram),
        Objective::BinaryClassification => {
            fill_binary(dataset, combination, config.min_hessian, histogram)
        }
        Objective::Multiclass { n_classes } => match n_classes {
            3 => fill_multiclass::<3>(dataset, combination, config.min_hessian, histogram),
            4 => fill_multiclass::<4>(dataset, combination, config.min_hessian, histogram),
            5 => fill_multiclass::<5>(dataset, combination, config.min_hessian, histogram),
            6 => fill_multiclass::<6>(dataset, combination, config.min_hessian, histogram),
            7 => fill_multiclass::<7>(dataset, combination, config.min_hessian, histogram),
            8 => fill_multiclass::<8>(dataset, combination, config.min_hessian, histogram),
            _ => fill_multiclass::<DYNAMIC_CLASSES>(
                dataset,
                combination,
                config.min_hessian,
                histogram,
            ),
        },
    }
}

/// Regression: gradient is the residual, hessian is 1.
fn fill_regression(
    dataset: &DataSet,
    combination: &FeatureCombination,
    histogram: &mut InteractionHistogram,
) {
    let residuals = dataset.residuals();
    for instance in 0..dataset.n_instances() {
        let cell = cell_of(dataset, combination, instance);
        histogram.grads[cell] += residuals[instance];
        histogram.hess[cell] += 1.0;
        histogram.counts[cell] += 1;
    }
}

/// Binary: gradient is `target - p`, hessian `p (1 - p)`, p from the logit.
fn fill_binary(
    dataset: &DataSet,
    combination: &FeatureCombination,
    min_hessian: f64,
    histogram: &mut InteractionHistogram,
) {
    let scores = dataset.scores();
    let targets = dataset.class_targets();
    for instance in 0..dataset.n_instances() {
        let cell = cell_of(dataset, combination, instance);
        let p = sigmoid(scores[instance]);
        histogram.grads[cell] += targets[instance] as f64 - p;
        histogram.hess[cell] += (p * (1.0 - p)).max(min_hessian);
        histogram.counts[cell] += 1;
    }
}

/// Multiclass: per-class gradient `1{v = target} - softmax_v`, hessian
/// `p_v (1 - p_v)`. The softmax subtracts the row max before `exp`.
fn fill_multiclass<const C: usize>(
    dataset: &DataSet,
    combination: &FeatureCombination,
    min_hessian: f64,
    histogram: &mut InteractionHistogram,
) {
    let c = if C == DYNAMIC_CLASSES {
        histogram.vector_length
    } else {
        debug_assert_eq!(C, histogram.vector_length);
        C
    };
    let scores = dataset.scores();
    let targets = dataset.class_targets();

    for instance in 0..dataset.n_instances() {
        let cell = cell_of(dataset, combination, instance);
        let row = &scores[instance * c..instance * c + c];
        let target = targets[instance] as usize;

        let mut max = f64::NEG_INFINITY;
        for &s in row {
            max = max.max(s);
        }
        let mut sum_exp = 0.0f64;
        for &s in row {
            sum_exp += (s - max).exp();
        }

        let base = cell * c;
        for v in 0..c {
            let p = (row[v] - max).exp() / sum_exp;
            let indicator = if v == target { 1.0 } else { 0.0 };
            histogram.grads[base + v] += indicator - p;
            histogram.hess[base + v] += (p * (1.0 - p)).max(min_hessian);
        }
        histogram.counts[cell] += 1;
    }
}

/// Collapse the histogram: sum of per-cell gains minus the single-cell gain
/// of the pooled totals. Cells under the count threshold keep feeding the
/// pooled totals but contribute no gain of their own.
fn reduce(histogram: &InteractionHistogram, min_instances_per_cell: u64, lambda: f64) -> f64 {
    let v = histogram.vector_length;
    let mut parent_grads = vec![0.0f64; v];
    let mut parent_hess = vec![0.0f64; v];
    let mut cell_gain_sum = 0.0f64;

    for cell in 0..histogram.cells() {
        let base = cell * v;
        let counted = histogram.counts[cell] >= min_instances_per_cell;
        for k in 0..v {
            let g = histogram.grads[base + k];
            let h = histogram.hess[base + k];
            parent_grads[k] += g;
            parent_hess[k] += h;
            if counted {
                cell_gain_sum += gain(g, h, lambda);
            }
        }
    }

    let mut parent_gain = 0.0f64;
    for k in 0..v {
        parent_gain += gain(parent_grads[k], parent_hess[k], lambda);
    }

    // floating-point inexactness can push the difference slightly negative
    (cell_gain_sum - parent_gain).max(0.0)
}

#[inline]
fn gain(grad_sum: f64, hess_sum: f64, lambda: f64) -> f64 {
    if hess_sum + lambda <= 0.0 {
        return 0.0;
    }
    grad_sum * grad_sum / (hess_sum + lambda)
}
