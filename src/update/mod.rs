//! Per-round model-update application.
//!
//! Given an update tensor and a dataset, a pass rewrites the per-instance
//! state (residuals for regression, predictor scores for classification) in
//! instance order. A training pass returns nothing; a validation pass also
//! folds the per-instance losses into the round metric.
//!
//! # Monomorphization
//!
//! The packed decode driver is generic over the pack width so the common
//! widths get a compile-time inner loop bound; [`for_each_bin`] matches the
//! runtime width onto those instantiations and falls back to a dynamic-width
//! version otherwise. Each objective kernel passes its per-instance work in
//! as a closure, which gives every (objective, width) pair its own inlined
//! loop body. Multiclass additionally monomorphizes small class counts in
//! [`multiclass`].

mod binary;
mod multiclass;
mod regression;

use crate::config::EngineConfig;
use crate::data::bitpack::PackLayout;
use crate::data::dataset::UpdateViews;
use crate::objective::Objective;

/// Pack width marker for the dynamic-width driver instantiation.
const DYNAMIC_WIDTH: usize = 0;

/// Class count marker for the dynamic-class kernels.
pub(crate) const DYNAMIC_CLASSES: usize = 0;

/// Decode `n_instances` linearized bins from packed words, invoking
/// `body(instance, bin)` in instance order.
///
/// Processes the full words with an inner loop of exactly `items_per_word`
/// iterations, then one final word holding `((n - 1) % items_per_word) + 1`
/// items; the padding bits of the final word are never read.
#[inline]
fn drive_packed<const P: usize>(
    words: &[u64],
    layout: PackLayout,
    n_instances: usize,
    mut body: impl FnMut(usize, usize),
) {
    debug_assert!(n_instances > 0);
    let items = if P == DYNAMIC_WIDTH {
        layout.items_per_word()
    } else {
        debug_assert_eq!(P, layout.items_per_word());
        P
    };
    let bits = layout.bits_per_item();
    let mask = layout.mask();

    let tail = (n_instances - 1) % items + 1;
    let full_words = (n_instances - tail) / items;

    let mut instance = 0;
    for word_index in 0..full_words {
        let mut word = words[word_index];
        for _ in 0..items {
            body(instance, (word & mask) as usize);
            word >>= bits;
            instance += 1;
        }
    }

    let mut word = words[full_words];
    for _ in 0..tail {
        body(instance, (word & mask) as usize);
        word >>= bits;
        instance += 1;
    }
}

/// Width-dispatching front end for [`drive_packed`].
#[inline]
pub(crate) fn for_each_bin(
    words: &[u64],
    layout: PackLayout,
    n_instances: usize,
    body: impl FnMut(usize, usize),
) {
    match layout.items_per_word() {
        1 => drive_packed::<1>(words, layout, n_instances, body),
        2 => drive_packed::<2>(words, layout, n_instances, body),
        3 => drive_packed::<3>(words, layout, n_instances, body),
        4 => drive_packed::<4>(words, layout, n_instances, body),
        5 => drive_packed::<5>(words, layout, n_instances, body),
        8 => drive_packed::<8>(words, layout, n_instances, body),
        16 => drive_packed::<16>(words, layout, n_instances, body),
        32 => drive_packed::<32>(words, layout, n_instances, body),
        64 => drive_packed::<64>(words, layout, n_instances, body),
        _ => drive_packed::<DYNAMIC_WIDTH>(words, layout, n_instances, body),
    }
}

/// Apply an update to the per-instance state without computing a metric.
pub(crate) fn training_pass(
    objective: Objective,
    views: &mut UpdateViews<'_>,
    update: &[f64],
    is_intercept: bool,
) {
    match objective {
        Objective::Regression => regression::training_pass(views, update, is_intercept),
        Objective::BinaryClassification => binary::training_pass(views, update, is_intercept),
        Objective::Multiclass { n_classes } => {
            multiclass::training_pass(views, update, n_classes, is_intercept)
        }
    }
}

/// Apply an update and return the round metric (mean loss over instances).
pub(crate) fn validation_pass(
    objective: Objective,
    views: &mut UpdateViews<'_>,
    update: &[f64],
    is_intercept: bool,
    n_instances: usize,
    config: &EngineConfig,
) -> f64 {
    let raw = match objective {
        Objective::Regression => {
            regression::validation_pass(views, update, is_intercept, n_instances)
        }
        Objective::BinaryClassification => {
            binary::validation_pass(views, update, is_intercept, n_instances)
        }
        Objective::Multiclass { n_classes } => multiclass::validation_pass(
            views,
            update,
            n_classes,
            is_intercept,
            n_instances,
            config.stabilize_softmax,
        ),
    };
    finalize_metric(objective, raw)
}

/// Round-metric guard: a non-finite accumulation reports `+inf` so the outer
/// loop rejects the round; a slightly negative multiclass mean (approximate
/// exp) is rounded up to zero.
#[inline]
fn finalize_metric(objective: Objective, raw: f64) -> f64 {
    if raw.is_nan() || raw.is_infinite() {
        tracing::warn!(metric = raw, "non-finite validation metric, round will be rejected");
        return f64::INFINITY;
    }
    if raw < 0.0 {
        debug_assert!(matches!(objective, Objective::Multiclass { .. }));
        return 0.0;
    }
    raw
}
