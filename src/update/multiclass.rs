//! Multiclass log-loss update kernels.
//!
//! Every instance carries one score per class; the update tensor holds a
//! class vector per cell. Small class counts get their own instantiations so
//! the per-class loops have compile-time bounds; larger counts take the
//! dynamic kernel.

// Range loops index two arrays in lockstep here.
#![allow(clippy::needless_range_loop)]

use super::{for_each_bin, DYNAMIC_CLASSES};
use crate::data::dataset::UpdateViews;
use crate::objective::multiclass_log_loss;

#[inline]
fn resolved<const C: usize>(n_classes: usize) -> usize {
    if C == DYNAMIC_CLASSES {
        n_classes
    } else {
        debug_assert_eq!(C, n_classes);
        C
    }
}

fn training_inner<const C: usize>(
    views: &mut UpdateViews<'_>,
    update: &[f64],
    n_classes: usize,
    is_intercept: bool,
) {
    let c = resolved::<C>(n_classes);
    let n = views.scores.len() / c;
    if n == 0 {
        return;
    }

    if is_intercept {
        for row in views.scores.chunks_exact_mut(c) {
            for v in 0..c {
                row[v] += update[v];
            }
        }
        return;
    }

    let scores = &mut *views.scores;
    for_each_bin(views.column.words(), views.column.layout(), n, |instance, bin| {
        let cell = &update[bin * c..bin * c + c];
        let row = &mut scores[instance * c..instance * c + c];
        for v in 0..c {
            row[v] += cell[v];
        }
    });
}

fn validation_inner<const C: usize>(
    views: &mut UpdateViews<'_>,
    update: &[f64],
    n_classes: usize,
    is_intercept: bool,
    n_instances: usize,
    stabilize: bool,
) -> f64 {
    let c = resolved::<C>(n_classes);
    if n_instances == 0 {
        return 0.0;
    }
    debug_assert_eq!(views.scores.len(), n_instances * c);

    let targets = views.class_targets();
    let scores = &mut *views.scores;
    let mut sum_loss = 0.0f64;

    let mut per_instance = |instance: usize, cell: &[f64]| {
        let target = targets[instance] as usize;
        let row = &mut scores[instance * c..instance * c + c];

        let shift = if stabilize {
            let mut max = f64::NEG_INFINITY;
            for v in 0..c {
                row[v] += cell[v];
                max = max.max(row[v]);
            }
            max
        } else {
            for v in 0..c {
                row[v] += cell[v];
            }
            0.0
        };

        let mut sum_exp = 0.0f64;
        let mut target_exp = 0.0f64;
        for v in 0..c {
            let one_exp = (row[v] - shift).exp();
            if v == target {
                target_exp = one_exp;
            }
            sum_exp += one_exp;
        }
        sum_loss += multiclass_log_loss(sum_exp, target_exp);
    };

    if is_intercept {
        let cell = &update[..c];
        for instance in 0..n_instances {
            per_instance(instance, cell);
        }
    } else {
        for_each_bin(
            views.column.words(),
            views.column.layout(),
            n_instances,
            |instance, bin| per_instance(instance, &update[bin * c..bin * c + c]),
        );
    }

    sum_loss / n_instances as f64
}

pub(crate) fn training_pass(
    views: &mut UpdateViews<'_>,
    update: &[f64],
    n_classes: usize,
    is_intercept: bool,
) {
    match n_classes {
        3 => training_inner::<3>(views, update, n_classes, is_intercept),
        4 => training_inner::<4>(views, update, n_classes, is_intercept),
        5 => training_inner::<5>(views, update, n_classes, is_intercept),
        6 => training_inner::<6>(views, update, n_classes, is_intercept),
        7 => training_inner::<7>(views, update, n_classes, is_intercept),
        8 => training_inner::<8>(views, update, n_classes, is_intercept),
        _ => training_inner::<DYNAMIC_CLASSES>(views, update, n_classes, is_intercept),
    }
}

pub(crate) fn validation_pass(
    views: &mut UpdateViews<'_>,
    update: &[f64],
    n_classes: usize,
    is_intercept: bool,
    n_instances: usize,
    stabilize: bool,
) -> f64 {
    match n_classes {
        3 => validation_inner::<3>(views, update, n_classes, is_intercept, n_instances, stabilize),
        4 => validation_inner::<4>(views, update, n_classes, is_intercept, n_instances, stabilize),
        5 => validation_inner::<5>(views, update, n_classes, is_intercept, n_instances, stabilize),
        6 => validation_inner::<6>(views, update, n_classes, is_intercept, n_instances, stabilize),
        7 => validation_inner::<7>(views, update, n_classes, is_intercept, n_instances, stabilize),
        8 => validation_inner::<8>(views, update, n_classes, is_intercept, n_instances, stabilize),
        _ => validation_inner::<DYNAMIC_CLASSES>(
            views,
            update,
            n_classes,
            is_intercept,
            n_instances,
            stabilize,
        ),
    }
}
