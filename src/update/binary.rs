//! Binary log-loss update kernels (single-logit convention).

use super::for_each_bin;
use crate::data::dataset::UpdateViews;
use crate::objective::binary_log_loss;

pub(crate) fn training_pass(views: &mut UpdateViews<'_>, update: &[f64], is_intercept: bool) {
    let n = views.scores.len();
    if n == 0 {
        return;
    }
    if is_intercept {
        let delta = update[0];
        for score in views.scores.iter_mut() {
            *score += delta;
        }
        return;
    }

    let scores = &mut *views.scores;
    for_each_bin(views.column.words(), views.column.layout(), n, |instance, bin| {
        scores[instance] += update[bin];
    });
}

pub(crate) fn validation_pass(
    views: &mut UpdateViews<'_>,
    update: &[f64],
    is_intercept: bool,
    n_instances: usize,
) -> f64 {
    if n_instances == 0 {
        return 0.0;
    }
    debug_assert_eq!(views.scores.len(), n_instances);

    let targets = views.class_targets();
    let mut sum_loss = 0.0f64;
    if is_intercept {
        let delta = update[0];
        for (instance, score) in views.scores.iter_mut().enumerate() {
            *score += delta;
            sum_loss += binary_log_loss(*score, targets[instance] as usize);
        }
    } else {
        let scores = &mut *views.scores;
        for_each_bin(
            views.column.words(),
            views.column.layout(),
            n_instances,
            |instance, bin| {
                let score = scores[instance] + update[bin];
                scores[instance] = score;
                sum_loss += binary_log_loss(score, targets[instance] as usize);
            },
        );
    }
    sum_loss / n_instances as f64
}
