//! Squared-error update kernels.
//!
//! Residuals shrink by the cell's update value; validation reports the mean
//! squared residual after the shift.

use super::for_each_bin;
use crate::data::dataset::UpdateViews;
use crate::objective::clip_to_finite;

pub(crate) fn training_pass(views: &mut UpdateViews<'_>, update: &[f64], is_intercept: bool) {
    let n = views.residuals.len();
    if n == 0 {
        return;
    }
    if is_intercept {
        let delta = update[0];
        for residual in views.residuals.iter_mut() {
            *residual = clip_to_finite(*residual - delta);
        }
        return;
    }

    let residuals = &mut *views.residuals;
    for_each_bin(views.column.words(), views.column.layout(), n, |instance, bin| {
        residuals[instance] = clip_to_finite(residuals[instance] - update[bin]);
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
    debug_assert_eq!(views.residuals.len(), n_instances);

    let mut sum_squares = 0.0f64;
    if is_intercept {
        let delta = update[0];
        for residual in views.residuals.iter_mut() {
            let shifted = clip_to_finite(*residual - delta);
            sum_squares += shifted * shifted;
            *residual = shifted;
        }
    } else {
        let residuals = &mut *views.residuals;
        for_each_bin(
            views.column.words(),
            views.column.layout(),
            n_instances,
            |instance, bin| {
                let shifted = clip_to_finite(residuals[instance] - update[bin]);
                sum_squares += shifted * shifted;
                residuals[instance] = shifted;
            },
        );
    }
    sum_squares / n_instances as f64
}
