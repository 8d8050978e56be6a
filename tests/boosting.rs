//! Engine-level boosting-round tests.
//!
//! These drive whole rounds the way the outer loop would: build an update
//! tensor from training-set statistics, apply it to both sets, and watch the
//! validation metric.

use ebm_core::{
    DatasetRole, Engine, EngineConfig, Feature, Objective, SegmentedTensor, TargetValues,
};

fn update_tensor(values: &[f64], bin_counts: &[usize], vector_length: usize) -> SegmentedTensor {
    let mut tensor = SegmentedTensor::allocate(bin_counts.len(), vector_length).unwrap();
    tensor.reshape(bin_counts).unwrap();
    tensor.values_mut().copy_from_slice(values);
    tensor
}

/// Mean residual per bin on the training set: the outer loop's simplest
/// possible shape-function fit.
fn mean_residual_update(engine: &Engine, bins: &[usize], bin_count: usize) -> SegmentedTensor {
    let training = engine.training().unwrap();
    let mut sums = vec![0.0f64; bin_count];
    let mut counts = vec![0u64; bin_count];
    for (i, &bin) in bins.iter().enumerate() {
        sums[bin] += training.residuals()[i];
        counts[bin] += 1;
    }
    for (sum, &count) in sums.iter_mut().zip(&counts) {
        if count > 0 {
            *sum /= count as f64;
        }
    }
    update_tensor(&sums, &[bin_count], 1)
}

#[test]
fn regression_rounds_drive_validation_mse_down() {
    // target depends only on the binned feature
    let train_bins: Vec<usize> = (0..64).map(|i| i % 4).collect();
    let train_targets: Vec<f64> = train_bins.iter().map(|&b| b as f64 * 2.0 - 3.0).collect();
    let valid_bins: Vec<usize> = (0..32).map(|i| (i * 3) % 4).collect();
    let valid_targets: Vec<f64> = valid_bins.iter().map(|&b| b as f64 * 2.0 - 3.0).collect();

    let mut engine = Engine::new(
        Objective::Regression,
        vec![Feature::ordinal(4)],
        &[&[0]],
        42,
        EngineConfig::default(),
    )
    .unwrap();
    engine
        .attach_dataset(
            DatasetRole::Training,
            TargetValues::Continuous(train_targets),
            &[],
            &[&train_bins],
        )
        .unwrap();
    engine
        .attach_dataset(
            DatasetRole::Validation,
            TargetValues::Continuous(valid_targets),
            &[],
            &[&valid_bins],
        )
        .unwrap();

    let mut last_metric = f64::MAX;
    for _round in 0..3 {
        let update = mean_residual_update(&engine, &train_bins, 4);
        engine.apply_training_update(0, &update).unwrap();
        let metric = engine.apply_validation_update(0, &update).unwrap();
        assert!(metric <= last_metric, "validation MSE must not increase");
        last_metric = metric;
    }
    // one mean-per-bin step already solves this separable problem
    assert!(last_metric < 1e-20);
}

#[test]
fn binary_round_improves_log_loss_on_separable_data() {
    let bins: Vec<usize> = (0..40).map(|i| i % 2).collect();
    let targets: Vec<u32> = bins.iter().map(|&b| b as u32).collect();

    let mut engine = Engine::new(
        Objective::BinaryClassification,
        vec![Feature::ordinal(2)],
        &[&[0]],
        1,
        EngineConfig::default(),
    )
    .unwrap();
    for role in [DatasetRole::Training, DatasetRole::Validation] {
        engine
            .attach_dataset(
                role,
                TargetValues::ClassIndices(targets.clone()),
                &[],
                &[&bins],
            )
            .unwrap();
    }

    let baseline = engine
        .apply_validation_update(0, &update_tensor(&[0.0, 0.0], &[2], 1))
        .unwrap();
    assert!((baseline - std::f64::consts::LN_2).abs() < 1e-12);

    // push bin 0 toward class 0 and bin 1 toward class 1
    let update = update_tensor(&[-1.0, 1.0], &[2], 1);
    engine.apply_training_update(0, &update).unwrap();
    let improved = engine.apply_validation_update(0, &update).unwrap();
    assert!(improved < baseline);
}

#[test]
fn multiclass_pair_combination_round() {
    // 3 classes keyed by the XOR-ish pattern of two binary features
    let f0: Vec<usize> = vec![0, 0, 1, 1, 0, 1, 0, 1, 0, 0, 1, 1];
    let f1: Vec<usize> = vec![0, 1, 0, 1, 0, 0, 1, 1, 1, 0, 1, 0];
    let targets: Vec<u32> = f0
        .iter()
        .zip(&f1)
        .map(|(&a, &b)| ((a + 2 * b) % 3) as u32)
        .collect();

    let mut engine = Engine::new(
        Objective::Multiclass { n_classes: 3 },
        vec![Feature::ordinal(2), Feature::ordinal(2)],
        &[&[0, 1]],
        9,
        EngineConfig::default(),
    )
    .unwrap();
    for role in [DatasetRole::Training, DatasetRole::Validation] {
        engine
            .attach_dataset(role, TargetValues::ClassIndices(targets.clone()), &[], &[&f0, &f1])
            .unwrap();
    }

    let baseline = engine
        .apply_validation_update(0, &update_tensor(&vec![0.0; 12], &[2, 2], 3))
        .unwrap();
    assert!((baseline - 3.0f64.ln()).abs() < 1e-12);

    // boost the true class of each of the four cells
    let mut values = vec![0.0f64; 12];
    for cell in 0..4 {
        let (a, b) = (cell % 2, cell / 2);
        values[cell * 3 + (a + 2 * b) % 3] = 2.0;
    }
    let update = update_tensor(&values, &[2, 2], 3);
    engine.apply_training_update(0, &update).unwrap();
    let improved = engine.apply_validation_update(0, &update).unwrap();
    assert!(improved < baseline);
}

#[test]
fn interaction_scorer_ranks_joint_structure_above_marginal() {
    // residuals follow XOR of features 0 and 1; feature 2 is noise-free but
    // carries no joint structure with 0
    let f0: Vec<usize> = vec![0, 0, 1, 1, 0, 0, 1, 1];
    let f1: Vec<usize> = vec![0, 1, 0, 1, 0, 1, 0, 1];
    let f2: Vec<usize> = vec![0, 0, 0, 0, 1, 1, 1, 1];
    let targets: Vec<f64> = f0
        .iter()
        .zip(&f1)
        .map(|(&a, &b)| if a ^ b == 1 { 1.0 } else { -1.0 })
        .collect();

    let mut engine = Engine::new(
        Objective::Regression,
        vec![
            Feature::ordinal(2),
            Feature::ordinal(2),
            Feature::ordinal(2),
        ],
        &[],
        3,
        EngineConfig::default(),
    )
    .unwrap();
    engine
        .attach_dataset(
            DatasetRole::Training,
            TargetValues::Continuous(targets),
            &[],
            &[&f0, &f1, &f2],
        )
        .unwrap();

    let xor_pair = engine.score_interaction(&[0, 1], 0).unwrap();
    let null_pair = engine.score_interaction(&[0, 2], 0).unwrap();
    assert!(xor_pair > null_pair);
    assert!(null_pair >= 0.0);
}

#[test]
fn interaction_scoring_leaves_state_untouched() {
    let bins: Vec<usize> = vec![0, 1, 0, 1];
    let mut engine = Engine::new(
        Objective::Regression,
        vec![Feature::ordinal(2)],
        &[&[0]],
        0,
        EngineConfig::default(),
    )
    .unwrap();
    engine
        .attach_dataset(
            DatasetRole::Training,
            TargetValues::Continuous(vec![1.0, -2.0, 3.0, -4.0]),
            &[],
            &[&bins],
        )
        .unwrap();

    let before = engine.training().unwrap().residuals().to_vec();
    engine.score_interaction(&[0], 0).unwrap();
    assert_eq!(engine.training().unwrap().residuals(), &before[..]);
}

#[test]
fn wide_bin_counts_take_the_dynamic_pack_width() {
    // 1000 bins need 10 bits, giving 6 items per word, which is not one of
    // the monomorphized widths
    let n = 257;
    let bins: Vec<usize> = (0..n).map(|i| (i * 37) % 1000).collect();
    let targets: Vec<f64> = bins.iter().map(|&b| (b % 7) as f64).collect();

    let mut engine = Engine::new(
        Objective::Regression,
        vec![Feature::ordinal(1000)],
        &[&[0]],
        0,
        EngineConfig::default(),
    )
    .unwrap();
    engine
        .attach_dataset(
            DatasetRole::Validation,
            TargetValues::Continuous(targets.clone()),
            &[],
            &[&bins],
        )
        .unwrap();

    // an update equal to the target for each occupied bin zeroes the MSE
    let mut values = vec![0.0f64; 1000];
    for (&bin, &target) in bins.iter().zip(&targets) {
        values[bin] = target;
    }
    let metric = engine
        .apply_validation_update(0, &update_tensor(&values, &[1000], 1))
        .unwrap();
    assert!(metric < 1e-20);
}
