//! Tests for prediction and hold-out validation

use super::*;
use crate::lm::{FixedEffectsRegression, feols};
use approx::assert_abs_diff_eq;
use ndarray::array;
use pd_core::data::Series;

/// Three stores over four weeks, y = 1.5 x + store shift + a small wobble
fn training_frame() -> DataFrame {
    let shift = [0.0, 2.0, -1.0];
    let mut store = Vec::new();
    let mut x = Vec::new();
    let mut y = Vec::new();
    for s in 0..3 {
        for w in 0..4 {
            let xi = 1.0 + (s * 4 + w) as f64 * 0.3 + (w as f64).sin();
            let wobble = 0.05 * ((s * 4 + w) as f64 * 1.7).cos();
            store.push(s as i64 + 1);
            x.push(xi);
            y.push(1.5 * xi + shift[s] + wobble);
        }
    }
    DataFrame::from_columns(vec![
        ("store", Series::int(store)),
        ("x", Series::float(x)),
        ("y", Series::float(y)),
    ])
    .unwrap()
}

fn new_rows() -> DataFrame {
    DataFrame::from_columns(vec![
        ("store", Series::int(vec![2, 4, 1, 5])),
        ("x", Series::float(vec![1.0, 2.0, 3.0, 4.0])),
        ("y", Series::float(vec![0.0, 0.0, 0.0, 0.0])),
    ])
    .unwrap()
}

#[test]
fn test_in_sample_prediction_matches_fitted_values() {
    let train = training_frame();
    let model = feols("y ~ x | store", &train).unwrap();

    let predicted = model.predict(&train).unwrap();
    assert_eq!(predicted.len(), train.nrows());
    for (p, f) in predicted.iter().zip(model.fitted_values()) {
        assert_abs_diff_eq!(*p, *f, epsilon = 1e-9);
    }
}

#[test]
fn test_strict_mode_reports_first_unseen_row() {
    let model = feols("y ~ x | store", &training_frame()).unwrap();
    match model.predict(&new_rows()) {
        Err(ModelError::UnseenCategory {
            variable,
            level,
            row,
        }) => {
            assert_eq!(variable, "store");
            assert_eq!(level, "4");
            assert_eq!(row, 1);
        }
        other => panic!("expected an unseen category, got {:?}", other),
    }
}

#[test]
fn test_lenient_mode_excludes_unseen_rows() {
    let model = feols("y ~ x | store", &training_frame()).unwrap();
    let prediction = model
        .predict_with(&new_rows(), PredictionMode::Lenient)
        .unwrap();

    assert_eq!(prediction.rows, vec![0, 2]);
    assert_eq!(prediction.len(), 2);
    assert_eq!(prediction.n_excluded(), 2);
    assert_eq!(
        prediction
            .unseen
            .iter()
            .map(|u| (u.row, u.level.as_str()))
            .collect::<Vec<_>>(),
        vec![(1, "4"), (3, "5")]
    );

    let effects = model.group_effects().unwrap();
    let beta = model.coefficient("x").unwrap();
    let expected_first = effects.grand_mean + beta * 1.0 + effects.effect("store", "2").unwrap();
    let expected_third = effects.grand_mean + beta * 3.0 + effects.effect("store", "1").unwrap();
    assert_abs_diff_eq!(prediction.values[0], expected_first, epsilon = 1e-12);
    assert_abs_diff_eq!(prediction.values[1], expected_third, epsilon = 1e-12);

    let laid_out = prediction.by_row(4);
    assert!(laid_out[0].is_some());
    assert_eq!(laid_out[1], None);
    assert!(laid_out[2].is_some());
    assert_eq!(laid_out[3], None);
}

#[test]
fn test_prediction_needs_group_effects() {
    let train = training_frame();
    let model = FixedEffectsRegression::new("y ~ x | store")
        .unwrap()
        .data(&train)
        .fit()
        .unwrap();

    assert!(matches!(
        model.predict(&train),
        Err(ModelError::GroupEffectsUnavailable)
    ));

    let slopes = model.coefficients().clone();
    let model = model.with_group_effects(&train).unwrap();
    assert_eq!(model.coefficients(), &slopes);
    assert!(model.predict(&train).is_ok());
}

#[test]
fn test_unseen_factor_level() {
    let train = DataFrame::from_columns(vec![
        ("region", Series::categorical(&["east", "north", "east", "north", "east", "north"])),
        ("x", Series::float(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.5])),
        ("y", Series::float(vec![2.0, 5.1, 6.0, 8.9, 10.1, 14.0])),
    ])
    .unwrap();
    let model = feols("y ~ x + factor(region)", &train).unwrap();

    let fresh = DataFrame::from_columns(vec![
        ("region", Series::categorical(&["north", "west"])),
        ("x", Series::float(vec![2.0, 2.0])),
    ])
    .unwrap();

    match model.predict(&fresh) {
        Err(ModelError::UnseenCategory { variable, level, row }) => {
            assert_eq!((variable.as_str(), level.as_str(), row), ("region", "west", 1));
        }
        other => panic!("expected an unseen category, got {:?}", other),
    }

    let lenient = model.predict_with(&fresh, PredictionMode::Lenient).unwrap();
    assert_eq!(lenient.rows, vec![0]);
    let expected = model.grand_mean().unwrap()
        + 2.0 * model.coefficient("x").unwrap()
        + model.coefficient("region[north]").unwrap();
    assert_abs_diff_eq!(lenient.values[0], expected, epsilon = 1e-12);
}

#[test]
fn test_response_transform_inverts_predictions() {
    let train = training_frame();
    let units = train.float_column("y").unwrap().mapv(|v| v.exp_m1());
    let train = train.with_column("units", Series::float(units)).unwrap();
    let model = feols("log1p(units) ~ x | store", &train).unwrap();

    let link = model.predict(&train).unwrap();
    let levels = model.response_transform().inverse_array(&link);
    for (q, l) in levels.iter().zip(link.iter()) {
        assert_eq!(*q, l.exp_m1());
    }
    // The log1p response reproduces the level-scale fit.
    let direct = feols("y ~ x | store", &train).unwrap();
    assert_abs_diff_eq!(
        model.coefficient("x").unwrap(),
        direct.coefficient("x").unwrap(),
        epsilon = 1e-9
    );
}

#[test]
fn test_validation_metrics_by_hand() {
    let actual = array![1.0, 2.0, 3.0, 4.0];
    let predicted = array![1.5, 2.0, 2.5, 4.0];
    let metrics = ValidationMetrics::compute(&actual, &predicted).unwrap();

    assert_eq!(metrics.n, 4);
    assert_abs_diff_eq!(metrics.rmse, 0.125_f64.sqrt(), epsilon = 1e-12);
    assert_abs_diff_eq!(metrics.mae, 0.25, epsilon = 1e-12);
    assert_abs_diff_eq!(metrics.r_squared, 0.9, epsilon = 1e-12);

    assert!(ValidationMetrics::compute(&actual, &array![1.0]).is_err());
    let empty = Array1::<f64>::zeros(0);
    assert!(ValidationMetrics::compute(&empty, &empty).is_err());
}

#[test]
fn test_validate_on_hold_out_rows() {
    let train = training_frame();
    let model = feols("y ~ x | store", &train).unwrap();

    let in_sample = model.validate(&train, PredictionMode::Strict).unwrap();
    assert_eq!(in_sample.n, 12);
    assert_abs_diff_eq!(
        in_sample.rmse,
        model.statistics().rmse,
        epsilon = 1e-9
    );
    assert!(in_sample.r_squared > 0.99);

    let partial = model.validate(&new_rows(), PredictionMode::Lenient).unwrap();
    assert_eq!(partial.n, 2);
    assert!(model.validate(&new_rows(), PredictionMode::Strict).is_err());
}

#[test]
fn test_unbalanced_two_way_prediction_matches_fitted_values() {
    let store_shift = [0.0, 1.5, -0.5, 2.5, 0.7];
    let week_shift = [0.0, 0.4, -0.3, 0.9, 0.1, -0.6];
    let mut store = Vec::new();
    let mut week = Vec::new();
    let mut x = Vec::new();
    let mut y = Vec::new();
    for s in 0..5 {
        for w in 0..6 {
            // every week misses one store
            if (s + 2 * w) % 5 == 0 {
                continue;
            }
            let xi = 0.5 + ((s * 6 + w) as f64 * 0.9).sin() + 0.1 * w as f64;
            let wobble = 0.03 * ((s * 6 + w) as f64 * 2.3).cos();
            store.push(s as i64);
            week.push(w as i64);
            x.push(xi);
            y.push(0.8 * xi + store_shift[s] + week_shift[w] + wobble);
        }
    }
    let train = DataFrame::from_columns(vec![
        ("store", Series::int(store)),
        ("week", Series::int(week)),
        ("x", Series::float(x)),
        ("y", Series::float(y)),
    ])
    .unwrap();
    assert!(train.nrows() < 30);

    let model = feols("y ~ x | store + week", &train).unwrap();
    assert!(model.group_effects().unwrap().converged);
    let predicted = model.predict(&train).unwrap();
    for (p, f) in predicted.iter().zip(model.fitted_values()) {
        assert_abs_diff_eq!(*p, *f, epsilon = 1e-6);
    }
}

#[test]
fn test_one_way_effects_from_training_means() {
    let train = training_frame();
    let bare = FixedEffectsRegression::new("y ~ x | store")
        .unwrap()
        .data(&train)
        .fit()
        .unwrap();
    let y_mean = train.float_column("y").unwrap().mean().unwrap();
    assert_abs_diff_eq!(bare.training_means().grand[0], y_mean, epsilon = 1e-12);

    let from_means = bare.clone().with_training_group_effects().unwrap();
    let from_rows = bare.with_group_effects(&train).unwrap();
    let (a, b) = (
        from_means.group_effects().unwrap(),
        from_rows.group_effects().unwrap(),
    );
    assert_abs_diff_eq!(a.grand_mean, b.grand_mean, epsilon = 1e-10);
    for level in ["1", "2", "3"] {
        assert_abs_diff_eq!(
            a.effect("store", level).unwrap(),
            b.effect("store", level).unwrap(),
            epsilon = 1e-10
        );
    }
    let predicted = from_means.predict(&new_rows().filter(&[true, false, true, false]).unwrap());
    assert_eq!(predicted.unwrap().len(), 2);

    let mut weeks = Vec::new();
    for _ in 0..3 {
        weeks.extend([1_i64, 2, 3, 4]);
    }
    let panel = train.with_column("week", Series::int(weeks)).unwrap();
    let two_way = FixedEffectsRegression::new("y ~ x | store + week")
        .unwrap()
        .data(&panel)
        .fit()
        .unwrap();
    assert!(matches!(
        two_way.with_training_group_effects(),
        Err(ModelError::InvalidConfig { .. })
    ));
}
