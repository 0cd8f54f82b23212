//! Tests for the fixed-effects estimator

use super::*;
use crate::error::ModelError;
use approx::{assert_abs_diff_eq, assert_relative_eq};
use pd_core::data::{DataFrame, Series};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

/// Five points around the line y = 0.05 + 1.99 x
fn line_frame() -> DataFrame {
    DataFrame::from_columns(vec![
        ("x", Series::float(vec![1.0, 2.0, 3.0, 4.0, 5.0])),
        ("y", Series::float(vec![2.1, 3.9, 6.2, 7.8, 10.1])),
        ("g", Series::categorical(&["a", "a", "b", "b", "c"])),
    ])
    .unwrap()
}

/// y = 2 x1 - 0.5 x2 + store effect, exactly
fn store_frame() -> DataFrame {
    let store_effect = [1.0, -2.0, 0.5, 3.0];
    let mut store = Vec::new();
    let mut x1 = Vec::new();
    let mut x2 = Vec::new();
    let mut y = Vec::new();
    for s in 0..4 {
        for t in 0..5 {
            let a = ((s * 5 + t) as f64 * 0.37).sin() + t as f64 * 0.1;
            let b = ((s * 7 + t * 3) as f64 * 0.21).cos() * 2.0;
            store.push(s as i64 + 1);
            x1.push(a);
            x2.push(b);
            y.push(2.0 * a - 0.5 * b + store_effect[s]);
        }
    }
    DataFrame::from_columns(vec![
        ("store", Series::int(store)),
        ("x1", Series::float(x1.clone())),
        ("x2", Series::float(x2)),
        ("x1_twice", Series::float(x1.iter().map(|v| 2.0 * v).collect::<Vec<_>>())),
        ("y", Series::float(y)),
    ])
    .unwrap()
}

#[test]
fn test_exact_slopes_with_store_effects() {
    let model = FixedEffectsRegression::new("y ~ x1 + x2 | store")
        .unwrap()
        .data(&store_frame())
        .fit()
        .unwrap();

    assert_abs_diff_eq!(model.coefficient("x1").unwrap(), 2.0, epsilon = 1e-9);
    assert_abs_diff_eq!(model.coefficient("x2").unwrap(), -0.5, epsilon = 1e-9);
    assert_eq!(model.coefficient_names(), vec!["x1", "x2"]);

    let stats = model.statistics();
    assert_eq!(stats.n_obs, 20);
    assert_eq!(stats.n_coefficients, 2);
    assert_eq!(stats.df_absorbed, 4);
    assert_eq!(stats.df_residual, 14);
    assert_eq!(stats.iterations, 1);
    assert!(stats.converged);
    assert!(stats.rss < 1e-16);
    assert_abs_diff_eq!(stats.r_squared, 1.0, epsilon = 1e-12);

    // Effects are only recovered on request when something is absorbed.
    assert!(!model.has_group_effects());
}

#[test]
fn test_ols_matches_hand_computation() {
    let model = FixedEffectsRegression::new("y ~ x")
        .unwrap()
        .data(&line_frame())
        .fit()
        .unwrap();

    assert_abs_diff_eq!(model.coefficient("x").unwrap(), 1.99, epsilon = 1e-10);
    assert_abs_diff_eq!(model.grand_mean().unwrap(), 0.05, epsilon = 1e-10);

    let expected_residuals = [0.06, -0.13, 0.18, -0.21, 0.10];
    for (r, e) in model.residuals().iter().zip(expected_residuals) {
        assert_abs_diff_eq!(*r, e, epsilon = 1e-10);
    }

    let stats = model.statistics();
    assert_eq!(stats.df_absorbed, 1);
    assert_eq!(stats.df_residual, 3);
    assert_eq!(stats.iterations, 0);
    assert_abs_diff_eq!(stats.rss, 0.107, epsilon = 1e-10);

    // sigma² = RSS / 3, Sxx = 10
    let coef = &model.coefficient_table()[0];
    let se = (0.107 / 3.0 / 10.0_f64).sqrt();
    assert_abs_diff_eq!(coef.std_error.unwrap(), se, epsilon = 1e-10);
    assert_abs_diff_eq!(coef.t_stat.unwrap(), 1.99 / se, epsilon = 1e-6);
    assert_eq!(coef.df, Some(3.0));
    // t(0.975, 3) = 3.182446
    assert_abs_diff_eq!(coef.ci_lower.unwrap(), 1.99 - 3.182446 * se, epsilon = 1e-5);
    assert_abs_diff_eq!(coef.ci_upper.unwrap(), 1.99 + 3.182446 * se, epsilon = 1e-5);
    assert!(coef.p_value.unwrap() < 1e-4);

    // Fitted values live on the response scale of the formula.
    let fitted = model.fitted_values();
    assert_abs_diff_eq!(fitted[0], 2.1 - 0.06, epsilon = 1e-10);
}

#[test]
fn test_heteroskedasticity_robust_errors() {
    let model = FixedEffectsRegression::new("y ~ x")
        .unwrap()
        .data(&line_frame())
        .vcov(VcovType::Hetero)
        .fit()
        .unwrap();

    // Σ dx² e² = 0.1154, bread = 1/Sxx = 0.1, HC1 factor n / (n - K) = 5/3
    let expected = 0.1154 / 100.0 * 5.0 / 3.0;
    assert_abs_diff_eq!(model.vcov()[(0, 0)], expected, epsilon = 1e-10);
    assert_abs_diff_eq!(
        model.coefficient_table()[0].std_error.unwrap(),
        expected.sqrt(),
        epsilon = 1e-10
    );
}

#[test]
fn test_cluster_robust_errors() {
    let model = FixedEffectsRegression::new("y ~ x")
        .unwrap()
        .data(&line_frame())
        .vcov(VcovType::Cluster("g".into()))
        .fit()
        .unwrap();

    // Cluster scores: a = 0.01, b = -0.21, c = 0.2
    // CR1 factor G/(G-1) · (n-1)/(n-p) = 1.5 · 4/4
    let meat = 0.01_f64.powi(2) + 0.21_f64.powi(2) + 0.2_f64.powi(2);
    let expected = meat / 100.0 * 1.5;
    assert_abs_diff_eq!(model.vcov()[(0, 0)], expected, epsilon = 1e-10);

    let stats = model.statistics();
    assert_eq!(stats.n_clusters, Some(3));
    assert_eq!(model.coefficient_table()[0].df, Some(2.0));
    assert!(model.summary().to_string().contains("Clusters: 3"));
}

#[test]
fn test_single_cluster_is_rejected() {
    let df = line_frame()
        .with_column("one", Series::categorical(&["k", "k", "k", "k", "k"]))
        .unwrap();
    let result = FixedEffectsRegression::new("y ~ x")
        .unwrap()
        .data(&df)
        .vcov(VcovType::Cluster("one".into()))
        .fit();
    assert!(matches!(result, Err(ModelError::InvalidConfig { .. })));
}

#[test]
fn test_collinear_regressors_are_named() {
    let result = FixedEffectsRegression::new("y ~ x1 + x2 + x1_twice | store")
        .unwrap()
        .data(&store_frame())
        .fit();

    match result {
        Err(ModelError::RankDeficient { columns }) => {
            assert!(columns.contains(&"x1".to_string()));
            assert!(columns.contains(&"x1_twice".to_string()));
            assert!(!columns.contains(&"x2".to_string()));
        }
        other => panic!("expected rank deficiency, got {:?}", other),
    }
}

#[test]
fn test_regressor_constant_within_groups_is_absorbed() {
    let df = store_frame();
    let store_level: Vec<f64> = df
        .column("store")
        .unwrap()
        .to_float_array()
        .unwrap()
        .mapv(|s| s * 1.5)
        .to_vec();
    let df = df.with_column("size", Series::float(store_level)).unwrap();

    let result = FixedEffectsRegression::new("y ~ x1 + size | store")
        .unwrap()
        .data(&df)
        .fit();
    match result {
        Err(ModelError::RankDeficient { columns }) => assert_eq!(columns, vec!["size"]),
        other => panic!("expected rank deficiency, got {:?}", other),
    }
}

#[test]
fn test_insufficient_data() {
    let df = DataFrame::from_columns(vec![
        ("x1", Series::float(vec![1.0, 2.0, 4.0])),
        ("x2", Series::float(vec![0.5, 0.1, 0.3])),
        ("y", Series::float(vec![1.0, 2.0, 3.0])),
    ])
    .unwrap();
    let result = FixedEffectsRegression::new("y ~ x1 + x2")
        .unwrap()
        .data(&df)
        .fit();
    assert!(matches!(
        result,
        Err(ModelError::InsufficientData {
            n_samples: 3,
            n_parameters: 3
        })
    ));
}

#[test]
fn test_missing_data_and_bad_config() {
    let no_data = FixedEffectsRegression::new("y ~ x").unwrap().fit();
    assert!(matches!(no_data, Err(ModelError::InvalidConfig { .. })));

    let bad_level = FixedEffectsRegression::new("y ~ x")
        .unwrap()
        .data(&line_frame())
        .config(EstimatorConfig::default().with_confidence_level(1.5))
        .fit();
    assert!(matches!(bad_level, Err(ModelError::InvalidConfig { .. })));

    let missing_column = FixedEffectsRegression::new("y ~ price")
        .unwrap()
        .data(&line_frame())
        .fit();
    assert!(missing_column.is_err());

    assert!(matches!(
        FixedEffectsRegression::new("y ~ x + x"),
        Err(ModelError::Formula(_))
    ));
}

#[test]
fn test_singletons_dropped_when_requested() {
    let df = DataFrame::from_columns(vec![
        ("store", Series::int(vec![1, 1, 1, 2, 2, 2, 3])),
        ("x", Series::float(vec![1.0, 2.0, 4.0, 1.5, 3.0, 2.0, 9.0])),
        ("y", Series::float(vec![3.0, 5.0, 9.0, 1.0, 4.0, 2.0, 100.0])),
    ])
    .unwrap();

    let config = EstimatorConfig::default()
        .with_demean(crate::fe::DemeanConfig::default().with_drop_singletons(true));
    let model = FixedEffectsRegression::new("y ~ x | store")
        .unwrap()
        .data(&df)
        .config(config)
        .fit()
        .unwrap();

    let stats = model.statistics();
    assert_eq!(stats.dropped_singletons, 1);
    assert_eq!(stats.n_obs, 6);
    assert_eq!(stats.df_absorbed, 2);
    // Store 1 is exactly y = 1 + 2x and store 2 is exactly y = -2 + 2x.
    assert_abs_diff_eq!(model.coefficient("x").unwrap(), 2.0, epsilon = 1e-10);
    assert!(model.summary().to_string().contains("Singletons dropped: 1"));
}

#[test]
fn test_factor_regressor_omits_first_level() {
    let region = ["east", "north", "south", "north", "east", "south", "north", "east"];
    let x = [0.5, 1.0, 2.0, 3.0, 1.5, 0.2, 2.2, 4.0];
    let shift = |r: &str| match r {
        "north" => 2.0,
        "south" => -1.0,
        _ => 0.0,
    };
    let y: Vec<f64> = region
        .iter()
        .zip(x)
        .map(|(r, x)| 1.0 + 0.5 * x + shift(r))
        .collect();
    let df = DataFrame::from_columns(vec![
        ("region", Series::categorical(&region)),
        ("x", Series::float(x.to_vec())),
        ("y", Series::float(y)),
    ])
    .unwrap();

    let model = feols("y ~ x + factor(region)", &df).unwrap();
    assert_eq!(
        model.coefficient_names(),
        vec!["x", "region[north]", "region[south]"]
    );
    assert_abs_diff_eq!(model.coefficient("x").unwrap(), 0.5, epsilon = 1e-10);
    assert_abs_diff_eq!(model.coefficient("region[north]").unwrap(), 2.0, epsilon = 1e-10);
    assert_abs_diff_eq!(model.coefficient("region[south]").unwrap(), -1.0, epsilon = 1e-10);
    assert_abs_diff_eq!(model.grand_mean().unwrap(), 1.0, epsilon = 1e-10);
}

#[test]
fn test_feols_recovers_effects_and_summarises() {
    let model = feols("y ~ x1 + x2 | store", &store_frame()).unwrap();
    let effects = model.group_effects().unwrap();

    // Effects are centred, so differences between stores are what is identified.
    let e1 = effects.effect("store", "1").unwrap();
    let e2 = effects.effect("store", "2").unwrap();
    let e4 = effects.effect("store", "4").unwrap();
    assert_abs_diff_eq!(e1 - e2, 3.0, epsilon = 1e-9);
    assert_abs_diff_eq!(e4 - e1, 2.0, epsilon = 1e-9);
    assert_abs_diff_eq!(
        model.grand_mean().unwrap() + e1,
        1.0,
        epsilon = 1e-9
    );

    let summary = model.summary();
    assert_eq!(summary.fixed_effects.len(), 1);
    assert_eq!(summary.fixed_effects[0].levels, 4);
    assert!(summary.coefficient("x1").is_some());
    let text = summary.to_string();
    assert!(text.contains("Formula: y ~ x1 + x2 | store"));
    assert!(text.contains("x2"));
    assert!(text.contains("Absorbed DF: 4"));
    assert!(text.contains("[2.5%"));
}

#[test]
fn test_two_way_noisy_panel_recovers_elasticities() {
    let mut rng = StdRng::seed_from_u64(7);
    let noise = Normal::new(0.0, 0.05).unwrap();
    let (n_stores, n_weeks) = (20, 10);
    let store_effect: Vec<f64> = (0..n_stores).map(|_| rng.random_range(2.0..4.0)).collect();
    let week_effect: Vec<f64> = (0..n_weeks).map(|_| rng.random_range(-0.3..0.3)).collect();

    let mut store = Vec::new();
    let mut week = Vec::new();
    let mut price = Vec::new();
    let mut promo = Vec::new();
    let mut units = Vec::new();
    for s in 0..n_stores {
        for w in 0..n_weeks {
            let p: f64 = rng.random_range(1.5..3.5);
            let on_promo = rng.random_bool(0.3);
            let log_q = store_effect[s] + week_effect[w] - 1.5 * p.ln()
                + if on_promo { 0.3 } else { 0.0 }
                + noise.sample(&mut rng);
            store.push(s as i64);
            week.push(w as i64);
            price.push(p);
            promo.push(on_promo);
            units.push(log_q.exp_m1());
        }
    }
    let df = DataFrame::from_columns(vec![
        ("store", Series::int(store)),
        ("week", Series::int(week)),
        ("price", Series::float(price)),
        ("promo", Series::bool(promo)),
        ("units", Series::float(units)),
    ])
    .unwrap();

    let model = FixedEffectsRegression::new("log1p(units) ~ log(price) + promo | store + week")
        .unwrap()
        .data(&df)
        .vcov(VcovType::Cluster("store".into()))
        .fit()
        .unwrap();

    let stats = model.statistics();
    assert!(stats.converged);
    assert!(stats.iterations >= 1);
    assert_eq!(stats.n_obs, 200);
    assert_eq!(stats.df_absorbed, 29);
    assert_eq!(stats.df_residual, 200 - 2 - 29);
    assert_eq!(stats.n_clusters, Some(20));
    assert!(stats.r_squared > 0.9);
    assert!(stats.r_squared_within > 0.9);

    let elasticity = model.summary().coefficient("log(price)").cloned().unwrap();
    assert_relative_eq!(elasticity.estimate, -1.5, max_relative = 0.1);
    assert!(elasticity.std_error.unwrap() > 0.0);
    assert!(elasticity.p_value.unwrap() < 0.01);
    assert!(elasticity.ci_lower.unwrap() < elasticity.estimate);
    assert!(elasticity.ci_upper.unwrap() > elasticity.estimate);
    assert_abs_diff_eq!(model.coefficient("promo").unwrap(), 0.3, epsilon = 0.05);
}

#[test]
fn test_coefficient_row_inference() {
    use crate::base::Coefficient;
    use statrs::distribution::StudentsT;

    let t3 = StudentsT::new(0.0, 1.0, 3.0).unwrap();
    let row = Coefficient::tested("log(price_a)", 2.0, 0.5, &t3, 3.182446);
    assert_abs_diff_eq!(row.t_stat.unwrap(), 4.0, epsilon = 1e-12);
    assert_eq!(row.df, Some(3.0));
    let (lo, hi) = row.interval().unwrap();
    assert_abs_diff_eq!(lo, 2.0 - 1.591223, epsilon = 1e-9);
    assert_abs_diff_eq!(hi, 2.0 + 1.591223, epsilon = 1e-9);
    // Two-sided p for t = 4 on 3 df is about 0.028.
    assert_abs_diff_eq!(row.p_value.unwrap(), 0.028, epsilon = 1e-3);
    assert!(row.is_significant(0.05));
    assert!(!row.is_significant(0.01));

    let broken = Coefficient::tested("log(price_b)", 2.0, f64::NAN, &t3, 3.182446);
    assert_eq!(broken.std_error, None);
    assert_eq!(broken.interval(), None);
    assert!(!broken.is_significant(0.05));
}
