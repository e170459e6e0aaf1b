use std::collections::BTreeMap;

use dpr_diversify::{DiversifyError, DiversitySearch, RunSettings, SearchInputs, Variant};
use dpr_portfolio::{latest_prices, mean_historical_return, nonzero_positions, sample_cov};
use dpr_schemas::PriceFrame;

/// Deterministic wavy price paths: `p0 * exp(drift * t + amp * sin(freq * t))`.
fn wavy_frame(specs: &[(&str, f64, f64, f64, f64)], rows: usize) -> PriceFrame {
    let timestamps: Vec<i64> = (0..rows as i64).map(|i| 1_577_923_200 + i * 86_400).collect();
    let columns = specs
        .iter()
        .map(|(sym, p0, drift, amp, freq)| {
            let path = (0..rows)
                .map(|t| {
                    let t = t as f64;
                    p0 * (drift * t + amp * (freq * t).sin()).exp()
                })
                .collect();
            (sym.to_string(), path)
        })
        .collect();
    PriceFrame::from_columns(timestamps, columns).unwrap()
}

fn growing_universe() -> PriceFrame {
    wavy_frame(
        &[
            ("AAA", 100.0, 0.0010, 0.020, 0.3),
            ("BBB", 50.0, 0.0006, 0.030, 0.7),
            ("CCC", 80.0, 0.0004, 0.015, 1.1),
            ("DDD", 30.0, 0.0008, 0.040, 0.5),
            ("EEE", 60.0, 0.0002, 0.010, 1.7),
        ],
        300,
    )
}

struct Estimates {
    mu: nalgebra::DVector<f64>,
    cov: nalgebra::DMatrix<f64>,
    latest: BTreeMap<String, f64>,
}

fn estimate(frame: &PriceFrame, settings: &RunSettings) -> Estimates {
    Estimates {
        mu: mean_historical_return(frame, settings.year_freq).unwrap(),
        cov: sample_cov(frame, settings.year_freq).unwrap(),
        latest: latest_prices(frame),
    }
}

fn inputs<'a>(frame: &'a PriceFrame, est: &'a Estimates, amount: f64) -> SearchInputs<'a> {
    SearchInputs {
        prices: frame,
        mu: &est.mu,
        cov: &est.cov,
        latest_prices: &est.latest,
        investment_amount: amount,
        sector_constraints: &[],
    }
}

#[test]
fn search_never_returns_fewer_positions_than_requested() {
    let frame = growing_universe();
    let settings = RunSettings::default();
    let est = estimate(&frame, &settings);
    let search = DiversitySearch::new(inputs(&frame, &est, 10_000.0), &settings);

    for variant in Variant::ALL {
        for target in 1..=5 {
            let out = search.run(variant, target).unwrap();
            assert!(out.diversity >= target, "{variant} target={target}: {}", out.diversity);
            assert!(nonzero_positions(&out.allocation.shares) >= target);
            assert_eq!(out.gamma_trajectory.last().copied(), Some(out.gamma));
            let executed = out.report.executed_symbols();
            for sym in out.allocation.shares.keys() {
                assert!(executed.contains(sym), "{sym} held but never executed");
            }
        }
    }
}

#[test]
fn higher_targets_never_need_less_gamma() {
    let frame = growing_universe();
    let settings = RunSettings::default();
    let est = estimate(&frame, &settings);
    let search = DiversitySearch::new(inputs(&frame, &est, 10_000.0), &settings);

    let low = search.run(Variant::MaxSharpe, 1).unwrap();
    let high = search.run(Variant::MaxSharpe, 5).unwrap();
    assert_eq!(low.gamma, settings.initial_gamma);
    assert_eq!(low.iterations(), 1);
    assert!(high.gamma >= low.gamma);
    // Each step adds exactly gamma_step.
    for pair in high.gamma_trajectory.windows(2) {
        approx::assert_relative_eq!(pair[1] - pair[0], settings.gamma_step, epsilon = 1e-12);
    }
}

#[test]
fn unaffordable_symbol_makes_target_unreachable_within_bound() {
    let frame = wavy_frame(
        &[
            ("AAA", 100.0, 0.0010, 0.020, 0.3),
            ("BBB", 50.0, 0.0006, 0.030, 0.7),
            ("ZZZ", 1_000_000.0, 0.0008, 0.010, 0.9),
        ],
        250,
    );
    let settings = RunSettings {
        max_iterations: 5,
        ..RunSettings::default()
    };
    let est = estimate(&frame, &settings);
    let search = DiversitySearch::new(inputs(&frame, &est, 1_000.0), &settings);

    match search.run(Variant::MaxSharpe, 3) {
        Err(DiversifyError::TargetUnreachable {
            target,
            best_count,
            iterations,
            last_gamma,
            ..
        }) => {
            assert_eq!(target, 3);
            assert!(best_count <= 2);
            assert_eq!(iterations, 5);
            approx::assert_relative_eq!(last_gamma, settings.gamma_at(5), epsilon = 1e-12);
        }
        other => panic!("expected TargetUnreachable, got {other:?}"),
    }
}

#[test]
fn target_above_universe_size_fails_without_iterating() {
    let frame = growing_universe();
    let settings = RunSettings::default();
    let est = estimate(&frame, &settings);
    let search = DiversitySearch::new(inputs(&frame, &est, 10_000.0), &settings);

    match search.run(Variant::EfficientRisk, 6) {
        Err(DiversifyError::TargetUnreachable { iterations, .. }) => assert_eq!(iterations, 0),
        other => panic!("expected TargetUnreachable, got {other:?}"),
    }
}

#[test]
fn infeasible_objective_propagates_as_distinct_error() {
    let falling = wavy_frame(
        &[
            ("AAA", 100.0, -0.0010, 0.020, 0.3),
            ("BBB", 50.0, -0.0006, 0.030, 0.7),
            ("CCC", 80.0, -0.0004, 0.015, 1.1),
        ],
        250,
    );
    let settings = RunSettings::default();
    let est = estimate(&falling, &settings);
    let search = DiversitySearch::new(inputs(&falling, &est, 10_000.0), &settings);

    for variant in [Variant::MaxSharpe, Variant::EfficientReturn] {
        match search.run(variant, 1) {
            Err(DiversifyError::OptimizationInfeasible { variant: v, gamma, .. }) => {
                assert_eq!(v, variant);
                assert_eq!(gamma, settings.initial_gamma);
            }
            other => panic!("expected OptimizationInfeasible for {variant}, got {other:?}"),
        }
    }

    // A volatility cap below the minimum attainable volatility is infeasible too.
    let tight = RunSettings {
        max_risk: 1e-6,
        ..RunSettings::default()
    };
    let search = DiversitySearch::new(inputs(&falling, &est, 10_000.0), &tight);
    let err = search.run(Variant::EfficientRisk, 1).unwrap_err();
    assert_eq!(err.kind(), "optimization_infeasible");
}

#[test]
fn identical_inputs_give_identical_trajectories() {
    let frame = growing_universe();
    let settings = RunSettings::default();
    let est = estimate(&frame, &settings);
    let search = DiversitySearch::new(inputs(&frame, &est, 10_000.0), &settings);

    for variant in Variant::ALL {
        let a = search.run(variant, 4).unwrap();
        let b = search.run(variant, 4).unwrap();
        assert_eq!(a.gamma_trajectory, b.gamma_trajectory);
        assert_eq!(a.allocation, b.allocation);
        assert_eq!(a.weights, b.weights);
        assert_eq!(a.report, b.report);
    }
}
