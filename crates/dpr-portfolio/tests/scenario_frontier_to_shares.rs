//! Prices -> estimates -> frontier -> clean weights -> whole shares.

use dpr_portfolio::{
    latest_prices, mean_historical_return, nonzero_positions, sample_cov, DiscreteAllocation,
    EfficientFrontier,
};
use dpr_schemas::PriceFrame;

/// Four deterministic price paths with distinct drift and wiggle.
fn frame() -> PriceFrame {
    let rows = 300usize;
    let specs = [("AAA", 0.0008, 0.010), ("BBB", 0.0004, 0.006), ("CCC", 0.0006, 0.015), ("DDD", 0.0002, 0.004)];
    let columns = specs
        .iter()
        .enumerate()
        .map(|(k, (sym, drift, amp))| {
            let mut p = 50.0 + 10.0 * k as f64;
            let col = (0..rows)
                .map(|t| {
                    let wiggle = amp * ((t as f64) * (0.7 + 0.31 * k as f64)).sin();
                    p *= 1.0 + drift + wiggle;
                    p
                })
                .collect();
            (sym.to_string(), col)
        })
        .collect();
    PriceFrame::from_columns((0..rows as i64).map(|t| t * 86_400).collect(), columns).unwrap()
}

#[test]
fn pipeline_respects_budget_and_widens_with_gamma() {
    let f = frame();
    let mu = mean_historical_return(&f, 252).unwrap();
    let cov = sample_cov(&f, 252).unwrap();
    let prices = latest_prices(&f);

    let mut counts = Vec::new();
    for gamma in [0.0, 0.5, 50.0] {
        let mut ef = EfficientFrontier::new(f.symbols().to_vec(), mu.clone(), cov.clone())
            .unwrap()
            .with_l2_reg(gamma);
        ef.max_sharpe(0.02).unwrap();
        let clean = ef.clean_weights(1e-4, 5).unwrap();
        assert!((clean.values().sum::<f64>() - 1.0).abs() < 1e-4);

        let alloc = DiscreteAllocation::new(&clean, &prices, 10_000.0)
            .unwrap()
            .greedy_portfolio();
        let spent: f64 = alloc
            .shares
            .iter()
            .map(|(s, k)| prices[s] * *k as f64)
            .sum();
        assert!(spent <= 10_000.0);
        counts.push(nonzero_positions(&alloc.shares));
    }
    assert!(counts[2] >= counts[0], "{counts:?}");
    assert_eq!(counts[2], 4, "{counts:?}");
}
