//! Summary statistics of a simulated run.

use chrono::DateTime;
use serde::{Deserialize, Serialize};

use dpr_schemas::PriceFrame;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PortfolioStats {
    #[serde(rename = "Start")]
    pub start: String,
    #[serde(rename = "End")]
    pub end: String,
    #[serde(rename = "Period")]
    pub period: String,
    #[serde(rename = "Start Value")]
    pub start_value: f64,
    #[serde(rename = "End Value")]
    pub end_value: f64,
    #[serde(rename = "Total Return [%]")]
    pub total_return_pct: f64,
    #[serde(rename = "Benchmark Return [%]")]
    pub benchmark_return_pct: f64,
    #[serde(rename = "Sharpe Ratio")]
    pub sharpe_ratio: f64,
}

/// Stats over an equity curve and the (forward-filled) price frame it was
/// marked on.
///
/// - Period counts frame rows as days, rendered like a pandas Timedelta.
/// - Benchmark is the equal-weight buy-and-hold return of every symbol that
///   has a price.
/// - Sharpe uses per-row equity returns (ddof = 1) annualised by
///   `sqrt(year_freq)`; a flat curve scores 0.
pub fn compute_stats(
    marks: &PriceFrame,
    equity_curve: &[(i64, f64)],
    init_cash: f64,
    year_freq: u32,
) -> PortfolioStats {
    let start_ts = equity_curve.first().map(|(t, _)| *t).unwrap_or(0);
    let end_ts = equity_curve.last().map(|(t, _)| *t).unwrap_or(0);
    let end_value = equity_curve.last().map(|(_, v)| *v).unwrap_or(init_cash);

    PortfolioStats {
        start: fmt_ts(start_ts),
        end: fmt_ts(end_ts),
        period: format!("{} days 00:00:00", equity_curve.len()),
        start_value: init_cash,
        end_value,
        total_return_pct: (end_value / init_cash - 1.0) * 100.0,
        benchmark_return_pct: benchmark_return(marks) * 100.0,
        sharpe_ratio: sharpe(equity_curve, year_freq),
    }
}

fn fmt_ts(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

fn benchmark_return(marks: &PriceFrame) -> f64 {
    let mut total = 0.0;
    let mut n = 0usize;
    for c in 0..marks.n_cols() {
        let col = marks.column(c);
        let first = col.iter().copied().find(|p| p.is_finite() && *p > 0.0);
        let last = col.iter().rev().copied().find(|p| p.is_finite());
        if let (Some(f), Some(l)) = (first, last) {
            total += l / f - 1.0;
            n += 1;
        }
    }
    if n == 0 {
        0.0
    } else {
        total / n as f64
    }
}

fn sharpe(equity_curve: &[(i64, f64)], year_freq: u32) -> f64 {
    let returns: Vec<f64> = equity_curve
        .windows(2)
        .filter(|w| w[0].1 > 0.0)
        .map(|w| w[1].1 / w[0].1 - 1.0)
        .collect();
    if returns.len() < 2 {
        return 0.0;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let var = returns.iter().map(|r| (r - mean) * (r - mean)).sum::<f64>() / (n - 1.0);
    let std = var.sqrt();
    if std <= 0.0 {
        0.0
    } else {
        mean / std * f64::from(year_freq).sqrt()
    }
}
