use std::collections::BTreeMap;

use dpr_schemas::PriceFrame;

use crate::stats::compute_stats;
use crate::types::{BacktestConfig, BacktestReport, ExecutedOrder};

/// Tolerance on the sum of target percents; rounded weights overshoot 1 slightly.
const WEIGHT_SUM_TOL: f64 = 1e-3;

#[derive(Clone, Debug, PartialEq)]
pub enum BacktestError {
    InvalidCash(f64),
    EmptyFrame,
    UnknownSymbol(String),
    NegativeWeight { symbol: String, weight: f64 },
    WeightsExceedOne(f64),
}

impl core::fmt::Display for BacktestError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            BacktestError::InvalidCash(c) => write!(f, "initial cash must be positive, got {}", c),
            BacktestError::EmptyFrame => write!(f, "price frame has no rows or columns"),
            BacktestError::UnknownSymbol(s) => write!(f, "weight given for unknown symbol '{}'", s),
            BacktestError::NegativeWeight { symbol, weight } => {
                write!(f, "negative target percent {} for '{}'", weight, symbol)
            }
            BacktestError::WeightsExceedOne(sum) => {
                write!(f, "target percents sum to {} (> 1) without leverage", sum)
            }
        }
    }
}

impl std::error::Error for BacktestError {}

pub struct BacktestEngine {
    config: BacktestConfig,
}

impl BacktestEngine {
    pub fn new(config: BacktestConfig) -> Result<Self, BacktestError> {
        if !(config.init_cash.is_finite() && config.init_cash > 0.0) {
            return Err(BacktestError::InvalidCash(config.init_cash));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Place target-percent orders at the first row and hold to the end.
    ///
    /// Orders go out in column order. A symbol gets an order only when its
    /// weight is positive and its first-row price is finite and positive;
    /// otherwise it is skipped and its cash stays uninvested.
    pub fn run_target_percent(
        &self,
        frame: &PriceFrame,
        weights: &BTreeMap<String, f64>,
    ) -> Result<BacktestReport, BacktestError> {
        if frame.is_empty() {
            return Err(BacktestError::EmptyFrame);
        }
        let mut sum = 0.0;
        for (symbol, w) in weights {
            if frame.symbol_index(symbol).is_none() {
                return Err(BacktestError::UnknownSymbol(symbol.clone()));
            }
            if *w < 0.0 {
                return Err(BacktestError::NegativeWeight {
                    symbol: symbol.clone(),
                    weight: *w,
                });
            }
            sum += w;
        }
        if sum > 1.0 + WEIGHT_SUM_TOL {
            return Err(BacktestError::WeightsExceedOne(sum));
        }

        let first_ts = frame.timestamps()[0];
        // Nothing is held before the first order, so group value is the cash.
        let group_value = self.config.init_cash;
        let mut cash = self.config.init_cash;
        let mut holdings: Vec<(usize, f64)> = Vec::new();
        let mut orders = Vec::new();

        for (col, symbol) in frame.symbols().iter().enumerate() {
            let w = weights.get(symbol).copied().unwrap_or(0.0);
            let price = frame.get(0, col);
            if w <= 0.0 || !price.is_finite() || price <= 0.0 {
                continue;
            }
            let cost = (w * group_value).min(cash);
            if cost <= 0.0 {
                continue;
            }
            let qty = cost / price;
            cash -= cost;
            holdings.push((col, qty));
            orders.push(ExecutedOrder {
                symbol: symbol.clone(),
                ts: first_ts,
                qty,
                price,
            });
        }

        let marks = frame.forward_filled();
        let equity_curve: Vec<(i64, f64)> = marks
            .timestamps()
            .iter()
            .enumerate()
            .map(|(r, ts)| {
                let held: f64 = holdings.iter().map(|(c, q)| q * marks.get(r, *c)).sum();
                (*ts, cash + held)
            })
            .collect();

        let stats = compute_stats(&marks, &equity_curve, self.config.init_cash, self.config.year_freq);

        Ok(BacktestReport {
            orders,
            equity_curve,
            cash,
            stats,
        })
    }
}
