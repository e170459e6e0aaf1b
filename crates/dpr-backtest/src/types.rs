use std::collections::BTreeSet;

use crate::stats::PortfolioStats;

/// Simulation settings. Passed per run; nothing is process-global.
#[derive(Clone, Debug, PartialEq)]
pub struct BacktestConfig {
    /// Starting cash.
    pub init_cash: f64,
    /// Periods per year for Sharpe annualisation.
    pub year_freq: u32,
}

impl BacktestConfig {
    pub fn new(init_cash: f64, year_freq: u32) -> Self {
        Self {
            init_cash,
            year_freq,
        }
    }
}

/// A filled buy order.
#[derive(Clone, Debug, PartialEq)]
pub struct ExecutedOrder {
    pub symbol: String,
    pub ts: i64,
    /// Fractional quantity.
    pub qty: f64,
    pub price: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BacktestReport {
    pub orders: Vec<ExecutedOrder>,
    /// (ts, equity) per frame row.
    pub equity_curve: Vec<(i64, f64)>,
    pub cash: f64,
    pub stats: PortfolioStats,
}

impl BacktestReport {
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    pub fn executed_symbols(&self) -> BTreeSet<String> {
        self.orders.iter().map(|o| o.symbol.clone()).collect()
    }
}
