//! dpr-backtest
//!
//! Buy-and-hold simulation of a target-percent order schedule.
//!
//! - One order per symbol at the first bar, sized to `weight * portfolio value`
//! - Cash is shared across symbols; orders fill at the bar's price
//! - Positions are then held; equity is marked on forward-filled prices
//! - Deterministic: same frame + weights + config => identical report

mod engine;
mod stats;
pub mod types;

pub use engine::{BacktestEngine, BacktestError};
pub use stats::{compute_stats, PortfolioStats};
pub use types::{BacktestConfig, BacktestReport, ExecutedOrder};
