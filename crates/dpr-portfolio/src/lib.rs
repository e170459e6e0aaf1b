//! dpr-portfolio
//!
//! Mean-variance portfolio construction over a [`dpr_schemas::PriceFrame`]:
//! - return / covariance estimation from historical prices
//! - long-only efficient-frontier solves (max Sharpe, efficient return,
//!   efficient risk, min volatility) with an L2 penalty and optional
//!   sector bounds
//! - weight cleaning and discrete share allocation
//! - allocation summaries (flat unit count or per-sector units)
//!
//! Pure deterministic logic: no IO, no clock, no RNG.

mod aggregate;
mod constraints;
mod discrete;
mod estimators;
mod frontier;

pub use aggregate::{nonzero_positions, value_counts, PerformanceSummary, COUNT_KEY};
pub use constraints::{sector_constraints, SectorBounds, SectorConstraint};
pub use discrete::{latest_prices, Allocation, AllocationError, DiscreteAllocation};
pub use estimators::{
    aligned_to_common_start, mean_historical_return, returns_from_prices, sample_cov,
    EstimateError,
};
pub use frontier::{
    EfficientFrontier, OptimizeError, Performance, SolverSettings,
};
