//! Error taxonomy of portfolio generation.

use dpr_backtest::BacktestError;
use dpr_md::ProviderError;
use dpr_portfolio::{AllocationError, EstimateError, OptimizeError};
use dpr_schemas::FrameError;

use crate::search::Variant;

/// Problems with the caller's request: amounts, fractions, class keys.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestError {
    InvalidAmount(f64),
    UnknownAssetClass(String),
    MissingAssetClass(String),
    InvalidFraction { class: String, value: f64 },
    FractionsDoNotSumToOne(f64),
    DiversityOrderTooLarge {
        class: String,
        order: usize,
        universe: usize,
    },
}

impl std::fmt::Display for RequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidAmount(v) => write!(f, "investment amount must be positive, got {v}"),
            Self::UnknownAssetClass(k) => {
                write!(f, "unknown asset class '{k}' (expected stock, crypto or mf)")
            }
            Self::MissingAssetClass(k) => write!(f, "no entry for asset class '{k}'"),
            Self::InvalidFraction { class, value } => {
                write!(f, "allocation fraction for '{class}' must be in [0, 1], got {value}")
            }
            Self::FractionsDoNotSumToOne(sum) => {
                write!(f, "allocation fractions must sum to 1, got {sum}")
            }
            Self::DiversityOrderTooLarge {
                class,
                order,
                universe,
            } => write!(
                f,
                "diversity order {order} for '{class}' exceeds its universe of {universe} symbols"
            ),
        }
    }
}

impl std::error::Error for RequestError {}

#[derive(Debug)]
pub enum DiversifyError {
    /// Invalid request.
    Request(RequestError),
    /// Server-side configuration is unusable.
    Config(String),
    /// Upstream fetch failed.
    Upstream(ProviderError),
    /// Price history is missing, partial or degenerate.
    Data(String),
    OptimizationInfeasible {
        variant: Variant,
        gamma: f64,
        reason: String,
    },
    TargetUnreachable {
        variant: Variant,
        target: usize,
        best_count: usize,
        last_gamma: f64,
        iterations: usize,
    },
    Allocation(AllocationError),
    Backtest(BacktestError),
    /// A solver or worker invariant broke.
    Internal(String),
}

impl DiversifyError {
    /// Stable machine-readable kind, used by the HTTP layer.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Request(_) => "invalid_request",
            Self::Config(_) => "config",
            Self::Upstream(_) => "upstream",
            Self::Data(_) => "data",
            Self::OptimizationInfeasible { .. } => "optimization_infeasible",
            Self::TargetUnreachable { .. } => "target_unreachable",
            Self::Allocation(_) => "allocation",
            Self::Backtest(_) => "backtest",
            Self::Internal(_) => "internal",
        }
    }

    pub(crate) fn from_optimize(e: OptimizeError, variant: Variant, gamma: f64) -> Self {
        match e {
            OptimizeError::Infeasible(reason) => Self::OptimizationInfeasible {
                variant,
                gamma,
                reason,
            },
            other => Self::Internal(format!("{variant} solve at gamma={gamma}: {other}")),
        }
    }
}

impl std::fmt::Display for DiversifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Request(e) => write!(f, "invalid request: {e}"),
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Upstream(e) => write!(f, "upstream data error: {e}"),
            Self::Data(msg) => write!(f, "price data error: {msg}"),
            Self::OptimizationInfeasible {
                variant,
                gamma,
                reason,
            } => write!(f, "{variant} infeasible at gamma={gamma}: {reason}"),
            Self::TargetUnreachable {
                variant,
                target,
                best_count,
                last_gamma,
                iterations,
            } => write!(
                f,
                "{variant}: diversity order {target} not reached after {iterations} iterations \
                 (best {best_count}, last gamma={last_gamma})"
            ),
            Self::Allocation(e) => write!(f, "discrete allocation failed: {e}"),
            Self::Backtest(e) => write!(f, "backtest failed: {e}"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for DiversifyError {}

impl From<RequestError> for DiversifyError {
    fn from(e: RequestError) -> Self {
        Self::Request(e)
    }
}

impl From<ProviderError> for DiversifyError {
    fn from(e: ProviderError) -> Self {
        Self::Upstream(e)
    }
}

impl From<EstimateError> for DiversifyError {
    fn from(e: EstimateError) -> Self {
        Self::Data(e.to_string())
    }
}

impl From<FrameError> for DiversifyError {
    fn from(e: FrameError) -> Self {
        Self::Data(e.to_string())
    }
}

impl From<AllocationError> for DiversifyError {
    fn from(e: AllocationError) -> Self {
        match e {
            AllocationError::MissingPrice(_) | AllocationError::NonPositivePrice { .. } => {
                Self::Data(e.to_string())
            }
            other => Self::Allocation(other),
        }
    }
}

impl From<BacktestError> for DiversifyError {
    fn from(e: BacktestError) -> Self {
        Self::Backtest(e)
    }
}
