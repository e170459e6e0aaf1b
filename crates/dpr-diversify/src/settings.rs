//! Explicit run settings for one asset class.

use dpr_config::AppConfig;
use dpr_portfolio::SolverSettings;
use dpr_schemas::AssetClass;

use crate::error::DiversifyError;

/// Everything the search and the simulation read. Built once per class and
/// passed down by reference; nothing is read from process-global state.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    pub seed: u64,
    /// Periods per year used by the estimators and the Sharpe ratio.
    pub year_freq: u32,
    pub risk_free_rate: f64,
    pub initial_gamma: f64,
    pub gamma_step: f64,
    pub max_iterations: usize,
    pub weight_cutoff: f64,
    pub weight_rounding: u32,
    pub solver: SolverSettings,
    /// Volatility cap of the efficient-risk variant.
    pub max_risk: f64,
    /// Return floor of the efficient-return variant.
    pub max_return: f64,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            seed: 42,
            year_freq: 252,
            risk_free_rate: 0.02,
            initial_gamma: 0.01,
            gamma_step: 0.5,
            max_iterations: 200,
            weight_cutoff: 1e-4,
            weight_rounding: 5,
            solver: SolverSettings::default(),
            max_risk: 1.0,
            max_return: 0.1,
        }
    }
}

impl RunSettings {
    pub fn from_config(cfg: &AppConfig, class: AssetClass) -> Result<Self, DiversifyError> {
        let universe = cfg
            .universe(class)
            .map_err(|e| DiversifyError::Config(e.to_string()))?;
        Ok(Self {
            seed: cfg.run.seed,
            year_freq: universe.year_freq,
            risk_free_rate: cfg.optimizer.risk_free_rate,
            initial_gamma: cfg.search.initial_gamma,
            gamma_step: cfg.search.gamma_step,
            max_iterations: cfg.search.max_iterations,
            weight_cutoff: cfg.optimizer.weight_cutoff,
            weight_rounding: cfg.optimizer.weight_rounding,
            solver: SolverSettings {
                max_iter: cfg.optimizer.solver_max_iter,
                tolerance: cfg.optimizer.solver_tolerance,
            },
            max_risk: cfg.thresholds.max_risk,
            max_return: cfg.thresholds.max_return,
        })
    }

    /// Gamma used at 1-based iteration `i`.
    pub fn gamma_at(&self, i: usize) -> f64 {
        self.initial_gamma + self.gamma_step * i.saturating_sub(1) as f64
    }
}
