//! Gamma escalation until the resolved portfolio is diverse enough.
//!
//! Each iteration builds a fresh [`EfficientFrontier`] with L2 strength
//! `gamma`, solves the variant's objective, cleans the weights, rounds them to
//! whole shares and replays them as a buy-and-hold schedule. The diversity of
//! the result is the number of symbols that were both executed in the replay
//! and hold at least one share. Below target, gamma grows by a fixed step;
//! the loop is bounded by `max_iterations`.

use std::collections::BTreeMap;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use dpr_backtest::{BacktestConfig, BacktestEngine, BacktestReport};
use dpr_portfolio::{
    Allocation, DiscreteAllocation, EfficientFrontier, Performance, SectorConstraint,
};
use dpr_schemas::PriceFrame;

use crate::error::DiversifyError;
use crate::settings::RunSettings;

/// Optimizer objective of one search. Wire indices are 1, 2, 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// Maximise the Sharpe ratio.
    MaxSharpe,
    /// Minimise volatility subject to a return floor.
    EfficientReturn,
    /// Maximise return subject to a volatility cap.
    EfficientRisk,
}

impl Variant {
    pub const ALL: [Variant; 3] = [Variant::MaxSharpe, Variant::EfficientReturn, Variant::EfficientRisk];

    pub fn index(&self) -> u8 {
        match self {
            Variant::MaxSharpe => 1,
            Variant::EfficientReturn => 2,
            Variant::EfficientRisk => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::MaxSharpe => "max_sharpe",
            Variant::EfficientReturn => "efficient_return",
            Variant::EfficientRisk => "efficient_risk",
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Estimated inputs shared by every variant of one price feature.
#[derive(Debug, Clone)]
pub struct SearchInputs<'a> {
    /// Raw (not forward-filled) prices replayed by the simulation.
    pub prices: &'a PriceFrame,
    pub mu: &'a DVector<f64>,
    pub cov: &'a DMatrix<f64>,
    pub latest_prices: &'a BTreeMap<String, f64>,
    pub investment_amount: f64,
    pub sector_constraints: &'a [SectorConstraint],
}

/// Resolved portfolio of one search.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub variant: Variant,
    pub weights: BTreeMap<String, f64>,
    pub allocation: Allocation,
    pub performance: Performance,
    pub report: BacktestReport,
    /// Symbols executed in the replay that also hold shares.
    pub diversity: usize,
    /// Gamma of the accepted iteration.
    pub gamma: f64,
    /// Every gamma tried, in order; the last entry is `gamma`.
    pub gamma_trajectory: Vec<f64>,
}

impl SearchOutcome {
    pub fn iterations(&self) -> usize {
        self.gamma_trajectory.len()
    }
}

/// One iteration's portfolio, before the diversity check.
struct Candidate {
    weights: BTreeMap<String, f64>,
    allocation: Allocation,
    performance: Performance,
    report: BacktestReport,
    diversity: usize,
}

pub struct DiversitySearch<'a> {
    inputs: SearchInputs<'a>,
    settings: &'a RunSettings,
}

impl<'a> DiversitySearch<'a> {
    pub fn new(inputs: SearchInputs<'a>, settings: &'a RunSettings) -> Self {
        Self { inputs, settings }
    }

    /// Raise gamma until `target` positions are held.
    ///
    /// Never returns an outcome with `diversity < target`. Solver
    /// infeasibility aborts the search at the iteration that hit it.
    pub fn run(&self, variant: Variant, target: usize) -> Result<SearchOutcome, DiversifyError> {
        let universe = self.inputs.prices.n_cols();
        if target > universe {
            return Err(DiversifyError::TargetUnreachable {
                variant,
                target,
                best_count: 0,
                last_gamma: self.settings.initial_gamma,
                iterations: 0,
            });
        }

        let engine = BacktestEngine::new(BacktestConfig::new(
            self.inputs.investment_amount,
            self.settings.year_freq,
        ))?;

        let mut trajectory = Vec::new();
        let mut best_count = 0;
        for i in 1..=self.settings.max_iterations {
            let gamma = self.settings.gamma_at(i);
            trajectory.push(gamma);

            let c = self.evaluate(&engine, variant, gamma)?;
            debug!(
                objective = variant.as_str(),
                iteration = i,
                gamma,
                count = c.diversity,
                target,
                "diversity search step"
            );

            if c.diversity >= target {
                info!(
                    objective = variant.as_str(),
                    gamma,
                    count = c.diversity,
                    target,
                    iterations = i,
                    "diversity target reached"
                );
                return Ok(SearchOutcome {
                    variant,
                    weights: c.weights,
                    allocation: c.allocation,
                    performance: c.performance,
                    report: c.report,
                    diversity: c.diversity,
                    gamma,
                    gamma_trajectory: trajectory,
                });
            }
            best_count = best_count.max(c.diversity);
        }

        Err(DiversifyError::TargetUnreachable {
            variant,
            target,
            best_count,
            last_gamma: trajectory.last().copied().unwrap_or(self.settings.initial_gamma),
            iterations: trajectory.len(),
        })
    }

    fn evaluate(
        &self,
        engine: &BacktestEngine,
        variant: Variant,
        gamma: f64,
    ) -> Result<Candidate, DiversifyError> {
        let s = self.settings;
        let opt_err = |e| DiversifyError::from_optimize(e, variant, gamma);

        let mut ef = EfficientFrontier::new(
            self.inputs.prices.symbols().to_vec(),
            self.inputs.mu.clone(),
            self.inputs.cov.clone(),
        )
        .map_err(opt_err)?
        .with_l2_reg(gamma)
        .with_sector_constraints(self.inputs.sector_constraints.to_vec())
        .with_settings(s.solver);

        match variant {
            Variant::MaxSharpe => ef.max_sharpe(s.risk_free_rate),
            Variant::EfficientReturn => ef.efficient_return(s.max_return),
            Variant::EfficientRisk => ef.efficient_risk(s.max_risk),
        }
        .map_err(opt_err)?;

        let performance = ef.portfolio_performance(s.risk_free_rate).map_err(opt_err)?;
        let weights = ef
            .clean_weights(s.weight_cutoff, s.weight_rounding)
            .map_err(opt_err)?;

        let allocation = DiscreteAllocation::new(
            &weights,
            self.inputs.latest_prices,
            self.inputs.investment_amount,
        )?
        .greedy_portfolio();
        let report = engine.run_target_percent(self.inputs.prices, &weights)?;

        let executed = report.executed_symbols();
        let diversity = allocation
            .shares
            .iter()
            .filter(|(sym, k)| **k > 0 && executed.contains(*sym))
            .count();

        Ok(Candidate {
            weights,
            allocation,
            performance,
            report,
            diversity,
        })
    }
}
