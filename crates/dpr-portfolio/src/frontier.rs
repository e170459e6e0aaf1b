//! Long-only efficient-frontier optimizer.
//!
//! Each objective is posed as a conic program over `w >= 0, sum w = 1` and
//! handed to the clarabel interior-point solver. Return floors and sector
//! bounds are linear rows; the volatility cap is a second-order cone row.
//!
//! The L2 term `gamma * ||w||^2` is added to every objective; raising gamma
//! pulls the solution toward equal weights.

use std::collections::BTreeMap;

use nalgebra::{DMatrix, DVector};

use crate::constraints::SectorConstraint;

const FEASIBILITY_TOL: f64 = 1e-6;
const MIN_SCALE: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
pub enum OptimizeError {
    /// Inputs are malformed (shape mismatch, non-finite values, bad target).
    InvalidInput(String),
    /// No long-only portfolio satisfies the requested target or bounds.
    Infeasible(String),
    /// Performance or cleaning requested before any solve.
    NotOptimized,
}

impl std::fmt::Display for OptimizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(msg) => write!(f, "invalid optimizer input: {msg}"),
            Self::Infeasible(msg) => write!(f, "optimization infeasible: {msg}"),
            Self::NotOptimized => write!(f, "weights requested before optimizing"),
        }
    }
}

impl std::error::Error for OptimizeError {}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverSettings {
    /// Interior-point iteration limit per solve.
    pub max_iter: u32,
    /// Feasibility and duality-gap tolerance.
    pub tolerance: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            max_iter: 200,
            tolerance: 1e-8,
        }
    }
}

/// Expected return, volatility and Sharpe ratio of a weight vector (fractions).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Performance {
    pub expected_return: f64,
    pub volatility: f64,
    pub sharpe: f64,
}

/// One optimizer instance per solve. Holds the last solution so that
/// [`EfficientFrontier::clean_weights`] and
/// [`EfficientFrontier::portfolio_performance`] can follow a solve.
#[derive(Debug, Clone)]
pub struct EfficientFrontier {
    symbols: Vec<String>,
    mu: DVector<f64>,
    cov: DMatrix<f64>,
    gamma: f64,
    sectors: Vec<SectorConstraint>,
    settings: SolverSettings,
    weights: Option<DVector<f64>>,
}

impl EfficientFrontier {
    pub fn new(
        symbols: Vec<String>,
        mu: DVector<f64>,
        cov: DMatrix<f64>,
    ) -> Result<Self, OptimizeError> {
        let n = symbols.len();
        if n == 0 {
            return Err(OptimizeError::InvalidInput("empty universe".to_string()));
        }
        if mu.len() != n || cov.nrows() != n || cov.ncols() != n {
            return Err(OptimizeError::InvalidInput(format!(
                "shape mismatch: {n} symbols, {} returns, {}x{} covariance",
                mu.len(),
                cov.nrows(),
                cov.ncols()
            )));
        }
        if mu.iter().chain(cov.iter()).any(|x| !x.is_finite()) {
            return Err(OptimizeError::InvalidInput(
                "non-finite expected return or covariance".to_string(),
            ));
        }
        Ok(Self {
            symbols,
            mu,
            cov,
            gamma: 0.0,
            sectors: Vec::new(),
            settings: SolverSettings::default(),
            weights: None,
        })
    }

    /// Add `gamma * ||w||^2` to the objective.
    pub fn with_l2_reg(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn with_sector_constraints(mut self, sectors: Vec<SectorConstraint>) -> Self {
        self.sectors = sectors;
        self
    }

    pub fn with_settings(mut self, settings: SolverSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Raw weights of the last solve, in symbol order.
    pub fn raw_weights(&self) -> Option<&DVector<f64>> {
        self.weights.as_ref()
    }

    // ─── Objectives ─────────────────────────────────────────────────────────

    /// Maximise `(mu'w - rf) / sqrt(w' S w)`.
    ///
    /// Solved in the homogenised variables `y = k w`: minimise
    /// `y'(S + gamma I)y` subject to `(mu - rf)'y = 1`, `sum y = k`, `y, k >= 0`,
    /// then rescale by `k`.
    pub fn max_sharpe(&mut self, risk_free_rate: f64) -> Result<BTreeMap<String, f64>, OptimizeError> {
        self.check_gamma()?;
        let best = self.mu.max();
        if best <= risk_free_rate {
            return Err(OptimizeError::Infeasible(format!(
                "at least one asset must have an expected return above the risk-free rate {risk_free_rate}; best is {best:.6}"
            )));
        }

        let n = self.symbols.len();
        let mut p = DMatrix::zeros(n + 1, n + 1);
        p.view_mut((0, 0), (n, n))
            .copy_from(&self.regularised_cov().scale(2.0));
        let mut prog = ConicProgram::new(p, DVector::zeros(n + 1));

        let excess = self.mu.add_scalar(-risk_free_rate).resize_vertically(n + 1, 0.0);
        prog.equal(excess, 1.0);
        let mut budget = DVector::from_element(n + 1, 1.0);
        budget[n] = -1.0;
        prog.equal(budget, 0.0);
        for i in 0..=n {
            prog.at_most(-unit(n + 1, i), 0.0);
        }
        for sc in &self.sectors {
            let mut row = indicator(n + 1, &sc.members);
            row[n] = -sc.upper;
            prog.at_most(row, 0.0);
            let mut row = -indicator(n + 1, &sc.members);
            row[n] = sc.lower;
            prog.at_most(row, 0.0);
        }

        let x = prog.solve(&self.settings)?;
        let k = x[n];
        if k <= MIN_SCALE {
            return Err(OptimizeError::Infeasible(format!(
                "max-sharpe scale collapsed to {k:.3e}"
            )));
        }
        let w = normalise(x.rows(0, n).unscale(k))?;
        Ok(self.store(w))
    }

    /// Minimise variance subject to `mu'w >= target_return`.
    pub fn efficient_return(&mut self, target_return: f64) -> Result<BTreeMap<String, f64>, OptimizeError> {
        self.check_gamma()?;
        if !target_return.is_finite() {
            return Err(OptimizeError::InvalidInput("target return must be finite".to_string()));
        }
        let best = self.mu.max();
        if target_return > best {
            return Err(OptimizeError::Infeasible(format!(
                "target return {target_return} exceeds the maximum attainable return {best:.6}"
            )));
        }
        let n = self.symbols.len();
        let mut prog = self.long_only(self.regularised_cov().scale(2.0), DVector::zeros(n));
        prog.at_most(-self.mu.clone(), -target_return);
        let w = normalise(prog.solve(&self.settings)?)?;
        Ok(self.store(w))
    }

    /// Maximise return subject to `sqrt(w' S w) <= target_volatility`.
    pub fn efficient_risk(&mut self, target_volatility: f64) -> Result<BTreeMap<String, f64>, OptimizeError> {
        self.check_gamma()?;
        if !(target_volatility.is_finite() && target_volatility > 0.0) {
            return Err(OptimizeError::InvalidInput(
                "target volatility must be positive".to_string(),
            ));
        }
        let n = self.symbols.len();

        let floor = self.long_only(self.cov.scale(2.0), DVector::zeros(n));
        let min_w = normalise(floor.solve(&self.settings)?)?;
        let min_vol = self.variance(&min_w).max(0.0).sqrt();
        if min_vol > target_volatility + FEASIBILITY_TOL {
            return Err(OptimizeError::Infeasible(format!(
                "minimum attainable volatility {min_vol:.6} exceeds target volatility {target_volatility}"
            )));
        }

        let p = DMatrix::identity(n, n).scale(2.0 * self.gamma);
        let mut prog = self.long_only(p, -self.mu.clone());
        prog.norm_at_most(self.cov_factor(), target_volatility);
        let w = normalise(prog.solve(&self.settings)?)?;
        Ok(self.store(w))
    }

    pub fn min_volatility(&mut self) -> Result<BTreeMap<String, f64>, OptimizeError> {
        self.check_gamma()?;
        let n = self.symbols.len();
        let prog = self.long_only(self.regularised_cov().scale(2.0), DVector::zeros(n));
        let w = normalise(prog.solve(&self.settings)?)?;
        Ok(self.store(w))
    }

    // ─── Post-solve ─────────────────────────────────────────────────────────

    /// Zero weights below `cutoff` and round the rest to `rounding` decimals.
    pub fn clean_weights(
        &self,
        cutoff: f64,
        rounding: u32,
    ) -> Result<BTreeMap<String, f64>, OptimizeError> {
        let w = self.weights.as_ref().ok_or(OptimizeError::NotOptimized)?;
        let scale = 10f64.powi(rounding as i32);
        Ok(self
            .symbols
            .iter()
            .zip(w.iter())
            .map(|(s, x)| {
                let x = if x.abs() < cutoff { 0.0 } else { *x };
                (s.clone(), (x * scale).round() / scale)
            })
            .collect())
    }

    /// Performance of the raw (uncleaned) weights of the last solve.
    pub fn portfolio_performance(&self, risk_free_rate: f64) -> Result<Performance, OptimizeError> {
        let w = self.weights.as_ref().ok_or(OptimizeError::NotOptimized)?;
        let expected_return = self.mu.dot(w);
        let volatility = self.variance(w).max(0.0).sqrt();
        let sharpe = if volatility > 0.0 {
            (expected_return - risk_free_rate) / volatility
        } else {
            0.0
        };
        Ok(Performance {
            expected_return,
            volatility,
            sharpe,
        })
    }

    // ─── Problem assembly ───────────────────────────────────────────────────

    fn check_gamma(&self) -> Result<(), OptimizeError> {
        if !(self.gamma.is_finite() && self.gamma >= 0.0) {
            return Err(OptimizeError::InvalidInput(format!(
                "L2 gamma must be finite and >= 0, got {}",
                self.gamma
            )));
        }
        Ok(())
    }

    fn store(&mut self, w: DVector<f64>) -> BTreeMap<String, f64> {
        let out = self
            .symbols
            .iter()
            .cloned()
            .zip(w.iter().copied())
            .collect();
        self.weights = Some(w);
        out
    }

    fn variance(&self, w: &DVector<f64>) -> f64 {
        w.dot(&(&self.cov * w))
    }

    fn regularised_cov(&self) -> DMatrix<f64> {
        let n = self.symbols.len();
        &self.cov + DMatrix::identity(n, n).scale(self.gamma)
    }

    /// `F` with `F'F = S`, from the eigen-decomposition so a singular
    /// covariance still factors.
    fn cov_factor(&self) -> DMatrix<f64> {
        let n = self.symbols.len();
        let eig = self.cov.clone().symmetric_eigen();
        let mut f = DMatrix::zeros(n, n);
        for k in 0..n {
            let root = eig.eigenvalues[k].max(0.0).sqrt();
            f.row_mut(k)
                .copy_from(&eig.eigenvectors.column(k).transpose().scale(root));
        }
        f
    }

    /// Budget, non-negativity and sector rows over the `n` weights.
    fn long_only(&self, p: DMatrix<f64>, q: DVector<f64>) -> ConicProgram {
        let n = self.symbols.len();
        let mut prog = ConicProgram::new(p, q);
        prog.equal(DVector::from_element(n, 1.0), 1.0);
        for i in 0..n {
            prog.at_most(-unit(n, i), 0.0);
        }
        for sc in &self.sectors {
            prog.at_most(indicator(n, &sc.members), sc.upper);
            prog.at_most(-indicator(n, &sc.members), -sc.lower);
        }
        prog
    }
}

fn unit(len: usize, i: usize) -> DVector<f64> {
    let mut v = DVector::zeros(len);
    v[i] = 1.0;
    v
}

fn indicator(len: usize, members: &[usize]) -> DVector<f64> {
    let mut v = DVector::zeros(len);
    for i in members {
        v[*i] = 1.0;
    }
    v
}

/// Clip solver noise below zero and rescale onto the budget.
fn normalise(x: DVector<f64>) -> Result<DVector<f64>, OptimizeError> {
    let w = x.map(|v| v.max(0.0));
    let total = w.sum();
    if !(total.is_finite() && total > MIN_SCALE) {
        return Err(OptimizeError::Infeasible(format!(
            "solver returned no usable weights (sum {total:.3e})"
        )));
    }
    Ok(w.unscale(total))
}

// ─── Conic program ──────────────────────────────────────────────────────────

/// `min 1/2 x'Px + q'x` subject to `Ax + s = b`, with rows grouped by cone:
/// equalities, then `a'x <= b` inequalities, then at most one `||Fx|| <= t`.
struct ConicProgram {
    p: DMatrix<f64>,
    q: DVector<f64>,
    equalities: Vec<(DVector<f64>, f64)>,
    inequalities: Vec<(DVector<f64>, f64)>,
    norm_bound: Option<(DMatrix<f64>, f64)>,
}

impl ConicProgram {
    fn new(p: DMatrix<f64>, q: DVector<f64>) -> Self {
        Self {
            p,
            q,
            equalities: Vec::new(),
            inequalities: Vec::new(),
            norm_bound: None,
        }
    }

    fn equal(&mut self, row: DVector<f64>, rhs: f64) {
        self.equalities.push((row, rhs));
    }

    fn at_most(&mut self, row: DVector<f64>, rhs: f64) {
        self.inequalities.push((row, rhs));
    }

    fn norm_at_most(&mut self, f: DMatrix<f64>, bound: f64) {
        self.norm_bound = Some((f, bound));
    }

    fn solve(&self, settings: &SolverSettings) -> Result<DVector<f64>, OptimizeError> {
        use clarabel::solver::*;

        let n = self.q.len();
        let mut rows: Vec<DVector<f64>> = Vec::new();
        let mut b: Vec<f64> = Vec::new();
        let mut cones = Vec::new();

        for (row, rhs) in &self.equalities {
            rows.push(row.clone());
            b.push(*rhs);
        }
        if !self.equalities.is_empty() {
            cones.push(ZeroConeT(self.equalities.len()));
        }
        for (row, rhs) in &self.inequalities {
            rows.push(row.clone());
            b.push(*rhs);
        }
        if !self.inequalities.is_empty() {
            cones.push(NonnegativeConeT(self.inequalities.len()));
        }
        if let Some((f, bound)) = &self.norm_bound {
            // s = [t; F x] lies in the second-order cone.
            rows.push(DVector::zeros(n));
            b.push(*bound);
            for r in 0..f.nrows() {
                rows.push(-f.row(r).transpose());
                b.push(0.0);
            }
            cones.push(SecondOrderConeT(f.nrows() + 1));
        }

        let a = DMatrix::from_fn(rows.len(), n, |i, j| rows[i][j]);
        let p = to_csc(&self.p, true);
        let a = to_csc(&a, false);
        let q: Vec<f64> = self.q.iter().copied().collect();

        let solver_settings = DefaultSettingsBuilder::default()
            .max_iter(settings.max_iter)
            .tol_feas(settings.tolerance)
            .tol_gap_abs(settings.tolerance)
            .tol_gap_rel(settings.tolerance)
            .verbose(false)
            .build()
            .map_err(|e| OptimizeError::InvalidInput(format!("solver settings: {e}")))?;

        let mut solver = DefaultSolver::new(&p, &q, &a, &b, &cones, solver_settings)
            .map_err(|e| OptimizeError::InvalidInput(format!("solver setup: {e:?}")))?;
        solver.solve();

        match solver.solution.status {
            SolverStatus::Solved | SolverStatus::AlmostSolved => {
                Ok(DVector::from_vec(solver.solution.x.clone()))
            }
            ref status => Err(OptimizeError::Infeasible(format!("solver status {status:?}"))),
        }
    }
}

/// Dense to compressed-sparse-column; `upper` keeps only the upper triangle.
fn to_csc(m: &DMatrix<f64>, upper: bool) -> clarabel::algebra::CscMatrix<f64> {
    let mut colptr = Vec::with_capacity(m.ncols() + 1);
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();
    colptr.push(0);
    for j in 0..m.ncols() {
        for i in 0..m.nrows() {
            if upper && i > j {
                break;
            }
            let v = m[(i, j)];
            if v != 0.0 {
                rowval.push(i);
                nzval.push(v);
            }
        }
        colptr.push(nzval.len());
    }
    clarabel::algebra::CscMatrix::new(m.nrows(), m.ncols(), colptr, rowval, nzval)
}
