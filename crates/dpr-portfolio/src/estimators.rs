//! Expected-return and covariance estimators.
//!
//! Prices are forward-filled before differencing; a return is missing when
//! either endpoint is. Rows where every return is missing are dropped.

use nalgebra::{DMatrix, DVector, SymmetricEigen};

use dpr_schemas::PriceFrame;

/// Minimum return observations per symbol (and per symbol pair).
const MIN_OBSERVATIONS: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub enum EstimateError {
    EmptyFrame,
    InsufficientHistory { symbol: String, observations: usize },
    NonFiniteEstimate { symbol: String },
}

impl std::fmt::Display for EstimateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyFrame => write!(f, "price frame is empty"),
            Self::InsufficientHistory {
                symbol,
                observations,
            } => write!(
                f,
                "insufficient price history for '{symbol}': {observations} return observation(s), need {MIN_OBSERVATIONS}"
            ),
            Self::NonFiniteEstimate { symbol } => {
                write!(f, "non-finite return estimate for '{symbol}'")
            }
        }
    }
}

impl std::error::Error for EstimateError {}

/// Simple returns, one row per consecutive pair of frame rows.
///
/// Returned row-major as `rows x n_cols` with NaN for missing entries.
pub fn returns_from_prices(frame: &PriceFrame) -> Vec<Vec<f64>> {
    let filled = frame.forward_filled();
    let cols = filled.n_cols();
    let mut out = Vec::with_capacity(filled.n_rows().saturating_sub(1));
    for r in 1..filled.n_rows() {
        let row: Vec<f64> = (0..cols)
            .map(|c| {
                let prev = filled.get(r - 1, c);
                let cur = filled.get(r, c);
                if prev.is_finite() && cur.is_finite() && prev > 0.0 {
                    cur / prev - 1.0
                } else {
                    f64::NAN
                }
            })
            .collect();
        if row.iter().any(|x| x.is_finite()) {
            out.push(row);
        }
    }
    out
}

/// Annualised compounded (geometric) mean return per symbol:
/// `prod(1 + r) ^ (frequency / n) - 1`.
pub fn mean_historical_return(
    frame: &PriceFrame,
    frequency: u32,
) -> Result<DVector<f64>, EstimateError> {
    if frame.is_empty() {
        return Err(EstimateError::EmptyFrame);
    }
    let rets = returns_from_prices(frame);
    let mut mu = DVector::zeros(frame.n_cols());
    for (c, symbol) in frame.symbols().iter().enumerate() {
        let col: Vec<f64> = rets.iter().map(|r| r[c]).filter(|x| x.is_finite()).collect();
        if col.len() < MIN_OBSERVATIONS {
            return Err(EstimateError::InsufficientHistory {
                symbol: symbol.clone(),
                observations: col.len(),
            });
        }
        // Summing logs keeps long histories from overflowing the product.
        let log_growth: f64 = col.iter().map(|r| (1.0 + r).ln()).sum();
        let v = (log_growth * f64::from(frequency) / col.len() as f64).exp() - 1.0;
        if !v.is_finite() {
            return Err(EstimateError::NonFiniteEstimate {
                symbol: symbol.clone(),
            });
        }
        mu[c] = v;
    }
    Ok(mu)
}

/// Annualised sample covariance of returns.
///
/// Each pair uses the rows where both returns exist (ddof = 1). The result is
/// repaired to the nearest positive semidefinite matrix by clipping negative
/// eigenvalues, since pairwise estimates need not be PSD.
pub fn sample_cov(frame: &PriceFrame, frequency: u32) -> Result<DMatrix<f64>, EstimateError> {
    if frame.is_empty() {
        return Err(EstimateError::EmptyFrame);
    }
    let rets = returns_from_prices(frame);
    let n = frame.n_cols();
    let mut cov = DMatrix::zeros(n, n);
    for i in 0..n {
        for j in i..n {
            let pairs: Vec<(f64, f64)> = rets
                .iter()
                .filter(|r| r[i].is_finite() && r[j].is_finite())
                .map(|r| (r[i], r[j]))
                .collect();
            if pairs.len() < MIN_OBSERVATIONS {
                let worst = if i == j { i } else { j };
                return Err(EstimateError::InsufficientHistory {
                    symbol: frame.symbols()[worst].clone(),
                    observations: pairs.len(),
                });
            }
            let m = pairs.len() as f64;
            let mean_i = pairs.iter().map(|p| p.0).sum::<f64>() / m;
            let mean_j = pairs.iter().map(|p| p.1).sum::<f64>() / m;
            let c = pairs
                .iter()
                .map(|(a, b)| (a - mean_i) * (b - mean_j))
                .sum::<f64>()
                / (m - 1.0)
                * f64::from(frequency);
            cov[(i, j)] = c;
            cov[(j, i)] = c;
        }
    }
    Ok(fix_nonpositive_semidefinite(cov))
}

fn fix_nonpositive_semidefinite(cov: DMatrix<f64>) -> DMatrix<f64> {
    let eig = SymmetricEigen::new(cov.clone());
    if eig.eigenvalues.iter().all(|v| *v >= 0.0) {
        return cov;
    }
    let clipped = eig.eigenvalues.map(|v| v.max(0.0));
    let fixed = &eig.eigenvectors * DMatrix::from_diagonal(&clipped) * eig.eigenvectors.transpose();
    // Re-symmetrise to wash out rounding.
    (&fixed + fixed.transpose()) * 0.5
}

/// Drop leading rows until every column has a finite price.
///
/// Returns `None` when some column never has a price.
pub fn aligned_to_common_start(frame: &PriceFrame) -> Option<PriceFrame> {
    let cols = frame.n_cols();
    let mut start = 0usize;
    for c in 0..cols {
        let first = (0..frame.n_rows()).find(|r| frame.get(*r, c).is_finite())?;
        start = start.max(first);
    }
    let timestamps = frame.timestamps()[start..].to_vec();
    let columns = frame
        .symbols()
        .iter()
        .enumerate()
        .map(|(c, s)| (s.clone(), frame.column(c)[start..].to_vec()))
        .collect();
    PriceFrame::from_columns(timestamps, columns).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn frame(cols: Vec<(&str, Vec<f64>)>) -> PriceFrame {
        let rows = cols[0].1.len();
        PriceFrame::from_columns(
            (0..rows as i64).collect(),
            cols.into_iter().map(|(s, v)| (s.to_string(), v)).collect(),
        )
        .unwrap()
    }

    #[test]
    fn compounded_mean_matches_closed_form() {
        // +10% then +10%: geometric daily mean 10%, annualised over 2 periods/year.
        let f = frame(vec![("A", vec![100.0, 110.0, 121.0])]);
        let mu = mean_historical_return(&f, 2).unwrap();
        assert_relative_eq!(mu[0], 0.21, epsilon = 1e-12);
    }

    #[test]
    fn gaps_are_forward_filled_before_differencing() {
        let f = frame(vec![
            ("A", vec![100.0, f64::NAN, 110.0, 121.0]),
            ("B", vec![50.0, 50.0, 50.0, 50.0]),
        ]);
        let rets = returns_from_prices(&f);
        assert_eq!(rets.len(), 3);
        assert_eq!(rets[0][0], 0.0);
        assert_relative_eq!(rets[1][0], 0.1, epsilon = 1e-12);
    }

    #[test]
    fn covariance_is_annualised_sample_cov() {
        let f = frame(vec![
            ("A", vec![100.0, 101.0, 99.0, 102.0, 103.0]),
            ("B", vec![50.0, 50.5, 49.0, 51.0, 50.0]),
        ]);
        let cov = sample_cov(&f, 252).unwrap();
        let rets = returns_from_prices(&f);
        let a: Vec<f64> = rets.iter().map(|r| r[0]).collect();
        let mean = a.iter().sum::<f64>() / a.len() as f64;
        let var = a.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (a.len() as f64 - 1.0);
        assert_relative_eq!(cov[(0, 0)], var * 252.0, epsilon = 1e-12);
        assert_relative_eq!(cov[(0, 1)], cov[(1, 0)]);
    }

    #[test]
    fn too_short_history_is_named() {
        let f = frame(vec![("A", vec![1.0, 2.0, 3.0]), ("B", vec![f64::NAN, f64::NAN, 3.0])]);
        match mean_historical_return(&f, 252).unwrap_err() {
            EstimateError::InsufficientHistory { symbol, observations } => {
                assert_eq!(symbol, "B");
                assert_eq!(observations, 0);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn common_start_drops_leading_gaps() {
        let f = frame(vec![
            ("A", vec![1.0, 2.0, 3.0, 4.0]),
            ("B", vec![f64::NAN, f64::NAN, 3.0, 4.0]),
        ]);
        let a = aligned_to_common_start(&f).unwrap();
        assert_eq!(a.timestamps(), &[2, 3]);
        assert_eq!(a.get(0, 0), 3.0);

        let never = frame(vec![("A", vec![1.0, 2.0]), ("B", vec![f64::NAN, f64::NAN])]);
        assert!(aligned_to_common_start(&never).is_none());
    }

    #[test]
    fn psd_repair_leaves_valid_matrix_untouched() {
        let m = DMatrix::from_row_slice(2, 2, &[0.04, 0.01, 0.01, 0.09]);
        assert_eq!(fix_nonpositive_semidefinite(m.clone()), m);

        let bad = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 1.0]);
        let fixed = fix_nonpositive_semidefinite(bad);
        let eig = SymmetricEigen::new(fixed);
        assert!(eig.eigenvalues.iter().all(|v| *v > -1e-12));
    }
}
