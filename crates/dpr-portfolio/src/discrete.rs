//! Continuous weights -> whole shares.

use std::collections::BTreeMap;

use dpr_schemas::PriceFrame;

/// The top-up pass gives up after skipping this many unaffordable assets.
const MAX_SKIPS: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub enum AllocationError {
    InvalidAmount(f64),
    NegativeWeight { symbol: String, weight: f64 },
    MissingPrice(String),
    NonPositivePrice { symbol: String, price: f64 },
}

impl std::fmt::Display for AllocationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidAmount(v) => write!(f, "investment amount must be positive, got {v}"),
            Self::NegativeWeight { symbol, weight } => {
                write!(f, "negative weight {weight} for '{symbol}' in long-only allocation")
            }
            Self::MissingPrice(s) => write!(f, "no latest price for '{s}'"),
            Self::NonPositivePrice { symbol, price } => {
                write!(f, "latest price {price} for '{symbol}' is not positive")
            }
        }
    }
}

impl std::error::Error for AllocationError {}

/// Whole-share result. `shares` holds only nonzero positions.
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub shares: BTreeMap<String, u64>,
    pub leftover: f64,
}

/// Last finite price of each column. Columns with no price are omitted.
pub fn latest_prices(frame: &PriceFrame) -> BTreeMap<String, f64> {
    frame
        .symbols()
        .iter()
        .enumerate()
        .filter_map(|(c, s)| {
            (0..frame.n_rows())
                .rev()
                .map(|r| frame.get(r, c))
                .find(|p| p.is_finite())
                .map(|p| (s.clone(), p))
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct DiscreteAllocation {
    /// (symbol, weight, price), positive weights only, heaviest first.
    targets: Vec<(String, f64, f64)>,
    total: f64,
}

impl DiscreteAllocation {
    pub fn new(
        weights: &BTreeMap<String, f64>,
        latest_prices: &BTreeMap<String, f64>,
        total_portfolio_value: f64,
    ) -> Result<Self, AllocationError> {
        if !(total_portfolio_value.is_finite() && total_portfolio_value > 0.0) {
            return Err(AllocationError::InvalidAmount(total_portfolio_value));
        }
        let mut targets = Vec::new();
        for (symbol, w) in weights {
            if *w < 0.0 {
                return Err(AllocationError::NegativeWeight {
                    symbol: symbol.clone(),
                    weight: *w,
                });
            }
            if *w == 0.0 {
                continue;
            }
            let price = *latest_prices
                .get(symbol)
                .ok_or_else(|| AllocationError::MissingPrice(symbol.clone()))?;
            if !(price.is_finite() && price > 0.0) {
                return Err(AllocationError::NonPositivePrice {
                    symbol: symbol.clone(),
                    price,
                });
            }
            targets.push((symbol.clone(), *w, price));
        }
        // Stable: equal weights keep symbol order.
        targets.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(Self {
            targets,
            total: total_portfolio_value,
        })
    }

    /// Greedy rounding.
    ///
    /// First buys `floor(w * total / price)` shares of each asset, heaviest
    /// first. Then repeatedly buys one share of the asset furthest below its
    /// target weight, skipping assets whose price exceeds the remaining cash.
    /// Total cost never exceeds the portfolio value.
    pub fn greedy_portfolio(&self) -> Allocation {
        let n = self.targets.len();
        let mut funds = self.total;
        let mut shares = vec![0u64; n];

        for (i, (_, w, price)) in self.targets.iter().enumerate() {
            let mut k = (w * self.total / price).floor().max(0.0);
            if k * price > funds {
                k = (funds / price).floor().max(0.0);
            }
            shares[i] = k as u64;
            funds -= k * price;
        }

        while funds > 0.0 && n > 0 {
            let invested: f64 = self
                .targets
                .iter()
                .zip(&shares)
                .map(|((_, _, p), k)| p * *k as f64)
                .sum();
            let mut deficit: Vec<f64> = self
                .targets
                .iter()
                .zip(&shares)
                .map(|((_, w, p), k)| {
                    let current = if invested > 0.0 {
                        p * *k as f64 / invested
                    } else {
                        0.0
                    };
                    w - current
                })
                .collect();

            let mut idx = argmax(&deficit);
            let mut skips = 0usize;
            while self.targets[idx].2 > funds {
                deficit[idx] = 0.0;
                idx = argmax(&deficit);
                if deficit[idx] < 0.0 || skips == MAX_SKIPS {
                    break;
                }
                skips += 1;
            }
            if deficit[idx] <= 0.0 || skips == MAX_SKIPS || self.targets[idx].2 > funds {
                break;
            }
            shares[idx] += 1;
            funds -= self.targets[idx].2;
        }

        Allocation {
            shares: self
                .targets
                .iter()
                .zip(shares)
                .filter(|(_, k)| *k > 0)
                .map(|((s, _, _), k)| (s.clone(), k))
                .collect(),
            leftover: funds,
        }
    }
}

/// First index of the maximum.
fn argmax(v: &[f64]) -> usize {
    let mut best = 0;
    for (i, x) in v.iter().enumerate() {
        if *x > v[best] {
            best = i;
        }
    }
    best
}
