//! Allocation summaries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::frontier::Performance;

/// Key of the flat summary produced when no sector map is given.
pub const COUNT_KEY: &str = "Count";

/// Summarise whole-share holdings.
///
/// Without a sector map: `{"Count": total shares}`. With one: total shares
/// per sector label; symbols absent from the map contribute nothing.
pub fn value_counts(
    allocation: &BTreeMap<String, u64>,
    sectors: Option<&BTreeMap<String, String>>,
) -> BTreeMap<String, u64> {
    let mut out = BTreeMap::new();
    match sectors {
        None => {
            out.insert(COUNT_KEY.to_string(), allocation.values().sum());
        }
        Some(sector_of) => {
            for (symbol, units) in allocation {
                if let Some(sector) = sector_of.get(symbol) {
                    *out.entry(sector.clone()).or_insert(0) += units;
                }
            }
        }
    }
    out
}

/// Number of symbols holding at least one share.
pub fn nonzero_positions(allocation: &BTreeMap<String, u64>) -> usize {
    allocation.values().filter(|k| **k > 0).count()
}

/// Optimizer-side performance, reported in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    #[serde(rename = "Expected annual return [%]")]
    pub expected_annual_return_pct: f64,
    #[serde(rename = "Annual volatility [%]")]
    pub annual_volatility_pct: f64,
}

impl From<Performance> for PerformanceSummary {
    fn from(p: Performance) -> Self {
        Self {
            expected_annual_return_pct: p.expected_return * 100.0,
            annual_volatility_pct: p.volatility * 100.0,
        }
    }
}
