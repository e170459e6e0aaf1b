//! Sector weight bounds for the frontier solver.

use std::collections::BTreeMap;

/// Inclusive lower / upper bound on a sector's total weight.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SectorBounds {
    pub lower: f64,
    pub upper: f64,
}

/// Resolved sector bound: `lower <= sum(w[members]) <= upper`.
#[derive(Clone, Debug, PartialEq)]
pub struct SectorConstraint {
    pub sector: String,
    /// Column indices into the optimizer's symbol order.
    pub members: Vec<usize>,
    pub lower: f64,
    pub upper: f64,
}

/// Resolve per-sector bounds against a symbol order.
///
/// Symbols without a sector are unconstrained. A bounded sector with no
/// members is kept, so a positive lower bound on it makes the solve infeasible
/// instead of being silently dropped.
pub fn sector_constraints(
    symbols: &[String],
    sector_of: &BTreeMap<String, String>,
    bounds: &BTreeMap<String, SectorBounds>,
) -> Vec<SectorConstraint> {
    bounds
        .iter()
        .map(|(sector, b)| SectorConstraint {
            sector: sector.clone(),
            members: symbols
                .iter()
                .enumerate()
                .filter(|(_, s)| sector_of.get(*s) == Some(sector))
                .map(|(i, _)| i)
                .collect(),
            lower: b.lower,
            upper: b.upper,
        })
        .collect()
}
