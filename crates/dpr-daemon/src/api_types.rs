//! Response types of the dpr-daemon HTTP endpoints that are not plain
//! pass-throughs of `dpr-schemas` types. No business logic lives here.

use dpr_diversify::GeneratedPortfolios;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Body of every non-2xx response produced by a handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// "invalid_request" | "upstream" | "data" | "optimization_infeasible" |
    /// "target_unreachable" | "config" | "internal" | ...
    pub kind: String,
}

// ---------------------------------------------------------------------------
// /generate_portfolio
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub run_id: Uuid,
    /// Hash of the canonical config the run was generated under.
    pub config_hash: String,
    /// Keyed `stock` / `crypto` / `mf`, then price feature, then variant index.
    pub portfolios: GeneratedPortfolios,
}
