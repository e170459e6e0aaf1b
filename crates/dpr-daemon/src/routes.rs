//! Axum router and all HTTP handlers for dpr-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers, so the scenario tests in `tests/` can drive the bare
//! router.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use dpr_diversify::DiversifyError;
use dpr_md::ProviderError;
use dpr_schemas::{ArticleRequest, BalancingRequest, StockRequest};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    api_types::{ErrorResponse, GenerateResponse, HealthResponse},
    state::AppState,
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/get_stock", post(get_stock))
        .route("/get_article", post(get_article))
        .route("/generate_portfolio", post(generate_portfolio))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Handler error rendered as `{"error", "kind"}` with a status per kind.
#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    fn invalid(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: "invalid_request",
            message: message.into(),
        }
    }
}

impl From<ProviderError> for ApiError {
    fn from(e: ProviderError) -> Self {
        let (status, kind) = if e.is_upstream() {
            (StatusCode::BAD_GATEWAY, "upstream")
        } else {
            (StatusCode::INTERNAL_SERVER_ERROR, "config")
        };
        Self {
            status,
            kind,
            message: e.to_string(),
        }
    }
}

impl From<DiversifyError> for ApiError {
    fn from(e: DiversifyError) -> Self {
        let status = match &e {
            DiversifyError::Request(_) => StatusCode::BAD_REQUEST,
            DiversifyError::Upstream(_) | DiversifyError::Data(_) => StatusCode::BAD_GATEWAY,
            DiversifyError::OptimizationInfeasible { .. } | DiversifyError::TargetUnreachable { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            DiversifyError::Config(_)
            | DiversifyError::Allocation(_)
            | DiversifyError::Backtest(_)
            | DiversifyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            warn!(kind = self.kind, error = %self.message, "request failed");
        }
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
                kind: self.kind.to_string(),
            }),
        )
            .into_response()
    }
}

fn require_symbol(symbol: &str) -> Result<&str, ApiError> {
    let s = symbol.trim();
    if s.is_empty() {
        return Err(ApiError::invalid("symbol must not be empty"));
    }
    Ok(s)
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

// ---------------------------------------------------------------------------
// POST /get_stock
// ---------------------------------------------------------------------------

pub(crate) async fn get_stock(
    State(st): State<Arc<AppState>>,
    Json(req): Json<StockRequest>,
) -> Result<Response, ApiError> {
    let symbol = require_symbol(&req.symbol)?;
    if req.range.trim().is_empty() || req.interval.trim().is_empty() {
        return Err(ApiError::invalid("range and interval must not be empty"));
    }
    let series = st.rapid.chart(symbol, req.interval.trim(), req.range.trim()).await?;
    Ok((StatusCode::OK, Json(series)).into_response())
}

// ---------------------------------------------------------------------------
// POST /get_article
// ---------------------------------------------------------------------------

pub(crate) async fn get_article(
    State(st): State<Arc<AppState>>,
    Json(req): Json<ArticleRequest>,
) -> Result<Response, ApiError> {
    let symbol = require_symbol(&req.symbol)?;
    let items = st.rapid.news(symbol).await?;
    Ok((StatusCode::OK, Json(items)).into_response())
}

// ---------------------------------------------------------------------------
// POST /generate_portfolio
// ---------------------------------------------------------------------------

/// Generate stock / crypto / mutual-fund portfolios for a `balancing` body.
///
/// History is fetched on the async runtime; each class's search runs on the
/// blocking pool.
pub(crate) async fn generate_portfolio(
    State(st): State<Arc<AppState>>,
    Json(req): Json<BalancingRequest>,
) -> Result<Response, ApiError> {
    let run_id = Uuid::new_v4();
    info!(%run_id, amount = req.investment_amount, "generate_portfolio");

    let portfolios =
        dpr_diversify::generate_portfolios(st.history.as_ref(), &st.config, &req).await?;

    info!(%run_id, classes = portfolios.len(), "generate_portfolio done");
    Ok((
        StatusCode::OK,
        Json(GenerateResponse {
            run_id,
            config_hash: st.config_hash.clone(),
            portfolios,
        }),
    )
        .into_response())
}
