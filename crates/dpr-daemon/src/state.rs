//! Shared runtime state for dpr-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. Everything here is
//! immutable after boot; upstream clients are cheap to share.

use std::sync::Arc;

use anyhow::Context;
use dpr_config::{AppConfig, LoadedConfig, ResolvedSecrets};
use dpr_md::{HistoricalProvider, RapidYahooClient};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self {
            service: "dpr-daemon",
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Cloneable (Arc) handle shared across all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub build: BuildInfo,
    pub config: Arc<AppConfig>,
    pub config_hash: String,
    /// News and chart pass-through.
    pub rapid: Arc<RapidYahooClient>,
    /// History source for portfolio generation, selected by `data.source`.
    pub history: Arc<dyn HistoricalProvider>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        config_hash: String,
        rapid: RapidYahooClient,
        history: Arc<dyn HistoricalProvider>,
    ) -> Self {
        Self {
            build: BuildInfo::default(),
            config: Arc::new(config),
            config_hash,
            rapid: Arc::new(rapid),
            history,
        }
    }

    /// Build clients from a loaded config and the secrets resolved for SERVE.
    pub fn from_loaded(loaded: &LoadedConfig, secrets: &ResolvedSecrets) -> anyhow::Result<Self> {
        let config = loaded.app_config()?;
        let rapid = dpr_diversify::rapid_client(&config, secrets).context("rapidapi client")?;
        let history =
            dpr_diversify::history_provider(&config, secrets).context("history provider")?;
        Ok(Self::new(config, loaded.config_hash.clone(), rapid, history))
    }
}
