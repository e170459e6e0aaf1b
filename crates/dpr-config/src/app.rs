//! Typed application config decoded from the merged layered JSON.
//!
//! Every section has defaults, so an empty YAML stack yields a runnable
//! config that reproduces the stock / crypto / mutual-fund universes the
//! service ships with.

use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use dpr_schemas::AssetClass;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub data: DataConfig,
    pub search: SearchConfig,
    pub optimizer: OptimizerConfig,
    pub thresholds: ThresholdConfig,
    pub run: RunConfig,
    pub universes: BTreeMap<AssetClass, UniverseConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            upstream: UpstreamConfig::default(),
            data: DataConfig::default(),
            search: SearchConfig::default(),
            optimizer: OptimizerConfig::default(),
            thresholds: ThresholdConfig::default(),
            run: RunConfig::default(),
            universes: AssetClass::ALL
                .iter()
                .map(|c| (*c, UniverseConfig::default_for(*c)))
                .collect(),
        }
    }
}

impl AppConfig {
    pub fn from_json(v: &Value) -> Result<Self> {
        let mut cfg: AppConfig =
            serde_json::from_value(v.clone()).context("config does not match AppConfig schema")?;
        // A partially specified `universes` map replaces the default map wholesale
        // under serde; put back any class the documents did not mention.
        for class in AssetClass::ALL {
            cfg.universes
                .entry(class)
                .or_insert_with(|| UniverseConfig::default_for(class));
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn universe(&self, class: AssetClass) -> Result<&UniverseConfig> {
        self.universes
            .get(&class)
            .with_context(|| format!("no universe configured for asset class '{class}'"))
    }

    pub fn validate(&self) -> Result<()> {
        let s = &self.search;
        if !(s.initial_gamma.is_finite() && s.initial_gamma > 0.0) {
            bail!("CONFIG_INVALID search.initial_gamma must be > 0");
        }
        if !(s.gamma_step.is_finite() && s.gamma_step > 0.0) {
            bail!("CONFIG_INVALID search.gamma_step must be > 0");
        }
        if s.max_iterations == 0 {
            bail!("CONFIG_INVALID search.max_iterations must be > 0");
        }
        let o = &self.optimizer;
        if o.solver_max_iter == 0 {
            bail!("CONFIG_INVALID optimizer.solver_max_iter must be > 0");
        }
        if !(o.solver_tolerance.is_finite() && o.solver_tolerance > 0.0) {
            bail!("CONFIG_INVALID optimizer.solver_tolerance must be > 0");
        }
        if self.data.history.start >= self.data.history.end {
            bail!(
                "CONFIG_INVALID data.history: start {} must precede end {}",
                self.data.history.start,
                self.data.history.end
            );
        }
        if self.upstream.rapidapi.timeout_secs == 0 {
            bail!("CONFIG_INVALID upstream.rapidapi.timeout_secs must be > 0");
        }
        if !self.thresholds.max_risk.is_finite() || self.thresholds.max_risk <= 0.0 {
            bail!("CONFIG_INVALID thresholds.max_risk must be > 0");
        }
        if !self.thresholds.max_return.is_finite() {
            bail!("CONFIG_INVALID thresholds.max_return must be finite");
        }
        for (class, u) in &self.universes {
            if u.year_freq == 0 {
                bail!("CONFIG_INVALID universes.{class}.year_freq must be > 0");
            }
            if u.symbols.is_empty() {
                bail!("CONFIG_INVALID universes.{class}.symbols must not be empty");
            }
            for (sector, b) in &u.sector_bounds {
                if !(0.0..=1.0).contains(&b.lower)
                    || !(0.0..=1.0).contains(&b.upper)
                    || b.lower > b.upper
                {
                    bail!(
                        "CONFIG_INVALID universes.{class}.sector_bounds.{sector}: need 0 <= lower <= upper <= 1"
                    );
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8899".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct UpstreamConfig {
    pub rapidapi: RapidApiConfig,
}

/// RapidAPI "apidojo" Yahoo Finance host. `api_key_env` is the NAME of the
/// env var carrying the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RapidApiConfig {
    pub base_url: String,
    pub host: String,
    pub api_key_env: String,
    pub region: String,
    pub timeout_secs: u64,
}

impl Default for RapidApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://apidojo-yahoo-finance-v1.p.rapidapi.com".to_string(),
            host: "apidojo-yahoo-finance-v1.p.rapidapi.com".to_string(),
            api_key_env: "RAPIDAPI_KEY".to_string(),
            region: "US".to_string(),
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    #[default]
    Yahoo,
    Twelvedata,
    Synthetic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub source: DataSource,
    pub history: HistoryWindow,
    pub providers: ProvidersConfig,
    /// Drop leading rows until every symbol has a price, so late listings do
    /// not leave holes at the simulation's first bar.
    pub align_common_start: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            source: DataSource::Yahoo,
            history: HistoryWindow::default(),
            providers: ProvidersConfig::default(),
            align_common_start: true,
        }
    }
}

/// Fixed download window for historical prices (inclusive start, exclusive end).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Default for HistoryWindow {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2010, 1, 1).unwrap_or_default(),
            end: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProvidersConfig {
    pub twelvedata: TwelveDataConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TwelveDataConfig {
    pub base_url: String,
    pub api_key_env: String,
}

impl Default for TwelveDataConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.twelvedata.com".to_string(),
            api_key_env: "TWELVEDATA_API_KEY".to_string(),
        }
    }
}

/// Gamma escalation schedule for the diversity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub initial_gamma: f64,
    pub gamma_step: f64,
    pub max_iterations: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            initial_gamma: 0.01,
            gamma_step: 0.5,
            max_iterations: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub risk_free_rate: f64,
    /// Weights with |w| below this are zeroed by weight cleaning.
    pub weight_cutoff: f64,
    /// Decimal places kept by weight cleaning.
    pub weight_rounding: u32,
    /// Interior-point iteration limit per solve.
    pub solver_max_iter: u32,
    /// Feasibility and duality-gap tolerance of the solver.
    pub solver_tolerance: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.02,
            weight_cutoff: 1e-4,
            weight_rounding: 5,
            solver_max_iter: 200,
            solver_tolerance: 1e-8,
        }
    }
}

/// `max_risk` is the volatility cap of the max-return variant; `max_return`
/// is the return floor of the min-risk variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub max_risk: f64,
    pub max_return: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            max_risk: 1.0,
            max_return: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub seed: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self { seed: 42 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SectorBoundConfig {
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UniverseConfig {
    pub symbols: Vec<String>,
    /// Periods per year used for annualisation.
    pub year_freq: u32,
    /// Optional symbol -> sector label. When non-empty, allocations are
    /// aggregated by sector instead of a flat count.
    pub sectors: BTreeMap<String, String>,
    /// Optional per-sector weight bounds enforced by the optimizer.
    pub sector_bounds: BTreeMap<String, SectorBoundConfig>,
}

impl Default for UniverseConfig {
    fn default() -> Self {
        Self::default_for(AssetClass::Stock)
    }
}

impl UniverseConfig {
    pub fn default_for(class: AssetClass) -> Self {
        let (symbols, year_freq): (&[&str], u32) = match class {
            AssetClass::Stock => (
                &[
                    "JCI", "TGT", "CMCSA", "CPB", "MO", "APA", "MMC", "JPM", "ZION", "PSA",
                    "BAX", "BMY", "LUV", "PCAR", "TXT", "TMO", "DE", "MSFT", "HPQ", "SEE",
                    "VZ", "CNP", "NI", "T", "BA", "AAPL",
                ],
                252,
            ),
            AssetClass::Crypto => (
                &[
                    "BTC-USD", "ETH-USD", "USDT-USD", "BNB-USD", "SOL-USD", "DOGE-USD",
                    "STETH-USD", "XRP-USD",
                ],
                365,
            ),
            AssetClass::MutualFund => (
                &[
                    "ENPIX", "ENPSX", "BIPSX", "WWNPX", "KNPCX", "CSVIX", "CYPSX", "ACWIX",
                    "TIQIX", "TROCX",
                ],
                252,
            ),
        };
        Self {
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            year_freq,
            sectors: BTreeMap::new(),
            sector_bounds: BTreeMap::new(),
        }
    }
}
