//! Upstream clients built from config and resolved secrets.

use std::sync::Arc;
use std::time::Duration;

use dpr_config::{AppConfig, DataSource, ResolvedSecrets};
use dpr_md::{HistoricalProvider, RapidYahooClient, SyntheticProvider, TwelveDataHistoricalProvider};

use crate::error::DiversifyError;

/// RapidAPI Yahoo client for news, charts and (with `source: yahoo`) history.
pub fn rapid_client(
    cfg: &AppConfig,
    secrets: &ResolvedSecrets,
) -> Result<RapidYahooClient, DiversifyError> {
    let r = &cfg.upstream.rapidapi;
    let key = secrets.rapidapi_key.clone().ok_or_else(|| {
        DiversifyError::Config(format!("env var '{}' (RapidAPI key) is not set", r.api_key_env))
    })?;
    let client = RapidYahooClient::new(
        key,
        r.base_url.clone(),
        r.host.clone(),
        Duration::from_secs(r.timeout_secs),
    )
    .map_err(|e| DiversifyError::Config(e.to_string()))?;
    Ok(client.with_region(r.region.clone()))
}

/// Historical price provider selected by `data.source`.
pub fn history_provider(
    cfg: &AppConfig,
    secrets: &ResolvedSecrets,
) -> Result<Arc<dyn HistoricalProvider>, DiversifyError> {
    match cfg.data.source {
        DataSource::Yahoo => Ok(Arc::new(rapid_client(cfg, secrets)?)),
        DataSource::Twelvedata => {
            let td = &cfg.data.providers.twelvedata;
            let key = secrets.twelvedata_api_key.clone().ok_or_else(|| {
                DiversifyError::Config(format!(
                    "env var '{}' (TwelveData api_key) is not set",
                    td.api_key_env
                ))
            })?;
            let http = reqwest::Client::builder()
                .timeout(Duration::from_secs(cfg.upstream.rapidapi.timeout_secs))
                .build()
                .map_err(|e| DiversifyError::Config(format!("http client build failed: {e}")))?;
            Ok(Arc::new(TwelveDataHistoricalProvider::new(
                key,
                td.base_url.clone(),
                http,
            )))
        }
        DataSource::Synthetic => Ok(Arc::new(SyntheticProvider::new(cfg.run.seed))),
    }
}
