//! `dpr news` and `dpr chart`: RapidAPI pass-through from the shell.

use anyhow::{Context, Result};
use dpr_config::ConfigMode;

use super::load_session;

pub async fn news(config_paths: &[String], symbol: &str) -> Result<()> {
    let session = load_session(config_paths, ConfigMode::Serve)?;
    let client = dpr_diversify::rapid_client(&session.config, &session.secrets)?;
    let items = client
        .news(symbol)
        .await
        .with_context(|| format!("news for {symbol} failed"))?;
    println!("{}", serde_json::to_string_pretty(&items)?);
    Ok(())
}

pub async fn chart(config_paths: &[String], symbol: &str, range: &str, interval: &str) -> Result<()> {
    let session = load_session(config_paths, ConfigMode::Serve)?;
    let client = dpr_diversify::rapid_client(&session.config, &session.secrets)?;
    let series = client
        .chart(symbol, interval, range)
        .await
        .with_context(|| format!("chart for {symbol} failed"))?;
    println!("{}", serde_json::to_string_pretty(&series)?);
    Ok(())
}
