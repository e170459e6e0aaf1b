//! Command handler modules for dpr-cli.
//!
//! Shared config loading lives here; command-specific logic lives in the
//! submodules.

pub mod generate;
pub mod market;

use std::collections::BTreeMap;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use dpr_config::{
    AppConfig, ConfigMode, LoadedConfig, ResolvedSecrets, UnusedKeyPolicy,
};

/// Loaded config plus the typed view and the secrets its mode needs.
pub struct Session {
    pub loaded: LoadedConfig,
    pub config: AppConfig,
    pub secrets: ResolvedSecrets,
}

/// Load layered config (defaults only when `paths` is empty), warn on unused
/// keys and resolve secrets for `mode`.
pub fn load_session(paths: &[String], mode: ConfigMode) -> Result<Session> {
    let loaded = if paths.is_empty() {
        dpr_config::load_layered_yaml_from_strings(&[])?
    } else {
        let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
        dpr_config::load_layered_yaml(&refs)?
    };
    dpr_config::report_unused_keys(mode, &loaded.config_json, UnusedKeyPolicy::Warn)?;
    let config = loaded.app_config()?;
    let secrets = dpr_config::resolve_secrets_for_mode(&loaded.config_json, mode)?;
    Ok(Session {
        loaded,
        config,
        secrets,
    })
}

/// Parse `stock=0.6,crypto=0.1,mf=0.3` into a string-keyed map. Keys are
/// checked against asset classes later, so typos surface as request errors.
pub fn parse_class_map<T>(raw: &str) -> Result<BTreeMap<String, T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let mut out = BTreeMap::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let Some((k, v)) = pair.split_once('=') else {
            bail!("expected key=value, got '{pair}'");
        };
        let value = v
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("invalid value for '{}'", k.trim()))?;
        out.insert(k.trim().to_string(), value);
    }
    Ok(out)
}
