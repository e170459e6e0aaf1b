//! Runtime secret resolution.
//!
//! Config YAML stores only env var NAMES (e.g. `"RAPIDAPI_KEY"`). Entry points
//! call [`resolve_secrets_for_mode`] once at startup and hand the resulting
//! [`ResolvedSecrets`] to client constructors. Errors name the variable,
//! never its value.
//!
//! | Mode     | Required                                                     |
//! |----------|--------------------------------------------------------------|
//! | SERVE    | RapidAPI key, plus TwelveData key when it is the data source |
//! | GENERATE | key of the configured data source                            |
//! | OFFLINE  | nothing                                                      |

use anyhow::{bail, Result};
use serde_json::Value;

use crate::ConfigMode;

/// Values are redacted in `Debug` output.
#[derive(Clone, Default)]
pub struct ResolvedSecrets {
    pub rapidapi_key: Option<String>,
    pub twelvedata_api_key: Option<String>,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field(
                "rapidapi_key",
                &self.rapidapi_key.as_ref().map(|_| "<REDACTED>"),
            )
            .field(
                "twelvedata_api_key",
                &self.twelvedata_api_key.as_ref().map(|_| "<REDACTED>"),
            )
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

struct SecretEnvNames {
    rapidapi_key_var: String,
    twelvedata_api_key_var: String,
}

/// Non-empty trimmed string at `pointer`, or `None`.
fn read_str_at(config: &Value, pointer: &str) -> Option<String> {
    let s = config.pointer(pointer)?.as_str()?;
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

fn parse_env_names(config_json: &Value) -> SecretEnvNames {
    SecretEnvNames {
        rapidapi_key_var: read_str_at(config_json, "/upstream/rapidapi/api_key_env")
            .unwrap_or_else(|| "RAPIDAPI_KEY".to_string()),
        twelvedata_api_key_var: read_str_at(config_json, "/data/providers/twelvedata/api_key_env")
            .unwrap_or_else(|| "TWELVEDATA_API_KEY".to_string()),
    }
}

fn data_source(config_json: &Value) -> String {
    read_str_at(config_json, "/data/source")
        .map(|s| s.to_ascii_lowercase())
        .unwrap_or_else(|| "yahoo".to_string())
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub fn resolve_secrets_for_mode(config_json: &Value, mode: ConfigMode) -> Result<ResolvedSecrets> {
    let names = parse_env_names(config_json);
    let source = data_source(config_json);

    let rapidapi_key = resolve_env(&names.rapidapi_key_var);
    let twelvedata_api_key = resolve_env(&names.twelvedata_api_key_var);

    let need_rapidapi = match mode {
        ConfigMode::Serve => true,
        ConfigMode::Generate => source == "yahoo",
        ConfigMode::Offline => false,
    };
    let need_twelvedata = match mode {
        ConfigMode::Serve | ConfigMode::Generate => source == "twelvedata",
        ConfigMode::Offline => false,
    };

    if need_rapidapi && rapidapi_key.is_none() {
        bail!(
            "SECRETS_MISSING mode={}: required env var '{}' \
             (RapidAPI key) is not set or empty",
            mode.as_str(),
            names.rapidapi_key_var,
        );
    }
    if need_twelvedata && twelvedata_api_key.is_none() {
        bail!(
            "SECRETS_MISSING mode={}: required env var '{}' \
             (TwelveData api_key) is not set or empty",
            mode.as_str(),
            names.twelvedata_api_key_var,
        );
    }

    Ok(ResolvedSecrets {
        rapidapi_key,
        twelvedata_api_key,
    })
}
