//! Mode-aware secret enforcement.
//!
//! Failure cases use sentinel env var names that are never set anywhere, so
//! no test mutates the process environment.

use dpr_config::{load_layered_yaml_from_strings, resolve_secrets_for_mode, ConfigMode};

fn load(yaml: &str) -> serde_json::Value {
    load_layered_yaml_from_strings(&[yaml])
        .expect("test yaml must parse cleanly")
        .config_json
}

const SENTINELS: &str = r#"
upstream:
  rapidapi:
    api_key_env: "DPR_SENTINEL_RAPIDAPI_MISSING_A1"
data:
  providers:
    twelvedata:
      api_key_env: "DPR_SENTINEL_TD_MISSING_A1"
"#;

#[test]
fn serve_fails_without_rapidapi_key() {
    let cfg = load(SENTINELS);
    let err = resolve_secrets_for_mode(&cfg, ConfigMode::Serve)
        .unwrap_err()
        .to_string();
    assert!(err.contains("SECRETS_MISSING"), "{err}");
    assert!(err.contains("mode=SERVE"), "{err}");
    assert!(err.contains("DPR_SENTINEL_RAPIDAPI_MISSING_A1"), "{err}");
}

#[test]
fn generate_requires_key_of_configured_source() {
    let yaml = format!("{SENTINELS}\n  source: twelvedata\n");
    let cfg = load(&yaml);
    let err = resolve_secrets_for_mode(&cfg, ConfigMode::Generate)
        .unwrap_err()
        .to_string();
    assert!(err.contains("DPR_SENTINEL_TD_MISSING_A1"), "{err}");
}

#[test]
fn generate_with_synthetic_source_needs_nothing() {
    let yaml = format!("{SENTINELS}\n  source: synthetic\n");
    let cfg = load(&yaml);
    let secrets = resolve_secrets_for_mode(&cfg, ConfigMode::Generate).unwrap();
    assert!(secrets.rapidapi_key.is_none());
    assert!(secrets.twelvedata_api_key.is_none());
}

#[test]
fn offline_needs_nothing() {
    let cfg = load(SENTINELS);
    assert!(resolve_secrets_for_mode(&cfg, ConfigMode::Offline).is_ok());
}

#[test]
fn config_stores_names_not_values() {
    let cfg = load(SENTINELS);
    assert_eq!(
        cfg.pointer("/upstream/rapidapi/api_key_env")
            .and_then(|v| v.as_str()),
        Some("DPR_SENTINEL_RAPIDAPI_MISSING_A1")
    );
}
