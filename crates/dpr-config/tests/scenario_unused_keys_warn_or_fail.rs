use dpr_config::{
    load_layered_yaml_from_strings, report_unused_keys, ConfigMode, UnusedKeyPolicy,
};

const YAML: &str = r#"
server:
  bind_addr: "127.0.0.1:8899"
search:
  gamma_step: 0.5
upstream:
  rapidapi:
    timeout_secs: 10
legacy:
  vectorbt_fees: 0.0
"#;

#[test]
fn unknown_top_level_key_is_reported_in_every_mode() {
    let loaded = load_layered_yaml_from_strings(&[YAML]).unwrap();
    for mode in [ConfigMode::Serve, ConfigMode::Generate, ConfigMode::Offline] {
        let r = report_unused_keys(mode, &loaded.config_json, UnusedKeyPolicy::Warn).unwrap();
        assert!(r
            .unused_leaf_pointers
            .contains(&"/legacy/vectorbt_fees".to_string()));
    }
}

#[test]
fn offline_mode_does_not_consume_server_or_upstream() {
    let loaded = load_layered_yaml_from_strings(&[YAML]).unwrap();
    let r = report_unused_keys(
        ConfigMode::Offline,
        &loaded.config_json,
        UnusedKeyPolicy::Warn,
    )
    .unwrap();
    assert!(r.unused_leaf_pointers.contains(&"/server/bind_addr".to_string()));
    assert!(r
        .unused_leaf_pointers
        .contains(&"/upstream/rapidapi/timeout_secs".to_string()));
    assert!(!r.unused_leaf_pointers.contains(&"/search/gamma_step".to_string()));
}

#[test]
fn fail_policy_turns_report_into_error() {
    let loaded = load_layered_yaml_from_strings(&[YAML]).unwrap();
    let err = report_unused_keys(ConfigMode::Serve, &loaded.config_json, UnusedKeyPolicy::Fail)
        .unwrap_err()
        .to_string();
    assert!(err.contains("CONFIG_UNUSED_KEYS"), "{err}");
}

#[test]
fn clean_config_passes_fail_policy() {
    let yaml = "server:\n  bind_addr: \"127.0.0.1:9000\"\nrun:\n  seed: 7\n";
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let r = report_unused_keys(ConfigMode::Serve, &loaded.config_json, UnusedKeyPolicy::Fail)
        .unwrap();
    assert!(r.is_clean());
}
