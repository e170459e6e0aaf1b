use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;

/// Small universes, a short window and thresholds any synthetic path meets.
const OFFLINE_YAML: &str = r#"
data:
  history:
    start: "2021-01-01"
    end: "2022-01-01"
optimizer:
  risk_free_rate: -1.0
thresholds:
  max_risk: 1.0
  max_return: -1.0
universes:
  stock:
    symbols: [AAPL, MSFT, JPM, VZ]
    year_freq: 252
  crypto:
    symbols: [BTC-USD, ETH-USD]
    year_freq: 365
  mf:
    symbols: [ACWIX, TROCX, BIPSX]
    year_freq: 252
"#;

fn config_file() -> tempfile::NamedTempFile {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    f.write_all(OFFLINE_YAML.as_bytes()).unwrap();
    f
}

#[test]
fn offline_generate_prints_three_classes() {
    let cfg = config_file();
    let out = Command::cargo_bin("dpr")
        .unwrap()
        .env_remove("RAPIDAPI_KEY")
        .args([
            "generate",
            "--offline",
            "--config",
            cfg.path().to_str().unwrap(),
            "--amount",
            "20000",
            "--allocation",
            "stock=0.6,crypto=0.1,mf=0.3",
            "--diversity",
            "stock=2,crypto=1,mf=2",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let json: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(json["source"], "synthetic");
    for class in ["stock", "crypto", "mf"] {
        assert!(
            json["portfolios"][class]["results"]["close_price"]["1"]["allocation"].is_object(),
            "{class}"
        );
    }
}

#[test]
fn misspelled_class_fails_with_its_name() {
    let cfg = config_file();
    Command::cargo_bin("dpr")
        .unwrap()
        .args([
            "generate",
            "--offline",
            "--config",
            cfg.path().to_str().unwrap(),
            "--allocation",
            "stock=0.6,crpyto=0.1,mf=0.3",
            "--diversity",
            "stock=2,crypto=1,mf=2",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("crpyto"));
}

#[test]
fn fractions_must_sum_to_one() {
    let cfg = config_file();
    Command::cargo_bin("dpr")
        .unwrap()
        .args([
            "generate",
            "--offline",
            "--config",
            cfg.path().to_str().unwrap(),
            "--allocation",
            "stock=0.9,crypto=0.1,mf=0.3",
            "--diversity",
            "stock=2,crypto=1,mf=2",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("sum to 1"));
}
