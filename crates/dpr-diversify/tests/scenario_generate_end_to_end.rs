use std::collections::BTreeMap;

use dpr_config::AppConfig;
use dpr_diversify::{
    build_from_frames, fetch_frames, generate_portfolios, get_diverse_portfolio, DiversifyError,
    PortfolioJob, RunSettings, Universe,
};
use dpr_md::SyntheticProvider;
use dpr_schemas::{AssetClass, BalancingRequest, PriceFeature};

fn synthetic_config(start: &str, end: &str) -> AppConfig {
    AppConfig::from_json(&serde_json::json!({
        "data": { "source": "synthetic", "history": { "start": start, "end": end } }
    }))
    .unwrap()
}

/// Thresholds any synthetic universe can meet; these tests check shape and
/// reproducibility, not the default return floor.
fn lenient(settings: RunSettings) -> RunSettings {
    RunSettings {
        risk_free_rate: -1.0,
        max_return: -1.0,
        ..settings
    }
}

fn request(fractions: &[(&str, f64)], orders: &[(&str, usize)]) -> BalancingRequest {
    BalancingRequest {
        investment_amount: 20_000.0,
        asset_allocation: fractions.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        diversity_order: orders.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
    }
}

#[tokio::test]
async fn three_classes_resolve_with_feature_and_variant_keys() {
    let cfg = synthetic_config("2018-01-01", "2023-01-01");
    let provider = SyntheticProvider::new(cfg.run.seed);
    let req = request(
        &[("stock", 0.6), ("crypto", 0.1), ("mf", 0.3)],
        &[("stock", 10), ("crypto", 2), ("mf", 3)],
    );

    let out = generate_portfolios(&provider, &cfg, &req).await.unwrap();
    assert_eq!(
        out.keys().copied().collect::<Vec<_>>(),
        vec![AssetClass::Stock, AssetClass::Crypto, AssetClass::MutualFund]
    );

    let amounts: f64 = out.values().map(|p| p.investment_amount).sum();
    approx::assert_relative_eq!(amounts, 20_000.0, epsilon = 1e-6);

    for (class, portfolio) in &out {
        let order = req.diversity_order[class.as_str()];
        assert_eq!(portfolio.diversity_order, order);
        assert_eq!(portfolio.results.len(), 2, "{class}");
        for feature in PriceFeature::ALL {
            let by_variant = &portfolio.results[&feature];
            assert_eq!(by_variant.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
            for r in by_variant.values() {
                assert!(!r.allocation.is_empty(), "{class}/{feature}/{}", r.variant);
                assert!(r.allocation.len() >= order);
                assert!(r.diversity >= order);
                assert!(r.leftover >= 0.0 && r.leftover <= portfolio.investment_amount);
                let units: u64 = r.allocation.values().sum();
                assert_eq!(r.value_counts.get("Count"), Some(&units));
                assert!(r.stats.start < r.stats.end);
                assert_eq!(r.stats.start_value, portfolio.investment_amount);
                assert!(r.performance.annual_volatility_pct > 0.0);
            }
        }
    }

    // The wire form is keyed by class, feature name and variant index.
    let json = serde_json::to_value(&out).unwrap();
    assert!(json["crypto"]["results"]["close_price"]["1"]["allocation"].is_object());
    assert!(json["mf"]["results"]["open_price"]["3"]["stats"]["Sharpe Ratio"].is_number());
    assert!(json["stock"]["results"]["close_price"]["2"]["performance"]["Annual volatility [%]"].is_number());
}

#[tokio::test]
async fn misspelled_class_key_is_a_request_error() {
    let cfg = synthetic_config("2021-01-01", "2022-01-01");
    let provider = SyntheticProvider::new(1);
    let req = request(
        &[("stock", 0.6), ("crpyto", 0.1), ("mf", 0.3)],
        &[("stock", 2), ("crypto", 1), ("mf", 1)],
    );
    let err = generate_portfolios(&provider, &cfg, &req).await.unwrap_err();
    assert_eq!(err.kind(), "invalid_request");
    assert!(err.to_string().contains("crpyto"), "{err}");
}

#[tokio::test]
async fn fixed_seed_reproduces_the_portfolio() {
    let cfg = synthetic_config("2021-01-01", "2022-06-01");
    let universe = Universe::new(AssetClass::Stock, ["AAPL", "MSFT", "JPM", "VZ", "TGT", "DE"]);
    let job = PortfolioJob {
        universe,
        investment_amount: 5_000.0,
        diversity_order: 4,
        settings: lenient(RunSettings::from_config(&cfg, AssetClass::Stock).unwrap()),
    };

    let a = get_diverse_portfolio(&SyntheticProvider::new(9), &job, &cfg.data).await.unwrap();
    let b = get_diverse_portfolio(&SyntheticProvider::new(9), &job, &cfg.data).await.unwrap();
    assert_eq!(a, b);

    for by_variant in a.results.values() {
        for r in by_variant.values() {
            assert!(r.diversity >= 4);
            assert!(r.iterations >= 1);
        }
    }
}

#[tokio::test]
async fn sector_counts_cover_only_mapped_symbols() {
    let cfg = synthetic_config("2021-01-01", "2022-06-01");
    let sectors: BTreeMap<String, String> = [
        ("AAPL", "Information Technology"),
        ("MSFT", "Information Technology"),
        ("JPM", "Financials"),
    ]
    .iter()
    .map(|(s, g)| (s.to_string(), g.to_string()))
    .collect();
    let universe = Universe::new(AssetClass::Stock, ["AAPL", "MSFT", "JPM", "VZ", "TGT"]).with_sectors(sectors.clone());
    let job = PortfolioJob {
        universe,
        investment_amount: 8_000.0,
        diversity_order: 5,
        settings: lenient(RunSettings::from_config(&cfg, AssetClass::Stock).unwrap()),
    };

    let provider = SyntheticProvider::new(3);
    let frames = fetch_frames(&provider, &job.universe, &cfg.data).await.unwrap();
    let portfolio = build_from_frames(&job, &frames, true).unwrap();

    for by_variant in portfolio.results.values() {
        for r in by_variant.values() {
            let mapped: u64 = r
                .allocation
                .iter()
                .filter(|(s, _)| sectors.contains_key(*s))
                .map(|(_, k)| k)
                .sum();
            let summed: u64 = r.value_counts.values().sum();
            assert_eq!(summed, mapped);
            assert!(!r.value_counts.contains_key("Count"));
            assert!(r.value_counts.keys().all(|k| k == "Information Technology" || k == "Financials"));
        }
    }
}

#[test]
fn frames_for_a_different_universe_are_rejected() {
    let cfg = AppConfig::default();
    let job = PortfolioJob {
        universe: Universe::new(AssetClass::MutualFund, ["ACWIX", "BIPSX"]),
        investment_amount: 1_000.0,
        diversity_order: 1,
        settings: RunSettings::from_config(&cfg, AssetClass::MutualFund).unwrap(),
    };
    let frame = dpr_schemas::PriceFrame::from_columns(
        vec![0, 86_400, 172_800],
        vec![
            ("ACWIX".to_string(), vec![10.0, 10.5, 10.7]),
            ("TROCX".to_string(), vec![20.0, 19.5, 21.0]),
        ],
    )
    .unwrap();
    let frames = PriceFeature::ALL.iter().map(|f| (*f, frame.clone())).collect();
    match build_from_frames(&job, &frames, true) {
        Err(DiversifyError::Data(msg)) => assert!(msg.contains("do not match"), "{msg}"),
        other => panic!("expected a data error, got {other:?}"),
    }
}
