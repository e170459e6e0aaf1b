//! In-process scenario tests for dpr-daemon HTTP endpoints.
//!
//! The Axum router is driven via `tower::ServiceExt::oneshot` without binding
//! a socket. RapidAPI is an httpmock server; history is synthetic.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{Request, StatusCode};
use dpr_config::AppConfig;
use dpr_daemon::{routes, state};
use dpr_md::{RapidYahooClient, SyntheticProvider};
use http_body_util::BodyExt;
use httpmock::prelude::*;
use serde_json::{json, Value};
use tower::ServiceExt; // oneshot

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn small_config(overrides: Value) -> AppConfig {
    let mut base = json!({
        "data": { "source": "synthetic", "history": { "start": "2021-01-01", "end": "2022-01-01" } },
        "universes": {
            "stock": { "symbols": ["AAPL", "MSFT", "JPM", "VZ", "TGT"], "year_freq": 252 },
            "crypto": { "symbols": ["BTC-USD", "ETH-USD", "XRP-USD"], "year_freq": 365 },
            "mf": { "symbols": ["ACWIX", "BIPSX", "TROCX"], "year_freq": 252 }
        }
    });
    if let (Some(b), Some(o)) = (base.as_object_mut(), overrides.as_object()) {
        for (k, v) in o {
            b.insert(k.clone(), v.clone());
        }
    }
    AppConfig::from_json(&base).unwrap()
}

fn make_router(server: &MockServer, cfg: AppConfig) -> axum::Router {
    let rapid = RapidYahooClient::new(
        "test-key".to_string(),
        server.base_url(),
        "apidojo-yahoo-finance-v1.p.rapidapi.com".to_string(),
        Duration::from_secs(5),
    )
    .unwrap();
    let st = state::AppState::new(cfg, "test-hash".to_string(), rapid, Arc::new(SyntheticProvider::new(42)));
    routes::build_router(Arc::new(st))
}

async fn call(router: axum::Router, req: Request<axum::body::Body>) -> (StatusCode, bytes::Bytes) {
    let resp = router.oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let body = resp
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<axum::body::Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(body.to_string()))
        .unwrap()
}

fn parse_json(b: bytes::Bytes) -> Value {
    serde_json::from_slice(&b).expect("body is not valid JSON")
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_returns_200_ok_true() {
    let server = MockServer::start_async().await;
    let router = make_router(&server, small_config(json!({})));
    let req = Request::builder()
        .method("GET")
        .uri("/v1/health")
        .body(axum::body::Body::empty())
        .unwrap();

    let (status, body) = call(router, req).await;
    assert_eq!(status, StatusCode::OK);
    let json = parse_json(body);
    assert_eq!(json["ok"], true);
    assert_eq!(json["service"], "dpr-daemon");
}

// ---------------------------------------------------------------------------
// POST /get_article
// ---------------------------------------------------------------------------

#[tokio::test]
async fn article_returns_title_and_url_pairs() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/news/v2/list").query_param("s", "TSLA");
            then.status(200).json_body(json!({ "data": { "main": { "stream": [
                { "content": { "title": "a", "clickThroughUrl": { "url": "https://x/a" } } },
                { "content": { "title": "b", "clickThroughUrl": null, "previewUrl": "https://x/b" } },
                { "content": { "title": "c", "clickThroughUrl": { "url": "https://x/c" } } }
            ] } } }));
        })
        .await;

    let (status, body) = call(
        make_router(&server, small_config(json!({}))),
        post_json("/get_article", json!({ "symbol": "TSLA" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let json = parse_json(body);
    let items = json.as_array().unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(items[0]["Title"], "a");
    assert_eq!(items[1]["Url"], "https://x/b");
}

#[tokio::test]
async fn upstream_rejection_maps_to_bad_gateway() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/news/v2/list");
            then.status(403).json_body(json!({ "message": "You are not subscribed to this API." }));
        })
        .await;

    let (status, body) = call(
        make_router(&server, small_config(json!({}))),
        post_json("/get_article", json!({ "symbol": "TSLA" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let json = parse_json(body);
    assert_eq!(json["kind"], "upstream");
    assert!(!json["error"].as_str().unwrap().contains("test-key"));
}

#[tokio::test]
async fn blank_symbol_is_bad_request() {
    let server = MockServer::start_async().await;
    let (status, body) = call(
        make_router(&server, small_config(json!({}))),
        post_json("/get_article", json!({ "symbol": "  " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(parse_json(body)["kind"], "invalid_request");
}

// ---------------------------------------------------------------------------
// POST /get_stock
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stock_returns_parallel_arrays() {
    let server = MockServer::start_async().await;
    let m = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/stock/v3/get-chart")
                .query_param("symbol", "AAPL")
                .query_param("interval", "1d")
                .query_param("range", "5d");
            then.status(200).json_body(json!({ "chart": { "result": [ {
                "timestamp": [1700000000, 1700086400],
                "indicators": { "quote": [ {
                    "close": [190.1, 191.2], "high": [192.0, 193.0],
                    "low": [189.0, 190.0], "open": [189.5, 190.5],
                    "volume": [100, null]
                } ] }
            } ], "error": null } }));
        })
        .await;

    let (status, body) = call(
        make_router(&server, small_config(json!({}))),
        post_json("/get_stock", json!({ "symbol": "AAPL", "range": "5d", "interval": "1d" })),
    )
    .await;
    m.assert_async().await;
    assert_eq!(status, StatusCode::OK);
    let json = parse_json(body);
    assert_eq!(json["symbol"], "AAPL");
    assert_eq!(json["close"], json!([190.1, 191.2]));
    assert_eq!(json["volume"], json!([100, null]));
    assert_eq!(json["timestamp"], json!([1700000000, 1700086400]));
}

// ---------------------------------------------------------------------------
// POST /generate_portfolio
// ---------------------------------------------------------------------------

fn balancing(crypto_key: &str) -> Value {
    let mut allocation = serde_json::Map::new();
    allocation.insert("stock".to_string(), json!(0.6));
    allocation.insert(crypto_key.to_string(), json!(0.1));
    allocation.insert("mf".to_string(), json!(0.3));
    json!({
        "investment_amount": 20000.0,
        "asset_allocation": allocation,
        "diversity_order": { "stock": 3, "crypto": 1, "mf": 2 }
    })
}

/// Thresholds every synthetic universe can meet, so the test checks shape only.
fn lenient() -> Value {
    json!({
        "optimizer": { "risk_free_rate": -1.0 },
        "thresholds": { "max_risk": 1.0, "max_return": -1.0 }
    })
}

#[tokio::test]
async fn generate_returns_three_classes() {
    let server = MockServer::start_async().await;
    let (status, body) = call(
        make_router(&server, small_config(lenient())),
        post_json("/generate_portfolio", balancing("crypto")),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", String::from_utf8_lossy(&body));
    let json = parse_json(body);
    assert!(json["run_id"].is_string());
    assert_eq!(json["config_hash"], "test-hash");
    for class in ["stock", "crypto", "mf"] {
        for feature in ["close_price", "open_price"] {
            for variant in ["1", "2", "3"] {
                let r = &json["portfolios"][class]["results"][feature][variant];
                assert!(r["allocation"].is_object(), "{class}/{feature}/{variant}");
                assert!(r["value_counts"]["Count"].as_u64().unwrap() > 0);
                assert!(r["stats"]["End Value"].is_number());
            }
        }
    }
}

#[tokio::test]
async fn misspelled_class_is_bad_request() {
    let server = MockServer::start_async().await;
    let (status, body) = call(
        make_router(&server, small_config(json!({}))),
        post_json("/generate_portfolio", balancing("crpyto")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json = parse_json(body);
    assert_eq!(json["kind"], "invalid_request");
    assert!(json["error"].as_str().unwrap().contains("crpyto"));
}

#[tokio::test]
async fn unattainable_return_floor_is_unprocessable() {
    let server = MockServer::start_async().await;
    let cfg = small_config(json!({
        "optimizer": { "risk_free_rate": -10.0 },
        "thresholds": { "max_risk": 1.0, "max_return": 50.0 }
    }));
    let (status, body) = call(
        make_router(&server, cfg),
        post_json("/generate_portfolio", balancing("crypto")),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(parse_json(body)["kind"], "optimization_infeasible");
}
