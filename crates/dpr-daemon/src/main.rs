//! dpr-daemon entry point.
//!
//! Thin: loads config and secrets, builds the shared state, wires middleware
//! and starts the HTTP server. Handlers live in `routes.rs`.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use dpr_config::{ConfigMode, UnusedKeyPolicy};
use dpr_daemon::{routes, state};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

const DEFAULT_CONFIG_PATHS: &str = "config/base.yaml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env.local if present (dev convenience); production injects env vars.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let paths = config_paths_from_env();
    let path_refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    let loaded = dpr_config::load_layered_yaml(&path_refs).context("load config")?;
    dpr_config::report_unused_keys(ConfigMode::Serve, &loaded.config_json, UnusedKeyPolicy::Warn)?;
    let secrets = dpr_config::resolve_secrets_for_mode(&loaded.config_json, ConfigMode::Serve)?;

    let shared = Arc::new(state::AppState::from_loaded(&loaded, &secrets)?);
    info!(config_hash = %shared.config_hash, source = shared.history.source_name(), "config loaded");

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = match bind_addr_from_env() {
        Some(a) => a,
        None => shared
            .config
            .server
            .bind_addr
            .parse()
            .with_context(|| format!("invalid server.bind_addr '{}'", shared.config.server.bind_addr))?,
    };
    info!("dpr-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// Comma-separated layer paths in `DPR_CONFIG`, base first.
fn config_paths_from_env() -> Vec<String> {
    std::env::var("DPR_CONFIG")
        .unwrap_or_else(|_| DEFAULT_CONFIG_PATHS.to_string())
        .split(',')
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("DPR_DAEMON_ADDR").ok()?.parse().ok()
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
