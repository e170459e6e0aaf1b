//! `dpr generate`: portfolio generation outside the daemon.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use dpr_config::{ConfigMode, DataSource};
use dpr_schemas::BalancingRequest;
use serde::Serialize;
use uuid::Uuid;

use super::load_session;

pub struct GenerateArgs {
    pub config_paths: Vec<String>,
    pub offline: bool,
    pub request: BalancingRequest,
    pub out: Option<String>,
}

#[derive(Serialize)]
struct GenerateOutput<'a> {
    run_id: Uuid,
    config_hash: &'a str,
    source: &'static str,
    portfolios: dpr_diversify::GeneratedPortfolios,
}

/// With `offline`, history comes from the seeded synthetic source and no
/// secrets are read.
pub async fn generate(args: GenerateArgs) -> Result<()> {
    let mode = if args.offline {
        ConfigMode::Offline
    } else {
        ConfigMode::Generate
    };
    let mut session = load_session(&args.config_paths, mode)?;
    if args.offline {
        session.config.data.source = DataSource::Synthetic;
    }

    let provider = dpr_diversify::history_provider(&session.config, &session.secrets)?;
    let run_id = Uuid::new_v4();
    tracing::info!(%run_id, source = provider.source_name(), "generate");

    let portfolios =
        dpr_diversify::generate_portfolios(provider.as_ref(), &session.config, &args.request)
            .await
            .context("portfolio generation failed")?;

    let out = GenerateOutput {
        run_id,
        config_hash: &session.loaded.config_hash,
        source: provider.source_name(),
        portfolios,
    };
    let json = serde_json::to_string_pretty(&out).context("serialize output failed")?;

    match args.out {
        Some(path) => {
            fs::write(Path::new(&path), json)
                .with_context(|| format!("write output failed: {path}"))?;
            println!("run_id={run_id}");
            println!("config_hash={}", session.loaded.config_hash);
            println!("output_path={path}");
        }
        None => println!("{json}"),
    }
    Ok(())
}
