use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dpr_schemas::BalancingRequest;

mod commands;

#[derive(Parser)]
#[command(name = "dpr")]
#[command(about = "Diversified portfolio generator CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> overrides)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Generate stock / crypto / mutual-fund portfolios and print them as JSON
    Generate {
        /// Layered config paths in merge order (defaults when omitted)
        #[arg(long = "config")]
        config_paths: Vec<String>,

        /// Use the seeded synthetic price source; no network, no secrets
        #[arg(long, default_value_t = false)]
        offline: bool,

        /// JSON file with a `balancing` body; overrides the flags below
        #[arg(long)]
        request: Option<String>,

        /// Total investment amount
        #[arg(long, default_value_t = 20_000.0)]
        amount: f64,

        /// Per-class fractions, e.g. stock=0.6,crypto=0.1,mf=0.3
        #[arg(long, default_value = "stock=0.6,crypto=0.1,mf=0.3")]
        allocation: String,

        /// Per-class diversity orders, e.g. stock=10,crypto=2,mf=3
        #[arg(long, default_value = "stock=10,crypto=2,mf=3")]
        diversity: String,

        /// Write the JSON here instead of stdout
        #[arg(long)]
        out: Option<String>,
    },

    /// Print the latest headlines for a symbol
    News {
        #[arg(long = "config")]
        config_paths: Vec<String>,

        #[arg(long)]
        symbol: String,
    },

    /// Print close/high/low/volume/timestamp arrays for a symbol
    Chart {
        #[arg(long = "config")]
        config_paths: Vec<String>,

        #[arg(long)]
        symbol: String,

        /// Upstream range, e.g. 1mo, 1y
        #[arg(long, default_value = "1mo")]
        range: String,

        /// Upstream interval, e.g. 1d, 1wk
        #[arg(long, default_value = "1d")]
        interval: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env.local if present (dev convenience).
    let _ = dotenvy::from_filename(".env.local");

    // Logs go to stderr so stdout stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = dpr_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Generate {
            config_paths,
            offline,
            request,
            amount,
            allocation,
            diversity,
            out,
        } => {
            let request = match request {
                Some(path) => {
                    let raw = std::fs::read_to_string(&path)
                        .with_context(|| format!("failed to read request: {path}"))?;
                    serde_json::from_str::<BalancingRequest>(&raw)
                        .with_context(|| format!("invalid balancing request: {path}"))?
                }
                None => BalancingRequest {
                    investment_amount: amount,
                    asset_allocation: commands::parse_class_map(&allocation)
                        .context("--allocation")?,
                    diversity_order: commands::parse_class_map(&diversity)
                        .context("--diversity")?,
                },
            };
            commands::generate::generate(commands::generate::GenerateArgs {
                config_paths,
                offline,
                request,
                out,
            })
            .await?;
        }

        Commands::News {
            config_paths,
            symbol,
        } => commands::market::news(&config_paths, &symbol).await?,

        Commands::Chart {
            config_paths,
            symbol,
            range,
            interval,
        } => commands::market::chart(&config_paths, &symbol, &range, &interval).await?,
    }

    Ok(())
}
