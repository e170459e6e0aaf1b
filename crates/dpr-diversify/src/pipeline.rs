//! Per-class orchestration and multi-class generation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use dpr_backtest::PortfolioStats;
use dpr_config::{AppConfig, DataConfig};
use dpr_md::{frames_from_bars, FetchBarsRequest, HistoricalProvider};
use dpr_portfolio::{
    aligned_to_common_start, latest_prices, mean_historical_return, sample_cov,
    sector_constraints, value_counts, PerformanceSummary,
};
use dpr_schemas::{AssetClass, BalancingRequest, PriceFeature, PriceFrame};

use crate::error::{DiversifyError, RequestError};
use crate::search::{DiversitySearch, SearchInputs, SearchOutcome, Variant};
use crate::settings::RunSettings;
use crate::universe::Universe;

/// Absolute tolerance on the sum of allocation fractions.
const FRACTION_SUM_TOL: f64 = 1e-6;

/// Resolved portfolio of one (feature, variant) search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantResult {
    pub variant: Variant,
    /// Whole shares per symbol; only nonzero positions.
    pub allocation: BTreeMap<String, u64>,
    pub leftover: f64,
    pub value_counts: BTreeMap<String, u64>,
    pub stats: PortfolioStats,
    pub performance: PerformanceSummary,
    pub gamma: f64,
    pub iterations: usize,
    pub diversity: usize,
}

impl VariantResult {
    fn from_outcome(outcome: SearchOutcome, sectors: Option<&BTreeMap<String, String>>) -> Self {
        let iterations = outcome.iterations();
        Self {
            variant: outcome.variant,
            value_counts: value_counts(&outcome.allocation.shares, sectors),
            allocation: outcome.allocation.shares,
            leftover: outcome.allocation.leftover,
            stats: outcome.report.stats,
            performance: outcome.performance.into(),
            gamma: outcome.gamma,
            iterations,
            diversity: outcome.diversity,
        }
    }
}

/// Price feature -> variant index (1, 2, 3) -> result.
pub type FeatureResults = BTreeMap<PriceFeature, BTreeMap<u8, VariantResult>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassPortfolio {
    pub class: AssetClass,
    pub investment_amount: f64,
    pub diversity_order: usize,
    pub results: FeatureResults,
}

/// Output of [`generate_portfolios`], keyed `stock` / `crypto` / `mf`.
pub type GeneratedPortfolios = BTreeMap<AssetClass, ClassPortfolio>;

/// One class's share of a generation request.
#[derive(Debug, Clone)]
pub struct PortfolioJob {
    pub universe: Universe,
    pub investment_amount: f64,
    pub diversity_order: usize,
    pub settings: RunSettings,
}

// ---------------------------------------------------------------------------
// Request validation
// ---------------------------------------------------------------------------

fn parse_class_keys<V: Copy>(
    entries: &BTreeMap<String, V>,
) -> Result<BTreeMap<AssetClass, V>, RequestError> {
    let mut out = BTreeMap::new();
    for (key, v) in entries {
        let class = AssetClass::from_key(key)
            .ok_or_else(|| RequestError::UnknownAssetClass(key.clone()))?;
        out.insert(class, *v);
    }
    for class in AssetClass::ALL {
        if !out.contains_key(&class) {
            return Err(RequestError::MissingAssetClass(class.as_str().to_string()));
        }
    }
    Ok(out)
}

/// Split `total` across asset classes by `fractions`.
///
/// Every class must be present, each fraction must lie in `[0, 1]` and the
/// fractions must sum to 1.
pub fn split_investment(
    total: f64,
    fractions: &BTreeMap<String, f64>,
) -> Result<BTreeMap<AssetClass, f64>, RequestError> {
    if !(total.is_finite() && total > 0.0) {
        return Err(RequestError::InvalidAmount(total));
    }
    let fractions = parse_class_keys(fractions)?;
    for (class, f) in &fractions {
        if !(f.is_finite() && (0.0..=1.0).contains(f)) {
            return Err(RequestError::InvalidFraction {
                class: class.as_str().to_string(),
                value: *f,
            });
        }
    }
    let sum: f64 = fractions.values().sum();
    if (sum - 1.0).abs() > FRACTION_SUM_TOL {
        return Err(RequestError::FractionsDoNotSumToOne(sum));
    }
    Ok(fractions.into_iter().map(|(c, f)| (c, total * f)).collect())
}

/// Validate a `balancing` request against the configured universes.
///
/// Classes whose share of the investment is zero are left out.
pub fn plan_jobs(cfg: &AppConfig, req: &BalancingRequest) -> Result<Vec<PortfolioJob>, DiversifyError> {
    let amounts = split_investment(req.investment_amount, &req.asset_allocation)?;
    let orders = parse_class_keys(&req.diversity_order)?;

    let mut jobs = Vec::new();
    for (class, amount) in amounts {
        let universe = Universe::from_config(cfg, class)?;
        let order = orders.get(&class).copied().unwrap_or(0);
        if order > universe.len() {
            return Err(RequestError::DiversityOrderTooLarge {
                class: class.as_str().to_string(),
                order,
                universe: universe.len(),
            }
            .into());
        }
        if amount <= 0.0 {
            info!(class = class.as_str(), "zero allocation; class skipped");
            continue;
        }
        jobs.push(PortfolioJob {
            settings: RunSettings::from_config(cfg, class)?,
            universe,
            investment_amount: amount,
            diversity_order: order,
        });
    }
    Ok(jobs)
}

// ---------------------------------------------------------------------------
// Orchestration
// ---------------------------------------------------------------------------

/// Download the history window and pivot it into close / open frames whose
/// columns follow the universe's symbol order.
pub async fn fetch_frames(
    provider: &dyn HistoricalProvider,
    universe: &Universe,
    data: &DataConfig,
) -> Result<BTreeMap<PriceFeature, PriceFrame>, DiversifyError> {
    let req = FetchBarsRequest {
        symbols: universe.symbols().to_vec(),
        start: data.history.start,
        end: data.history.end,
    };
    let bars = provider.fetch_bars(req).await?;
    info!(
        source = provider.source_name(),
        class = universe.class.as_str(),
        bars = bars.len(),
        "history fetched"
    );
    Ok(frames_from_bars(&bars, universe.symbols())?)
}

/// Run the three search variants on every price feature of `frames`.
///
/// With `align_common_start`, leading rows are dropped until every symbol has
/// a price, so the simulation can buy the whole universe on its first bar.
pub fn build_from_frames(
    job: &PortfolioJob,
    frames: &BTreeMap<PriceFeature, PriceFrame>,
    align_common_start: bool,
) -> Result<ClassPortfolio, DiversifyError> {
    let universe = &job.universe;
    if !(job.investment_amount.is_finite() && job.investment_amount > 0.0) {
        return Err(RequestError::InvalidAmount(job.investment_amount).into());
    }
    if job.diversity_order > universe.len() {
        return Err(RequestError::DiversityOrderTooLarge {
            class: universe.class.as_str().to_string(),
            order: job.diversity_order,
            universe: universe.len(),
        }
        .into());
    }

    let mut results = FeatureResults::new();
    for feature in PriceFeature::ALL {
        let raw = frames
            .get(&feature)
            .ok_or_else(|| DiversifyError::Data(format!("no {feature} frame")))?;
        if raw.symbols() != universe.symbols() {
            return Err(DiversifyError::Data(format!(
                "{feature} frame columns do not match the {} universe",
                universe.class
            )));
        }
        if let Some(missing) = (0..raw.n_cols()).find(|c| raw.column(*c).iter().all(|p| !p.is_finite())) {
            return Err(DiversifyError::Data(format!(
                "no {feature} history for symbol '{}'",
                raw.symbols()[missing]
            )));
        }
        let prices = if align_common_start {
            aligned_to_common_start(raw).ok_or_else(|| {
                DiversifyError::Data(format!("{feature} frame has no common start"))
            })?
        } else {
            raw.clone()
        };
        if prices.n_rows() < raw.n_rows() {
            warn!(
                class = universe.class.as_str(),
                feature = feature.as_str(),
                dropped = raw.n_rows() - prices.n_rows(),
                "leading rows dropped to align listings"
            );
        }

        let mu = mean_historical_return(&prices, job.settings.year_freq)?;
        let cov = sample_cov(&prices, job.settings.year_freq)?;
        let latest = latest_prices(&prices);
        let constraints = sector_constraints(
            prices.symbols(),
            universe.sector_map().unwrap_or(&BTreeMap::new()),
            universe.sector_bounds(),
        );

        let search = DiversitySearch::new(
            SearchInputs {
                prices: &prices,
                mu: &mu,
                cov: &cov,
                latest_prices: &latest,
                investment_amount: job.investment_amount,
                sector_constraints: &constraints,
            },
            &job.settings,
        );

        let mut by_variant = BTreeMap::new();
        for variant in Variant::ALL {
            let outcome = search.run(variant, job.diversity_order)?;
            by_variant.insert(
                variant.index(),
                VariantResult::from_outcome(outcome, universe.sector_map()),
            );
        }
        results.insert(feature, by_variant);
    }

    Ok(ClassPortfolio {
        class: universe.class,
        investment_amount: job.investment_amount,
        diversity_order: job.diversity_order,
        results,
    })
}

/// Fetch one class's history and build its portfolios on the calling thread.
pub async fn get_diverse_portfolio(
    provider: &dyn HistoricalProvider,
    job: &PortfolioJob,
    data: &DataConfig,
) -> Result<ClassPortfolio, DiversifyError> {
    let frames = fetch_frames(provider, &job.universe, data).await?;
    build_from_frames(job, &frames, data.align_common_start)
}

/// Generate portfolios for every asset class of a `balancing` request.
///
/// Fetching is async; each class's search runs on the blocking pool.
pub async fn generate_portfolios(
    provider: &dyn HistoricalProvider,
    cfg: &AppConfig,
    req: &BalancingRequest,
) -> Result<GeneratedPortfolios, DiversifyError> {
    let jobs = plan_jobs(cfg, req)?;
    let mut out = GeneratedPortfolios::new();
    for job in jobs {
        let frames = fetch_frames(provider, &job.universe, &cfg.data).await?;
        let align = cfg.data.align_common_start;
        let class = job.universe.class;
        let portfolio = tokio::task::spawn_blocking(move || build_from_frames(&job, &frames, align))
            .await
            .map_err(|e| DiversifyError::Internal(format!("{class} generation task failed: {e}")))??;
        out.insert(class, portfolio);
    }
    Ok(out)
}
