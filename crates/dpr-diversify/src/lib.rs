//! dpr-diversify
//!
//! Diversity search and portfolio generation. Ties the estimators and
//! frontier solver of `dpr-portfolio` to the buy-and-hold replay of
//! `dpr-backtest`, and drives them per asset class from fetched history.

mod error;
mod pipeline;
mod search;
mod settings;
mod sources;
mod universe;

pub use error::{DiversifyError, RequestError};
pub use pipeline::{
    build_from_frames, fetch_frames, generate_portfolios, get_diverse_portfolio, plan_jobs,
    split_investment, ClassPortfolio, FeatureResults, GeneratedPortfolios, PortfolioJob,
    VariantResult,
};
pub use search::{DiversitySearch, SearchInputs, SearchOutcome, Variant};
pub use settings::RunSettings;
pub use sources::{history_provider, rapid_client};
pub use universe::Universe;
