//! dpr-md
//!
//! Market-data access: the RapidAPI Yahoo Finance pass-through (news and
//! chart), pluggable historical providers, and assembly of fetched bars into
//! dense [`dpr_schemas::PriceFrame`]s.
//!
//! Nothing here does portfolio math.

pub mod frames;
pub mod provider;
pub mod rapid;
pub mod synthetic;
pub mod twelvedata;

pub use frames::frames_from_bars;
pub use provider::{FetchBarsRequest, HistoricalProvider, ProviderBar, ProviderError};
pub use rapid::RapidYahooClient;
pub use synthetic::SyntheticProvider;
pub use twelvedata::TwelveDataHistoricalProvider;

const SECS_PER_DAY: i64 = 86_400;

/// Floor an epoch-seconds timestamp to 00:00:00 UTC of the same day.
///
/// Daily bars from different venues stamp the session open at different
/// times of day; flooring aligns them on one date index.
pub fn utc_day_floor(ts: i64) -> i64 {
    ts - ts.rem_euclid(SECS_PER_DAY)
}
