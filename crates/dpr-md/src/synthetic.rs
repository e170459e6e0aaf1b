//! Seeded geometric-Brownian-motion price generator.
//!
//! Used for offline runs and tests: identical seed and request give identical
//! bars, independent of symbol order.

use chrono::{Datelike, Duration, NaiveTime, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::provider::{FetchBarsRequest, HistoricalProvider, ProviderBar, ProviderError};

#[derive(Debug, Clone)]
pub struct SyntheticProvider {
    seed: u64,
    include_weekends: bool,
}

impl SyntheticProvider {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            include_weekends: false,
        }
    }

    /// Emit bars for every calendar day (crypto-style sessions).
    pub fn with_weekends(mut self, include: bool) -> Self {
        self.include_weekends = include;
        self
    }

    fn symbol_seed(&self, symbol: &str) -> u64 {
        // FNV-1a over the symbol, mixed with the run seed.
        let mut h: u64 = 0xcbf2_9ce4_8422_2325;
        for b in symbol.as_bytes() {
            h ^= u64::from(*b);
            h = h.wrapping_mul(0x0000_0100_0000_01b3);
        }
        h ^ self.seed
    }

    fn generate(
        &self,
        symbol: &str,
        days: &[i64],
    ) -> Result<Vec<ProviderBar>, ProviderError> {
        let mut rng = StdRng::seed_from_u64(self.symbol_seed(symbol));
        let std_normal = Normal::new(0.0, 1.0)
            .map_err(|e| ProviderError::Config(format!("normal distribution: {e}")))?;

        let annual_drift: f64 = rng.gen_range(0.02..0.30);
        let annual_vol: f64 = rng.gen_range(0.08..0.45);
        let dt: f64 = 1.0 / 252.0;
        let mut close: f64 = rng.gen_range(10.0..200.0);

        let mut out = Vec::with_capacity(days.len());
        for day_ts in days {
            let gap = 0.25 * annual_vol * dt.sqrt() * std_normal.sample(&mut rng);
            let open = close * gap.exp();
            let z: f64 = std_normal.sample(&mut rng);
            let step = (annual_drift - 0.5 * annual_vol * annual_vol) * dt
                + annual_vol * dt.sqrt() * z;
            close = open * step.exp();
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
            out.push(ProviderBar {
                symbol: symbol.to_string(),
                day_ts: *day_ts,
                open: Some(open),
                high: Some(high),
                low: Some(low),
                close: Some(close),
                volume: Some(rng.gen_range(10_000..5_000_000)),
            });
        }
        Ok(out)
    }
}

#[async_trait::async_trait]
impl HistoricalProvider for SyntheticProvider {
    fn source_name(&self) -> &'static str {
        "synthetic"
    }

    async fn fetch_bars(&self, req: FetchBarsRequest) -> Result<Vec<ProviderBar>, ProviderError> {
        let mut days = Vec::new();
        let mut d = req.start;
        while d < req.end {
            let weekend = matches!(d.weekday(), Weekday::Sat | Weekday::Sun);
            if self.include_weekends || !weekend {
                days.push(d.and_time(NaiveTime::MIN).and_utc().timestamp());
            }
            d += Duration::days(1);
        }

        let mut out = Vec::with_capacity(days.len() * req.symbols.len());
        for sym in &req.symbols {
            out.extend(self.generate(sym, &days)?);
        }
        Ok(out)
    }
}
