//! Symbol universes per asset class.

use std::collections::BTreeMap;

use dpr_config::AppConfig;
use dpr_portfolio::SectorBounds;
use dpr_schemas::AssetClass;

use crate::error::DiversifyError;

/// Sorted, de-duplicated symbols of one asset class with optional sectors.
#[derive(Debug, Clone, PartialEq)]
pub struct Universe {
    pub class: AssetClass,
    symbols: Vec<String>,
    sectors: BTreeMap<String, String>,
    sector_bounds: BTreeMap<String, SectorBounds>,
}

impl Universe {
    pub fn new<I, S>(class: AssetClass, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut symbols: Vec<String> = symbols.into_iter().map(Into::into).collect();
        symbols.sort();
        symbols.dedup();
        Self {
            class,
            symbols,
            sectors: BTreeMap::new(),
            sector_bounds: BTreeMap::new(),
        }
    }

    /// Attach a symbol -> sector map. Allocations are then summarised per
    /// sector instead of as a flat count.
    pub fn with_sectors(mut self, sectors: BTreeMap<String, String>) -> Self {
        self.sectors = sectors;
        self
    }

    pub fn with_sector_bounds(mut self, bounds: BTreeMap<String, SectorBounds>) -> Self {
        self.sector_bounds = bounds;
        self
    }

    pub fn from_config(cfg: &AppConfig, class: AssetClass) -> Result<Self, DiversifyError> {
        let u = cfg
            .universe(class)
            .map_err(|e| DiversifyError::Config(e.to_string()))?;
        let bounds = u
            .sector_bounds
            .iter()
            .map(|(sector, b)| {
                (
                    sector.clone(),
                    SectorBounds {
                        lower: b.lower,
                        upper: b.upper,
                    },
                )
            })
            .collect();
        Ok(Self::new(class, u.symbols.iter().cloned())
            .with_sectors(u.sectors.clone())
            .with_sector_bounds(bounds))
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// `None` when no sector map is configured.
    pub fn sector_map(&self) -> Option<&BTreeMap<String, String>> {
        if self.sectors.is_empty() {
            None
        } else {
            Some(&self.sectors)
        }
    }

    pub fn sector_bounds(&self) -> &BTreeMap<String, SectorBounds> {
        &self.sector_bounds
    }
}
