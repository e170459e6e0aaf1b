//! dpr-schemas
//!
//! Shared data and wire types. No business logic lives here beyond shape
//! validation and lookups.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Asset classes / price features
// ---------------------------------------------------------------------------

/// Asset class of a universe. Wire keys are `stock`, `crypto`, `mf`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AssetClass {
    #[serde(rename = "stock")]
    Stock,
    #[serde(rename = "crypto")]
    Crypto,
    #[serde(rename = "mf")]
    MutualFund,
}

impl AssetClass {
    pub const ALL: [AssetClass; 3] = [AssetClass::Stock, AssetClass::Crypto, AssetClass::MutualFund];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetClass::Stock => "stock",
            AssetClass::Crypto => "crypto",
            AssetClass::MutualFund => "mf",
        }
    }

    /// Exact, case-sensitive key lookup. Misspelled keys are not guessed.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "stock" => Some(AssetClass::Stock),
            "crypto" => Some(AssetClass::Crypto),
            "mf" => Some(AssetClass::MutualFund),
            _ => None,
        }
    }
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which price column a frame was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PriceFeature {
    #[serde(rename = "close_price")]
    Close,
    #[serde(rename = "open_price")]
    Open,
}

impl PriceFeature {
    pub const ALL: [PriceFeature; 2] = [PriceFeature::Close, PriceFeature::Open];

    pub fn as_str(&self) -> &'static str {
        match self {
            PriceFeature::Close => "close_price",
            PriceFeature::Open => "open_price",
        }
    }
}

impl fmt::Display for PriceFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// PriceFrame
// ---------------------------------------------------------------------------

/// Errors raised when a frame's shape is inconsistent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    ShapeMismatch { expected: usize, actual: usize },
    DuplicateSymbol(String),
    UnsortedIndex,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::ShapeMismatch { expected, actual } => {
                write!(f, "frame shape mismatch: expected {expected} values, got {actual}")
            }
            FrameError::DuplicateSymbol(s) => write!(f, "duplicate symbol column '{s}'"),
            FrameError::UnsortedIndex => write!(f, "frame index must be strictly increasing"),
        }
    }
}

impl std::error::Error for FrameError {}

/// A dense time × symbol price matrix for one price feature.
///
/// Values are row-major. Missing observations are `f64::NAN`.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceFrame {
    timestamps: Vec<i64>,
    symbols: Vec<String>,
    values: Vec<f64>,
}

impl PriceFrame {
    pub fn new(
        timestamps: Vec<i64>,
        symbols: Vec<String>,
        values: Vec<f64>,
    ) -> Result<Self, FrameError> {
        let expected = timestamps.len() * symbols.len();
        if values.len() != expected {
            return Err(FrameError::ShapeMismatch {
                expected,
                actual: values.len(),
            });
        }
        if timestamps.windows(2).any(|w| w[0] >= w[1]) {
            return Err(FrameError::UnsortedIndex);
        }
        for (i, s) in symbols.iter().enumerate() {
            if symbols[..i].contains(s) {
                return Err(FrameError::DuplicateSymbol(s.clone()));
            }
        }
        Ok(Self {
            timestamps,
            symbols,
            values,
        })
    }

    /// Build from per-symbol columns (each column must have `timestamps.len()` rows).
    pub fn from_columns(
        timestamps: Vec<i64>,
        columns: Vec<(String, Vec<f64>)>,
    ) -> Result<Self, FrameError> {
        let rows = timestamps.len();
        let mut values = vec![f64::NAN; rows * columns.len()];
        let mut symbols = Vec::with_capacity(columns.len());
        let n_cols = columns.len();
        for (j, (sym, col)) in columns.into_iter().enumerate() {
            if col.len() != rows {
                return Err(FrameError::ShapeMismatch {
                    expected: rows,
                    actual: col.len(),
                });
            }
            for (i, v) in col.into_iter().enumerate() {
                values[i * n_cols + j] = v;
            }
            symbols.push(sym);
        }
        Self::new(timestamps, symbols, values)
    }

    pub fn n_rows(&self) -> usize {
        self.timestamps.len()
    }

    pub fn n_cols(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty() || self.symbols.is_empty()
    }

    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn symbol_index(&self, symbol: &str) -> Option<usize> {
        self.symbols.iter().position(|s| s == symbol)
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.symbols.len() + col]
    }

    pub fn column(&self, col: usize) -> Vec<f64> {
        (0..self.n_rows()).map(|r| self.get(r, col)).collect()
    }

    /// Copy of the frame with each column forward-filled. Leading gaps stay NaN.
    pub fn forward_filled(&self) -> Self {
        let mut out = self.clone();
        let cols = self.n_cols();
        for c in 0..cols {
            let mut last = f64::NAN;
            for r in 0..self.n_rows() {
                let idx = r * cols + c;
                if out.values[idx].is_finite() {
                    last = out.values[idx];
                } else {
                    out.values[idx] = last;
                }
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// HTTP bodies
// ---------------------------------------------------------------------------

/// `POST /get_stock` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRequest {
    pub symbol: String,
    pub range: String,
    pub interval: String,
}

/// `POST /get_article` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRequest {
    pub symbol: String,
}

/// Parallel price arrays returned by `POST /get_stock`. Upstream gaps are `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub symbol: String,
    pub close: Vec<Option<f64>>,
    pub high: Vec<Option<f64>>,
    pub volume: Vec<Option<i64>>,
    pub low: Vec<Option<f64>>,
    pub timestamp: Vec<i64>,
}

/// One headline returned by `POST /get_article`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Url")]
    pub url: Option<String>,
}

/// `POST /generate_portfolio` body.
///
/// Keys of both maps are asset-class keys (`stock`, `crypto`, `mf`); they stay
/// strings here so unknown keys surface as a configuration error downstream
/// rather than a deserialization failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalancingRequest {
    pub investment_amount: f64,
    pub asset_allocation: BTreeMap<String, f64>,
    pub diversity_order: BTreeMap<String, usize>,
}
