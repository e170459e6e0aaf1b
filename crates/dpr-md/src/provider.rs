//! Provider boundary for historical daily prices.

use std::fmt;

use chrono::NaiveDate;

// ---------------------------------------------------------------------------
// Bar / request
// ---------------------------------------------------------------------------

/// One daily bar as reported by a provider. Any field may be missing upstream.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderBar {
    pub symbol: String,
    /// Day of the bar as epoch seconds at 00:00 UTC.
    pub day_ts: i64,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<i64>,
}

/// Daily bars for `symbols` over `[start, end)`.
#[derive(Debug, Clone)]
pub struct FetchBarsRequest {
    pub symbols: Vec<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Network, timeout or TLS failure.
    Transport(String),
    /// Non-2xx HTTP status. 401/403 mean a bad key; 429 means rate limited.
    Http { status: u16, message: String },
    /// The upstream API reported an application-level error in a 2xx body.
    Api { code: Option<i64>, message: String },
    /// The response body is not the expected JSON.
    Decode(String),
    /// The response decoded but a required field is absent.
    MissingField(String),
    /// Client-side configuration problem (empty key, bad base URL).
    Config(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Transport(msg) => write!(f, "transport error: {msg}"),
            ProviderError::Http { status, message } => {
                write!(f, "upstream http status={status}: {message}")
            }
            ProviderError::Api {
                code: Some(c),
                message,
            } => write!(f, "provider api error code={c}: {message}"),
            ProviderError::Api {
                code: None,
                message,
            } => write!(f, "provider api error: {message}"),
            ProviderError::Decode(msg) => write!(f, "decode error: {msg}"),
            ProviderError::MissingField(path) => write!(f, "missing field in response: {path}"),
            ProviderError::Config(msg) => write!(f, "config error: {msg}"),
        }
    }
}

impl std::error::Error for ProviderError {}

impl ProviderError {
    /// `true` for errors caused by the upstream service rather than local config.
    pub fn is_upstream(&self) -> bool {
        !matches!(self, ProviderError::Config(_))
    }
}

// ---------------------------------------------------------------------------
// Provider trait
// ---------------------------------------------------------------------------

/// Pluggable historical provider.
///
/// Bars come back in any order and may repeat a day; [`crate::frames_from_bars`]
/// sorts and de-duplicates.
#[async_trait::async_trait]
pub trait HistoricalProvider: Send + Sync {
    fn source_name(&self) -> &'static str;

    async fn fetch_bars(&self, req: FetchBarsRequest) -> Result<Vec<ProviderBar>, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockProvider {
        bars: Vec<ProviderBar>,
    }

    #[async_trait::async_trait]
    impl HistoricalProvider for MockProvider {
        fn source_name(&self) -> &'static str {
            "mock"
        }

        async fn fetch_bars(
            &self,
            req: FetchBarsRequest,
        ) -> Result<Vec<ProviderBar>, ProviderError> {
            Ok(self
                .bars
                .iter()
                .filter(|b| req.symbols.contains(&b.symbol))
                .cloned()
                .collect())
        }
    }

    fn bar(sym: &str, day_ts: i64) -> ProviderBar {
        ProviderBar {
            symbol: sym.to_string(),
            day_ts,
            open: Some(1.0),
            high: None,
            low: None,
            close: Some(1.5),
            volume: None,
        }
    }

    #[tokio::test]
    async fn trait_is_object_safe_and_filters() {
        let p: Box<dyn HistoricalProvider> = Box::new(MockProvider {
            bars: vec![bar("AAPL", 0), bar("MSFT", 0)],
        });
        let req = FetchBarsRequest {
            symbols: vec!["MSFT".to_string()],
            start: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
        };
        let got = p.fetch_bars(req).await.unwrap();
        assert_eq!(p.source_name(), "mock");
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].symbol, "MSFT");
    }

    #[test]
    fn display_carries_status_and_path() {
        let e = ProviderError::Http {
            status: 429,
            message: "Too many requests".into(),
        };
        assert!(e.to_string().contains("429"));
        let e = ProviderError::MissingField("data.main.stream".into());
        assert!(e.to_string().contains("data.main.stream"));
        assert!(!ProviderError::Config("x".into()).is_upstream());
        assert!(e.is_upstream());
    }
}
