//! TwelveData-backed historical provider.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::provider::{FetchBarsRequest, HistoricalProvider, ProviderBar, ProviderError};
use crate::utc_day_floor;

/// API key is read by the caller and passed in; do not log it.
#[derive(Clone)]
pub struct TwelveDataHistoricalProvider {
    api_key: String,
    http: reqwest::Client,
    base_url: String,
}

impl std::fmt::Debug for TwelveDataHistoricalProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwelveDataHistoricalProvider")
            .field("base_url", &self.base_url)
            .field("api_key", &"<REDACTED>")
            .finish()
    }
}

impl TwelveDataHistoricalProvider {
    pub fn new(api_key: String, base_url: String, http: reqwest::Client) -> Self {
        Self {
            api_key,
            http,
            base_url,
        }
    }

    fn build_time_series_url(&self) -> String {
        format!("{}/time_series", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait::async_trait]
impl HistoricalProvider for TwelveDataHistoricalProvider {
    fn source_name(&self) -> &'static str {
        "twelvedata"
    }

    async fn fetch_bars(&self, req: FetchBarsRequest) -> Result<Vec<ProviderBar>, ProviderError> {
        let mut out: Vec<ProviderBar> = Vec::new();
        let start_s = req.start.format("%Y-%m-%d").to_string();
        // TwelveData's end_date is inclusive; the request window is not.
        let end_s = req
            .end
            .pred_opt()
            .unwrap_or(req.end)
            .format("%Y-%m-%d")
            .to_string();

        for sym in req.symbols.iter() {
            let resp = self
                .http
                .get(self.build_time_series_url())
                .query(&[
                    ("symbol", sym.as_str()),
                    ("interval", "1day"),
                    ("start_date", start_s.as_str()),
                    ("end_date", end_s.as_str()),
                    ("timezone", "UTC"),
                    ("format", "JSON"),
                    ("apikey", self.api_key.as_str()),
                ])
                .send()
                .await
                // without_url: the key travels in the query string.
                .map_err(|e| ProviderError::Transport(e.without_url().to_string()))?;

            let status = resp.status();
            let body: TwelveDataTimeSeriesResponse = resp.json().await.map_err(|e| {
                ProviderError::Decode(format!("twelvedata json decode failed: {}", e.without_url()))
            })?;

            if !status.is_success() {
                return Err(ProviderError::Http {
                    status: status.as_u16(),
                    message: body.status_message(),
                });
            }
            if body.status.as_deref() == Some("error") {
                return Err(ProviderError::Api {
                    code: body.code,
                    message: body.message.clone().unwrap_or_else(|| "unknown".to_string()),
                });
            }

            let values = body.values.unwrap_or_default();
            tracing::debug!(symbol = %sym, bars = values.len(), "fetched twelvedata history");
            for v in values {
                out.push(ProviderBar {
                    symbol: sym.to_string(),
                    day_ts: utc_day_floor(parse_datetime(&v.datetime)?),
                    open: parse_price(&v.open, "open")?,
                    high: parse_price(&v.high, "high")?,
                    low: parse_price(&v.low, "low")?,
                    close: parse_price(&v.close, "close")?,
                    volume: v.volume.parse::<i64>().ok(),
                });
            }
        }

        Ok(out)
    }
}

fn parse_datetime(s: &str) -> Result<i64, ProviderError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc).timestamp());
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(ndt.and_utc().timestamp());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| ndt.and_utc().timestamp())
        .ok_or_else(|| ProviderError::Decode(format!("twelvedata datetime parse failed: {s}")))
}

fn parse_price(s: &str, field: &str) -> Result<Option<f64>, ProviderError> {
    if s.trim().is_empty() {
        return Ok(None);
    }
    s.trim()
        .parse::<f64>()
        .map(Some)
        .map_err(|_| ProviderError::Decode(format!("twelvedata {field} is not a number: {s}")))
}

#[derive(Debug, Clone, Deserialize)]
struct TwelveDataTimeSeriesResponse {
    status: Option<String>,
    message: Option<String>,
    code: Option<i64>,
    values: Option<Vec<TwelveDataBarValue>>,
}

impl TwelveDataTimeSeriesResponse {
    fn status_message(&self) -> String {
        match (&self.code, &self.message) {
            (Some(c), Some(m)) => format!("code={} {}", c, m),
            (_, Some(m)) => m.clone(),
            _ => "unknown".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct TwelveDataBarValue {
    datetime: String,
    #[serde(default)]
    open: String,
    #[serde(default)]
    high: String,
    #[serde(default)]
    low: String,
    #[serde(default)]
    close: String,
    #[serde(default)]
    volume: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datetime_formats() {
        assert_eq!(parse_datetime("2020-01-02").unwrap(), 1_577_923_200);
        assert_eq!(parse_datetime("2020-01-02 14:30:00").unwrap(), 1_577_975_400);
        assert_eq!(parse_datetime("2020-01-02T14:30:00Z").unwrap(), 1_577_975_400);
        assert!(parse_datetime("02/01/2020").is_err());
    }

    #[test]
    fn blank_price_is_missing_not_error() {
        assert_eq!(parse_price("", "open").unwrap(), None);
        assert_eq!(parse_price("182.34", "open").unwrap(), Some(182.34));
        assert!(parse_price("n/a", "open").is_err());
    }
}
