//! RapidAPI "apidojo" Yahoo Finance client.
//!
//! Three calls are used: `news/v2/list` (headlines), `stock/v3/get-chart`
//! with a `range` (chart pass-through) and `stock/v3/get-chart` with
//! `period1`/`period2` (daily history for portfolio generation).

use std::time::Duration;

use chrono::{NaiveDate, NaiveTime};
use dpr_schemas::{ChartSeries, NewsItem};
use serde::Deserialize;
use serde_json::Value;

use crate::provider::{FetchBarsRequest, HistoricalProvider, ProviderBar, ProviderError};
use crate::utc_day_floor;

/// Headlines returned per symbol at most.
pub const NEWS_LIMIT: usize = 10;

const NEWS_SNIPPET_COUNT: &str = "28";
const CHART_EVENTS: &str = "capitalGain,div,split";

/// API key is passed in by the caller and never logged.
#[derive(Clone)]
pub struct RapidYahooClient {
    http: reqwest::Client,
    base_url: String,
    host: String,
    api_key: String,
    region: String,
}

impl std::fmt::Debug for RapidYahooClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RapidYahooClient")
            .field("base_url", &self.base_url)
            .field("host", &self.host)
            .field("api_key", &"<REDACTED>")
            .field("region", &self.region)
            .finish()
    }
}

impl RapidYahooClient {
    pub fn new(
        api_key: String,
        base_url: String,
        host: String,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        if api_key.trim().is_empty() {
            return Err(ProviderError::Config("rapidapi key is empty".to_string()));
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Config(format!("http client build failed: {e}")))?;
        Ok(Self {
            http,
            base_url,
            host,
            api_key,
            region: "US".to_string(),
        })
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn send_json(&self, req: reqwest::RequestBuilder) -> Result<Value, ProviderError> {
        let resp = req
            .header("X-RapidAPI-Key", self.api_key.as_str())
            .header("X-RapidAPI-Host", self.host.as_str())
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.without_url().to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Http {
                status: status.as_u16(),
                message: truncate(&body, 200),
            });
        }
        resp.json::<Value>()
            .await
            .map_err(|e| ProviderError::Decode(format!("rapidapi json decode failed: {e}")))
    }

    /// Latest headlines for `symbol`: at most [`NEWS_LIMIT`], fewer when the
    /// upstream stream is shorter.
    pub async fn news(&self, symbol: &str) -> Result<Vec<NewsItem>, ProviderError> {
        let req = self
            .http
            .post(self.url("/news/v2/list"))
            .query(&[
                ("region", self.region.as_str()),
                ("snippetCount", NEWS_SNIPPET_COUNT),
                ("s", symbol),
            ])
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(" ");
        let body = self.send_json(req).await?;
        let items = parse_news(&body)?;
        tracing::debug!(symbol, items = items.len(), "fetched news");
        Ok(items)
    }

    /// Parallel close/high/low/volume/timestamp arrays for a `range` window.
    pub async fn chart(
        &self,
        symbol: &str,
        interval: &str,
        range: &str,
    ) -> Result<ChartSeries, ProviderError> {
        let req = self.http.get(self.url("/stock/v3/get-chart")).query(&[
            ("interval", interval),
            ("symbol", symbol),
            ("range", range),
            ("region", self.region.as_str()),
            ("includePrePost", "false"),
            ("useYfid", "true"),
            ("includeAdjustedClose", "true"),
            ("events", CHART_EVENTS),
        ]);
        let body = self.send_json(req).await?;
        let chart = parse_chart(&body)?;
        Ok(ChartSeries {
            symbol: symbol.to_string(),
            close: chart.quote.close,
            high: chart.quote.high,
            volume: chart.quote.volume,
            low: chart.quote.low,
            timestamp: chart.timestamp,
        })
    }
}

#[async_trait::async_trait]
impl HistoricalProvider for RapidYahooClient {
    fn source_name(&self) -> &'static str {
        "yahoo"
    }

    async fn fetch_bars(&self, req: FetchBarsRequest) -> Result<Vec<ProviderBar>, ProviderError> {
        let period1 = day_start_ts(req.start).to_string();
        let period2 = day_start_ts(req.end).to_string();
        let mut out = Vec::new();

        for sym in &req.symbols {
            let http_req = self.http.get(self.url("/stock/v3/get-chart")).query(&[
                ("interval", "1d"),
                ("symbol", sym.as_str()),
                ("period1", period1.as_str()),
                ("period2", period2.as_str()),
                ("region", self.region.as_str()),
                ("includePrePost", "false"),
                ("useYfid", "true"),
                ("includeAdjustedClose", "true"),
                ("events", CHART_EVENTS),
            ]);
            let body = self.send_json(http_req).await?;
            let chart = parse_chart(&body)?;
            let before = out.len();
            for (i, ts) in chart.timestamp.iter().enumerate() {
                out.push(ProviderBar {
                    symbol: sym.clone(),
                    day_ts: utc_day_floor(*ts),
                    open: at(&chart.quote.open, i),
                    high: at(&chart.quote.high, i),
                    low: at(&chart.quote.low, i),
                    close: at(&chart.quote.close, i),
                    volume: at(&chart.quote.volume, i),
                });
            }
            tracing::debug!(symbol = %sym, bars = out.len() - before, "fetched history");
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

pub(crate) fn parse_news(body: &Value) -> Result<Vec<NewsItem>, ProviderError> {
    let stream = body
        .pointer("/data/main/stream")
        .and_then(Value::as_array)
        .ok_or_else(|| ProviderError::MissingField("data.main.stream".to_string()))?;

    stream
        .iter()
        .take(NEWS_LIMIT)
        .enumerate()
        .map(|(i, entry)| {
            let content = entry
                .get("content")
                .ok_or_else(|| {
                    ProviderError::MissingField(format!("data.main.stream[{i}].content"))
                })?;
            let title = content
                .get("title")
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    ProviderError::MissingField(format!("data.main.stream[{i}].content.title"))
                })?;
            // clickThroughUrl is null for syndicated items; fall back to the preview.
            let url = content
                .pointer("/clickThroughUrl/url")
                .and_then(Value::as_str)
                .or_else(|| content.get("previewUrl").and_then(Value::as_str))
                .map(str::to_string);
            Ok(NewsItem {
                title: title.to_string(),
                url,
            })
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Quote {
    #[serde(default)]
    pub open: Vec<Option<f64>>,
    #[serde(default)]
    pub close: Vec<Option<f64>>,
    #[serde(default)]
    pub high: Vec<Option<f64>>,
    #[serde(default)]
    pub low: Vec<Option<f64>>,
    #[serde(default)]
    pub volume: Vec<Option<i64>>,
}

#[derive(Debug)]
pub(crate) struct ParsedChart {
    pub timestamp: Vec<i64>,
    pub quote: Quote,
}

pub(crate) fn parse_chart(body: &Value) -> Result<ParsedChart, ProviderError> {
    let env: ChartEnvelope = serde_json::from_value(body.clone())
        .map_err(|e| ProviderError::Decode(format!("chart payload: {e}")))?;

    if let Some(err) = env.chart.error {
        return Err(ProviderError::Api {
            code: None,
            message: format!(
                "{}: {}",
                err.code.unwrap_or_else(|| "unknown".to_string()),
                err.description.unwrap_or_default()
            ),
        });
    }

    let result = env
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| ProviderError::MissingField("chart.result[0]".to_string()))?;
    let quote = result
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::MissingField("chart.result[0].indicators.quote[0]".to_string()))?;

    Ok(ParsedChart {
        timestamp: result.timestamp,
        quote,
    })
}

fn at<T: Copy>(v: &[Option<T>], i: usize) -> Option<T> {
    v.get(i).copied().flatten()
}

fn day_start_ts(d: NaiveDate) -> i64 {
    d.and_time(NaiveTime::MIN).and_utc().timestamp()
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}
