use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use common::{Error, Indicators, Result, SignalSource};

use crate::{build_http, QuoteClient};

const BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// Chart API client. Serves as the fallback live price (last 1-minute close
/// of the session) and as the daily-close history behind the indicators.
pub struct ChartClient {
    http: Client,
    /// Exchange suffix appended to canonical symbols, e.g. `.NS`.
    suffix: String,
}

impl ChartClient {
    pub fn new(timeout: Duration, suffix: impl Into<String>) -> Result<Self> {
        Ok(Self {
            http: build_http(timeout)?,
            suffix: suffix.into(),
        })
    }

    /// Non-null closes for `symbol` over `range` at `interval`, oldest first.
    pub async fn closes(&self, symbol: &str, range: &str, interval: &str) -> Result<Vec<f64>> {
        let url = format!("{BASE_URL}/{symbol}{}", self.suffix);
        let resp = self
            .http
            .get(&url)
            .query(&[("range", range), ("interval", interval)])
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(Error::Feed(format!("chart HTTP {status} for {symbol}")));
        }
        parse_closes(&body)
    }
}

#[async_trait]
impl QuoteClient for ChartClient {
    fn name(&self) -> &str {
        "chart"
    }

    async fn last_price(&self, symbol: &str) -> Result<f64> {
        self.closes(symbol, "1d", "1m")
            .await?
            .last()
            .copied()
            .ok_or_else(|| Error::Feed(format!("no intraday closes for {symbol}")))
    }
}

#[async_trait]
impl SignalSource for ChartClient {
    async fn indicators(&self, symbol: &str) -> Indicators {
        match self.closes(symbol, "3mo", "1d").await {
            Ok(closes) => {
                debug!(symbol = %symbol, bars = closes.len(), "Daily closes fetched");
                signals::indicators_from_closes(&closes)
            }
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "Indicator history unavailable");
                Indicators::default()
            }
        }
    }
}

/// Pull the close series out of a chart response, dropping null bars.
pub fn parse_closes(body: &str) -> Result<Vec<f64>> {
    let resp: ChartResponse =
        serde_json::from_str(body).map_err(|e| Error::Feed(format!("chart: {e}")))?;

    if let Some(err) = resp.chart.error {
        return Err(Error::Feed(format!(
            "chart: {}",
            err.description.unwrap_or_else(|| "unknown error".into())
        )));
    }

    let closes: Vec<f64> = resp
        .chart
        .result
        .into_iter()
        .flatten()
        .next()
        .and_then(|r| r.indicators.quote.into_iter().next())
        .map(|q| q.close.into_iter().flatten().filter(|c| c.is_finite()).collect())
        .unwrap_or_default();

    if closes.is_empty() {
        return Err(Error::Feed("chart: empty close series".into()));
    }
    Ok(closes)
}

// ─── Response types ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Deserialize)]
struct ChartError {
    description: Option<String>,
}

#[derive(Deserialize)]
struct ChartResult {
    indicators: ChartIndicators,
}

#[derive(Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<QuoteSeries>,
}

#[derive(Deserialize)]
struct QuoteSeries {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_bars_are_skipped() {
        let body = r#"{"chart":{"result":[{"meta":{},"indicators":{"quote":[{"close":[101.5,null,102.25]}]}}],"error":null}}"#;
        assert_eq!(parse_closes(body).unwrap(), vec![101.5, 102.25]);
    }

    #[test]
    fn api_error_is_reported() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let err = parse_closes(body).unwrap_err();
        assert!(err.to_string().contains("delisted"), "{err}");
    }

    #[test]
    fn all_null_series_is_empty_error() {
        let body = r#"{"chart":{"result":[{"indicators":{"quote":[{"close":[null,null]}]}}],"error":null}}"#;
        assert!(parse_closes(body).is_err());
    }
}
