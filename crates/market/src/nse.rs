use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use common::{Error, Result};

use crate::{build_http, QuoteClient};

const BASE_URL: &str = "https://www.nseindia.com";

/// Primary live quote source: the exchange's own equity quote endpoint.
///
/// The endpoint only answers requests carrying session cookies, so the home
/// page is fetched once to prime the cookie jar (and again after a 401/403).
pub struct NseClient {
    http: Client,
    primed: AtomicBool,
}

impl NseClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: build_http(timeout)?,
            primed: AtomicBool::new(false),
        })
    }

    async fn prime(&self) -> Result<()> {
        if self.primed.load(Ordering::Relaxed) {
            return Ok(());
        }
        self.http
            .get(BASE_URL)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        self.primed.store(true, Ordering::Relaxed);
        debug!("NSE session cookies primed");
        Ok(())
    }
}

#[async_trait]
impl QuoteClient for NseClient {
    fn name(&self) -> &str {
        "nse"
    }

    async fn last_price(&self, symbol: &str) -> Result<f64> {
        self.prime().await?;

        let resp = self
            .http
            .get(format!("{BASE_URL}/api/quote-equity"))
            .query(&[("symbol", symbol)])
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            self.primed.store(false, Ordering::Relaxed);
        }
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(Error::Feed(format!("NSE HTTP {status} for {symbol}")));
        }
        parse_quote(&body)
    }
}

/// Extract `priceInfo.lastPrice` from a quote-equity response.
pub fn parse_quote(body: &str) -> Result<f64> {
    let quote: QuoteResponse =
        serde_json::from_str(body).map_err(|e| Error::Feed(format!("NSE quote: {e}")))?;
    quote
        .price_info
        .and_then(|p| p.last_price)
        .ok_or_else(|| Error::Feed("NSE quote has no lastPrice".into()))
}

// ─── Response types ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    price_info: Option<PriceInfo>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceInfo {
    last_price: Option<f64>,
}
