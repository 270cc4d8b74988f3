use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use common::{PriceSource, Result};

/// A single upstream quote endpoint. Unlike [`PriceSource`], failures are
/// returned so the caller can decide whether to try another source.
#[async_trait]
pub trait QuoteClient: Send + Sync {
    fn name(&self) -> &str;

    async fn last_price(&self, symbol: &str) -> Result<f64>;
}

/// Tries the primary source, then the fallback. Zero, negative and
/// non-finite quotes count as failures.
///
/// Each source gets its own `per_source` limit, so a stalled primary still
/// leaves the fallback its full turn.
pub struct FallbackPriceSource {
    sources: Vec<Arc<dyn QuoteClient>>,
    per_source: Duration,
}

impl FallbackPriceSource {
    pub fn new(
        primary: Arc<dyn QuoteClient>,
        fallback: Arc<dyn QuoteClient>,
        per_source: Duration,
    ) -> Self {
        Self {
            sources: vec![primary, fallback],
            per_source,
        }
    }
}

#[async_trait]
impl PriceSource for FallbackPriceSource {
    async fn price(&self, symbol: &str) -> Option<f64> {
        for source in &self.sources {
            let Ok(quote) = tokio::time::timeout(self.per_source, source.last_price(symbol)).await
            else {
                warn!(
                    symbol = %symbol,
                    source = source.name(),
                    timeout = ?self.per_source,
                    "Price source timed out"
                );
                continue;
            };
            match quote {
                Ok(price) if price.is_finite() && price > 0.0 => {
                    debug!(symbol = %symbol, source = source.name(), price, "Price fetched");
                    return Some(price);
                }
                Ok(price) => {
                    warn!(symbol = %symbol, source = source.name(), price, "Ignoring unusable quote");
                }
                Err(e) => {
                    warn!(symbol = %symbol, source = source.name(), error = %e, "Price source failed");
                }
            }
        }
        None
    }

    fn time_budget(&self) -> Option<Duration> {
        Some(self.per_source * self.sources.len() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use common::Error;

    const LIMIT: Duration = Duration::from_secs(10);

    struct Fixed {
        answer: Option<f64>,
        calls: AtomicUsize,
        delay: Duration,
    }

    impl Fixed {
        fn new(answer: Option<f64>) -> Arc<Self> {
            Self::slow(answer, Duration::ZERO)
        }

        fn slow(answer: Option<f64>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                answer,
                calls: AtomicUsize::new(0),
                delay,
            })
        }
    }

    #[async_trait]
    impl QuoteClient for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn last_price(&self, _symbol: &str) -> Result<f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.answer.ok_or_else(|| Error::Feed("down".into()))
        }
    }

    #[tokio::test]
    async fn primary_wins_without_touching_fallback() {
        let primary = Fixed::new(Some(101.0));
        let fallback = Fixed::new(Some(99.0));
        let source = FallbackPriceSource::new(primary.clone(), fallback.clone(), LIMIT);

        assert_eq!(source.price("ABC").await, Some(101.0));
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn zero_quote_falls_through() {
        let source = FallbackPriceSource::new(Fixed::new(Some(0.0)), Fixed::new(Some(99.0)), LIMIT);
        assert_eq!(source.price("ABC").await, Some(99.0));
    }

    #[tokio::test]
    async fn both_down_is_unavailable() {
        let source = FallbackPriceSource::new(Fixed::new(None), Fixed::new(None), LIMIT);
        assert_eq!(source.price("ABC").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_primary_still_reaches_fallback() {
        let primary = Fixed::slow(Some(101.0), Duration::from_secs(3600));
        let fallback = Fixed::slow(Some(112.0), Duration::from_secs(2));
        let source = FallbackPriceSource::new(primary.clone(), fallback.clone(), LIMIT);

        let started = tokio::time::Instant::now();
        assert_eq!(source.price("ABC").await, Some(112.0));
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() <= source.time_budget().unwrap());
    }

    #[test]
    fn budget_covers_every_source() {
        let source = FallbackPriceSource::new(Fixed::new(None), Fixed::new(None), LIMIT);
        assert_eq!(source.time_budget(), Some(Duration::from_secs(20)));
    }
}
