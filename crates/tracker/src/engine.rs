use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use tokio::sync::RwLock;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use common::{
    CrossingEvent, Error, HoldingsTable, Indicators, PriceSource, ProbabilityScorer, SignalSource,
    TradingWindow, TrackingState,
};
use store::SharedStore;

use crate::alerts::{format_crossing, format_error, AlertDispatcher};
use crate::{features, rule};

/// Cloneable handle passed to other crates (Telegram, API).
#[derive(Clone)]
pub struct TrackerHandle {
    state: Arc<RwLock<TrackingState>>,
}

impl TrackerHandle {
    pub async fn state(&self) -> TrackingState {
        *self.state.read().await
    }

    /// Suspend evaluation from the next tick on. Returns `false` if already paused.
    pub async fn pause(&self) -> bool {
        self.set(TrackingState::Paused).await
    }

    /// Returns `false` if tracking was already active.
    pub async fn resume(&self) -> bool {
        self.set(TrackingState::Active).await
    }

    async fn set(&self, next: TrackingState) -> bool {
        let mut state = self.state.write().await;
        if *state == next {
            return false;
        }
        let previous = *state;
        info!(from = %previous, to = %next, "Tracking state changed");
        *state = next;
        true
    }
}

/// Per-tick bookkeeping for logs and tests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Crossings detected this tick, in table order. Already persisted.
    pub events: Vec<CrossingEvent>,
    /// Open holdings that received a fresh price.
    pub priced: usize,
    /// Open holdings skipped because no price was available.
    pub unavailable: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Paused,
    OutsideWindow,
    Completed(TickReport),
}

impl TickOutcome {
    pub fn events(&self) -> &[CrossingEvent] {
        match self {
            TickOutcome::Completed(report) => &report.events,
            _ => &[],
        }
    }
}

/// A tick stopped by a store failure. Crossings saved before the failure are
/// durable and still need to be announced.
#[derive(Debug, thiserror::Error)]
#[error("tick aborted: {source}")]
pub struct TickAborted {
    #[source]
    pub source: Error,
    pub persisted: Vec<CrossingEvent>,
}

impl TickAborted {
    fn new(source: Error, persisted: Vec<CrossingEvent>) -> Self {
        Self { source, persisted }
    }
}

/// Market data fetched for one symbol during the unlocked phase of a tick.
struct Quote {
    price: f64,
    indicators: Indicators,
}

/// Periodic evaluator of open holdings against their thresholds.
///
/// A tick fetches prices and indicators from a snapshot without holding the
/// store lock, then re-loads the table under the lock and applies the quotes
/// to rows that are still open. Commands issued while quotes are in flight
/// are never blocked and never overwritten. A crossing is saved before the
/// loop moves on, which is what guarantees at most one alert per holding
/// even across a crash.
pub struct TrackingEngine {
    store: SharedStore,
    prices: Arc<dyn PriceSource>,
    signals: Arc<dyn SignalSource>,
    scorer: Arc<dyn ProbabilityScorer>,
    window: TradingWindow,
    call_timeout: Duration,
    state: Arc<RwLock<TrackingState>>,
}

impl TrackingEngine {
    pub fn new(
        store: SharedStore,
        prices: Arc<dyn PriceSource>,
        signals: Arc<dyn SignalSource>,
        scorer: Arc<dyn ProbabilityScorer>,
        window: TradingWindow,
        call_timeout: Duration,
    ) -> (Self, TrackerHandle) {
        let state = Arc::new(RwLock::new(TrackingState::Active));
        let handle = TrackerHandle {
            state: state.clone(),
        };
        let engine = TrackingEngine {
            store,
            prices,
            signals,
            scorer,
            window,
            call_timeout,
            state,
        };
        (engine, handle)
    }

    pub async fn run_tick(&self) -> Result<TickOutcome, TickAborted> {
        self.run_tick_at(Local::now().naive_local()).await
    }

    /// Evaluate every open holding once, as of local time `now`.
    pub async fn run_tick_at(&self, now: NaiveDateTime) -> Result<TickOutcome, TickAborted> {
        if *self.state.read().await == TrackingState::Paused {
            debug!("Tracking paused; tick skipped");
            return Ok(TickOutcome::Paused);
        }
        if !self.window.contains(now) {
            debug!(%now, "Outside trading window; tick skipped");
            return Ok(TickOutcome::OutsideWindow);
        }

        let snapshot = self
            .store
            .read()
            .await
            .map_err(|e| TickAborted::new(e, Vec::new()))?;
        let mut report = TickReport::default();
        let quotes = self.fetch_quotes(&snapshot, &mut report).await;

        let store = self.store.lock().await;
        let mut table = store.load().map_err(|e| TickAborted::new(e, Vec::new()))?;

        for idx in 0..table.holdings.len() {
            let holding = &mut table.holdings[idx];
            if !holding.is_open() {
                continue;
            }
            // Rows added since the snapshot wait for the next tick.
            let Some(quote) = quotes.get(&holding.symbol) else {
                continue;
            };

            holding.observe(quote.price);
            let features = features::assemble(holding, quote.price, &quote.indicators);
            holding.probability = Some(self.scorer.score(&features).unwrap_or(0.0));
            report.priced += 1;

            if let Some(event) = rule::apply(holding, quote.price, now) {
                info!(
                    symbol = %event.symbol,
                    kind = %event.kind,
                    price = event.price,
                    pnl = event.profit_and_loss,
                    "Threshold crossed"
                );
                if let Err(e) = store.save(&table) {
                    error!(symbol = %event.symbol, error = %e, "Failed to persist crossing; tick aborted");
                    return Err(TickAborted::new(e, report.events));
                }
                report.events.push(event);
            }
        }

        store
            .save(&table)
            .map_err(|e| TickAborted::new(e, report.events.clone()))?;

        info!(
            priced = report.priced,
            unavailable = report.unavailable.len(),
            crossings = report.events.len(),
            "Tick complete"
        );
        Ok(TickOutcome::Completed(report))
    }

    /// Price and indicators for every open symbol in `snapshot`, fetched once
    /// per symbol and without the store lock.
    async fn fetch_quotes(
        &self,
        snapshot: &HoldingsTable,
        report: &mut TickReport,
    ) -> HashMap<String, Quote> {
        let mut quotes = HashMap::new();
        for holding in snapshot.holdings.iter().filter(|h| h.is_open()) {
            let symbol = &holding.symbol;
            if quotes.contains_key(symbol) || report.unavailable.contains(symbol) {
                continue;
            }
            let Some(price) = self.fetch_price(symbol).await else {
                warn!(symbol = %symbol, "No price available; holding left unchanged");
                report.unavailable.push(symbol.clone());
                continue;
            };
            let indicators = self.fetch_indicators(symbol).await;
            quotes.insert(symbol.clone(), Quote { price, indicators });
        }
        quotes
    }

    async fn fetch_price(&self, symbol: &str) -> Option<f64> {
        let limit = self.prices.time_budget().unwrap_or(self.call_timeout);
        with_timeout(symbol, "price", limit, self.prices.price(symbol))
            .await
            .flatten()
    }

    async fn fetch_indicators(&self, symbol: &str) -> Indicators {
        with_timeout(symbol, "indicators", self.call_timeout, self.signals.indicators(symbol))
            .await
            .unwrap_or_default()
    }

    /// Run ticks forever at `interval`. Call from `tokio::spawn`.
    ///
    /// Alerts go out only after the tick that produced them has returned, so
    /// a slow or failing channel never holds the store lock.
    pub async fn run(self, interval: Duration, alerts: AlertDispatcher) {
        info!(interval = ?interval, window = ?self.window, "Tracking engine running");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            match self.run_tick().await {
                Ok(outcome) => {
                    for event in outcome.events() {
                        alerts.dispatch(&format_crossing(event)).await;
                    }
                }
                Err(aborted) => {
                    error!(error = %aborted.source, "Tick failed");
                    for event in &aborted.persisted {
                        alerts.dispatch(&format_crossing(event)).await;
                    }
                    alerts.dispatch(&format_error(&aborted.source)).await;
                }
            }
        }
    }
}

async fn with_timeout<T>(
    symbol: &str,
    call: &str,
    limit: Duration,
    fut: impl Future<Output = T>,
) -> Option<T> {
    match tokio::time::timeout(limit, fut).await {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(symbol = %symbol, call, timeout = ?limit, "External call timed out");
            None
        }
    }
}
