use std::time::Duration;

use async_trait::async_trait;

use crate::{FeatureVector, HoldingsTable, Indicators, Result};

/// Best-effort live price lookup.
///
/// Implementations never fail the caller: anything that goes wrong upstream
/// (network, parse, empty response) is reported as `None` and logged where
/// it happened.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Latest traded price for a canonical symbol, or `None` if unavailable.
    async fn price(&self, symbol: &str) -> Option<f64>;

    /// Longest a single [`PriceSource::price`] call may legitimately take.
    /// Sources that chain several upstreams report the sum of their
    /// per-upstream limits; `None` leaves the bound to the caller.
    fn time_budget(&self) -> Option<Duration> {
        None
    }
}

/// Technical indicator lookup. Missing values are `None`, never an error.
#[async_trait]
pub trait SignalSource: Send + Sync {
    async fn indicators(&self, symbol: &str) -> Indicators;
}

/// Success-probability model consumed through a fixed feature contract.
pub trait ProbabilityScorer: Send + Sync {
    /// Score in `0..=100`, or `None` when no model is loaded.
    fn score(&self, features: &FeatureVector) -> Option<f64>;
}

/// Durable table of holdings. Whole-table load and whole-table replace are the
/// only primitives; callers serialize access through `store::SharedStore`.
pub trait HoldingsStore: Send + Sync {
    fn load(&self) -> Result<HoldingsTable>;

    /// Replace the stored table. A failed save must leave the previous
    /// contents intact.
    fn save(&self, table: &HoldingsTable) -> Result<()>;
}

impl<T: HoldingsStore + ?Sized> HoldingsStore for std::sync::Arc<T> {
    fn load(&self) -> Result<HoldingsTable> {
        (**self).load()
    }

    fn save(&self, table: &HoldingsTable) -> Result<()> {
        (**self).save(table)
    }
}

/// Outbound message channel to the operator.
///
/// Delivery is fire-and-forget from the caller's point of view; the error is
/// returned only so the dispatcher can log it.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short channel name used in logs ("telegram", "email").
    fn name(&self) -> &str;

    async fn send(&self, message: &str) -> Result<()>;
}
