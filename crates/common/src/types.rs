use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Exchange suffixes accepted on input and stripped before storage.
const EXCHANGE_SUFFIXES: [&str; 2] = [".NS", ".BO"];

/// Canonical storage form of a ticker: trimmed, uppercase, exchange suffix removed.
pub fn canonical_symbol(raw: &str) -> String {
    let upper = raw.trim().to_uppercase();
    EXCHANGE_SUFFIXES
        .iter()
        .find_map(|suffix| upper.strip_suffix(suffix))
        .map(|s| s.trim().to_string())
        .unwrap_or(upper)
}

/// Round to two decimal places (currency precision).
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Lifecycle state of a holding. Every variant other than `Open` is terminal.
///
/// `Exited` is never produced by the tracker; it marks a row the operator
/// closed by hand in the table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum HoldingStatus {
    Open,
    TargetHit { at: NaiveDateTime },
    StopLossHit { at: NaiveDateTime },
    Exited { at: NaiveDateTime },
}

impl HoldingStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, HoldingStatus::Open)
    }

    /// Time the holding stopped being tracked, if it has.
    pub fn crossed_at(&self) -> Option<NaiveDateTime> {
        match self {
            HoldingStatus::Open => None,
            HoldingStatus::TargetHit { at }
            | HoldingStatus::StopLossHit { at }
            | HoldingStatus::Exited { at } => Some(*at),
        }
    }
}

impl std::fmt::Display for HoldingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HoldingStatus::Open => write!(f, "Active"),
            HoldingStatus::TargetHit { at } => write!(f, "Target @ {}", at.format("%Y-%m-%d %H:%M:%S")),
            HoldingStatus::StopLossHit { at } => write!(f, "SL @ {}", at.format("%Y-%m-%d %H:%M:%S")),
            HoldingStatus::Exited { at } => write!(f, "Exit @ {}", at.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

/// One tracked position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub symbol: String,
    pub entry_price: f64,
    pub target_price: f64,
    pub stop_loss_price: f64,
    pub quantity: f64,
    pub opened_on: NaiveDate,
    pub status: HoldingStatus,
    pub last_price: Option<f64>,
    /// Last success score in `0..=100`.
    pub probability: Option<f64>,
    pub profit_and_loss: Option<f64>,
}

impl Holding {
    /// A freshly added, open holding with no derived fields.
    pub fn new(
        symbol: impl Into<String>,
        entry_price: f64,
        target_price: f64,
        stop_loss_price: f64,
        quantity: f64,
        opened_on: NaiveDate,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            entry_price,
            target_price,
            stop_loss_price,
            quantity,
            opened_on,
            status: HoldingStatus::Open,
            last_price: None,
            probability: None,
            profit_and_loss: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    /// Record a fresh price and recompute profit and loss.
    pub fn observe(&mut self, price: f64) {
        self.last_price = Some(price);
        self.profit_and_loss = Some(self.pnl_at(price));
    }

    /// `(price - entry) * qty`, rounded to currency precision.
    pub fn pnl_at(&self, price: f64) -> f64 {
        round2((price - self.entry_price) * self.quantity)
    }

    /// P/L at the last observed price, zero if never priced.
    pub fn current_pnl(&self) -> f64 {
        self.last_price.map(|p| self.pnl_at(p)).unwrap_or(0.0)
    }
}

/// The whole persisted table.
///
/// `reserved_rows` carries legacy `TOTAL` aggregate rows verbatim (in column
/// order) so they survive a load/save cycle without ever being treated as
/// holdings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HoldingsTable {
    pub holdings: Vec<Holding>,
    pub reserved_rows: Vec<Vec<String>>,
}

impl HoldingsTable {
    pub fn new(holdings: Vec<Holding>) -> Self {
        Self {
            holdings,
            reserved_rows: Vec::new(),
        }
    }

    /// First holding with the given canonical symbol.
    pub fn find(&self, symbol: &str) -> Option<&Holding> {
        self.holdings.iter().find(|h| h.symbol == symbol)
    }

    pub fn find_mut(&mut self, symbol: &str) -> Option<&mut Holding> {
        self.holdings.iter_mut().find(|h| h.symbol == symbol)
    }

    pub fn open_count(&self) -> usize {
        self.holdings.iter().filter(|h| h.is_open()).count()
    }
}

/// Which threshold a holding crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossingKind {
    Target,
    StopLoss,
}

impl std::fmt::Display for CrossingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CrossingKind::Target => write!(f, "Target"),
            CrossingKind::StopLoss => write!(f, "Stop Loss"),
        }
    }
}

/// Emitted exactly once per holding, when it leaves `Open`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossingEvent {
    pub kind: CrossingKind,
    pub symbol: String,
    pub price: f64,
    pub entry_price: f64,
    pub target_price: f64,
    pub stop_loss_price: f64,
    pub quantity: f64,
    pub profit_and_loss: f64,
    pub probability: f64,
    pub at: NaiveDateTime,
}

/// Indicator snapshot for one symbol. Any field may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Indicators {
    /// 14-period RSI.
    pub rsi: Option<f64>,
    /// 20-period EMA of daily closes.
    pub ema_fast: Option<f64>,
    /// 50-period EMA of daily closes.
    pub ema_slow: Option<f64>,
}

/// Input to the probability model. Field order and names are a fixed contract
/// with the model file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub dist_target: f64,
    pub dist_sl: f64,
    pub rsi: Option<f64>,
    pub ema_ratio: f64,
    pub atr: f64,
    pub mom: f64,
    pub macd: f64,
}

impl FeatureVector {
    pub const NAMES: [&'static str; 7] =
        ["dist_target", "dist_sl", "rsi", "ema_ratio", "atr", "mom", "macd"];

    /// Named values in contract order; `None` marks a missing input.
    pub fn values(&self) -> [(&'static str, Option<f64>); 7] {
        [
            ("dist_target", Some(self.dist_target)),
            ("dist_sl", Some(self.dist_sl)),
            ("rsi", self.rsi),
            ("ema_ratio", Some(self.ema_ratio)),
            ("atr", Some(self.atr)),
            ("mom", Some(self.mom)),
            ("macd", Some(self.macd)),
        ]
    }
}

/// Administrative tracking state, checked at the top of every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TrackingState {
    #[default]
    Active,
    Paused,
}

impl std::fmt::Display for TrackingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackingState::Active => write!(f, "active"),
            TrackingState::Paused => write!(f, "paused"),
        }
    }
}

/// Read-only health snapshot: counts by status and total P/L.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub active: usize,
    pub targets: usize,
    pub stops: usize,
    pub exited: usize,
    pub total_pnl: f64,
}

impl PortfolioSummary {
    pub fn from_holdings(holdings: &[Holding]) -> Self {
        let mut summary = Self::default();
        for h in holdings {
            summary.total_pnl += h.current_pnl();
            match h.status {
                HoldingStatus::Open => summary.active += 1,
                HoldingStatus::TargetHit { .. } => summary.targets += 1,
                HoldingStatus::StopLossHit { .. } => summary.stops += 1,
                HoldingStatus::Exited { .. } => summary.exited += 1,
            }
        }
        summary.total_pnl = round2(summary.total_pnl);
        summary
    }
}
