pub mod config;
pub mod error;
pub mod feeds;
pub mod types;

pub use config::{Config, EmailConfig, TradingWindow};
pub use error::{Error, Result};
pub use feeds::{HoldingsStore, Notifier, PriceSource, ProbabilityScorer, SignalSource};
pub use types::*;
