pub mod ema;
pub mod rsi;

pub use ema::ema;
pub use rsi::RsiIndicator;

use common::Indicators;

/// RSI lookback used for the momentum feature.
pub const RSI_PERIOD: usize = 14;
/// Fast and slow EMA lengths whose ratio feeds the trend feature.
pub const EMA_FAST: usize = 20;
pub const EMA_SLOW: usize = 50;

/// Compute the indicator snapshot from daily closes (oldest first).
/// Each indicator is `None` when the series is too short for it.
pub fn indicators_from_closes(closes: &[f64]) -> Indicators {
    Indicators {
        rsi: RsiIndicator::new(RSI_PERIOD).compute(closes),
        ema_fast: ema(closes, EMA_FAST),
        ema_slow: ema(closes, EMA_SLOW),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_history_only_fills_what_it_can() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let ind = indicators_from_closes(&closes);
        assert!(ind.rsi.is_some());
        assert!(ind.ema_fast.is_some());
        assert!(ind.ema_slow.is_none());
    }

    #[test]
    fn empty_history_is_all_missing() {
        assert_eq!(indicators_from_closes(&[]), Indicators::default());
    }
}
