use common::{FeatureVector, Holding, Indicators};

/// Build the scorer input for `holding` at `price`.
///
/// Distances are normalised by the entry price. The EMA ratio falls back to
/// `1.0` when either average is missing or the slow one is zero; a missing
/// RSI stays missing and is imputed by the scorer.
pub fn assemble(holding: &Holding, price: f64, indicators: &Indicators) -> FeatureVector {
    let (dist_target, dist_sl) = if holding.entry_price > 0.0 {
        (
            (holding.target_price - price) / holding.entry_price,
            (price - holding.stop_loss_price) / holding.entry_price,
        )
    } else {
        (0.0, 0.0)
    };

    let ema_ratio = match (indicators.ema_fast, indicators.ema_slow) {
        (Some(fast), Some(slow)) if slow != 0.0 => fast / slow,
        _ => 1.0,
    };

    FeatureVector {
        dist_target,
        dist_sl,
        rsi: indicators.rsi,
        ema_ratio,
        atr: 0.0,
        mom: 0.0,
        macd: 0.0,
    }
}
