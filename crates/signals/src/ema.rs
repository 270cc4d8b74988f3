/// Exponential moving average of the whole series, returned for the last bar.
///
/// Seeded with the SMA of the first `period` closes, then smoothed with
/// `k = 2 / (period + 1)`. Returns `None` with fewer than `period` values.
pub fn ema(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period {
        return None;
    }
    let k = 2.0 / (period as f64 + 1.0);
    let seed = closes[..period].iter().sum::<f64>() / period as f64;

    Some(
        closes[period..]
            .iter()
            .fold(seed, |acc, &price| price * k + acc * (1.0 - k)),
    )
}
