/// RSI (Relative Strength Index) momentum oscillator.
///
/// Uses Wilder's smoothed moving average over the full series.
/// Returns `None` until at least `period + 1` closes are available.
#[derive(Debug, Clone, Copy)]
pub struct RsiIndicator {
    pub period: usize,
}

impl RsiIndicator {
    pub fn new(period: usize) -> Self {
        Self { period: period.max(2) }
    }

    /// Compute RSI from close prices (oldest first).
    pub fn compute(&self, closes: &[f64]) -> Option<f64> {
        if closes.len() < self.period + 1 {
            return None;
        }

        let changes: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
        let (seed, rest) = changes.split_at(self.period);
        let n = self.period as f64;

        let mut avg_gain = seed.iter().filter(|&&c| c > 0.0).sum::<f64>() / n;
        let mut avg_loss = seed.iter().filter(|&&c| c < 0.0).map(|c| -c).sum::<f64>() / n;

        for &change in rest {
            avg_gain = (avg_gain * (n - 1.0) + change.max(0.0)) / n;
            avg_loss = (avg_loss * (n - 1.0) + (-change).max(0.0)) / n;
        }

        if avg_loss == 0.0 {
            return Some(100.0);
        }
        let rs = avg_gain / avg_loss;
        Some(100.0 - 100.0 / (1.0 + rs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsi_returns_none_when_insufficient_data() {
        let rsi = RsiIndicator::new(14);
        assert!(rsi.compute(&[100.0; 14]).is_none());
    }

    #[test]
    fn rsi_all_gains_returns_100() {
        let rsi = RsiIndicator::new(3);
        let value = rsi.compute(&[10.0, 11.0, 12.0, 13.0, 14.0]).unwrap();
        assert!((value - 100.0).abs() < 1e-6, "Expected ~100, got {value}");
    }

    #[test]
    fn rsi_all_losses_returns_0() {
        let rsi = RsiIndicator::new(3);
        let value = rsi.compute(&[14.0, 13.0, 12.0, 11.0, 10.0]).unwrap();
        assert!(value.abs() < 1e-6, "Expected ~0, got {value}");
    }

    #[test]
    fn rsi_stays_in_range_on_mixed_series() {
        let rsi = RsiIndicator::new(14);
        let prices = [
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.15, 43.61, 44.33, 44.83, 45.10,
            45.15, 44.34, 44.09, 44.60,
        ];
        let v = rsi.compute(&prices).unwrap();
        assert!((0.0..=100.0).contains(&v), "RSI out of range: {v}");
    }
}
