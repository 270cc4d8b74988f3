//! The threshold decision rule and the one-way status transition.

use chrono::NaiveDateTime;

use common::{CrossingEvent, CrossingKind, Holding, HoldingStatus};

/// Which threshold `price` crosses, if any. Target is checked first, so a
/// price satisfying both conditions counts as a target hit.
pub fn decide(holding: &Holding, price: f64) -> Option<CrossingKind> {
    if price >= holding.target_price {
        Some(CrossingKind::Target)
    } else if price <= holding.stop_loss_price {
        Some(CrossingKind::StopLoss)
    } else {
        None
    }
}

/// Apply the rule to an open holding and, on a crossing, move it to its
/// terminal status. Holdings that are already terminal are never touched.
///
/// Expects `observe(price)` and the probability to have been recorded first;
/// the event snapshots both.
pub fn apply(holding: &mut Holding, price: f64, at: NaiveDateTime) -> Option<CrossingEvent> {
    if !holding.is_open() {
        return None;
    }
    let kind = decide(holding, price)?;

    holding.status = match kind {
        CrossingKind::Target => HoldingStatus::TargetHit { at },
        CrossingKind::StopLoss => HoldingStatus::StopLossHit { at },
    };

    Some(CrossingEvent {
        kind,
        symbol: holding.symbol.clone(),
        price,
        entry_price: holding.entry_price,
        target_price: holding.target_price,
        stop_loss_price: holding.stop_loss_price,
        quantity: holding.quantity,
        profit_and_loss: holding.pnl_at(price),
        probability: holding.probability.unwrap_or(0.0),
        at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn holding(target: f64, stop: f64) -> Holding {
        let day = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        Holding::new("ABC", 100.0, target, stop, 10.0, day)
    }

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 5)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    #[test]
    fn thresholds_are_inclusive() {
        let h = holding(110.0, 95.0);
        assert_eq!(decide(&h, 110.0), Some(CrossingKind::Target));
        assert_eq!(decide(&h, 95.0), Some(CrossingKind::StopLoss));
        assert_eq!(decide(&h, 109.99), None);
        assert_eq!(decide(&h, 95.01), None);
    }

    #[test]
    fn target_wins_when_both_match() {
        // Misconfigured: target below stop-loss.
        let mut h = holding(90.0, 95.0);
        let event = apply(&mut h, 92.0, at()).unwrap();
        assert_eq!(event.kind, CrossingKind::Target);
        assert_eq!(h.status, HoldingStatus::TargetHit { at: at() });
    }

    #[test]
    fn terminal_holding_never_transitions_again() {
        let mut h = holding(110.0, 95.0);
        assert!(apply(&mut h, 112.0, at()).is_some());
        let status = h.status;

        assert!(apply(&mut h, 80.0, at()).is_none());
        assert!(apply(&mut h, 120.0, at()).is_none());
        assert_eq!(h.status, status);
    }

    #[test]
    fn event_carries_snapshot() {
        let mut h = holding(110.0, 95.0);
        h.observe(93.0);
        h.probability = Some(12.5);
        let event = apply(&mut h, 93.0, at()).unwrap();

        assert_eq!(event.kind, CrossingKind::StopLoss);
        assert_eq!(event.profit_and_loss, -70.0);
        assert_eq!(event.probability, 12.5);
        assert_eq!(event.stop_loss_price, 95.0);
    }
}
