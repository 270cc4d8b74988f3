use std::sync::Arc;

use tracing::{debug, warn};

use common::{CrossingEvent, CrossingKind, Error, Notifier};

use crate::report::amount;

/// Operator message for a threshold crossing.
pub fn format_crossing(event: &CrossingEvent) -> String {
    let headline = match event.kind {
        CrossingKind::Target => format!("🎯 *{}* hit Target ₹{}", event.symbol, amount(event.price)),
        CrossingKind::StopLoss => {
            format!("⚠️ *{}* hit Stop Loss ₹{}", event.symbol, amount(event.price))
        }
    };
    let outcome = if event.profit_and_loss >= 0.0 { "Profit" } else { "Loss" };

    format!(
        "{headline}\n\
         Buy ₹{} | Target ₹{} | SL ₹{} | Qty {}\n\
         {outcome} ₹{} | Prob: {}%",
        amount(event.entry_price),
        amount(event.target_price),
        amount(event.stop_loss_price),
        amount(event.quantity),
        amount(event.profit_and_loss),
        amount(event.probability),
    )
}

/// Operator message for a tick that could not complete.
pub fn format_error(error: &Error) -> String {
    format!("⚠️ Bot error: {error}")
}

/// Fans every message out to all configured channels. A failing channel is
/// logged and skipped.
#[derive(Clone, Default)]
pub struct AlertDispatcher {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl AlertDispatcher {
    pub fn new(notifiers: Vec<Arc<dyn Notifier>>) -> Self {
        Self { notifiers }
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    /// Send `message` everywhere; returns how many channels accepted it.
    pub async fn dispatch(&self, message: &str) -> usize {
        let mut delivered = 0;
        for notifier in &self.notifiers {
            match notifier.send(message).await {
                Ok(()) => {
                    debug!(channel = notifier.name(), "Alert delivered");
                    delivered += 1;
                }
                Err(e) => warn!(channel = notifier.name(), error = %e, "Failed to deliver alert"),
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::Mutex;

    fn event(kind: CrossingKind, price: f64, pnl: f64) -> CrossingEvent {
        CrossingEvent {
            kind,
            symbol: "ABC".into(),
            price,
            entry_price: 100.0,
            target_price: 110.0,
            stop_loss_price: 95.0,
            quantity: 10.0,
            profit_and_loss: pnl,
            probability: 63.5,
            at: NaiveDate::from_ymd_opt(2024, 1, 5)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn target_message_layout() {
        let text = format_crossing(&event(CrossingKind::Target, 112.0, 120.0));
        assert_eq!(
            text,
            "🎯 *ABC* hit Target ₹112\nBuy ₹100 | Target ₹110 | SL ₹95 | Qty 10\nProfit ₹120 | Prob: 63.5%"
        );
    }

    #[test]
    fn stop_message_reports_loss() {
        let text = format_crossing(&event(CrossingKind::StopLoss, 93.0, -70.0));
        assert!(text.starts_with("⚠️ *ABC* hit Stop Loss ₹93"));
        assert!(text.ends_with("Loss ₹-70 | Prob: 63.5%"));
    }

    #[test]
    fn error_message_prefix() {
        let text = format_error(&Error::Store("disk full".into()));
        assert_eq!(text, "⚠️ Bot error: Holdings store error: disk full");
    }

    struct Recording {
        name: &'static str,
        fail: bool,
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for Recording {
        fn name(&self) -> &str {
            self.name
        }

        async fn send(&self, message: &str) -> common::Result<()> {
            if self.fail {
                return Err(Error::Notify("offline".into()));
            }
            self.sent.lock().unwrap().push(message.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn failing_channel_does_not_block_others() {
        let broken = Arc::new(Recording {
            name: "email",
            fail: true,
            sent: Mutex::new(Vec::new()),
        });
        let chat = Arc::new(Recording {
            name: "telegram",
            fail: false,
            sent: Mutex::new(Vec::new()),
        });
        let dispatcher = AlertDispatcher::new(vec![broken, chat.clone()]);

        assert_eq!(dispatcher.dispatch("hello").await, 1);
        assert_eq!(chat.sent.lock().unwrap().as_slice(), ["hello".to_string()]);
    }
}
