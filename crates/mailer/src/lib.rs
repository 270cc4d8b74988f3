//! Optional e-mail alert channel. Each alert carries the current holdings
//! table as a CSV attachment.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, warn};

use common::{EmailConfig, Error, Notifier, Result};
use store::{csv_store, SharedStore};

const ATTACHMENT_NAME: &str = "holdings.csv";
const SUBJECT_PREFIX: &str = "SwingBot";

pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
    store: SharedStore,
}

fn mailbox(raw: &str) -> Result<Mailbox> {
    raw.parse()
        .map_err(|e| Error::Config(format!("invalid e-mail address '{raw}': {e}")))
}

impl EmailNotifier {
    pub fn new(config: &EmailConfig, store: SharedStore) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| Error::Config(format!("SMTP relay {}: {e}", config.smtp_host)))?
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self {
            transport,
            from: mailbox(&config.from)?,
            to: mailbox(&config.to)?,
            store,
        })
    }

    /// Current table as CSV, or `None` (logged) if it cannot be read.
    async fn snapshot(&self) -> Option<Vec<u8>> {
        match self
            .store
            .read()
            .await
            .and_then(|table| csv_store::to_csv_bytes(&table))
        {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(error = %e, "Holdings snapshot unavailable; sending e-mail without attachment");
                None
            }
        }
    }

    pub fn compose(&self, message: &str, attachment: Option<Vec<u8>>) -> Result<Message> {
        compose(&self.from, &self.to, message, attachment)
    }
}

/// Subject line: the first line of the alert without Markdown emphasis.
pub fn subject_for(message: &str) -> String {
    let headline: String = message
        .lines()
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| *c != '*')
        .collect();
    format!("{SUBJECT_PREFIX}: {}", headline.trim())
}

/// Build the e-mail. The body is the alert text with Markdown emphasis removed.
pub fn compose(
    from: &Mailbox,
    to: &Mailbox,
    message: &str,
    attachment: Option<Vec<u8>>,
) -> Result<Message> {
    let body = SinglePart::plain(message.replace('*', ""));
    let builder = Message::builder()
        .from(from.clone())
        .to(to.clone())
        .subject(subject_for(message));

    let email = match attachment {
        Some(bytes) => {
            let csv = ContentType::parse("text/csv")
                .map_err(|e| Error::Notify(format!("content type: {e}")))?;
            builder.multipart(
                MultiPart::mixed()
                    .singlepart(body)
                    .singlepart(Attachment::new(ATTACHMENT_NAME.to_string()).body(bytes, csv)),
            )
        }
        None => builder.singlepart(body),
    };
    email.map_err(|e| Error::Notify(format!("e-mail build: {e}")))
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &str {
        "email"
    }

    async fn send(&self, message: &str) -> Result<()> {
        let attachment = self.snapshot().await;
        let email = self.compose(message, attachment)?;
        self.transport
            .send(email)
            .await
            .map_err(|e| Error::Notify(format!("smtp: {e}")))?;
        debug!(to = %self.to, "Alert e-mailed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use common::{Holding, HoldingsTable};
    use store::MemoryStore;

    fn boxes() -> (Mailbox, Mailbox) {
        (mailbox("bot@example.com").unwrap(), mailbox("me@example.com").unwrap())
    }

    #[test]
    fn subject_uses_headline_without_markup() {
        let subject = subject_for("🎯 *ABC* hit Target ₹112\nBuy ₹100");
        assert_eq!(subject, "SwingBot: 🎯 ABC hit Target ₹112");
    }

    #[test]
    fn attachment_is_included_when_available() {
        let (from, to) = boxes();
        let email = compose(&from, &to, "⚠️ *ABC* hit Stop Loss ₹93", Some(b"Stock\nABC\n".to_vec()))
            .unwrap();
        let raw = String::from_utf8_lossy(&email.formatted()).into_owned();
        assert!(raw.contains("holdings.csv"));
        assert!(raw.contains("text/csv"));
    }

    #[test]
    fn plain_message_without_attachment() {
        let (from, to) = boxes();
        let email = compose(&from, &to, "⚠️ Bot error: boom", None).unwrap();
        let raw = String::from_utf8_lossy(&email.formatted()).into_owned();
        assert!(!raw.contains("holdings.csv"));
    }

    #[test]
    fn bad_address_is_a_config_error() {
        assert!(matches!(mailbox("not-an-address"), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn snapshot_falls_back_to_none_when_store_fails() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let memory = std::sync::Arc::new(MemoryStore::new(HoldingsTable::new(vec![Holding::new(
            "ABC", 100.0, 110.0, 95.0, 10.0, day,
        )])));
        let config = EmailConfig {
            smtp_host: "smtp.example.com".into(),
            username: "u".into(),
            password: "p".into(),
            from: "bot@example.com".into(),
            to: "me@example.com".into(),
        };
        let notifier = EmailNotifier::new(&config, SharedStore::new(memory.clone())).unwrap();

        let bytes = notifier.snapshot().await.unwrap();
        assert!(String::from_utf8(bytes).unwrap().contains("ABC"));

        memory.set_fail_load(true);
        assert!(notifier.snapshot().await.is_none());
    }
}
