use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use teloxide::{ApiError, RequestError};
use tracing::warn;

use common::{Error, Notifier, Result};

/// Delivers alerts to the operator chat.
///
/// Messages are sent as Markdown so symbols render bold; if Telegram rejects
/// the markup (stray `_` or `*` in an error text) the message is resent as
/// plain text. Any other failure is returned as is: after a timeout the
/// first copy may already have been delivered.
#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramNotifier {
    pub fn new(bot: Bot, chat_id: i64) -> Self {
        Self {
            bot,
            chat_id: ChatId(chat_id),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, message: &str) -> Result<()> {
        let markdown = self
            .bot
            .send_message(self.chat_id, message)
            .parse_mode(ParseMode::Markdown)
            .await;
        match markdown {
            Ok(_) => Ok(()),
            Err(e) if is_markup_rejection(&e) => {
                warn!(error = %e, "Markdown alert rejected; resending as plain text");
                self.bot
                    .send_message(self.chat_id, message)
                    .await
                    .map(|_| ())
                    .map_err(notify_err)
            }
            Err(e) => Err(notify_err(e)),
        }
    }
}

/// Telegram refused the message only because of its formatting.
fn is_markup_rejection(e: &RequestError) -> bool {
    matches!(e, RequestError::Api(ApiError::CantParseEntities(_)))
}

fn notify_err(e: RequestError) -> Error {
    Error::Notify(format!("telegram: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_entity_parse_errors_allow_a_plain_resend() {
        let markup = RequestError::Api(ApiError::CantParseEntities(
            "Bad Request: can't parse entities: Can't find end of the entity".into(),
        ));
        assert!(is_markup_rejection(&markup));

        assert!(!is_markup_rejection(&RequestError::Api(ApiError::BotBlocked)));
        assert!(!is_markup_rejection(&RequestError::Api(ApiError::Unknown(
            "Bad Request: chat not found".into(),
        ))));
    }

    #[test]
    fn delivery_error_names_the_channel() {
        let err = notify_err(RequestError::Api(ApiError::BotBlocked));
        assert!(matches!(&err, Error::Notify(text) if text.starts_with("telegram: ")));
    }
}
