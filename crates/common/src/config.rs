use std::path::PathBuf;
use std::time::Duration;

use chrono::{Datelike, NaiveDateTime, NaiveTime, Weekday};

use crate::{Error, Result};

/// Minimum spacing between tracking ticks.
pub const MIN_TICK_INTERVAL: Duration = Duration::from_secs(60);

/// All configuration loaded from environment variables at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // Telegram
    pub telegram_token: String,
    /// The single recipient of alerts and scheduled messages.
    pub telegram_chat_id: i64,
    pub telegram_allowed_user_ids: Vec<i64>,

    // Storage
    pub holdings_file: PathBuf,
    pub backup_dir: PathBuf,
    pub model_file: PathBuf,

    // Tracking
    pub trading_window: TradingWindow,
    pub tick_interval: Duration,
    pub call_timeout: Duration,
    pub quote_suffix: String,

    // Optional secondary channel
    pub email: Option<EmailConfig>,

    // Dashboard (disabled without a token)
    pub dashboard_token: Option<String>,
    pub dashboard_port: u16,
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub username: String,
    pub password: String,
    pub from: String,
    pub to: String,
}

/// Local-time window during which ticks are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradingWindow {
    pub open: NaiveTime,
    pub close: NaiveTime,
    pub skip_weekends: bool,
}

impl Default for TradingWindow {
    fn default() -> Self {
        Self {
            open: NaiveTime::from_hms_opt(9, 15, 0).unwrap_or_default(),
            close: NaiveTime::from_hms_opt(15, 30, 0).unwrap_or_default(),
            skip_weekends: true,
        }
    }
}

impl TradingWindow {
    /// True when `now` falls inside the window (both bounds inclusive).
    pub fn contains(&self, now: NaiveDateTime) -> bool {
        if self.skip_weekends && matches!(now.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }
        let t = now.time();
        self.open <= t && t <= self.close
    }
}

impl Config {
    /// Load configuration from the process environment.
    /// Loads `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key).filter(|v| !v.trim().is_empty()).ok_or_else(|| {
                Error::Config(format!(
                    "Required environment variable '{key}' is not set. Check your .env file."
                ))
            })
        };

        let telegram_chat_id = parse_i64("TELEGRAM_CHAT_ID", &required("TELEGRAM_CHAT_ID")?)?;

        let telegram_allowed_user_ids = match lookup("TELEGRAM_ALLOWED_USER_IDS") {
            Some(raw) if !raw.trim().is_empty() => raw
                .split(',')
                .map(|s| parse_i64("TELEGRAM_ALLOWED_USER_IDS", s))
                .collect::<Result<Vec<_>>>()?,
            _ => vec![telegram_chat_id],
        };

        let defaults = TradingWindow::default();
        let trading_window = TradingWindow {
            open: match lookup("MARKET_OPEN") {
                Some(v) => parse_time("MARKET_OPEN", &v)?,
                None => defaults.open,
            },
            close: match lookup("MARKET_CLOSE") {
                Some(v) => parse_time("MARKET_CLOSE", &v)?,
                None => defaults.close,
            },
            skip_weekends: match lookup("SKIP_WEEKENDS") {
                Some(v) => parse_bool("SKIP_WEEKENDS", &v)?,
                None => defaults.skip_weekends,
            },
        };
        if trading_window.open >= trading_window.close {
            return Err(Error::Config(format!(
                "MARKET_OPEN ({}) must be earlier than MARKET_CLOSE ({})",
                trading_window.open, trading_window.close
            )));
        }

        let tick_secs = optional_u64(&lookup, "TICK_INTERVAL_SECS")?.unwrap_or(60);
        let call_timeout_secs = optional_u64(&lookup, "CALL_TIMEOUT_SECS")?.unwrap_or(10);

        let email = match (
            lookup("SMTP_HOST"),
            lookup("SMTP_USERNAME"),
            lookup("SMTP_PASSWORD"),
            lookup("EMAIL_FROM"),
            lookup("EMAIL_TO"),
        ) {
            (Some(smtp_host), Some(username), Some(password), Some(from), Some(to)) => {
                Some(EmailConfig {
                    smtp_host,
                    username,
                    password,
                    from,
                    to,
                })
            }
            _ => None,
        };

        Ok(Config {
            telegram_token: required("TELEGRAM_TOKEN")?,
            telegram_chat_id,
            telegram_allowed_user_ids,
            holdings_file: lookup("HOLDINGS_FILE")
                .unwrap_or_else(|| "swing_holdings.csv".to_string())
                .into(),
            backup_dir: lookup("BACKUP_DIR")
                .unwrap_or_else(|| "backups".to_string())
                .into(),
            model_file: lookup("MODEL_FILE")
                .unwrap_or_else(|| "ai_model.json".to_string())
                .into(),
            trading_window,
            tick_interval: Duration::from_secs(tick_secs).max(MIN_TICK_INTERVAL),
            call_timeout: Duration::from_secs(call_timeout_secs.max(1)),
            quote_suffix: lookup("QUOTE_SUFFIX").unwrap_or_else(|| ".NS".to_string()),
            email,
            dashboard_token: lookup("DASHBOARD_TOKEN").filter(|t| !t.is_empty()),
            dashboard_port: optional_u64(&lookup, "DASHBOARD_PORT")?
                .map(|p| {
                    u16::try_from(p)
                        .map_err(|_| Error::Config(format!("DASHBOARD_PORT out of range: {p}")))
                })
                .transpose()?
                .unwrap_or(8080),
        })
    }
}

fn parse_i64(key: &str, raw: &str) -> Result<i64> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| Error::Config(format!("{key} contains non-numeric ID: '{}'", raw.trim())))
}

fn parse_time(key: &str, raw: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|e| Error::Config(format!("{key} must be HH:MM, got '{raw}': {e}")))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(Error::Config(format!("{key} must be true or false, got '{other}'"))),
    }
}

fn optional_u64<F>(lookup: &F, key: &str) -> Result<Option<u64>>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| {
            v.trim()
                .parse::<u64>()
                .map_err(|_| Error::Config(format!("{key} must be a whole number, got '{v}'")))
        })
        .transpose()
}
