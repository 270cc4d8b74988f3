use std::sync::Arc;

use anyhow::Context;
use teloxide::Bot;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use common::{Config, Notifier, PriceSource, ProbabilityScorer, SignalSource};
use mailer::EmailNotifier;
use market::{ChartClient, FallbackPriceSource, NseClient};
use scorer::ModelScorer;
use store::{CsvHoldingsStore, SharedStore};
use telegram_ctrl::{start_bot, BotDeps, TelegramNotifier};
use tracker::{AlertDispatcher, JobRunner, TrackingEngine};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env().context("loading configuration")?;
    info!(
        holdings = %cfg.holdings_file.display(),
        tick = ?cfg.tick_interval,
        "SwingBot starting"
    );

    // ── Holdings store ────────────────────────────────────────────────────────
    let csv = CsvHoldingsStore::open(&cfg.holdings_file)
        .with_context(|| format!("opening {}", cfg.holdings_file.display()))?;
    let store = SharedStore::new(csv);
    let table = store.read().await.context("reading holdings")?;
    info!(rows = table.holdings.len(), active = table.open_count(), "Holdings loaded");

    // ── Market data ───────────────────────────────────────────────────────────
    let chart = Arc::new(ChartClient::new(cfg.call_timeout, cfg.quote_suffix.clone())?);
    let nse = Arc::new(NseClient::new(cfg.call_timeout)?);
    // Each source gets the full per-call limit; the engine bounds the price
    // lookup by the sum of both.
    let prices: Arc<dyn PriceSource> =
        Arc::new(FallbackPriceSource::new(nse, chart.clone(), cfg.call_timeout));
    let signals: Arc<dyn SignalSource> = chart;

    // ── Probability model ─────────────────────────────────────────────────────
    let scorer: Arc<dyn ProbabilityScorer> = Arc::new(ModelScorer::load(&cfg.model_file));

    // ── Alert channels ────────────────────────────────────────────────────────
    let bot = Bot::new(cfg.telegram_token.clone());
    let mut notifiers: Vec<Arc<dyn Notifier>> =
        vec![Arc::new(TelegramNotifier::new(bot.clone(), cfg.telegram_chat_id))];
    match &cfg.email {
        Some(email) => {
            notifiers.push(Arc::new(EmailNotifier::new(email, store.clone())?));
            info!(to = %email.to, "E-mail alerts enabled");
        }
        None => info!("E-mail alerts disabled"),
    }
    let alerts = AlertDispatcher::new(notifiers);
    info!(channels = alerts.len(), "Alert channels ready");

    // ── Tracking engine ───────────────────────────────────────────────────────
    let (engine, tracker) = TrackingEngine::new(
        store.clone(),
        prices,
        signals,
        scorer,
        cfg.trading_window,
        cfg.call_timeout,
    );

    // ── Scheduled jobs ────────────────────────────────────────────────────────
    let jobs = JobRunner::new(store.clone(), cfg.backup_dir.clone(), alerts.clone());

    // ── Telegram C2 ───────────────────────────────────────────────────────────
    let bot_deps = BotDeps {
        store: store.clone(),
        tracker: tracker.clone(),
        allowed_user_ids: Arc::new(cfg.telegram_allowed_user_ids.clone()),
    };

    // ── Spawn all tasks ───────────────────────────────────────────────────────
    tokio::spawn(engine.run(cfg.tick_interval, alerts.clone()));
    tokio::spawn(jobs.run());
    tokio::spawn(start_bot(bot, bot_deps));

    match cfg.dashboard_token.clone() {
        Some(token) => {
            let api_state = api::AppState {
                store: store.clone(),
                tracker,
                dashboard_token: token,
            };
            let port = cfg.dashboard_port;
            tokio::spawn(async move {
                if let Err(e) = api::serve(api_state, port).await {
                    error!(error = %e, "Dashboard API stopped");
                }
            });
        }
        None => warn!("DASHBOARD_TOKEN not set; dashboard API disabled"),
    }

    alerts
        .dispatch(&format!(
            "🤖 SwingBot started. Tracking {} active holdings.",
            table.open_count()
        ))
        .await;

    // Keep main alive
    info!("All subsystems started. Waiting for shutdown signal.");
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting.");
    Ok(())
}
