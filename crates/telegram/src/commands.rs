use std::sync::Arc;

use chrono::Local;
use teloxide::{dispatching::UpdateHandler, prelude::*, utils::command::BotCommands};
use tracing::{info, warn};

use common::{Result as CoreResult, TrackingState};
use store::{book, SharedStore};
use tracker::{report, TrackerHandle};

use crate::parse;

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Dependencies injected into every handler via `dptree`.
#[derive(Clone)]
pub struct BotDeps {
    pub store: SharedStore,
    pub tracker: TrackerHandle,
    pub allowed_user_ids: Arc<Vec<i64>>,
}

/// Telegram bot commands exposed to the operator.
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "SwingBot commands:")]
pub enum Command {
    #[command(description = "Show this help")]
    Start,
    #[command(description = "Show this help")]
    Help,
    #[command(description = "Resume tracking")]
    Go,
    #[command(description = "Pause tracking")]
    Pause,
    #[command(description = "Show tracking state")]
    Check,
    #[command(description = "SYMBOL BUY TARGET SL QTY: start tracking a holding")]
    Track(String),
    #[command(description = "SYMBOL TARGET SL [QTY]: change thresholds")]
    Update(String),
    #[command(description = "SYMBOL: stop tracking a holding")]
    Remove(String),
    #[command(description = "SYMBOL: show one holding")]
    Info(String),
    #[command(description = "List all holdings")]
    List,
    #[command(description = "P/L of active holdings")]
    Today,
    #[command(description = "Full health snapshot")]
    Statusfull,
    #[command(description = "Alias for /statusfull")]
    Sf,
}

/// Start the Telegram bot in long-polling mode.
pub async fn start_bot(bot: Bot, deps: BotDeps) {
    let deps = Arc::new(deps);

    info!("Telegram bot starting (long-polling)");

    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![deps])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

fn schema() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync>> {
    use dptree::case;

    let command_handler = teloxide::filter_command::<Command, _>()
        .branch(case![Command::Start].endpoint(handle_help))
        .branch(case![Command::Help].endpoint(handle_help))
        .branch(case![Command::Go].endpoint(handle_go))
        .branch(case![Command::Pause].endpoint(handle_pause))
        .branch(case![Command::Check].endpoint(handle_check))
        .branch(case![Command::Track(args)].endpoint(handle_track))
        .branch(case![Command::Update(args)].endpoint(handle_update))
        .branch(case![Command::Remove(args)].endpoint(handle_remove))
        .branch(case![Command::Info(args)].endpoint(handle_info))
        .branch(case![Command::List].endpoint(handle_list))
        .branch(case![Command::Today].endpoint(handle_today))
        .branch(case![Command::Statusfull].endpoint(handle_status_full))
        .branch(case![Command::Sf].endpoint(handle_status_full));

    Update::filter_message()
        .filter_map(|msg: Message| msg.from().map(|u| u.id))
        .filter_async(auth_filter)
        .branch(command_handler)
}

/// Silently drop messages from users not in the allowed list.
async fn auth_filter(user_id: UserId, deps: Arc<BotDeps>) -> bool {
    let uid = user_id.0 as i64;
    let allowed = deps.allowed_user_ids.contains(&uid);
    if !allowed {
        warn!(user_id = uid, "Unauthorized Telegram access attempt");
    }
    allowed
}

/// Reply text for a fallible command: the rendered success or the error.
fn reply<T>(result: CoreResult<T>, render: impl FnOnce(T) -> String) -> String {
    match result {
        Ok(value) => render(value),
        Err(e) => format!("❌ {e}"),
    }
}

async fn handle_help(bot: Bot, msg: Message) -> HandlerResult {
    let text = format!(
        "👋 Swing position tracker.\n\n{}",
        Command::descriptions()
    );
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

async fn handle_go(bot: Bot, msg: Message, deps: Arc<BotDeps>) -> HandlerResult {
    let text = if deps.tracker.resume().await {
        "▶️ Tracking resumed."
    } else {
        "Tracking is already active."
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

async fn handle_pause(bot: Bot, msg: Message, deps: Arc<BotDeps>) -> HandlerResult {
    let text = if deps.tracker.pause().await {
        "⏸️ Tracking paused. Send /go to resume."
    } else {
        "Tracking is already paused."
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

async fn handle_check(bot: Bot, msg: Message, deps: Arc<BotDeps>) -> HandlerResult {
    let state = deps.tracker.state().await;
    let icon = match state {
        TrackingState::Active => "🟢",
        TrackingState::Paused => "⏸️",
    };
    let text = match deps.store.read().await {
        Ok(table) => format!(
            "{icon} Tracking is {state}. {} active holdings.",
            table.open_count()
        ),
        Err(e) => format!("{icon} Tracking is {state}. Holdings unavailable: {e}"),
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

async fn handle_track(bot: Bot, msg: Message, args: String, deps: Arc<BotDeps>) -> HandlerResult {
    let text = match parse::track(&args) {
        Ok(new) => {
            let today = Local::now().date_naive();
            let result = deps.store.update(|t| book::add(t, new, today)).await;
            if let Ok(h) = &result {
                info!(symbol = %h.symbol, entry = h.entry_price, "Holding added");
            }
            reply(result, |h| {
                format!("✅ Now tracking\n{}", report::holding_line(&h))
            })
        }
        Err(usage) => usage.to_string(),
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

async fn handle_update(bot: Bot, msg: Message, args: String, deps: Arc<BotDeps>) -> HandlerResult {
    let text = match parse::update(&args) {
        Ok(a) => {
            let result = deps
                .store
                .update(|t| book::update(t, &a.symbol, a.target_price, a.stop_loss_price, a.quantity))
                .await;
            if let Ok(h) = &result {
                info!(symbol = %h.symbol, target = h.target_price, stop = h.stop_loss_price, "Holding updated");
            }
            reply(result, |h| format!("✏️ Updated\n{}", report::holding_line(&h)))
        }
        Err(usage) => usage.to_string(),
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

async fn handle_remove(bot: Bot, msg: Message, args: String, deps: Arc<BotDeps>) -> HandlerResult {
    let text = match parse::single_symbol(&args, parse::REMOVE_USAGE) {
        Ok(symbol) => {
            let result = deps.store.update(|t| book::remove(t, &symbol)).await;
            if let Ok(n) = &result {
                info!(symbol = %symbol, rows = *n, "Holding removed");
            }
            reply(result, |_| format!("🗑️ {symbol} removed."))
        }
        Err(usage) => usage.to_string(),
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

async fn handle_info(bot: Bot, msg: Message, args: String, deps: Arc<BotDeps>) -> HandlerResult {
    let text = match parse::single_symbol(&args, parse::INFO_USAGE) {
        Ok(symbol) => reply(deps.store.read().await, |table| {
            reply(book::get(&table, &symbol).map(report::holding_detail), |s| s)
        }),
        Err(usage) => usage.to_string(),
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

async fn handle_list(bot: Bot, msg: Message, deps: Arc<BotDeps>) -> HandlerResult {
    let text = reply(deps.store.read().await, |t| report::holdings_list(&t));
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

async fn handle_today(bot: Bot, msg: Message, deps: Arc<BotDeps>) -> HandlerResult {
    let text = reply(deps.store.read().await, |t| report::todays_pnl(&t));
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

async fn handle_status_full(bot: Bot, msg: Message, deps: Arc<BotDeps>) -> HandlerResult {
    let state = deps.tracker.state().await;
    let now = Local::now().naive_local();
    let text = reply(deps.store.read().await, |t| report::health_report(&t, state, now));
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}
