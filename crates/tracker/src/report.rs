//! Plain-text renderings of the holdings table shared by chat replies,
//! scheduled jobs and alerts.

use chrono::{Duration, NaiveDateTime};

use common::{round2, Holding, HoldingStatus, HoldingsTable, PortfolioSummary, TrackingState};

/// Currency or quantity rendered at two-decimal precision without trailing
/// zeros (`112`, `63.5`, `-70.25`).
pub fn amount(value: f64) -> String {
    let rounded = round2(value);
    if rounded == 0.0 {
        "0".to_string()
    } else {
        rounded.to_string()
    }
}

fn price_or_na(price: Option<f64>) -> String {
    price.map(|p| format!("₹{}", amount(p))).unwrap_or_else(|| "n/a".to_string())
}

fn status_label(status: &HoldingStatus) -> String {
    match status {
        HoldingStatus::Open => "🟢 Active".to_string(),
        HoldingStatus::TargetHit { .. } => format!("✅ {status}"),
        HoldingStatus::StopLossHit { .. } => format!("❌ {status}"),
        HoldingStatus::Exited { .. } => format!("⏹️ {status}"),
    }
}

/// One-line view of a holding.
pub fn holding_line(h: &Holding) -> String {
    format!(
        "{} | Buy ₹{} | T ₹{} | SL ₹{} | Qty {} | LTP {} | P/L ₹{} | {}",
        h.symbol,
        amount(h.entry_price),
        amount(h.target_price),
        amount(h.stop_loss_price),
        amount(h.quantity),
        price_or_na(h.last_price),
        amount(h.current_pnl()),
        status_label(&h.status),
    )
}

/// Full detail for a single holding.
pub fn holding_detail(h: &Holding) -> String {
    let probability = h
        .probability
        .map(|p| format!("{}%", amount(p)))
        .unwrap_or_else(|| "n/a".to_string());
    format!(
        "ℹ️ {}\n\
         Added: {}\n\
         Buy ₹{} | Target ₹{} | SL ₹{} | Qty {}\n\
         Last price: {}\n\
         P/L: ₹{}\n\
         Probability: {}\n\
         Status: {}",
        h.symbol,
        h.opened_on.format("%Y-%m-%d"),
        amount(h.entry_price),
        amount(h.target_price),
        amount(h.stop_loss_price),
        amount(h.quantity),
        price_or_na(h.last_price),
        amount(h.current_pnl()),
        probability,
        status_label(&h.status),
    )
}

pub fn holdings_list(table: &HoldingsTable) -> String {
    if table.holdings.is_empty() {
        return "No holdings tracked. Add one with /track.".to_string();
    }
    let mut out = format!("📋 Tracked holdings ({})", table.holdings.len());
    for h in &table.holdings {
        out.push('\n');
        out.push_str(&holding_line(h));
    }
    out
}

fn summary_block(summary: &PortfolioSummary) -> String {
    format!(
        "Active: {} | Targets: {} | Stops: {} | Exited: {}\nTotal P/L: ₹{}",
        summary.active,
        summary.targets,
        summary.stops,
        summary.exited,
        amount(summary.total_pnl)
    )
}

/// Open holdings with their P/L at the last observed price.
pub fn todays_pnl(table: &HoldingsTable) -> String {
    let open: Vec<&Holding> = table.holdings.iter().filter(|h| h.is_open()).collect();
    if open.is_empty() {
        return "No active holdings.".to_string();
    }
    let mut out = String::from("📈 Today's P/L");
    let mut total = 0.0;
    for h in open {
        let pnl = h.current_pnl();
        total += pnl;
        out.push_str(&format!("\n{}: ₹{} (LTP {})", h.symbol, amount(pnl), price_or_na(h.last_price)));
    }
    out.push_str(&format!("\nTotal: ₹{}", amount(total)));
    out
}

/// Health snapshot: tracking state, one line per holding, counts and total.
pub fn health_report(table: &HoldingsTable, state: TrackingState, now: NaiveDateTime) -> String {
    let summary = PortfolioSummary::from_holdings(&table.holdings);
    let mut out = format!(
        "🩺 Status @ {}\nTracking: {state}",
        now.format("%Y-%m-%d %H:%M:%S")
    );
    for h in &table.holdings {
        out.push('\n');
        out.push_str(&holding_line(h));
    }
    out.push('\n');
    out.push_str(&summary_block(&summary));
    out
}

pub fn morning_greeting(table: &HoldingsTable) -> String {
    format!(
        "🌞 Good morning! Tracking {} active stocks today.",
        table.open_count()
    )
}

pub fn daily_summary(table: &HoldingsTable) -> String {
    let summary = PortfolioSummary::from_holdings(&table.holdings);
    format!("🌇 Market closed. Daily summary\n{}", summary_block(&summary))
}

/// Summary plus every crossing recorded in the seven days up to `now`.
pub fn weekly_summary(table: &HoldingsTable, now: NaiveDateTime) -> String {
    let since = now - Duration::days(7);
    let summary = PortfolioSummary::from_holdings(&table.holdings);

    let mut out = format!(
        "📊 Weekly summary ({} to {})",
        since.format("%Y-%m-%d"),
        now.format("%Y-%m-%d")
    );
    let recent: Vec<&Holding> = table
        .holdings
        .iter()
        .filter(|h| h.status.crossed_at().is_some_and(|at| at > since && at <= now))
        .collect();
    if recent.is_empty() {
        out.push_str("\nNo holdings closed this week.");
    }
    for h in recent {
        out.push_str(&format!(
            "\n{} {}: P/L ₹{}",
            status_label(&h.status),
            h.symbol,
            amount(h.current_pnl())
        ));
    }
    out.push('\n');
    out.push_str(&summary_block(&summary));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn table() -> HoldingsTable {
        let mut open = Holding::new("ABC", 100.0, 110.0, 95.0, 10.0, day(2));
        open.observe(105.0);
        let mut hit = Holding::new("XYZ", 50.0, 60.0, 45.0, 4.0, day(2));
        hit.observe(61.0);
        hit.status = HoldingStatus::TargetHit {
            at: day(4).and_hms_opt(11, 0, 0).unwrap(),
        };
        let mut old = Holding::new("OLD", 10.0, 12.0, 9.0, 1.0, day(1));
        old.observe(8.5);
        old.status = HoldingStatus::StopLossHit {
            at: NaiveDate::from_ymd_opt(2023, 12, 1)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
        };
        HoldingsTable::new(vec![open, hit, old])
    }

    #[test]
    fn amount_trims_trailing_zeros() {
        assert_eq!(amount(112.0), "112");
        assert_eq!(amount(63.456), "63.46");
        assert_eq!(amount(-0.001), "0");
    }

    #[test]
    fn unpriced_holding_shows_na() {
        let h = Holding::new("NEW", 100.0, 110.0, 95.0, 1.0, day(2));
        assert!(holding_line(&h).contains("LTP n/a"));
    }

    #[test]
    fn todays_pnl_only_counts_open_holdings() {
        let text = todays_pnl(&table());
        assert!(text.contains("ABC: ₹50"));
        assert!(!text.contains("XYZ"));
        assert!(text.ends_with("Total: ₹50"));
    }

    #[test]
    fn health_report_counts_statuses() {
        let now = day(5).and_hms_opt(12, 0, 0).unwrap();
        let text = health_report(&table(), TrackingState::Paused, now);
        assert!(text.contains("Tracking: paused"));
        assert!(text.contains("Active: 1 | Targets: 1 | Stops: 1"));
        // 50 + 44 - 1.5
        assert!(text.ends_with("Total P/L: ₹92.5"));
    }

    #[test]
    fn weekly_summary_lists_recent_crossings_only() {
        let now = day(6).and_hms_opt(16, 0, 0).unwrap();
        let text = weekly_summary(&table(), now);
        assert!(text.contains("XYZ"));
        assert!(!text.contains("OLD"));
    }

    #[test]
    fn empty_list_hints_at_track() {
        assert!(holdings_list(&HoldingsTable::default()).contains("/track"));
    }
}
