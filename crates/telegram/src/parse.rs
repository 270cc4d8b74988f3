//! Argument parsing for the commands that take parameters.

use common::{canonical_symbol, Error, Result};
use store::NewHolding;

pub const TRACK_USAGE: &str =
    "Usage: /track SYMBOL BUY TARGET SL QTY\nExample: /track INFY 1500 1650 1420 10";
pub const UPDATE_USAGE: &str =
    "Usage: /update SYMBOL TARGET SL [QTY]\nExample: /update INFY 1700 1480";
pub const REMOVE_USAGE: &str = "Usage: /remove SYMBOL";
pub const INFO_USAGE: &str = "Usage: /info SYMBOL";

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateArgs {
    pub symbol: String,
    pub target_price: f64,
    pub stop_loss_price: f64,
    pub quantity: Option<f64>,
}

fn usage(text: &str) -> Error {
    Error::InvalidInput(text.to_string())
}

/// Accepts `1500`, `1,500.50` and `₹1500`.
fn number(raw: &str, usage_text: &str) -> Result<f64> {
    let cleaned: String = raw
        .trim_start_matches('₹')
        .chars()
        .filter(|c| *c != ',')
        .collect();
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(usage(usage_text)),
    }
}

fn symbol(raw: &str, usage_text: &str) -> Result<String> {
    let symbol = canonical_symbol(raw);
    if symbol.is_empty() || symbol.starts_with('/') {
        return Err(usage(usage_text));
    }
    Ok(symbol)
}

pub fn track(args: &str) -> Result<NewHolding> {
    let parts: Vec<&str> = args.split_whitespace().collect();
    let [sym, buy, target, stop, qty] = parts.as_slice() else {
        return Err(usage(TRACK_USAGE));
    };
    Ok(NewHolding {
        symbol: symbol(sym, TRACK_USAGE)?,
        entry_price: number(buy, TRACK_USAGE)?,
        target_price: number(target, TRACK_USAGE)?,
        stop_loss_price: number(stop, TRACK_USAGE)?,
        quantity: number(qty, TRACK_USAGE)?,
    })
}

pub fn update(args: &str) -> Result<UpdateArgs> {
    let parts: Vec<&str> = args.split_whitespace().collect();
    let (sym, target, stop, qty) = match parts.as_slice() {
        [sym, target, stop] => (sym, target, stop, None),
        [sym, target, stop, qty] => (sym, target, stop, Some(qty)),
        _ => return Err(usage(UPDATE_USAGE)),
    };
    Ok(UpdateArgs {
        symbol: symbol(sym, UPDATE_USAGE)?,
        target_price: number(target, UPDATE_USAGE)?,
        stop_loss_price: number(stop, UPDATE_USAGE)?,
        quantity: qty.map(|q| number(q, UPDATE_USAGE)).transpose()?,
    })
}

/// Exactly one symbol argument.
pub fn single_symbol(args: &str, usage_text: &str) -> Result<String> {
    let parts: Vec<&str> = args.split_whitespace().collect();
    match parts.as_slice() {
        [sym] => symbol(sym, usage_text),
        _ => Err(usage(usage_text)),
    }
}
