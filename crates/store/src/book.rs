//! Operator-driven edits to the holdings table.
//!
//! Each function mutates a loaded table in place and is meant to run inside
//! [`crate::SharedStore::update`]; an `Err` leaves the stored table untouched.

use chrono::NaiveDate;

use common::{canonical_symbol, Error, Holding, HoldingsTable, Result};

use crate::RESERVED_SYMBOL;

/// Arguments of an add request, as typed by the operator.
#[derive(Debug, Clone, PartialEq)]
pub struct NewHolding {
    pub symbol: String,
    pub entry_price: f64,
    pub target_price: f64,
    pub stop_loss_price: f64,
    pub quantity: f64,
}

/// Reject non-positive values and thresholds on the wrong side of the entry.
pub fn validate_thresholds(entry: f64, target: f64, stop: f64, quantity: f64) -> Result<()> {
    let fields = [
        ("buy", entry),
        ("target", target),
        ("stop-loss", stop),
        ("quantity", quantity),
    ];
    for (name, value) in fields {
        if !value.is_finite() || value <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "{name} must be a positive number, got {value}"
            )));
        }
    }
    if stop >= entry {
        return Err(Error::InvalidInput(format!(
            "stop-loss {stop} must be below the buy price {entry}"
        )));
    }
    if target <= entry {
        return Err(Error::InvalidInput(format!(
            "target {target} must be above the buy price {entry}"
        )));
    }
    Ok(())
}

fn checked_symbol(raw: &str) -> Result<String> {
    let symbol = canonical_symbol(raw);
    if symbol.is_empty() {
        return Err(Error::InvalidInput("symbol must not be empty".into()));
    }
    if symbol == RESERVED_SYMBOL {
        return Err(Error::InvalidInput(format!("'{RESERVED_SYMBOL}' is a reserved name")));
    }
    Ok(symbol)
}

fn not_tracked(symbol: &str) -> Error {
    Error::InvalidInput(format!("{symbol} is not being tracked"))
}

/// Add a new open holding. Symbols are unique within the table.
pub fn add(table: &mut HoldingsTable, new: NewHolding, today: NaiveDate) -> Result<Holding> {
    let symbol = checked_symbol(&new.symbol)?;
    validate_thresholds(new.entry_price, new.target_price, new.stop_loss_price, new.quantity)?;
    if table.find(&symbol).is_some() {
        return Err(Error::InvalidInput(format!(
            "{symbol} is already tracked; use /update or /remove first"
        )));
    }

    let holding = Holding::new(
        symbol,
        new.entry_price,
        new.target_price,
        new.stop_loss_price,
        new.quantity,
        today,
    );
    table.holdings.push(holding.clone());
    Ok(holding)
}

/// Change target, stop-loss and optionally quantity of the first holding
/// with this symbol. Status is left as it is.
pub fn update(
    table: &mut HoldingsTable,
    symbol: &str,
    target: f64,
    stop: f64,
    quantity: Option<f64>,
) -> Result<Holding> {
    let symbol = canonical_symbol(symbol);
    let holding = table.find_mut(&symbol).ok_or_else(|| not_tracked(&symbol))?;
    let quantity = quantity.unwrap_or(holding.quantity);
    validate_thresholds(holding.entry_price, target, stop, quantity)?;

    holding.target_price = target;
    holding.stop_loss_price = stop;
    holding.quantity = quantity;
    if let Some(price) = holding.last_price {
        holding.profit_and_loss = Some(holding.pnl_at(price));
    }
    Ok(holding.clone())
}

/// Remove every row with this symbol. Returns how many were removed.
pub fn remove(table: &mut HoldingsTable, symbol: &str) -> Result<usize> {
    let symbol = canonical_symbol(symbol);
    let before = table.holdings.len();
    table.holdings.retain(|h| h.symbol != symbol);
    match before - table.holdings.len() {
        0 => Err(not_tracked(&symbol)),
        n => Ok(n),
    }
}

/// Look up the first holding with this symbol.
pub fn get<'a>(table: &'a HoldingsTable, symbol: &str) -> Result<&'a Holding> {
    let symbol = canonical_symbol(symbol);
    table.find(&symbol).ok_or_else(|| not_tracked(&symbol))
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::HoldingStatus;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn abc() -> NewHolding {
        NewHolding {
            symbol: "abc.ns".into(),
            entry_price: 100.0,
            target_price: 110.0,
            stop_loss_price: 95.0,
            quantity: 10.0,
        }
    }

    #[test]
    fn add_canonicalises_and_starts_open() {
        let mut table = HoldingsTable::default();
        let h = add(&mut table, abc(), today()).unwrap();

        assert_eq!(h.symbol, "ABC");
        assert_eq!(h.status, HoldingStatus::Open);
        assert_eq!(h.last_price, None);
        assert_eq!(h.profit_and_loss, None);
        assert_eq!(table.holdings.len(), 1);
    }

    #[test]
    fn add_rejects_duplicates_and_bad_thresholds() {
        let mut table = HoldingsTable::default();
        add(&mut table, abc(), today()).unwrap();
        assert!(add(&mut table, abc(), today()).is_err());

        let inverted = NewHolding {
            symbol: "XYZ".into(),
            target_price: 90.0,
            ..abc()
        };
        let err = add(&mut table, inverted, today()).unwrap_err();
        assert!(err.to_string().contains("target"), "{err}");

        let reserved = NewHolding {
            symbol: "total".into(),
            ..abc()
        };
        assert!(add(&mut table, reserved, today()).is_err());
        assert_eq!(table.holdings.len(), 1);
    }

    #[test]
    fn update_validates_against_entry_and_refreshes_pnl() {
        let mut table = HoldingsTable::default();
        add(&mut table, abc(), today()).unwrap();
        table.holdings[0].observe(104.0);

        assert!(update(&mut table, "ABC", 120.0, 101.0, None).is_err());

        let h = update(&mut table, "abc", 120.0, 90.0, Some(20.0)).unwrap();
        assert_eq!((h.target_price, h.stop_loss_price, h.quantity), (120.0, 90.0, 20.0));
        assert_eq!(h.profit_and_loss, Some(80.0));
    }

    #[test]
    fn remove_drops_all_matching_rows() {
        let mut table = HoldingsTable::default();
        add(&mut table, abc(), today()).unwrap();
        let duplicate = table.holdings[0].clone();
        table.holdings.push(duplicate);

        assert_eq!(remove(&mut table, "ABC").unwrap(), 2);
        assert!(remove(&mut table, "ABC").is_err());
    }

    #[test]
    fn get_unknown_symbol_is_descriptive() {
        let table = HoldingsTable::default();
        let err = get(&table, "nope").unwrap_err();
        assert_eq!(err.to_string(), "NOPE is not being tracked");
    }
}
