use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use tracing::{debug, info};

use common::{canonical_symbol, Error, Holding, HoldingStatus, HoldingsStore, HoldingsTable, Result};

/// Column headers, in the order they are written.
pub const COLUMNS: [&str; 10] = [
    "Stock", "Buy", "Target", "SL", "Qty", "Date", "Status", "LastPrice", "Prob", "P/L",
];

/// Legacy aggregate-row marker in the `Stock` column.
pub const RESERVED_SYMBOL: &str = "TOTAL";

const DATE_FORMAT: &str = "%Y-%m-%d";
/// Day-first layouts a spreadsheet export may use for the Date column.
const EXPORT_DATE_FORMATS: [&str; 2] = ["%d-%m-%Y", "%d/%m/%Y"];
const STAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Holdings table persisted as a CSV file.
///
/// Saves go to a sibling temp file which is then renamed over the target, so
/// a failed write never leaves a truncated table behind.
pub struct CsvHoldingsStore {
    path: PathBuf,
}

impl CsvHoldingsStore {
    /// Point at `path` without touching the filesystem.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Point at `path`, creating an empty table (header row only) if the
    /// file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::new(path);
        if !store.path.exists() {
            if let Some(parent) = store.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            store.save(&HoldingsTable::default())?;
            info!(path = %store.path.display(), "Created empty holdings table");
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl HoldingsStore for CsvHoldingsStore {
    fn load(&self) -> Result<HoldingsTable> {
        let file = File::open(&self.path).map_err(|e| {
            Error::Store(format!("cannot open '{}': {e}", self.path.display()))
        })?;
        read_table(file)
    }

    fn save(&self, table: &HoldingsTable) -> Result<()> {
        let tmp = self.temp_path();
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            write_table(&mut writer, table)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp, &self.path).map_err(|e| {
            Error::Store(format!("cannot replace '{}': {e}", self.path.display()))
        })?;
        debug!(path = %self.path.display(), rows = table.holdings.len(), "Holdings table saved");
        Ok(())
    }
}

/// Render a table as CSV bytes (used for backups and e-mail attachments).
pub fn to_csv_bytes(table: &HoldingsTable) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write_table(&mut buf, table)?;
    Ok(buf)
}

fn csv_err(e: csv::Error) -> Error {
    Error::Store(e.to_string())
}

/// Parse a CSV table. Columns are located by header name; missing optional
/// columns read as empty.
pub fn read_table<R: Read>(reader: R) -> Result<HoldingsTable> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let index: HashMap<String, usize> = rdr
        .headers()
        .map_err(csv_err)?
        .iter()
        .enumerate()
        .map(|(i, h)| (h.trim_start_matches('\u{feff}').to_string(), i))
        .collect();

    let mut table = HoldingsTable::default();
    for (n, record) in rdr.records().enumerate() {
        let record = record.map_err(csv_err)?;
        // Header is line 1.
        let line = n + 2;
        let cell = |col: &str| {
            index
                .get(col)
                .and_then(|&i| record.get(i))
                .filter(|v| !v.is_empty())
        };

        // Hand-edited rows may carry lowercase tickers or an exchange suffix.
        let symbol = cell("Stock").map(canonical_symbol).unwrap_or_default();
        if symbol.is_empty() {
            continue; // blank spacer row
        }
        if symbol == RESERVED_SYMBOL {
            table
                .reserved_rows
                .push(COLUMNS.iter().map(|c| cell(*c).unwrap_or("").to_string()).collect());
            continue;
        }

        table.holdings.push(parse_holding(line, &symbol, &cell)?);
    }
    Ok(table)
}

fn parse_holding<'a>(
    line: usize,
    symbol: &str,
    cell: &dyn Fn(&str) -> Option<&'a str>,
) -> Result<Holding> {
    let required = |col: &str| -> Result<f64> {
        let raw = cell(col)
            .ok_or_else(|| Error::Store(format!("row {line} ({symbol}): missing {col}")))?;
        parse_number(raw)
            .ok_or_else(|| Error::Store(format!("row {line} ({symbol}): bad {col} '{raw}'")))
    };
    let optional = |col: &str| -> Result<Option<f64>> {
        match cell(col) {
            None => Ok(None),
            Some(raw) => parse_number(raw).map(Some).ok_or_else(|| {
                Error::Store(format!("row {line} ({symbol}): bad {col} '{raw}'"))
            }),
        }
    };

    let date_raw = cell("Date")
        .ok_or_else(|| Error::Store(format!("row {line} ({symbol}): missing Date")))?;
    let opened_on = parse_date(date_raw)
        .ok_or_else(|| Error::Store(format!("row {line} ({symbol}): bad Date '{date_raw}'")))?;

    let status_raw = cell("Status").unwrap_or("");
    let status = parse_status(status_raw, opened_on).ok_or_else(|| {
        Error::Store(format!("row {line} ({symbol}): unrecognised Status '{status_raw}'"))
    })?;

    Ok(Holding {
        symbol: symbol.to_string(),
        entry_price: required("Buy")?,
        target_price: required("Target")?,
        stop_loss_price: required("SL")?,
        quantity: required("Qty")?,
        opened_on,
        status,
        last_price: optional("LastPrice")?,
        probability: optional("Prob")?,
        profit_and_loss: optional("P/L")?,
    })
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Accepts `2024-01-02` as well as spreadsheet exports with a time part or
/// a day-first date.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let head = raw.get(..10).unwrap_or(raw);
    std::iter::once(DATE_FORMAT)
        .chain(EXPORT_DATE_FORMATS)
        .find_map(|format| NaiveDate::parse_from_str(head, format).ok())
}

/// Decode the Status column. Keywords are matched case-insensitively; a
/// terminal status without a readable timestamp is stamped at midnight of
/// the open date. Any `exit` wording marks a row closed by hand.
pub fn parse_status(raw: &str, opened_on: NaiveDate) -> Option<HoldingStatus> {
    let lower = raw.trim().to_lowercase();
    let at = || {
        raw.split_once('@')
            .and_then(|(_, ts)| NaiveDateTime::parse_from_str(ts.trim(), STAMP_FORMAT).ok())
            .unwrap_or_else(|| opened_on.and_time(NaiveTime::MIN))
    };

    if lower.contains("target") {
        Some(HoldingStatus::TargetHit { at: at() })
    } else if lower.contains("sl") || lower.contains("stop") {
        Some(HoldingStatus::StopLossHit { at: at() })
    } else if lower.contains("exit") {
        Some(HoldingStatus::Exited { at: at() })
    } else if lower.is_empty() || lower.contains("active") || lower == "open" {
        Some(HoldingStatus::Open)
    } else {
        None
    }
}

fn status_cell(status: &HoldingStatus) -> String {
    match status {
        HoldingStatus::Open => "Active".to_string(),
        HoldingStatus::TargetHit { at } => format!("✅ Target @ {}", at.format(STAMP_FORMAT)),
        HoldingStatus::StopLossHit { at } => format!("❌ SL @ {}", at.format(STAMP_FORMAT)),
        HoldingStatus::Exited { at } => format!("⏹️ Exit @ {}", at.format(STAMP_FORMAT)),
    }
}

fn opt(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

pub fn write_table<W: Write>(writer: W, table: &HoldingsTable) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(COLUMNS).map_err(csv_err)?;

    for h in &table.holdings {
        wtr.write_record([
            h.symbol.clone(),
            h.entry_price.to_string(),
            h.target_price.to_string(),
            h.stop_loss_price.to_string(),
            h.quantity.to_string(),
            h.opened_on.format(DATE_FORMAT).to_string(),
            status_cell(&h.status),
            opt(h.last_price),
            opt(h.probability),
            opt(h.profit_and_loss),
        ])
        .map_err(csv_err)?;
    }
    for row in &table.reserved_rows {
        wtr.write_record(row).map_err(csv_err)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[test]
    fn open_creates_header_only_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("holdings.csv");
        let store = CsvHoldingsStore::open(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.trim(), "Stock,Buy,Target,SL,Qty,Date,Status,LastPrice,Prob,P/L");
        assert!(store.load().unwrap().holdings.is_empty());
    }

    #[test]
    fn save_then_load_preserves_fields_and_total_row() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvHoldingsStore::open(dir.path().join("h.csv")).unwrap();

        let at = day().and_hms_opt(11, 5, 0).unwrap();
        let mut hit = Holding::new("ABC", 100.0, 110.0, 95.0, 10.0, day());
        hit.observe(112.0);
        hit.probability = Some(61.25);
        hit.status = HoldingStatus::TargetHit { at };
        let table = HoldingsTable {
            holdings: vec![hit, Holding::new("XYZ", 50.5, 60.0, 45.0, 3.0, day())],
            reserved_rows: vec![vec![
                "TOTAL".into(), "".into(), "".into(), "".into(), "".into(),
                "".into(), "".into(), "".into(), "".into(), "120".into(),
            ]],
        };

        store.save(&table).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded, table);
        assert!(!dir.path().join("h.csv.tmp").exists());
    }

    #[test]
    fn legacy_file_with_missing_columns_and_emoji_status() {
        let csv = "Stock,Buy,Target,SL,Qty,Date,Status\n\
                   INFY,1500,1600,1450,5,2024-03-01 00:00:00,✅ Target @ 2024-03-04 10:15:00\n\
                   TCS,3500,3700,3400,2,2024-03-01,\n\
                   TOTAL,,,,,,\n";
        let table = read_table(csv.as_bytes()).unwrap();

        assert_eq!(table.holdings.len(), 2);
        assert_eq!(
            table.holdings[0].status,
            HoldingStatus::TargetHit {
                at: NaiveDate::from_ymd_opt(2024, 3, 4).unwrap().and_hms_opt(10, 15, 0).unwrap()
            }
        );
        assert_eq!(table.holdings[1].status, HoldingStatus::Open);
        assert_eq!(table.holdings[1].last_price, None);
        assert_eq!(table.reserved_rows.len(), 1);
    }

    #[test]
    fn bad_number_reports_row() {
        let csv = "Stock,Buy,Target,SL,Qty,Date,Status\nABC,abc,110,95,1,2024-03-01,Active\n";
        let err = read_table(csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("row 2"), "{err}");
    }

    #[test]
    fn status_keywords_are_case_insensitive() {
        assert!(matches!(
            parse_status("❌ sl @ garbage", day()),
            Some(HoldingStatus::StopLossHit { at }) if at == day().and_time(NaiveTime::MIN)
        ));
        assert_eq!(parse_status("ACTIVE", day()), Some(HoldingStatus::Open));
        assert_eq!(parse_status("sold half", day()), None);
    }

    #[test]
    fn manually_exited_row_is_terminal_and_table_still_loads() {
        let csv = "Stock,Buy,Target,SL,Qty,Date,Status\n\
                   INFY,1500,1600,1450,5,2024-03-01,Exited manually\n\
                   TCS,3500,3700,3400,2,2024-03-01,Active\n";
        let table = read_table(csv.as_bytes()).unwrap();

        assert_eq!(table.holdings.len(), 2);
        assert_eq!(
            table.holdings[0].status,
            HoldingStatus::Exited { at: day().and_time(NaiveTime::MIN) }
        );
        assert!(!table.holdings[0].is_open());
        assert!(table.holdings[1].is_open());
        assert_eq!(table.open_count(), 1);
    }

    #[test]
    fn exited_status_survives_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvHoldingsStore::open(dir.path().join("h.csv")).unwrap();
        let mut closed = Holding::new("INFY", 1500.0, 1600.0, 1450.0, 5.0, day());
        closed.status = HoldingStatus::Exited { at: day().and_hms_opt(14, 0, 0).unwrap() };
        let table = HoldingsTable::new(vec![closed]);

        store.save(&table).unwrap();
        assert_eq!(store.load().unwrap(), table);
    }

    #[test]
    fn hand_typed_symbols_are_canonicalised() {
        let csv = "Stock,Buy,Target,SL,Qty,Date,Status\n\
                   infy.ns,1500,1600,1450,5,2024-03-01,Active\n\
                   tcs.bo,3500,3700,3400,2,2024-03-01,\n\
                   total,,,,,,\n";
        let table = read_table(csv.as_bytes()).unwrap();

        let symbols: Vec<&str> = table.holdings.iter().map(|h| h.symbol.as_str()).collect();
        assert_eq!(symbols, ["INFY", "TCS"]);
        assert_eq!(table.reserved_rows.len(), 1);
        assert!(table.find("INFY").is_some());
    }

    #[test]
    fn spreadsheet_export_with_bom_and_day_first_dates_loads() {
        let csv = "\u{feff}Stock,Buy,Target,SL,Qty,Date,Status,LastPrice,Prob,P/L\n\
                   RELIANCE,2400,2600,2300,4,01/03/2024,Active,2450.5,58.2,202\n\
                   HDFCBANK,1500,1650,1450,10,04-03-2024,❌ SL @ 2024-03-06 11:00:00,1449,31,-510\n";
        let table = read_table(csv.as_bytes()).unwrap();

        assert_eq!(table.holdings.len(), 2);
        assert_eq!(table.holdings[0].symbol, "RELIANCE");
        assert_eq!(table.holdings[0].opened_on, day());
        assert_eq!(table.holdings[0].last_price, Some(2450.5));
        assert_eq!(
            table.holdings[1].opened_on,
            NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
        );
        assert!(!table.holdings[1].is_open());
    }
}
