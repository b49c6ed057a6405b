//! CSV ledger exporter.

use crate::domain::error::PaperError;
use crate::domain::ledger::LedgerEntry;
use crate::ports::export_port::LedgerExporter;
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use tracing::info;

pub const HEADERS: [&str; 10] = [
    "Entry",
    "Stock Ticker",
    "Buy Invested Amount",
    "Buy Submission Time",
    "Buy Completed Time",
    "Completed Order Price",
    "Shares Holding",
    "Sell Order Time",
    "Sell Completed Time",
    "Profit",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct CsvLedgerExporter;

fn time_cell(t: Option<DateTime<Utc>>) -> String {
    t.map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}

fn decimal_cell(d: Option<Decimal>) -> String {
    d.map(|d| d.normalize().to_string()).unwrap_or_default()
}

/// `destination` with a `.csv` extension added when it has none.
pub fn csv_destination(destination: &Path) -> PathBuf {
    if destination.extension().is_some() {
        destination.to_path_buf()
    } else {
        destination.with_extension("csv")
    }
}

impl LedgerExporter for CsvLedgerExporter {
    fn export(&self, entries: &[LedgerEntry], destination: &Path) -> Result<PathBuf, PaperError> {
        let path = csv_destination(destination);
        let export_err = |e: csv::Error| PaperError::Export {
            reason: format!("{}: {}", path.display(), e),
        };

        let mut writer = csv::Writer::from_path(&path).map_err(export_err)?;
        writer.write_record(HEADERS).map_err(export_err)?;
        for entry in entries {
            writer
                .write_record([
                    entry.id.0.to_string(),
                    entry.ticker.clone(),
                    entry.buy_invested_amount.normalize().to_string(),
                    time_cell(Some(entry.buy_submission_time)),
                    time_cell(entry.buy_completed_time),
                    decimal_cell(entry.completed_order_price),
                    decimal_cell(entry.shares_holding),
                    time_cell(entry.sell_order_time),
                    time_cell(entry.sell_completed_time),
                    decimal_cell(entry.profit),
                ])
                .map_err(export_err)?;
        }
        writer.flush().map_err(|e| PaperError::Export {
            reason: format!("{}: {}", path.display(), e),
        })?;

        info!(path = %path.display(), entries = entries.len(), "ledger exported");
        Ok(path)
    }
}
