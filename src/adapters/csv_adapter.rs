//! CSV market data adapter.
//!
//! Reads daily bars from `<base_path>/<TICKER>.csv` with the columns
//! `date,open,high,low,close,volume` (dates as `YYYY-MM-DD`). Serves both as
//! the price oracle (latest close) and as the momentum candidate selector.

use crate::domain::error::PaperError;
use crate::domain::universe::{self, PriceBar};
use crate::ports::candidate_port::CandidateSelector;
use crate::ports::price_port::PriceOracle;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

pub struct CsvAdapter {
    base_path: PathBuf,
    universe: Option<Vec<String>>,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self {
            base_path,
            universe: None,
        }
    }

    /// Restrict candidate selection to `codes` instead of every file on disk.
    pub fn with_universe(mut self, codes: Vec<String>) -> Self {
        self.universe = Some(codes);
        self
    }

    fn csv_path(&self, ticker: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", ticker))
    }

    pub fn fetch_bars(&self, ticker: &str) -> Result<Vec<PriceBar>, PaperError> {
        let unavailable = |reason: String| PaperError::PriceUnavailable {
            ticker: ticker.to_string(),
            reason,
        };

        let path = self.csv_path(ticker);
        let content = fs::read_to_string(&path)
            .map_err(|e| unavailable(format!("failed to read {}: {}", path.display(), e)))?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| unavailable(format!("CSV parse error: {}", e)))?;

            let date_str = record
                .get(0)
                .ok_or_else(|| unavailable("missing date column".into()))?;
            let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
                .map_err(|e| unavailable(format!("invalid date format: {}", e)))?;

            let close: Decimal = record
                .get(4)
                .ok_or_else(|| unavailable("missing close column".into()))?
                .trim()
                .parse()
                .map_err(|e| unavailable(format!("invalid close value: {}", e)))?;

            bars.push(PriceBar { date, close });
        }

        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }

    pub fn list_symbols(&self) -> Result<Vec<String>, PaperError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| PaperError::NoCandidate {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut symbols = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if let Some(code) = name_str.strip_suffix(".csv") {
                if !code.is_empty() && !code.starts_with('.') {
                    symbols.push(code.to_uppercase());
                }
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}

impl PriceOracle for CsvAdapter {
    fn current_price(&self, ticker: &str) -> Result<Decimal, PaperError> {
        let bars = self.fetch_bars(ticker)?;
        bars.last()
            .map(|b| b.close)
            .ok_or_else(|| PaperError::PriceUnavailable {
                ticker: ticker.to_string(),
                reason: "no bars".into(),
            })
    }
}

impl CandidateSelector for CsvAdapter {
    fn select_next(&self) -> Result<String, PaperError> {
        let codes = match &self.universe {
            Some(codes) => codes.clone(),
            None => self.list_symbols()?,
        };

        let mut series = Vec::with_capacity(codes.len());
        for code in codes {
            match self.fetch_bars(&code) {
                Ok(bars) => series.push((code, bars)),
                Err(e) => debug!(ticker = %code, error = %e, "skipping candidate"),
            }
        }

        let ranked = universe::rank(series);
        let best = ranked.into_iter().next().ok_or_else(|| PaperError::NoCandidate {
            reason: format!(
                "no ticker in {} has at least {} bars",
                self.base_path.display(),
                universe::MIN_BARS
            ),
        })?;
        debug!(ticker = %best.ticker, score = %best.score, bars = best.bars, "candidate selected");
        Ok(best.ticker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;

    fn create_test_csv(dir: &std::path::Path, ticker: &str, content: &str) {
        let path = dir.join(format!("{}.csv", ticker));
        let mut file = fs::File::create(path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
    }

    const AAPL: &str = "date,open,high,low,close,volume\n\
        2024-01-03,101,103,100,102.5,1200\n\
        2024-01-02,99,101,98,100,1000\n";

    #[test]
    fn current_price_is_latest_close() {
        let dir = tempfile::tempdir().unwrap();
        create_test_csv(dir.path(), "AAPL", AAPL);
        let adapter = CsvAdapter::new(dir.path().to_path_buf());
        assert_eq!(adapter.current_price("AAPL").unwrap(), dec!(102.5));
    }

    #[test]
    fn missing_file_is_price_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = CsvAdapter::new(dir.path().to_path_buf());
        let err = adapter.current_price("MSFT").unwrap_err();
        assert!(matches!(err, PaperError::PriceUnavailable { ticker, .. } if ticker == "MSFT"));
    }

    #[test]
    fn header_only_file_has_no_price() {
        let dir = tempfile::tempdir().unwrap();
        create_test_csv(dir.path(), "AAPL", "date,open,high,low,close,volume\n");
        let adapter = CsvAdapter::new(dir.path().to_path_buf());
        assert!(adapter.current_price("AAPL").is_err());
    }

    #[test]
    fn bad_close_is_error() {
        let dir = tempfile::tempdir().unwrap();
        create_test_csv(
            dir.path(),
            "AAPL",
            "date,open,high,low,close,volume\n2024-01-02,1,1,1,abc,1\n",
        );
        let adapter = CsvAdapter::new(dir.path().to_path_buf());
        assert!(adapter.fetch_bars("AAPL").is_err());
    }

    #[test]
    fn list_symbols_ignores_other_files() {
        let dir = tempfile::tempdir().unwrap();
        create_test_csv(dir.path(), "MSFT", AAPL);
        create_test_csv(dir.path(), "AAPL", AAPL);
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        let adapter = CsvAdapter::new(dir.path().to_path_buf());
        assert_eq!(adapter.list_symbols().unwrap(), vec!["AAPL", "MSFT"]);
    }

    #[test]
    fn selects_strongest_momentum() {
        let dir = tempfile::tempdir().unwrap();
        create_test_csv(dir.path(), "AAPL", AAPL);
        create_test_csv(
            dir.path(),
            "NVDA",
            "date,open,high,low,close,volume\n2024-01-02,1,1,1,100,1\n2024-01-03,1,1,1,110,1\n",
        );
        create_test_csv(
            dir.path(),
            "TSLA",
            "date,open,high,low,close,volume\n2024-01-02,1,1,1,100,1\n",
        );
        let adapter = CsvAdapter::new(dir.path().to_path_buf());
        assert_eq!(adapter.select_next().unwrap(), "NVDA");

        let restricted = CsvAdapter::new(dir.path().to_path_buf())
            .with_universe(vec!["AAPL".into(), "TSLA".into(), "GONE".into()]);
        assert_eq!(restricted.select_next().unwrap(), "AAPL");
    }

    #[test]
    fn no_candidate_when_nothing_ranks() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = CsvAdapter::new(dir.path().to_path_buf());
        let err = adapter.select_next().unwrap_err();
        assert!(matches!(err, PaperError::NoCandidate { .. }));
    }
}
