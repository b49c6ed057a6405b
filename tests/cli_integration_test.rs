//! CLI integration tests for command orchestration.
//!
//! Tests cover:
//! - Settings built from INI (delay, exit threshold, export path)
//! - Store selection (json / sqlite / unknown)
//! - Market adapter construction and universe parsing
//! - End-to-end commands against a temp profile directory

use clap::Parser;
use papertrader::adapters::file_config_adapter::FileConfigAdapter;
use papertrader::cli::{self, Cli, DECLINED_EXIT};
use papertrader::domain::error::PaperError;
use papertrader::domain::ledger::EntryId;
use papertrader::domain::snapshot::Snapshot;
use papertrader::ports::candidate_port::CandidateSelector;
use papertrader::ports::profile_port::ProfileStore;
use rust_decimal_macros::dec;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

fn config(content: &str) -> FileConfigAdapter {
    FileConfigAdapter::from_string(content).unwrap()
}

fn first_version() -> Snapshot {
    Snapshot {
        version: 1,
        ..Snapshot::fresh("derek")
    }
}

mod settings {
    use super::*;

    #[test]
    fn defaults_when_sections_missing() {
        let cfg = config("[profile]\nname = derek\n");
        let lifecycle = cli::build_lifecycle_settings(&cfg);
        assert_eq!(lifecycle.execution_delay, chrono::Duration::minutes(10));
        assert_eq!(cli::build_driver_settings(&cfg).exit_threshold_pct, dec!(0.3));
        assert_eq!(cli::export_path(&cfg), PathBuf::from("ledger.csv"));
    }

    #[test]
    fn values_read_from_ini() {
        let cfg = config(
            "[execution]\ndelay_minutes = 3\nexit_threshold_pct = 1.5\n\n\
             [export]\npath = out/derek\n",
        );
        assert_eq!(
            cli::build_lifecycle_settings(&cfg).execution_delay,
            chrono::Duration::minutes(3)
        );
        assert_eq!(cli::build_driver_settings(&cfg).exit_threshold_pct, dec!(1.5));
        assert_eq!(cli::export_path(&cfg), PathBuf::from("out/derek"));
    }

    #[test]
    fn buy_message_uses_ledger_ticker() {
        let msg = cli::buy_submitted_message(EntryId(3), "  aapl ", dec!(20));
        assert_eq!(msg, "buy order #3 submitted for AAPL ($20)");
    }

    #[test]
    fn profile_name_required() {
        let err = cli::profile_name(&config("[profile]\nstore = json\n")).unwrap_err();
        assert!(matches!(err, PaperError::ConfigMissing { ref key, .. } if key == "name"));
    }
}

mod stores {
    use super::*;

    #[test]
    fn json_store_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(&format!(
            "[profile]\nname = derek\npath = {}\n",
            dir.path().display()
        ));
        let store = cli::open_store(&cfg).unwrap();
        assert!(matches!(store.load(), Err(PaperError::ProfileNotFound { .. })));

        store.save(&first_version()).unwrap();
        assert!(dir.path().join("derek.json").exists());
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn sqlite_store_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(&format!(
            "[profile]\nname = derek\nstore = sqlite\npath = {}\n",
            dir.path().join("profiles.db").display()
        ));
        let store = cli::open_store(&cfg).unwrap();
        store.save(&first_version()).unwrap();
        assert_eq!(store.load().unwrap().version, 1);
    }

    #[test]
    fn unknown_store_rejected() {
        let cfg = config("[profile]\nname = derek\nstore = redis\n");
        let err = cli::open_store(&cfg).err().unwrap();
        assert!(matches!(err, PaperError::ConfigInvalid { ref key, .. } if key == "store"));
    }
}

mod market {
    use super::*;

    #[test]
    fn universe_restricts_selection() {
        let dir = tempfile::tempdir().unwrap();
        write_bars(dir.path(), "AAPL", &["100", "101"]);
        write_bars(dir.path(), "NVDA", &["100", "120"]);

        let cfg = config(&format!(
            "[market]\ndata_dir = {}\ncodes = aapl\n",
            dir.path().display()
        ));
        let market = cli::build_market(&cfg).unwrap();
        assert_eq!(market.select_next().unwrap(), "AAPL");
    }

    #[test]
    fn bad_codes_rejected() {
        let cfg = config("[market]\ncodes = AAPL,,MSFT\n");
        let err = cli::build_market(&cfg).err().unwrap();
        assert!(matches!(err, PaperError::ConfigInvalid { ref key, .. } if key == "codes"));
    }
}

fn write_bars(dir: &Path, ticker: &str, closes: &[&str]) {
    let mut content = String::from("date,open,high,low,close,volume\n");
    for (i, close) in closes.iter().enumerate() {
        content.push_str(&format!("2024-01-{:02},1,1,1,{},100\n", i + 2, close));
    }
    fs::write(dir.join(format!("{}.csv", ticker)), content).unwrap();
}

mod end_to_end {
    use super::*;

    struct Workspace {
        dir: tempfile::TempDir,
        config: PathBuf,
    }

    impl Workspace {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let data = dir.path().join("data");
            fs::create_dir(&data).unwrap();
            write_bars(&data, "AAPL", &["98", "100"]);

            let config = dir.path().join("papertrader.ini");
            fs::write(
                &config,
                format!(
                    "[profile]\nname = derek\nstore = json\npath = {profiles}\n\n\
                     [market]\ndata_dir = {data}\n\n\
                     [export]\npath = {export}\n",
                    profiles = dir.path().join("profiles").display(),
                    data = data.display(),
                    export = dir.path().join("ledger").display(),
                ),
            )
            .unwrap();
            fs::create_dir(dir.path().join("profiles")).unwrap();
            Workspace { dir, config }
        }

        fn run(&self, args: &[&str]) -> ExitCode {
            let config = self.config.display().to_string();
            let mut argv = vec!["papertrader", args[0], "--config", config.as_str()];
            argv.extend_from_slice(&args[1..]);
            cli::run(Cli::parse_from(argv))
        }

        fn snapshot(&self) -> Snapshot {
            let raw = fs::read_to_string(self.dir.path().join("profiles/derek.json")).unwrap();
            Snapshot::from_json(&raw).unwrap()
        }
    }

    #[test]
    fn init_buy_tick_export() {
        let ws = Workspace::new();
        assert_eq!(ws.run(&["init", "--cash", "20"]), ExitCode::SUCCESS);
        assert_eq!(ws.snapshot().state.cash, dec!(20));

        assert_eq!(ws.run(&["init", "--cash", "50"]), ExitCode::from(2));
        assert_eq!(ws.snapshot().state.cash, dec!(20));

        assert_eq!(ws.run(&["buy", "--ticker", "aapl"]), ExitCode::SUCCESS);
        let snapshot = ws.snapshot();
        assert!(snapshot.state.pending_purchase);
        assert_eq!(snapshot.ledger.entries()[0].ticker, "AAPL");
        assert_eq!(snapshot.ledger.entries()[0].buy_invested_amount, dec!(20));

        // Still inside the execution delay.
        assert_eq!(ws.run(&["tick"]), ExitCode::SUCCESS);
        assert!(ws.snapshot().state.pending_purchase);

        assert_eq!(ws.run(&["sell"]), ExitCode::from(DECLINED_EXIT));
        assert_eq!(
            ws.run(&["buy", "--ticker", "AAPL", "--amount", "5"]),
            ExitCode::from(DECLINED_EXIT)
        );
        assert_eq!(ws.run(&["status"]), ExitCode::SUCCESS);

        assert_eq!(ws.run(&["export"]), ExitCode::SUCCESS);
        let exported = fs::read_to_string(ws.dir.path().join("ledger.csv")).unwrap();
        assert!(exported.starts_with("Entry,Stock Ticker,Buy Invested Amount"));
        assert_eq!(exported.lines().count(), 2);
    }

    #[test]
    fn deposit_adds_cash() {
        let ws = Workspace::new();
        ws.run(&["init", "--cash", "20"]);
        assert_eq!(ws.run(&["deposit", "--amount", "5.50"]), ExitCode::SUCCESS);
        assert_eq!(ws.snapshot().state.cash, dec!(25.50));
        assert_eq!(ws.run(&["deposit", "--amount", "0"]), ExitCode::from(DECLINED_EXIT));
    }

    #[test]
    fn missing_config_exits_with_config_code() {
        let code = cli::run(Cli::parse_from([
            "papertrader",
            "status",
            "--config",
            "/nonexistent/papertrader.ini",
        ]));
        assert_eq!(code, ExitCode::from(2));
    }
}
