//! CLI definition and dispatch.

use chrono::Duration;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::error;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_export_adapter::CsvLedgerExporter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_profile_adapter::JsonProfileStore;
#[cfg(feature = "sqlite")]
use crate::adapters::sqlite_profile_adapter::SqliteProfileStore;
use crate::domain::config_validation::validate_config;
use crate::domain::driver::{run_tick, DriverSettings};
use crate::domain::error::PaperError;
use crate::domain::ledger::EntryId;
use crate::domain::lifecycle::{
    LifecycleSettings, OrderLifecycle, Outcome, DEFAULT_EXECUTION_DELAY_MINUTES,
};
use crate::domain::universe::parse_codes;
use crate::ports::clock_port::SystemClock;
use crate::ports::config_port::ConfigPort;
use crate::ports::export_port::LedgerExporter;
use crate::ports::profile_port::ProfileStore;

/// Exit code for a request the account refused (insufficient funds, order
/// still pending, ...). Nothing was changed.
pub const DECLINED_EXIT: u8 = 7;

#[derive(Parser, Debug)]
#[command(name = "papertrader", about = "Single-account paper trading simulator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new profile funded with starting cash
    Init {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        cash: Decimal,
    },
    /// Add cash to the profile
    Deposit {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        amount: Decimal,
    },
    /// Submit a buy order (defaults to all available cash)
    Buy {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        ticker: String,
        #[arg(long)]
        amount: Option<Decimal>,
    },
    /// Submit a sell order for the open position
    Sell {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Run one scheduling tick: complete, exit, or enter
    Tick {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show the account summary
    Status {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Export the ledger to CSV
    Export {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Init { config, cash } => {
            with_account(&config, |account, _| run_init(account, cash))
        }
        Command::Deposit { config, amount } => with_account(&config, |account, _| {
            Ok(report(account.deposit(amount)?, |cash| {
                format!("deposited ${}, cash now ${}", amount, cash.round_dp(2))
            }))
        }),
        Command::Buy {
            config,
            ticker,
            amount,
        } => with_account(&config, |account, _| {
            let amount = amount.unwrap_or(account.state().cash);
            Ok(report(account.submit_order(&ticker, amount)?, |id| {
                buy_submitted_message(id, &ticker, amount)
            }))
        }),
        Command::Sell { config } => with_account(&config, |account, _| {
            Ok(report(account.submit_sell()?, |id| format!("sell order {} submitted", id)))
        }),
        Command::Tick { config } => with_account(&config, run_tick_command),
        Command::Status { config } => with_account(&config, |account, _| {
            println!("Profile: {} (version {})", account.profile(), account.version());
            println!("Stage: {:?}", account.stage());
            println!("Ledger Entries: {}", account.ledger().len());
            println!("{}", account.state());
            Ok(ExitCode::SUCCESS)
        }),
        Command::Export { config, output } => with_account(&config, |account, session| {
            let destination = output.unwrap_or_else(|| export_path(&session.config));
            let path = CsvLedgerExporter.export(account.ledger().entries(), &destination)?;
            println!("exported {} entries to {}", account.ledger().len(), path.display());
            Ok(ExitCode::SUCCESS)
        }),
    }
}

/// Everything an account borrows for the lifetime of one command.
pub struct Session {
    pub config: FileConfigAdapter,
    pub store: Box<dyn ProfileStore>,
    pub market: CsvAdapter,
    pub clock: SystemClock,
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, PaperError> {
    FileConfigAdapter::from_file(path).map_err(|e| PaperError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

pub fn open_session(config_path: &Path) -> Result<Session, PaperError> {
    let config = load_config(config_path)?;
    validate_config(&config)?;
    let store = open_store(&config)?;
    let market = build_market(&config)?;
    Ok(Session {
        config,
        store,
        market,
        clock: SystemClock,
    })
}

fn with_account<F>(config_path: &Path, f: F) -> ExitCode
where
    F: FnOnce(&mut OrderLifecycle<'_>, &Session) -> Result<ExitCode, PaperError>,
{
    let result = open_session(config_path).and_then(|session| {
        let mut account = OrderLifecycle::open(
            session.store.as_ref(),
            &session.market,
            &session.clock,
            build_lifecycle_settings(&session.config),
        )?;
        f(&mut account, &session)
    });

    match result {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "command failed");
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn report<T>(outcome: Outcome<T>, describe: impl FnOnce(T) -> String) -> ExitCode {
    match outcome {
        Outcome::Done(value) => {
            println!("{}", describe(value));
            ExitCode::SUCCESS
        }
        Outcome::Declined(reason) => {
            eprintln!("declined: {reason}");
            ExitCode::from(DECLINED_EXIT)
        }
    }
}

pub fn buy_submitted_message(id: EntryId, ticker: &str, amount: Decimal) -> String {
    format!(
        "buy order {} submitted for {} (${})",
        id,
        ticker.trim().to_uppercase(),
        amount
    )
}

fn run_init(account: &mut OrderLifecycle<'_>, cash: Decimal) -> Result<ExitCode, PaperError> {
    if account.version() > 0 {
        eprintln!(
            "error: profile '{}' already exists (version {})",
            account.profile(),
            account.version()
        );
        return Ok(ExitCode::from(2));
    }
    Ok(report(account.deposit(cash)?, |cash| {
        format!("profile '{}' created with ${}", account.profile(), cash)
    }))
}

fn run_tick_command(
    account: &mut OrderLifecycle<'_>,
    session: &Session,
) -> Result<ExitCode, PaperError> {
    let report = run_tick(account, &session.market, &build_driver_settings(&session.config))?;
    for event in &report.events {
        println!("{}", event);
    }
    println!("Stage: {:?}", report.stage);

    if session.config.get_bool("export", "on_tick", false) {
        let destination = export_path(&session.config);
        let path = CsvLedgerExporter.export(account.ledger().entries(), &destination)?;
        println!("ledger exported to {}", path.display());
    }
    Ok(ExitCode::SUCCESS)
}

pub fn profile_name(config: &dyn ConfigPort) -> Result<String, PaperError> {
    config
        .get_string("profile", "name")
        .ok_or_else(|| PaperError::ConfigMissing {
            section: "profile".into(),
            key: "name".into(),
        })
}

pub fn open_store(config: &dyn ConfigPort) -> Result<Box<dyn ProfileStore>, PaperError> {
    let name = profile_name(config)?;
    let kind = config
        .get_string("profile", "store")
        .unwrap_or_else(|| "json".to_string());
    match kind.as_str() {
        "json" => {
            let dir = config
                .get_string("profile", "path")
                .unwrap_or_else(|| "profiles".to_string());
            Ok(Box::new(JsonProfileStore::new(dir, &name)))
        }
        #[cfg(feature = "sqlite")]
        "sqlite" => Ok(Box::new(SqliteProfileStore::from_config(config, &name)?)),
        other => Err(PaperError::ConfigInvalid {
            section: "profile".into(),
            key: "store".into(),
            reason: format!("store '{}' is not available in this build", other),
        }),
    }
}

pub fn build_market(config: &dyn ConfigPort) -> Result<CsvAdapter, PaperError> {
    let data_dir = config
        .get_string("market", "data_dir")
        .unwrap_or_else(|| "data".to_string());
    let adapter = CsvAdapter::new(PathBuf::from(data_dir));

    match config
        .get_string("market", "codes")
        .filter(|c| !c.trim().is_empty())
    {
        Some(codes) => {
            let codes = parse_codes(&codes).map_err(|e| PaperError::ConfigInvalid {
                section: "market".into(),
                key: "codes".into(),
                reason: e.to_string(),
            })?;
            Ok(adapter.with_universe(codes))
        }
        None => Ok(adapter),
    }
}

pub fn build_lifecycle_settings(config: &dyn ConfigPort) -> LifecycleSettings {
    let minutes = config
        .get_int("execution", "delay_minutes", DEFAULT_EXECUTION_DELAY_MINUTES)
        .max(0);
    LifecycleSettings {
        execution_delay: Duration::minutes(minutes),
    }
}

pub fn build_driver_settings(config: &dyn ConfigPort) -> DriverSettings {
    let default = DriverSettings::default();
    DriverSettings {
        exit_threshold_pct: config.get_decimal(
            "execution",
            "exit_threshold_pct",
            default.exit_threshold_pct,
        ),
    }
}

pub fn export_path(config: &dyn ConfigPort) -> PathBuf {
    config
        .get_string("export", "path")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("ledger.csv"))
}
