#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use papertrader::domain::error::PaperError;
use papertrader::domain::lifecycle::{LifecycleSettings, OrderLifecycle};
use papertrader::domain::snapshot::{check_version, Snapshot};
use papertrader::ports::candidate_port::CandidateSelector;
use papertrader::ports::clock_port::Clock;
use papertrader::ports::price_port::PriceOracle;
use papertrader::ports::profile_port::ProfileStore;
use rust_decimal::Decimal;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

pub struct ManualClock {
    now: Cell<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Cell::new(Utc.with_ymd_and_hms(2024, 3, 1, 14, 0, 0).unwrap()),
        }
    }

    pub fn advance_minutes(&self, minutes: i64) {
        self.advance(Duration::minutes(minutes));
    }

    pub fn advance(&self, d: Duration) {
        self.now.set(self.now.get() + d);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }
}

pub struct MockPriceOracle {
    pub prices: RefCell<HashMap<String, Decimal>>,
    pub calls: Cell<usize>,
}

impl MockPriceOracle {
    pub fn new() -> Self {
        Self {
            prices: RefCell::new(HashMap::new()),
            calls: Cell::new(0),
        }
    }

    pub fn set(&self, ticker: &str, price: Decimal) {
        self.prices.borrow_mut().insert(ticker.to_string(), price);
    }

    pub fn clear(&self, ticker: &str) {
        self.prices.borrow_mut().remove(ticker);
    }
}

impl PriceOracle for MockPriceOracle {
    fn current_price(&self, ticker: &str) -> Result<Decimal, PaperError> {
        self.calls.set(self.calls.get() + 1);
        self.prices
            .borrow()
            .get(ticker)
            .copied()
            .ok_or_else(|| PaperError::PriceUnavailable {
                ticker: ticker.to_string(),
                reason: "no quote".into(),
            })
    }
}

/// In-memory store with the same compare-and-swap rule as the real ones.
pub struct MemoryProfileStore {
    pub profile: String,
    pub saved: RefCell<Option<Snapshot>>,
    pub saves: Cell<usize>,
    pub fail_saves: Cell<bool>,
}

impl MemoryProfileStore {
    pub fn new(profile: &str) -> Self {
        Self {
            profile: profile.to_string(),
            saved: RefCell::new(None),
            saves: Cell::new(0),
            fail_saves: Cell::new(false),
        }
    }

    pub fn stored(&self) -> Option<Snapshot> {
        self.saved.borrow().clone()
    }
}

impl ProfileStore for MemoryProfileStore {
    fn load(&self) -> Result<Snapshot, PaperError> {
        self.stored().ok_or_else(|| PaperError::ProfileNotFound {
            profile: self.profile.clone(),
        })
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), PaperError> {
        if self.fail_saves.get() {
            return Err(PaperError::Persistence {
                reason: "simulated write failure".into(),
            });
        }
        let stored = self.saved.borrow().as_ref().map(|s| s.version).unwrap_or(0);
        check_version(&self.profile, stored, snapshot.version)?;
        *self.saved.borrow_mut() = Some(snapshot.clone());
        self.saves.set(self.saves.get() + 1);
        Ok(())
    }
}

pub struct StaticSelector {
    pub pick: RefCell<Result<String, String>>,
    pub calls: Cell<usize>,
}

impl StaticSelector {
    pub fn picks(ticker: &str) -> Self {
        Self {
            pick: RefCell::new(Ok(ticker.to_string())),
            calls: Cell::new(0),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            pick: RefCell::new(Err(reason.to_string())),
            calls: Cell::new(0),
        }
    }
}

impl CandidateSelector for StaticSelector {
    fn select_next(&self) -> Result<String, PaperError> {
        self.calls.set(self.calls.get() + 1);
        self.pick
            .borrow()
            .clone()
            .map_err(|reason| PaperError::NoCandidate { reason })
    }
}

pub struct Harness {
    pub store: MemoryProfileStore,
    pub prices: MockPriceOracle,
    pub clock: ManualClock,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            store: MemoryProfileStore::new("derek"),
            prices: MockPriceOracle::new(),
            clock: ManualClock::new(),
        }
    }

    pub fn open(&self) -> OrderLifecycle<'_> {
        OrderLifecycle::open(
            &self.store,
            &self.prices,
            &self.clock,
            LifecycleSettings::default(),
        )
        .unwrap()
    }

    /// A fresh account funded with `cash`.
    pub fn funded(&self, cash: Decimal) -> OrderLifecycle<'_> {
        let mut account = self.open();
        assert!(account.deposit(cash).unwrap().is_done());
        account
    }
}
