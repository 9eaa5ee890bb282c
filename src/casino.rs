//! Casino assembly
//!
//! Builds the repository for the configured backend and wires the ledger,
//! settlement desk, account service, admin console and per-player tables.

use crate::accounts::AccountService;
use crate::admin::AdminConsole;
use crate::common::traits::Repository;
use crate::config::{CasinoConfig, StorageBackend};
use crate::errors::CasinoResult;
#[cfg(not(feature = "persistent"))]
use crate::errors::ConfigurationError;
use crate::games::crash::CrashTiming;
use crate::games::rng::{GameRng, OutcomeSource};
use crate::games::types::CasinoEvent;
use crate::ledger::Ledger;
use crate::memory_store::MemoryRepository;
use crate::scheduler::{CrashDriver, SharedCrashTable};
use crate::settings::GameSettings;
use crate::settlement::SettlementDesk;
use crate::tables::{BlackjackTable, CrashTable, RouletteTable};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

pub struct Casino {
    config: CasinoConfig,
    ledger: Arc<Ledger>,
    desk: Arc<SettlementDesk>,
    settings: GameSettings,
    accounts: AccountService,
    admin: AdminConsole,
    seed: Option<u64>,
    tables_opened: AtomicU64,
}

impl Casino {
    /// Open the configured backend and seed default settings
    pub fn open(config: CasinoConfig) -> CasinoResult<Self> {
        config.validate()?;
        let repo = Self::create_repository(&config)?;
        Self::with_repository(config, repo)
    }

    /// Assemble around an existing repository
    pub fn with_repository(config: CasinoConfig, repo: Arc<dyn Repository>) -> CasinoResult<Self> {
        let ledger = Arc::new(Ledger::new(Arc::clone(&repo)));
        let desk = Arc::new(SettlementDesk::new(Arc::clone(&ledger)));
        let settings = GameSettings::new(Arc::clone(&repo), config.roulette.clone());
        settings.seed_defaults()?;

        let accounts = AccountService::new(Arc::clone(&ledger), config.accounts.clone());
        let admin = AdminConsole::new(Arc::clone(&desk), settings.clone(), config.logs.clone());

        tracing::info!(backend = ?config.storage.backend, "Casino ready");
        Ok(Self {
            config,
            ledger,
            desk,
            settings,
            accounts,
            admin,
            seed: None,
            tables_opened: AtomicU64::new(0),
        })
    }

    /// Derive every table's randomness from `seed` so a session replays exactly
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn create_repository(config: &CasinoConfig) -> CasinoResult<Arc<dyn Repository>> {
        match config.storage.backend {
            StorageBackend::Memory => Ok(Arc::new(MemoryRepository::new())),
            #[cfg(feature = "persistent")]
            StorageBackend::RocksDb => Ok(Arc::new(
                crate::storage::RocksRepository::open_with_config(&config.storage)?,
            )),
            #[cfg(not(feature = "persistent"))]
            StorageBackend::RocksDb => Err(ConfigurationError::InvalidValue {
                field: "storage.backend".to_string(),
                value: "rocksdb".to_string(),
                reason: "built without the persistent feature".to_string(),
            }
            .into()),
        }
    }

    pub fn config(&self) -> &CasinoConfig {
        &self.config
    }

    pub fn accounts(&self) -> &AccountService {
        &self.accounts
    }

    pub fn admin(&self) -> &AdminConsole {
        &self.admin
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn desk(&self) -> &Arc<SettlementDesk> {
        &self.desk
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CasinoEvent> {
        self.ledger.subscribe()
    }

    fn next_source(&self) -> Box<dyn OutcomeSource> {
        let index = self.tables_opened.fetch_add(1, Ordering::Relaxed);
        match self.seed {
            Some(seed) => Box::new(GameRng::seeded(seed.wrapping_add(index))),
            None => Box::new(GameRng::from_entropy()),
        }
    }

    pub fn blackjack_table(&self, account: &str) -> CasinoResult<BlackjackTable> {
        self.ledger.balance(account)?;
        Ok(BlackjackTable::new(account, Arc::clone(&self.desk), self.next_source()))
    }

    pub fn roulette_table(&self, account: &str) -> CasinoResult<RouletteTable> {
        self.ledger.balance(account)?;
        Ok(RouletteTable::new(
            account,
            Arc::clone(&self.desk),
            self.settings.clone(),
            self.next_source(),
            self.config.roulette.history_len,
        ))
    }

    pub fn crash_table(&self, account: &str) -> CasinoResult<CrashTable> {
        self.ledger.balance(account)?;
        Ok(CrashTable::new(
            account,
            Arc::clone(&self.desk),
            self.next_source(),
            CrashTiming::from(&self.config.crash),
            self.config.crash.history_len,
        ))
    }

    /// Crash table already running on its own timer
    pub fn start_crash(&self, account: &str) -> CasinoResult<(SharedCrashTable, CrashDriver)> {
        let table = Arc::new(Mutex::new(self.crash_table(account)?));
        let driver = CrashDriver::spawn(Arc::clone(&table), self.config.poll_interval());
        Ok((table, driver))
    }
}
