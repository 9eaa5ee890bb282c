//! Tablestakes - offline casino core
//!
//! Blackjack, Roulette and Crash engines over a fictional-currency ledger.
//! Engines are pure round state machines; tables move money through the
//! settlement desk so every accepted wager settles exactly once.

pub mod accounts;
pub mod admin;
pub mod casino;
pub mod common;
pub mod config;
pub mod errors;
pub mod games;
pub mod ledger;
pub mod memory_store;
pub mod scheduler;
pub mod settings;
pub mod settlement;
#[cfg(feature = "persistent")]
pub mod storage;
pub mod tables;

pub use casino::Casino;
pub use common::traits::Repository;
pub use common::types::{Account, BetRecord, GameKind, Money, TransactionKind, TransactionRecord};
pub use config::{CasinoConfig, ConfigLoader};
pub use errors::{CasinoError, CasinoResult};
pub use games::types::{CasinoEvent, Outcome};
pub use ledger::Ledger;
pub use memory_store::MemoryRepository;
pub use settlement::{SettlementDesk, WagerHandle, WagerRequest};
#[cfg(feature = "persistent")]
pub use storage::RocksRepository;
