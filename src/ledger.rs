//! Balance mutations and activity logs
//!
//! Every balance change in the casino goes through [`Ledger`]. Calls for the same
//! account are serialized by a per-name mutex held across the balance update and
//! the log append, so admin and player actions cannot interleave mid-operation.

use crate::common::traits::{NewBet, NewTransaction, Repository};
use crate::common::types::{
    current_timestamp, BetRecord, GameKind, Money, TransactionKind, TransactionRecord,
};
use crate::errors::{AccountError, CasinoResult, GameError, StorageError};
use crate::games::types::CasinoEvent;
use dashmap::DashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

/// Capacity of the notification channel
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

pub struct Ledger {
    repo: Arc<dyn Repository>,
    locks: DashMap<String, Arc<Mutex<()>>>,
    events: broadcast::Sender<CasinoEvent>,
}

impl Ledger {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            repo,
            locks: DashMap::new(),
            events,
        }
    }

    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repo
    }

    /// Receive balance and round notifications
    pub fn subscribe(&self) -> broadcast::Receiver<CasinoEvent> {
        self.events.subscribe()
    }

    /// Publish a notification; nobody listening is not an error
    pub fn publish(&self, event: CasinoEvent) {
        let _ = self.events.send(event);
    }

    /// Run `op` inside the critical section for `account`
    fn exclusive<T>(&self, account: &str, op: impl FnOnce() -> CasinoResult<T>) -> CasinoResult<T> {
        let lock = self
            .locks
            .entry(account.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock
            .lock()
            .map_err(|_| StorageError::WriteFailed(format!("account lock poisoned: {}", account)))?;
        op()
    }

    pub fn balance(&self, account: &str) -> CasinoResult<Money> {
        self.repo
            .get_account(account)?
            .map(|a| a.balance)
            .ok_or_else(|| AccountError::UnknownAccount(account.to_string()).into())
    }

    /// Subtract `amount`; rejected, never clamped, if it exceeds the balance
    pub fn debit(&self, account: &str, amount: Money) -> CasinoResult<Money> {
        if !amount.is_positive() {
            return Err(GameError::InvalidWager(format!("debit must be positive, got {}", amount)).into());
        }
        self.exclusive(account, || self.apply(account, -amount))
    }

    /// Add `amount`, which may be zero
    pub fn credit(&self, account: &str, amount: Money) -> CasinoResult<Money> {
        if amount.is_negative() {
            return Err(GameError::InvalidWager(format!("credit must not be negative, got {}", amount)).into());
        }
        self.exclusive(account, || self.apply(account, amount))
    }

    pub fn record_bet(
        &self,
        account: &str,
        game: GameKind,
        wager: Money,
        winnings: Money,
    ) -> CasinoResult<BetRecord> {
        self.exclusive(account, || self.append_bet(account, game, wager, winnings))
    }

    pub fn record_transaction(
        &self,
        account: &str,
        kind: TransactionKind,
        amount: Money,
    ) -> CasinoResult<TransactionRecord> {
        self.exclusive(account, || self.append_transaction(account, kind, amount))
    }

    /// Credit `amount` and log it as `kind` in one critical section
    pub fn deposit(&self, account: &str, kind: TransactionKind, amount: Money) -> CasinoResult<Money> {
        if !amount.is_positive() {
            return Err(GameError::InvalidWager(format!("deposit must be positive, got {}", amount)).into());
        }
        self.exclusive(account, || {
            let (balance, _) = self.apply_logged(account, kind, amount)?;
            tracing::info!(account, %kind, %amount, %balance, "Deposit recorded");
            Ok(balance)
        })
    }

    /// Debit `amount` and log it as a negative `kind` transaction
    pub fn withdraw(&self, account: &str, kind: TransactionKind, amount: Money) -> CasinoResult<Money> {
        if !amount.is_positive() {
            return Err(GameError::InvalidWager(format!("withdrawal must be positive, got {}", amount)).into());
        }
        self.exclusive(account, || {
            let (balance, _) = self.apply_logged(account, kind, -amount)?;
            tracing::info!(account, %kind, %amount, %balance, "Withdrawal recorded");
            Ok(balance)
        })
    }

    /// Credit `winnings` and write the bet record as a single repository write.
    ///
    /// On failure neither the credit nor the record exists, so the caller may retry.
    pub fn settle_bet(
        &self,
        account: &str,
        game: GameKind,
        wager: Money,
        winnings: Money,
    ) -> CasinoResult<(Money, BetRecord)> {
        if winnings.is_negative() {
            return Err(GameError::InvalidWager(format!("winnings must not be negative, got {}", winnings)).into());
        }
        if !wager.is_positive() {
            return Err(GameError::InvalidWager(format!("logged wager must be positive, got {}", wager)).into());
        }
        self.exclusive(account, || {
            let entry = self.new_bet(account, game, wager, winnings);
            let (balance, record) = self.repo.adjust_with_bet(account, winnings, entry)?;
            self.announce(account, winnings, balance);
            Ok((balance, record))
        })
    }

    fn apply(&self, account: &str, delta: Money) -> CasinoResult<Money> {
        let balance = self.repo.adjust_balance(account, delta)?;
        self.announce(account, delta, balance);
        Ok(balance)
    }

    /// Balance change and its transaction row, written together
    fn apply_logged(
        &self,
        account: &str,
        kind: TransactionKind,
        delta: Money,
    ) -> CasinoResult<(Money, TransactionRecord)> {
        let entry = self.new_transaction(account, kind, delta);
        let (balance, record) = self.repo.adjust_with_transaction(account, delta, entry)?;
        self.announce(account, delta, balance);
        Ok((balance, record))
    }

    fn announce(&self, account: &str, delta: Money, balance: Money) {
        tracing::debug!(account, %delta, %balance, "Balance adjusted");
        if delta != Money::ZERO {
            self.publish(CasinoEvent::BalanceChanged {
                account: account.to_string(),
                delta,
                balance,
            });
        }
    }

    fn new_bet(&self, account: &str, game: GameKind, wager: Money, winnings: Money) -> NewBet {
        NewBet {
            account: account.to_string(),
            game,
            wager,
            winnings,
            timestamp: current_timestamp(),
        }
    }

    fn new_transaction(&self, account: &str, kind: TransactionKind, amount: Money) -> NewTransaction {
        NewTransaction {
            account: account.to_string(),
            kind,
            amount,
            timestamp: current_timestamp(),
        }
    }

    fn append_bet(
        &self,
        account: &str,
        game: GameKind,
        wager: Money,
        winnings: Money,
    ) -> CasinoResult<BetRecord> {
        if !wager.is_positive() {
            return Err(GameError::InvalidWager(format!("logged wager must be positive, got {}", wager)).into());
        }
        self.repo.append_bet(self.new_bet(account, game, wager, winnings))
    }

    fn append_transaction(
        &self,
        account: &str,
        kind: TransactionKind,
        amount: Money,
    ) -> CasinoResult<TransactionRecord> {
        self.repo.append_transaction(self.new_transaction(account, kind, amount))
    }
}
