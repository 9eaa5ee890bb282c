//! In-memory repository backend
//!
//! Default store for tests and throwaway sessions. A single `RwLock` guards all
//! four tables, so every trait call is atomic on its own.

use crate::common::traits::{NewBet, NewTransaction, Repository};
use crate::common::types::{Account, BetRecord, LogQuery, Money, TransactionRecord};
use crate::errors::{AccountError, CasinoResult, GameError, StorageError};
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct Tables {
    accounts: BTreeMap<String, Account>,
    referral_index: HashMap<String, String>,
    settings: HashMap<String, f64>,
    bets: Vec<BetRecord>,
    transactions: Vec<TransactionRecord>,
    next_bet_id: u64,
    next_transaction_id: u64,
}

impl Tables {
    /// Balance after `delta`, checked but not yet stored
    fn checked_balance(&self, name: &str, delta: Money) -> CasinoResult<Money> {
        let account = self
            .accounts
            .get(name)
            .ok_or_else(|| AccountError::UnknownAccount(name.to_string()))?;

        let updated = account
            .balance
            .checked_add(delta)
            .ok_or_else(|| StorageError::WriteFailed("balance overflow".to_string()))?;
        if updated.is_negative() {
            return Err(GameError::InsufficientFunds {
                requested: -delta,
                available: account.balance,
            }
            .into());
        }
        Ok(updated)
    }

    fn store_balance(&mut self, name: &str, balance: Money) {
        if let Some(account) = self.accounts.get_mut(name) {
            account.balance = balance;
        }
    }

    fn push_bet(&mut self, entry: NewBet) -> BetRecord {
        self.next_bet_id += 1;
        let record = entry.into_record(self.next_bet_id);
        self.bets.push(record.clone());
        record
    }

    fn push_transaction(&mut self, entry: NewTransaction) -> TransactionRecord {
        self.next_transaction_id += 1;
        let record = entry.into_record(self.next_transaction_id);
        self.transactions.push(record.clone());
        record
    }
}

/// Repository kept entirely in process memory
#[derive(Default)]
pub struct MemoryRepository {
    tables: RwLock<Tables>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> CasinoResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| StorageError::ReadFailed("memory store lock poisoned".to_string()).into())
    }

    fn write(&self) -> CasinoResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| StorageError::WriteFailed("memory store lock poisoned".to_string()).into())
    }
}

impl Repository for MemoryRepository {
    fn insert_account(&self, account: &Account) -> CasinoResult<()> {
        let mut tables = self.write()?;
        if tables.accounts.contains_key(&account.name) {
            return Err(AccountError::DuplicateAccount(account.name.clone()).into());
        }
        if tables.referral_index.contains_key(&account.referral_code) {
            return Err(StorageError::WriteFailed(format!(
                "referral code {} already assigned",
                account.referral_code
            ))
            .into());
        }

        tables
            .referral_index
            .insert(account.referral_code.clone(), account.name.clone());
        tables.accounts.insert(account.name.clone(), account.clone());
        Ok(())
    }

    fn get_account(&self, name: &str) -> CasinoResult<Option<Account>> {
        Ok(self.read()?.accounts.get(name).cloned())
    }

    fn find_by_referral_code(&self, code: &str) -> CasinoResult<Option<String>> {
        Ok(self.read()?.referral_index.get(code).cloned())
    }

    fn adjust_balance(&self, name: &str, delta: Money) -> CasinoResult<Money> {
        let mut tables = self.write()?;
        let updated = tables.checked_balance(name, delta)?;
        tables.store_balance(name, updated);
        Ok(updated)
    }

    fn delete_account(&self, name: &str) -> CasinoResult<bool> {
        let mut tables = self.write()?;
        match tables.accounts.remove(name) {
            Some(account) => {
                tables.referral_index.remove(&account.referral_code);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn list_accounts(&self) -> CasinoResult<Vec<Account>> {
        Ok(self.read()?.accounts.values().cloned().collect())
    }

    fn get_setting(&self, name: &str) -> CasinoResult<Option<f64>> {
        Ok(self.read()?.settings.get(name).copied())
    }

    fn put_setting(&self, name: &str, value: f64) -> CasinoResult<()> {
        self.write()?.settings.insert(name.to_string(), value);
        Ok(())
    }

    fn append_bet(&self, entry: NewBet) -> CasinoResult<BetRecord> {
        Ok(self.write()?.push_bet(entry))
    }

    fn append_transaction(&self, entry: NewTransaction) -> CasinoResult<TransactionRecord> {
        Ok(self.write()?.push_transaction(entry))
    }

    fn adjust_with_bet(
        &self,
        name: &str,
        delta: Money,
        entry: NewBet,
    ) -> CasinoResult<(Money, BetRecord)> {
        let mut tables = self.write()?;
        let updated = tables.checked_balance(name, delta)?;
        tables.store_balance(name, updated);
        Ok((updated, tables.push_bet(entry)))
    }

    fn adjust_with_transaction(
        &self,
        name: &str,
        delta: Money,
        entry: NewTransaction,
    ) -> CasinoResult<(Money, TransactionRecord)> {
        let mut tables = self.write()?;
        let updated = tables.checked_balance(name, delta)?;
        tables.store_balance(name, updated);
        Ok((updated, tables.push_transaction(entry)))
    }

    fn recent_bets(&self, query: &LogQuery) -> CasinoResult<Vec<BetRecord>> {
        Ok(self
            .read()?
            .bets
            .iter()
            .rev()
            .filter(|record| query.matches(&record.account))
            .take(query.limit)
            .cloned()
            .collect())
    }

    fn recent_transactions(&self, query: &LogQuery) -> CasinoResult<Vec<TransactionRecord>> {
        Ok(self
            .read()?
            .transactions
            .iter()
            .rev()
            .filter(|record| query.matches(&record.account))
            .take(query.limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Store whose log writes can be made to fail

    use super::*;
    use crate::common::types::current_timestamp;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    pub(crate) struct FlakyRepository {
        inner: MemoryRepository,
        failures: AtomicUsize,
    }

    impl FlakyRepository {
        pub(crate) fn with_account(name: &str, balance: Money) -> Arc<Self> {
            let repo = Self::default();
            repo.insert_account(&Account {
                name: name.to_string(),
                password_hash: String::new(),
                balance,
                referral_code: format!("{}-REF", name.to_uppercase()),
                created_at: current_timestamp(),
            })
            .unwrap();
            Arc::new(repo)
        }

        /// Make the next `count` log writes fail
        pub(crate) fn fail_log_writes(&self, count: usize) {
            self.failures.store(count, Ordering::SeqCst);
        }

        fn check(&self) -> CasinoResult<()> {
            let tripped = self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if tripped {
                return Err(StorageError::WriteFailed("injected log failure".to_string()).into());
            }
            Ok(())
        }
    }

    impl Repository for FlakyRepository {
        fn insert_account(&self, account: &Account) -> CasinoResult<()> {
            self.inner.insert_account(account)
        }

        fn get_account(&self, name: &str) -> CasinoResult<Option<Account>> {
            self.inner.get_account(name)
        }

        fn find_by_referral_code(&self, code: &str) -> CasinoResult<Option<String>> {
            self.inner.find_by_referral_code(code)
        }

        fn adjust_balance(&self, name: &str, delta: Money) -> CasinoResult<Money> {
            self.inner.adjust_balance(name, delta)
        }

        fn delete_account(&self, name: &str) -> CasinoResult<bool> {
            self.inner.delete_account(name)
        }

        fn list_accounts(&self) -> CasinoResult<Vec<Account>> {
            self.inner.list_accounts()
        }

        fn get_setting(&self, name: &str) -> CasinoResult<Option<f64>> {
            self.inner.get_setting(name)
        }

        fn put_setting(&self, name: &str, value: f64) -> CasinoResult<()> {
            self.inner.put_setting(name, value)
        }

        fn append_bet(&self, entry: NewBet) -> CasinoResult<BetRecord> {
            self.check()?;
            self.inner.append_bet(entry)
        }

        fn append_transaction(&self, entry: NewTransaction) -> CasinoResult<TransactionRecord> {
            self.check()?;
            self.inner.append_transaction(entry)
        }

        fn adjust_with_bet(
            &self,
            name: &str,
            delta: Money,
            entry: NewBet,
        ) -> CasinoResult<(Money, BetRecord)> {
            self.check()?;
            self.inner.adjust_with_bet(name, delta, entry)
        }

        fn adjust_with_transaction(
            &self,
            name: &str,
            delta: Money,
            entry: NewTransaction,
        ) -> CasinoResult<(Money, TransactionRecord)> {
            self.check()?;
            self.inner.adjust_with_transaction(name, delta, entry)
        }

        fn recent_bets(&self, query: &LogQuery) -> CasinoResult<Vec<BetRecord>> {
            self.inner.recent_bets(query)
        }

        fn recent_transactions(&self, query: &LogQuery) -> CasinoResult<Vec<TransactionRecord>> {
            self.inner.recent_transactions(query)
        }
    }
}
