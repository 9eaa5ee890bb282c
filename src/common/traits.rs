//! Shared traits and interfaces
//!
//! The persistence contract the casino core depends on. Backends only need point
//! lookups, an atomic balance adjustment and insert-only logs with newest-first reads.

use crate::common::types::{
    Account, BetRecord, GameKind, LogQuery, Money, TransactionKind, TransactionRecord,
};
use crate::errors::CasinoResult;
use chrono::{DateTime, Utc};

/// Storage interface for accounts, settings and activity logs
pub trait Repository: Send + Sync {
    /// Insert a new account; fails with `DuplicateAccount` if the name is taken
    fn insert_account(&self, account: &Account) -> CasinoResult<()>;

    /// Point lookup by account name
    fn get_account(&self, name: &str) -> CasinoResult<Option<Account>>;

    /// Point lookup by referral code, returning the owning account name
    fn find_by_referral_code(&self, code: &str) -> CasinoResult<Option<String>>;

    /// Add `delta` to the balance and return the new balance.
    ///
    /// Fails with `InsufficientFunds` and leaves the balance untouched if the
    /// result would be negative, and with `UnknownAccount` if the name is absent.
    fn adjust_balance(&self, name: &str, delta: Money) -> CasinoResult<Money>;

    /// Remove an account; returns false if it did not exist
    fn delete_account(&self, name: &str) -> CasinoResult<bool>;

    /// All accounts, ordered by name
    fn list_accounts(&self) -> CasinoResult<Vec<Account>>;

    /// Read a numeric game setting
    fn get_setting(&self, name: &str) -> CasinoResult<Option<f64>>;

    /// Create or replace a numeric game setting
    fn put_setting(&self, name: &str, value: f64) -> CasinoResult<()>;

    /// Append a bet log entry, assigning its sequence id
    fn append_bet(&self, entry: NewBet) -> CasinoResult<BetRecord>;

    /// Append a transaction log entry, assigning its sequence id
    fn append_transaction(&self, entry: NewTransaction) -> CasinoResult<TransactionRecord>;

    /// Adjust the balance and append the bet row as one write.
    ///
    /// Either both land or neither does; the balance rules of `adjust_balance` apply.
    fn adjust_with_bet(
        &self,
        name: &str,
        delta: Money,
        entry: NewBet,
    ) -> CasinoResult<(Money, BetRecord)>;

    /// Adjust the balance and append the transaction row as one write
    fn adjust_with_transaction(
        &self,
        name: &str,
        delta: Money,
        entry: NewTransaction,
    ) -> CasinoResult<(Money, TransactionRecord)>;

    /// Bet logs matching the query, most recent first
    fn recent_bets(&self, query: &LogQuery) -> CasinoResult<Vec<BetRecord>>;

    /// Transaction logs matching the query, most recent first
    fn recent_transactions(&self, query: &LogQuery) -> CasinoResult<Vec<TransactionRecord>>;
}

/// Bet log entry before the repository assigns an id
#[derive(Clone, Debug)]
pub struct NewBet {
    pub account: String,
    pub game: GameKind,
    pub wager: Money,
    pub winnings: Money,
    pub timestamp: DateTime<Utc>,
}

impl NewBet {
    pub fn into_record(self, id: u64) -> BetRecord {
        BetRecord {
            id,
            outcome: self.winnings - self.wager,
            account: self.account,
            game: self.game,
            wager: self.wager,
            winnings: self.winnings,
            timestamp: self.timestamp,
        }
    }
}

/// Transaction log entry before the repository assigns an id
#[derive(Clone, Debug)]
pub struct NewTransaction {
    pub account: String,
    pub kind: TransactionKind,
    pub amount: Money,
    pub timestamp: DateTime<Utc>,
}

impl NewTransaction {
    pub fn into_record(self, id: u64) -> TransactionRecord {
        TransactionRecord {
            id,
            account: self.account,
            kind: self.kind,
            amount: self.amount,
            timestamp: self.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::current_timestamp;

    #[test]
    fn test_new_bet_computes_outcome() {
        let record = NewBet {
            account: "ana".to_string(),
            game: GameKind::Roulette,
            wager: Money::from_units(10),
            winnings: Money::ZERO,
            timestamp: current_timestamp(),
        }
        .into_record(7);

        assert_eq!(record.id, 7);
        assert_eq!(record.outcome, Money::from_units(-10));
    }
}
