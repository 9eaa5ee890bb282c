//! Admin console operations

use crate::common::traits::Repository;
use crate::common::types::{
    AccountSummary, BetRecord, CasinoStats, LogQuery, Money, TransactionKind, TransactionRecord,
};
use crate::config::LogsConfig;
use crate::errors::{AccountError, CasinoResult, GameError};
use crate::ledger::Ledger;
use crate::settings::GameSettings;
use crate::settlement::SettlementDesk;
use std::sync::Arc;

pub struct AdminConsole {
    repo: Arc<dyn Repository>,
    ledger: Arc<Ledger>,
    desk: Arc<SettlementDesk>,
    settings: GameSettings,
    logs: LogsConfig,
}

impl AdminConsole {
    pub fn new(desk: Arc<SettlementDesk>, settings: GameSettings, logs: LogsConfig) -> Self {
        let ledger = Arc::clone(desk.ledger());
        Self {
            repo: Arc::clone(ledger.repository()),
            ledger,
            desk,
            settings,
            logs,
        }
    }

    pub fn list_accounts(&self) -> CasinoResult<Vec<AccountSummary>> {
        Ok(self
            .repo
            .list_accounts()?
            .iter()
            .map(AccountSummary::from)
            .collect())
    }

    pub fn stats(&self) -> CasinoResult<CasinoStats> {
        let accounts = self.repo.list_accounts()?;
        Ok(CasinoStats {
            total_accounts: accounts.len(),
            total_balance: accounts.iter().map(|a| a.balance).sum(),
        })
    }

    pub fn deposit(&self, name: &str, amount: Money) -> CasinoResult<Money> {
        self.ledger.deposit(name, TransactionKind::AdminDeposit, amount)
    }

    /// Rejected with `InsufficientFunds` rather than overdrawing the account
    pub fn withdraw(&self, name: &str, amount: Money) -> CasinoResult<Money> {
        self.ledger
            .withdraw(name, TransactionKind::AdminWithdrawal, amount)
    }

    /// Remove an account; its bet and transaction logs are kept.
    ///
    /// Refused while the account has a wager waiting to settle.
    pub fn delete_account(&self, name: &str) -> CasinoResult<()> {
        let open = self.desk.open_wagers(name);
        if !open.is_empty() {
            return Err(GameError::invalid_state(
                "delete_account",
                format!("{} open wager(s) for {}", open.len(), name),
            )
            .into());
        }
        if !self.repo.delete_account(name)? {
            return Err(AccountError::UnknownAccount(name.to_string()).into());
        }
        tracing::info!(account = name, "Account deleted");
        Ok(())
    }

    pub fn roulette_payout(&self) -> CasinoResult<u32> {
        self.settings.straight_payout()
    }

    pub fn set_roulette_payout(&self, payout: u32) -> CasinoResult<()> {
        self.settings.set_straight_payout(payout)
    }

    pub fn bet_logs(&self, filter: Option<&str>, limit: Option<usize>) -> CasinoResult<Vec<BetRecord>> {
        self.repo.recent_bets(&self.query(filter, limit))
    }

    pub fn transaction_logs(
        &self,
        filter: Option<&str>,
        limit: Option<usize>,
    ) -> CasinoResult<Vec<TransactionRecord>> {
        self.repo.recent_transactions(&self.query(filter, limit))
    }

    fn query(&self, filter: Option<&str>, limit: Option<usize>) -> LogQuery {
        let limit = limit.unwrap_or(self.logs.default_limit);
        match filter.map(str::trim).filter(|f| !f.is_empty()) {
            Some(filter) => LogQuery::for_account(filter, limit),
            None => LogQuery::recent(limit),
        }
    }
}
