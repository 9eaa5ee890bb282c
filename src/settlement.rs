//! Settlement desk
//!
//! Uniform place-then-resolve contract shared by all three tables. Placing a wager
//! debits the stake and registers an open wager under a fresh handle; resolving the
//! handle credits the winnings and writes the single bet record. A handle can be
//! resolved once, after which it no longer exists.

use crate::common::types::{GameKind, Money};
use crate::errors::{CasinoError, CasinoResult, GameError};
use crate::games::types::{CasinoEvent, Outcome};
use crate::ledger::Ledger;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Identifier of an accepted, not yet settled wager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WagerHandle(Uuid);

impl WagerHandle {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for WagerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WagerRequest {
    pub account: String,
    pub game: GameKind,
    pub wager: Money,
}

impl WagerRequest {
    pub fn new(account: impl Into<String>, game: GameKind, wager: Money) -> Self {
        Self {
            account: account.into(),
            game,
            wager,
        }
    }
}

/// Debited stake waiting for its round to resolve
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenWager {
    pub handle: WagerHandle,
    pub account: String,
    pub game: GameKind,
    pub wager: Money,
    pub placed_at: DateTime<Utc>,
}

pub struct SettlementDesk {
    ledger: Arc<Ledger>,
    open: DashMap<WagerHandle, OpenWager>,
}

impl SettlementDesk {
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self {
            ledger,
            open: DashMap::new(),
        }
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    /// Validate and debit the stake. A rejection leaves no trace in the ledger.
    pub fn place_wager(&self, request: WagerRequest) -> CasinoResult<WagerHandle> {
        let debited = if request.wager.is_positive() {
            self.ledger.debit(&request.account, request.wager)
        } else {
            Err(GameError::InvalidWager(format!("wager must be positive, got {}", request.wager)).into())
        };
        if let Err(e) = debited {
            self.reject(&request.account, request.game, &e);
            return Err(e);
        }

        let handle = WagerHandle::new();
        tracing::debug!(%handle, account = %request.account, game = %request.game, wager = %request.wager, "Wager placed");
        self.open.insert(
            handle,
            OpenWager {
                handle,
                account: request.account,
                game: request.game,
                wager: request.wager,
                placed_at: Utc::now(),
            },
        );
        Ok(handle)
    }

    /// Credit `winnings` for `handle` and write its bet record
    pub fn resolve(&self, handle: WagerHandle, winnings: Money) -> CasinoResult<Outcome> {
        if winnings.is_negative() {
            return Err(GameError::InvalidWager(format!("winnings must not be negative, got {}", winnings)).into());
        }
        let (_, wager) = self
            .open
            .remove(&handle)
            .ok_or_else(|| GameError::invalid_state("resolve", format!("wager {} is not open", handle)))?;

        match self
            .ledger
            .settle_bet(&wager.account, wager.game, wager.wager, winnings)
        {
            Ok((balance, record)) => {
                let outcome = Outcome::new(wager.wager, winnings);
                tracing::info!(
                    %handle,
                    account = %wager.account,
                    game = %wager.game,
                    wager = %outcome.wager,
                    winnings = %outcome.winnings,
                    net = %outcome.net,
                    %balance,
                    bet_id = record.id,
                    "Wager settled"
                );
                self.ledger.publish(CasinoEvent::RoundResolved {
                    account: wager.account,
                    game: wager.game,
                    outcome,
                });
                Ok(outcome)
            }
            Err(e) => {
                tracing::warn!(%handle, error = %e, "Settlement failed; wager stays open");
                self.open.insert(handle, wager);
                Err(e)
            }
        }
    }

    /// Publish a rejection for the presentation layer
    pub fn reject(&self, account: &str, game: GameKind, error: &CasinoError) {
        tracing::warn!(account, %game, reason = error.reason_code(), "Wager rejected: {}", error);
        self.ledger.publish(CasinoEvent::BetRejected {
            account: account.to_string(),
            game,
            reason: error.reason_code().to_string(),
        });
    }

    pub fn is_open(&self, handle: &WagerHandle) -> bool {
        self.open.contains_key(handle)
    }

    /// Open wagers for `account`, oldest first, so interrupted rounds can be resumed
    pub fn open_wagers(&self, account: &str) -> Vec<OpenWager> {
        let mut wagers: Vec<OpenWager> = self
            .open
            .iter()
            .filter(|entry| entry.account == account)
            .map(|entry| entry.value().clone())
            .collect();
        wagers.sort_by_key(|w| w.placed_at);
        wagers
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }
}
