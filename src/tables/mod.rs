//! Game tables
//!
//! A table binds one engine to one player's account. It runs the pure transition,
//! moves money through the settlement desk, publishes notifications and only then
//! commits the new round state.

pub mod blackjack;
pub mod crash;
pub mod roulette;

pub use blackjack::BlackjackTable;
pub use crash::CrashTable;
pub use roulette::RouletteTable;

use crate::common::types::GameKind;
use crate::errors::{CasinoError, CasinoResult, GameError};
use crate::games::types::{Outcome, RoundEvent};
use crate::settlement::{SettlementDesk, WagerHandle};

/// Debited wager of the current round
#[derive(Debug, Default)]
pub(crate) struct WagerSlot {
    handle: Option<WagerHandle>,
    /// Outcome the desk has not accepted yet
    unsettled: Option<Outcome>,
}

impl WagerSlot {
    pub(crate) fn hold(&mut self, handle: WagerHandle) {
        self.handle = Some(handle);
        self.unsettled = None;
    }

    pub(crate) fn handle(&self) -> Option<WagerHandle> {
        self.handle
    }

    /// Settle the held wager; on failure the outcome is kept for `retry`
    pub(crate) fn settle(&mut self, desk: &SettlementDesk, outcome: Outcome) -> CasinoResult<Outcome> {
        let handle = self
            .handle
            .ok_or_else(|| GameError::invalid_state("settle", "no wager held"))?;
        match desk.resolve(handle, outcome.winnings) {
            Ok(settled) => {
                self.handle = None;
                self.unsettled = None;
                Ok(settled)
            }
            Err(e) => {
                self.unsettled = Some(outcome);
                Err(e)
            }
        }
    }

    /// Finish a settlement that failed earlier
    pub(crate) fn retry(&mut self, desk: &SettlementDesk) -> CasinoResult<Option<Outcome>> {
        match self.unsettled {
            Some(outcome) => self.settle(desk, outcome).map(Some),
            None => Ok(None),
        }
    }
}

/// Log the engine events of a committed step
pub(crate) fn trace_events(account: &str, game: GameKind, events: &[RoundEvent]) {
    for event in events {
        tracing::debug!(account, %game, ?event, "Round event");
    }
}

/// Publish a rejection and hand the error back
pub(crate) fn rejected(
    desk: &SettlementDesk,
    account: &str,
    game: GameKind,
    error: impl Into<CasinoError>,
) -> CasinoError {
    let error = error.into();
    desk.reject(account, game, &error);
    error
}
