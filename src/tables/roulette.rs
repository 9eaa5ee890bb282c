use crate::common::types::{GameKind, Money};
use crate::errors::{CasinoResult, GameError};
use crate::games::rng::OutcomeSource;
use crate::games::roulette::{BetKind, RouletteBet, RouletteRound, RouletteSpin};
use crate::settings::GameSettings;
use crate::settlement::{SettlementDesk, WagerRequest};
use crate::tables::{rejected, trace_events, WagerSlot};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;

const GAME: GameKind = GameKind::Roulette;

/// Read-only view for the presentation layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RouletteSnapshot {
    pub slip: Vec<RouletteBet>,
    pub total_stake: Money,
    pub last_spin: Option<RouletteSpin>,
    /// Winning pockets, oldest first
    pub history: Vec<u8>,
}

pub struct RouletteTable {
    account: String,
    desk: Arc<SettlementDesk>,
    settings: GameSettings,
    source: Box<dyn OutcomeSource>,
    round: RouletteRound,
    slot: WagerSlot,
    history: VecDeque<u8>,
    history_len: usize,
}

impl RouletteTable {
    pub fn new(
        account: impl Into<String>,
        desk: Arc<SettlementDesk>,
        settings: GameSettings,
        source: Box<dyn OutcomeSource>,
        history_len: usize,
    ) -> Self {
        Self {
            account: account.into(),
            desk,
            settings,
            source,
            round: RouletteRound::new(),
            slot: WagerSlot::default(),
            history: VecDeque::with_capacity(history_len),
            history_len,
        }
    }

    pub fn snapshot(&self) -> RouletteSnapshot {
        RouletteSnapshot {
            slip: self.round.slip().to_vec(),
            total_stake: self.round.total_stake(),
            last_spin: self.round.last_spin().cloned(),
            history: self.history.iter().copied().collect(),
        }
    }

    /// Add a bet to the slip; nothing is debited until the spin
    pub fn add_bet(&mut self, kind: BetKind, stake: Money) -> CasinoResult<RouletteSnapshot> {
        let balance = self.desk.ledger().balance(&self.account)?;
        let step = self
            .round
            .add_bet(RouletteBet { kind, stake }, balance)
            .map_err(|e| rejected(&self.desk, &self.account, GAME, e))?;
        self.round = step.state;
        tracing::debug!(account = %self.account, %kind, %stake, "Roulette bet added");
        Ok(self.snapshot())
    }

    pub fn clear_bets(&mut self) -> RouletteSnapshot {
        self.round = self.round.clear_bets().state;
        self.snapshot()
    }

    /// Spin the wheel with the injected source
    pub fn spin(&mut self) -> CasinoResult<RouletteSpin> {
        let pocket = self.source.next_pocket();
        self.spin_to(pocket)
    }

    /// Resolve the slip against a known pocket, for replays
    pub fn spin_to(&mut self, pocket: u8) -> CasinoResult<RouletteSpin> {
        self.slot.retry(&self.desk)?;
        let payout = self.settings.straight_payout()?;
        let step = self
            .round
            .spin(pocket, payout)
            .map_err(|e| rejected(&self.desk, &self.account, GAME, e))?;

        let handle = self.desk.place_wager(WagerRequest::new(
            self.account.clone(),
            GAME,
            self.round.total_stake(),
        ))?;
        self.slot.hold(handle);

        trace_events(&self.account, GAME, &step.events);
        let settlement = step.settlement();
        self.round = step.state;
        if self.history.len() == self.history_len {
            self.history.pop_front();
        }
        if self.history_len > 0 {
            self.history.push_back(pocket);
        }
        if let Some(outcome) = settlement {
            self.slot.settle(&self.desk, outcome)?;
        }

        self.round
            .last_spin()
            .cloned()
            .ok_or_else(|| GameError::invalid_state("spin", "no spin recorded").into())
    }
}
