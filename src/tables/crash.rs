use crate::common::types::{GameKind, Money};
use crate::errors::{CasinoResult, GameError};
use crate::games::crash::{CrashBet, CrashRound, CrashSnapshot, CrashTiming};
use crate::games::rng::OutcomeSource;
use crate::games::types::{CasinoEvent, Outcome, RoundEvent};
use crate::games::Step;
use crate::settlement::{SettlementDesk, WagerHandle, WagerRequest};
use crate::tables::{rejected, trace_events, WagerSlot};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

const GAME: GameKind = GameKind::Crash;

pub struct CrashTable {
    account: String,
    desk: Arc<SettlementDesk>,
    source: Box<dyn OutcomeSource>,
    timing: CrashTiming,
    round: CrashRound,
    slot: WagerSlot,
    history: VecDeque<f64>,
    history_len: usize,
}

impl CrashTable {
    pub fn new(
        account: impl Into<String>,
        desk: Arc<SettlementDesk>,
        source: Box<dyn OutcomeSource>,
        timing: CrashTiming,
        history_len: usize,
    ) -> Self {
        Self {
            account: account.into(),
            desk,
            source,
            round: CrashRound::new(1, &timing),
            timing,
            slot: WagerSlot::default(),
            history: VecDeque::with_capacity(history_len),
            history_len,
        }
    }

    pub fn round(&self) -> &CrashRound {
        &self.round
    }

    pub fn snapshot(&self) -> CrashSnapshot {
        CrashSnapshot::new(&self.round, self.history.iter().copied().collect())
    }

    /// Stake a wager for the round that is counting down
    pub fn place_bet(&mut self, wager: Money) -> CasinoResult<CrashSnapshot> {
        self.slot.retry(&self.desk)?;
        let step = self
            .round
            .place_bet(wager)
            .map_err(|e| rejected(&self.desk, &self.account, GAME, e))?;

        let handle = self
            .desk
            .place_wager(WagerRequest::new(self.account.clone(), GAME, wager))?;
        self.slot.hold(handle);
        self.commit(step)?;
        Ok(self.snapshot())
    }

    /// Take the last polled multiplier. A repeat returns the outcome already paid.
    pub fn cash_out(&mut self) -> CasinoResult<Outcome> {
        self.slot.retry(&self.desk)?;
        if let Some(CrashBet {
            cashed_out_at: Some(_),
            settled: Some(settled),
            ..
        }) = self.round.bet
        {
            return Ok(settled);
        }

        let step = self.round.cash_out()?;
        let settlement = step.settlement();
        self.commit(step)?;
        settlement.ok_or_else(|| GameError::invalid_state("cash_out", "nothing to settle").into())
    }

    /// Move the round clock; called by the driver on every poll
    pub fn advance(&mut self, dt: Duration) -> CasinoResult<Vec<RoundEvent>> {
        if let Err(e) = self.slot.retry(&self.desk) {
            tracing::warn!(account = %self.account, error = %e, "Crash settlement retry failed");
        }
        let step = self.round.advance(dt, &self.timing, self.source.as_mut());
        let events = step.events.clone();
        self.commit(step)?;
        Ok(events)
    }

    fn commit(&mut self, step: Step<CrashRound>) -> CasinoResult<()> {
        trace_events(&self.account, GAME, &step.events);
        let settlement = step.settlement();
        self.round = step.state;

        for event in &step.events {
            match *event {
                RoundEvent::CrashedAt { crash_point, .. } => {
                    if self.history.len() == self.history_len {
                        self.history.pop_front();
                    }
                    if self.history_len > 0 {
                        self.history.push_back(crash_point);
                    }
                }
                RoundEvent::PhaseChanged { round, phase } => {
                    tracing::debug!(round, %phase, "Crash phase changed");
                    self.desk.ledger().publish(CasinoEvent::CrashPhase {
                        round,
                        phase,
                        multiplier: self.round.phase.multiplier(),
                    });
                }
                _ => {}
            }
        }

        if let Some(outcome) = settlement {
            self.slot.settle(&self.desk, outcome)?;
        }
        Ok(())
    }

    /// Handle of the wager riding on the current round, if any
    pub fn open_handle(&self) -> Option<WagerHandle> {
        self.slot.handle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::traits::Repository;
    use crate::common::types::{current_timestamp, Account, LogQuery};
    use crate::errors::CasinoError;
    use crate::games::cards::Card;
    use crate::games::types::CrashPhaseKind;
    use crate::ledger::Ledger;
    use crate::memory_store::testing::FlakyRepository;
    use crate::memory_store::MemoryRepository;

    struct FixedCrash(f64);

    impl OutcomeSource for FixedCrash {
        fn next_unit(&mut self) -> f64 {
            0.0
        }
        fn next_pocket(&mut self) -> u8 {
            0
        }
        fn shuffle(&mut self, _cards: &mut [Card]) {}
        fn crash_point(&mut self, _shape: u32, _scale: f64, _floor: f64) -> f64 {
            self.0
        }
    }

    fn table(balance: i64, crash_at: f64, growth_rate: f64) -> CrashTable {
        let repo = Arc::new(MemoryRepository::new());
        repo.insert_account(&Account {
            name: "ana".to_string(),
            password_hash: String::new(),
            balance: Money::from_units(balance),
            referral_code: "ANA001".to_string(),
            created_at: current_timestamp(),
        })
        .unwrap();
        table_on(repo, crash_at, growth_rate)
    }

    fn table_on(repo: Arc<dyn Repository>, crash_at: f64, growth_rate: f64) -> CrashTable {
        let desk = Arc::new(SettlementDesk::new(Arc::new(Ledger::new(repo))));
        let timing = CrashTiming {
            growth_rate,
            ..CrashTiming::default()
        };
        CrashTable::new("ana", desk, Box::new(FixedCrash(crash_at)), timing, 10)
    }

    fn balance(table: &CrashTable) -> Money {
        table.desk.ledger().balance("ana").unwrap()
    }

    fn bets(table: &CrashTable) -> usize {
        table
            .desk
            .ledger()
            .repository()
            .recent_bets(&LogQuery::recent(100))
            .unwrap()
            .len()
    }

    #[test]
    fn test_cash_out_scenario_credits_once() {
        let mut table = table(1000, 2.0, 1.8);
        table.place_bet(Money::from_units(50)).unwrap();
        assert_eq!(balance(&table), Money::from_units(950));

        table.advance(Duration::from_secs(5)).unwrap();
        table.advance(Duration::from_secs(1)).unwrap();
        assert_eq!(table.snapshot().multiplier, 1.8);

        let first = table.cash_out().unwrap();
        assert_eq!(first.winnings, Money::from_units(90));
        let second = table.cash_out().unwrap();
        assert_eq!(second, first);

        assert_eq!(balance(&table), Money::from_units(1040));
        assert_eq!(bets(&table), 1);

        table.advance(Duration::from_secs(1)).unwrap();
        assert_eq!(table.snapshot().phase, CrashPhaseKind::Crashed);
        assert_eq!(balance(&table), Money::from_units(1040));
        assert_eq!(bets(&table), 1);
    }

    #[test]
    fn test_crash_settles_uncashed_bet_as_loss() {
        let mut table = table(100, 1.5, 1.05);
        table.place_bet(Money::from_units(20)).unwrap();

        table.advance(Duration::from_secs(5)).unwrap();
        let events = table.advance(Duration::from_secs(10)).unwrap();
        assert!(events.contains(&RoundEvent::Settled(Outcome::loss(Money::from_units(20)))));

        assert_eq!(balance(&table), Money::from_units(80));
        assert_eq!(bets(&table), 1);
        assert_eq!(table.snapshot().history, vec![1.5]);
        assert!(table.open_handle().is_none());
        assert!(table.cash_out().is_err());
    }

    #[test]
    fn test_bet_only_while_waiting() {
        let mut table = table(100, 3.0, 1.05);
        table.advance(Duration::from_secs(5)).unwrap();

        let err = table.place_bet(Money::from_units(10)).unwrap_err();
        assert!(matches!(err, CasinoError::Game(GameError::InvalidState { .. })));
        assert_eq!(balance(&table), Money::from_units(100));
    }

    #[test]
    fn test_phase_notifications() {
        let mut table = table(100, 1.01, 1.05);
        let mut rx = table.desk.ledger().subscribe();

        table.advance(Duration::from_secs(5)).unwrap();
        table.advance(Duration::from_secs(1)).unwrap();
        table.advance(Duration::from_secs(3)).unwrap();

        let phases: Vec<CrashPhaseKind> = std::iter::from_fn(|| rx.try_recv().ok())
            .filter_map(|event| match event {
                CasinoEvent::CrashPhase { phase, .. } => Some(phase),
                _ => None,
            })
            .collect();
        assert_eq!(
            phases,
            vec![
                CrashPhaseKind::Running,
                CrashPhaseKind::Crashed,
                CrashPhaseKind::Waiting
            ]
        );
        assert_eq!(table.round().round, 2);
    }

    #[test]
    fn test_failed_cash_out_is_paid_once() {
        let repo = FlakyRepository::with_account("ana", Money::from_units(1000));
        let mut table = table_on(repo.clone(), 2.0, 1.8);
        table.place_bet(Money::from_units(50)).unwrap();
        table.advance(Duration::from_secs(5)).unwrap();
        table.advance(Duration::from_secs(1)).unwrap();

        repo.fail_log_writes(1);
        assert!(table.cash_out().is_err());
        assert_eq!(balance(&table), Money::from_units(950));
        assert_eq!(bets(&table), 0);

        let outcome = table.cash_out().unwrap();
        assert_eq!(outcome.winnings, Money::from_units(90));
        assert_eq!(table.cash_out().unwrap(), outcome);
        assert_eq!(balance(&table), Money::from_units(1040));
        assert_eq!(bets(&table), 1);

        table.advance(Duration::from_secs(1)).unwrap();
        assert_eq!(balance(&table), Money::from_units(1040));
        assert_eq!(bets(&table), 1);
    }

    #[test]
    fn test_failed_crash_loss_is_recorded_on_next_poll() {
        let repo = FlakyRepository::with_account("ana", Money::from_units(100));
        let mut table = table_on(repo.clone(), 1.5, 1.05);
        table.place_bet(Money::from_units(20)).unwrap();
        table.advance(Duration::from_secs(5)).unwrap();

        repo.fail_log_writes(1);
        assert!(table.advance(Duration::from_secs(10)).is_err());
        assert_eq!(table.snapshot().phase, CrashPhaseKind::Crashed);
        assert_eq!(bets(&table), 0);
        assert!(table.open_handle().is_some());

        table.advance(Duration::from_millis(10)).unwrap();
        table.advance(Duration::from_millis(10)).unwrap();
        assert_eq!(balance(&table), Money::from_units(80));
        assert_eq!(bets(&table), 1);
        assert!(table.open_handle().is_none());
        assert_eq!(table.desk.open_count(), 0);
    }
}
