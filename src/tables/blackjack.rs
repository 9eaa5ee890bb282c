use crate::common::types::{GameKind, Money};
use crate::errors::{CasinoResult, GameError};
use crate::games::blackjack::{BlackjackRound, BlackjackSnapshot};
use crate::games::cards::Deck;
use crate::games::rng::OutcomeSource;
use crate::games::Step;
use crate::settlement::{SettlementDesk, WagerRequest};
use crate::tables::{rejected, trace_events, WagerSlot};
use std::sync::Arc;

const GAME: GameKind = GameKind::Blackjack;

pub struct BlackjackTable {
    account: String,
    desk: Arc<SettlementDesk>,
    source: Box<dyn OutcomeSource>,
    round: BlackjackRound,
    slot: WagerSlot,
}

impl BlackjackTable {
    pub fn new(account: impl Into<String>, desk: Arc<SettlementDesk>, source: Box<dyn OutcomeSource>) -> Self {
        Self {
            account: account.into(),
            desk,
            source,
            round: BlackjackRound::Idle,
            slot: WagerSlot::default(),
        }
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn round(&self) -> &BlackjackRound {
        &self.round
    }

    pub fn snapshot(&self) -> BlackjackSnapshot {
        BlackjackSnapshot::from(&self.round)
    }

    /// Debit `wager` and deal from a freshly shuffled deck.
    ///
    /// A rejected deal draws nothing from the source.
    pub fn deal(&mut self, wager: Money) -> CasinoResult<BlackjackSnapshot> {
        self.slot.retry(&self.desk)?;
        self.round
            .can_deal(wager)
            .map_err(|e| rejected(&self.desk, &self.account, GAME, e))?;
        let available = self.desk.ledger().balance(&self.account)?;
        if wager > available {
            return Err(rejected(
                &self.desk,
                &self.account,
                GAME,
                GameError::InsufficientFunds {
                    requested: wager,
                    available,
                },
            ));
        }

        let deck = Deck::shuffled(self.source.as_mut());
        self.deal_with_deck(wager, deck)
    }

    /// Deal from a prepared deck, for replays
    pub fn deal_with_deck(&mut self, wager: Money, deck: Deck) -> CasinoResult<BlackjackSnapshot> {
        self.slot.retry(&self.desk)?;
        let step = self
            .round
            .deal(wager, deck)
            .map_err(|e| rejected(&self.desk, &self.account, GAME, e))?;

        let handle = self
            .desk
            .place_wager(WagerRequest::new(self.account.clone(), GAME, wager))?;
        self.slot.hold(handle);
        self.commit(step)
    }

    pub fn hit(&mut self) -> CasinoResult<BlackjackSnapshot> {
        let step = self.round.hit()?;
        self.commit(step)
    }

    /// Dealer plays out; a repeated stand fails without touching the ledger
    pub fn stand(&mut self) -> CasinoResult<BlackjackSnapshot> {
        let step = self.round.stand()?;
        self.commit(step)
    }

    pub fn reset(&mut self) -> CasinoResult<BlackjackSnapshot> {
        self.slot.retry(&self.desk)?;
        let step = self.round.reset()?;
        self.commit(step)
    }

    fn commit(&mut self, step: Step<BlackjackRound>) -> CasinoResult<BlackjackSnapshot> {
        trace_events(&self.account, GAME, &step.events);
        let settlement = step.settlement();
        self.round = step.state;
        if let Some(outcome) = settlement {
            self.slot.settle(&self.desk, outcome)?;
        }
        Ok(self.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::traits::Repository;
    use crate::common::types::{current_timestamp, Account, LogQuery};
    use crate::errors::{CasinoError, GameError};
    use crate::games::blackjack::HandResult;
    use crate::games::cards::{Card, Rank, Suit};
    use crate::games::rng::GameRng;
    use crate::ledger::Ledger;
    use crate::memory_store::testing::FlakyRepository;
    use crate::memory_store::MemoryRepository;

    fn table(balance: i64) -> BlackjackTable {
        let repo = Arc::new(MemoryRepository::new());
        repo.insert_account(&Account {
            name: "ana".to_string(),
            password_hash: String::new(),
            balance: Money::from_units(balance),
            referral_code: "ANA001".to_string(),
            created_at: current_timestamp(),
        })
        .unwrap();
        let desk = Arc::new(SettlementDesk::new(Arc::new(Ledger::new(repo))));
        BlackjackTable::new("ana", desk, Box::new(GameRng::seeded(5)))
    }

    fn deck(ranks: &[Rank]) -> Deck {
        Deck::stacked(ranks.iter().map(|&r| Card::new(r, Suit::Clubs)).collect())
    }

    fn balance(table: &BlackjackTable) -> Money {
        table.desk.ledger().balance("ana").unwrap()
    }

    fn bet_count(table: &BlackjackTable) -> usize {
        table
            .desk
            .ledger()
            .repository()
            .recent_bets(&LogQuery::recent(100))
            .unwrap()
            .len()
    }

    #[test]
    fn test_natural_scenario() {
        let mut table = table(1000);
        let snap = table
            .deal_with_deck(
                Money::from_units(100),
                deck(&[Rank::Ace, Rank::King, Rank::Seven, Rank::Queen]),
            )
            .unwrap();

        assert_eq!(snap.result, Some(HandResult::PlayerWins));
        assert_eq!(snap.outcome.unwrap().winnings, Money::from_units(200));
        assert_eq!(balance(&table), Money::from_units(1100));
        assert_eq!(bet_count(&table), 1);
    }

    #[test]
    fn test_stake_debited_on_deal() {
        let mut table = table(1000);
        table
            .deal_with_deck(
                Money::from_units(100),
                deck(&[Rank::Ten, Rank::Six, Rank::Nine, Rank::Nine]),
            )
            .unwrap();
        assert_eq!(balance(&table), Money::from_units(900));
        assert_eq!(table.desk.open_count(), 1);
    }

    #[test]
    fn test_duplicate_stand_settles_once() {
        let mut table = table(1000);
        table
            .deal_with_deck(
                Money::from_units(100),
                deck(&[Rank::Ten, Rank::Nine, Rank::Nine, Rank::Eight]),
            )
            .unwrap();

        let snap = table.stand().unwrap();
        assert_eq!(snap.result, Some(HandResult::PlayerWins));
        assert_eq!(balance(&table), Money::from_units(1100));

        assert!(matches!(
            table.stand(),
            Err(CasinoError::Game(GameError::InvalidState { .. }))
        ));
        assert_eq!(balance(&table), Money::from_units(1100));
        assert_eq!(bet_count(&table), 1);
    }

    #[test]
    fn test_rejected_deal_leaves_table_idle() {
        let mut table = table(50);
        let err = table.deal(Money::from_units(100)).unwrap_err();
        assert!(matches!(err, CasinoError::Game(GameError::InsufficientFunds { .. })));
        assert_eq!(table.round(), &BlackjackRound::Idle);
        assert_eq!(balance(&table), Money::from_units(50));

        assert!(table.deal(Money::ZERO).is_err());
        assert_eq!(bet_count(&table), 0);
    }

    #[test]
    fn test_random_hands_conserve_money() {
        let mut table = table(1000);
        for _ in 0..50 {
            let snap = table.deal(Money::from_units(10)).unwrap();
            if snap.result.is_none() {
                table.stand().unwrap();
            }
        }

        let bets = table
            .desk
            .ledger()
            .repository()
            .recent_bets(&LogQuery::recent(100))
            .unwrap();
        assert_eq!(bets.len(), 50);
        let net: Money = bets.iter().map(|b| b.outcome).sum();
        assert_eq!(balance(&table), Money::from_units(1000) + net);
        assert_eq!(table.desk.open_count(), 0);
    }

    #[test]
    fn test_rejected_deal_keeps_seeded_sequence() {
        let mut replay = table(1000);
        let mut rejected_first = table(1000);

        assert!(rejected_first.deal(Money::ZERO).is_err());
        assert!(rejected_first.deal(Money::from_units(5000)).is_err());

        let a = replay.deal(Money::from_units(10)).unwrap();
        let b = rejected_first.deal(Money::from_units(10)).unwrap();
        assert_eq!(a.player, b.player);
        assert_eq!(a.dealer, b.dealer);
    }

    #[test]
    fn test_failed_settlement_is_paid_once_on_next_action() {
        let repo = FlakyRepository::with_account("ana", Money::from_units(1000));
        let desk = Arc::new(SettlementDesk::new(Arc::new(Ledger::new(repo.clone()))));
        let mut table = BlackjackTable::new("ana", desk, Box::new(GameRng::seeded(5)));

        table
            .deal_with_deck(
                Money::from_units(100),
                deck(&[Rank::Ten, Rank::Nine, Rank::Ten, Rank::Seven]),
            )
            .unwrap();
        repo.fail_log_writes(1);
        assert!(table.stand().is_err());
        assert_eq!(balance(&table), Money::from_units(900));
        assert_eq!(bet_count(&table), 0);
        assert_eq!(table.desk.open_count(), 1);

        table.reset().unwrap();
        assert_eq!(balance(&table), Money::from_units(1100));
        assert_eq!(bet_count(&table), 1);
        assert_eq!(table.desk.open_count(), 0);
        assert_eq!(table.round(), &BlackjackRound::Idle);
    }
}
