//! Blackjack round state machine
//!
//! `Idle -> PlayerTurn -> Resolved`, with a fresh deal allowed from `Idle` or
//! `Resolved`. Transitions borrow the current state and return a new one, so a
//! rejected operation leaves the caller's state untouched.

use crate::common::types::Money;
use crate::errors::GameError;
use crate::games::cards::{Card, Deck, Hand};
use crate::games::types::{Outcome, RoundEvent, Seat};
use crate::games::Step;
use serde::{Deserialize, Serialize};

/// Dealer draws while below this value
pub const DEALER_STANDS_ON: u32 = 17;

/// How a hand ended
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HandResult {
    PlayerBust,
    DealerBust,
    PlayerWins,
    DealerWins,
    Push,
}

impl HandResult {
    /// Gross return for `wager`: a win pays double, a push returns the stake
    pub fn winnings(self, wager: Money) -> Money {
        match self {
            HandResult::DealerBust | HandResult::PlayerWins => wager.times(2),
            HandResult::Push => wager,
            HandResult::PlayerBust | HandResult::DealerWins => Money::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiveHand {
    pub wager: Money,
    pub player: Hand,
    pub dealer: Hand,
    deck: Deck,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedHand {
    pub player: Hand,
    pub dealer: Hand,
    pub result: HandResult,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum BlackjackRound {
    #[default]
    Idle,
    PlayerTurn(LiveHand),
    Resolved(ResolvedHand),
}

impl BlackjackRound {
    pub fn state_name(&self) -> &'static str {
        match self {
            BlackjackRound::Idle => "idle",
            BlackjackRound::PlayerTurn(_) => "player_turn",
            BlackjackRound::Resolved(_) => "resolved",
        }
    }

    /// Whether a wager is live on the table
    pub fn is_live(&self) -> bool {
        matches!(self, BlackjackRound::PlayerTurn(_))
    }

    /// Checks `deal` runs before touching the deck
    pub fn can_deal(&self, wager: Money) -> Result<(), GameError> {
        if self.is_live() {
            return Err(GameError::invalid_state("deal", self.state_name()));
        }
        if !wager.is_positive() {
            return Err(GameError::InvalidWager(format!("wager must be positive, got {}", wager)));
        }
        Ok(())
    }

    /// Start a hand with `deck`; a natural 21 stands immediately
    pub fn deal(&self, wager: Money, mut deck: Deck) -> Result<Step<BlackjackRound>, GameError> {
        self.can_deal(wager)?;

        let mut events = vec![RoundEvent::WagerAccepted { wager }];
        let mut player = Hand::new();
        let mut dealer = Hand::new();
        for seat in [Seat::Player, Seat::Player, Seat::Dealer, Seat::Dealer] {
            let card = draw(&mut deck)?;
            match seat {
                Seat::Player => player.push(card),
                Seat::Dealer => dealer.push(card),
            }
            events.push(RoundEvent::CardDrawn { seat, card });
        }

        let live = LiveHand {
            wager,
            player,
            dealer,
            deck,
        };
        if live.player.value() == 21 {
            return finish_with_dealer(live, events);
        }

        Ok(Step::with_events(BlackjackRound::PlayerTurn(live), events))
    }

    /// Draw one card for the player; a bust resolves as a loss
    pub fn hit(&self) -> Result<Step<BlackjackRound>, GameError> {
        let mut live = match self {
            BlackjackRound::PlayerTurn(live) => live.clone(),
            other => return Err(GameError::invalid_state("hit", other.state_name())),
        };

        let card = draw(&mut live.deck)?;
        live.player.push(card);
        let mut events = vec![RoundEvent::CardDrawn {
            seat: Seat::Player,
            card,
        }];

        if live.player.is_bust() {
            let resolved = resolve(live, HandResult::PlayerBust);
            events.push(RoundEvent::Settled(resolved.outcome));
            return Ok(Step::with_events(BlackjackRound::Resolved(resolved), events));
        }

        Ok(Step::with_events(BlackjackRound::PlayerTurn(live), events))
    }

    /// Play out the dealer and settle
    pub fn stand(&self) -> Result<Step<BlackjackRound>, GameError> {
        match self {
            BlackjackRound::PlayerTurn(live) => finish_with_dealer(live.clone(), Vec::new()),
            other => Err(GameError::invalid_state("stand", other.state_name())),
        }
    }

    /// Clear a finished hand
    pub fn reset(&self) -> Result<Step<BlackjackRound>, GameError> {
        match self {
            BlackjackRound::PlayerTurn(_) => Err(GameError::invalid_state("reset", self.state_name())),
            _ => Ok(Step::new(BlackjackRound::Idle)),
        }
    }
}

fn draw(deck: &mut Deck) -> Result<Card, GameError> {
    deck.draw()
        .ok_or_else(|| GameError::invalid_state("draw", "deck exhausted"))
}

fn finish_with_dealer(
    mut live: LiveHand,
    mut events: Vec<RoundEvent>,
) -> Result<Step<BlackjackRound>, GameError> {
    while live.dealer.value() < DEALER_STANDS_ON {
        let card = draw(&mut live.deck)?;
        live.dealer.push(card);
        events.push(RoundEvent::CardDrawn {
            seat: Seat::Dealer,
            card,
        });
    }

    let player = live.player.value();
    let dealer = live.dealer.value();
    let result = if dealer > 21 {
        HandResult::DealerBust
    } else if player > dealer {
        HandResult::PlayerWins
    } else if player < dealer {
        HandResult::DealerWins
    } else {
        HandResult::Push
    };

    let resolved = resolve(live, result);
    events.push(RoundEvent::Settled(resolved.outcome));
    Ok(Step::with_events(BlackjackRound::Resolved(resolved), events))
}

fn resolve(live: LiveHand, result: HandResult) -> ResolvedHand {
    ResolvedHand {
        outcome: Outcome::new(live.wager, result.winnings(live.wager)),
        player: live.player,
        dealer: live.dealer,
        result,
    }
}

/// Read-only view for the presentation layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlackjackSnapshot {
    pub state: String,
    pub wager: Option<Money>,
    pub player: Vec<Card>,
    pub player_value: u32,
    /// Only the up card while the player is acting
    pub dealer: Vec<Card>,
    pub dealer_value: Option<u32>,
    pub result: Option<HandResult>,
    pub outcome: Option<Outcome>,
}

impl From<&BlackjackRound> for BlackjackSnapshot {
    fn from(round: &BlackjackRound) -> Self {
        match round {
            BlackjackRound::Idle => Self {
                state: round.state_name().to_string(),
                wager: None,
                player: Vec::new(),
                player_value: 0,
                dealer: Vec::new(),
                dealer_value: None,
                result: None,
                outcome: None,
            },
            BlackjackRound::PlayerTurn(live) => Self {
                state: round.state_name().to_string(),
                wager: Some(live.wager),
                player: live.player.cards().to_vec(),
                player_value: live.player.value(),
                dealer: live.dealer.cards().iter().take(1).copied().collect(),
                dealer_value: None,
                result: None,
                outcome: None,
            },
            BlackjackRound::Resolved(done) => Self {
                state: round.state_name().to_string(),
                wager: Some(done.outcome.wager),
                player: done.player.cards().to_vec(),
                player_value: done.player.value(),
                dealer: done.dealer.cards().to_vec(),
                dealer_value: Some(done.dealer.value()),
                result: Some(done.result),
                outcome: Some(done.outcome),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::cards::{Rank, Suit};

    fn cards(ranks: &[Rank]) -> Vec<Card> {
        ranks.iter().map(|&r| Card::new(r, Suit::Hearts)).collect()
    }

    fn deck(ranks: &[Rank]) -> Deck {
        Deck::stacked(cards(ranks))
    }

    fn hundred() -> Money {
        Money::from_units(100)
    }

    #[test]
    fn test_natural_resolves_on_deal() {
        let step = BlackjackRound::Idle
            .deal(hundred(), deck(&[Rank::Ace, Rank::King, Rank::Nine, Rank::Eight]))
            .unwrap();

        let outcome = step.settlement().unwrap();
        assert_eq!(outcome.winnings, Money::from_units(200));
        assert_eq!(outcome.net, hundred());
        match step.state {
            BlackjackRound::Resolved(done) => assert_eq!(done.result, HandResult::PlayerWins),
            other => panic!("unexpected state {:?}", other),
        }
    }

    #[test]
    fn test_natural_against_dealer_21_pushes() {
        let step = BlackjackRound::Idle
            .deal(hundred(), deck(&[Rank::Ace, Rank::King, Rank::Ace, Rank::Queen]))
            .unwrap();
        assert_eq!(step.settlement().unwrap().winnings, hundred());
    }

    #[test]
    fn test_hit_bust_is_a_loss() {
        let dealt = BlackjackRound::Idle
            .deal(
                hundred(),
                deck(&[Rank::King, Rank::Six, Rank::Nine, Rank::Eight, Rank::Queen]),
            )
            .unwrap();
        assert!(dealt.settlement().is_none());
        assert!(dealt.state.is_live());

        let busted = dealt.state.hit().unwrap();
        let outcome = busted.settlement().unwrap();
        assert_eq!(outcome.winnings, Money::ZERO);
        assert_eq!(outcome.net, Money::from_units(-100));
        assert_eq!(busted.state.state_name(), "resolved");
    }

    #[test]
    fn test_dealer_draws_to_17() {
        // player 19, dealer 10+2 then draws 3 then 5 -> 20
        let dealt = BlackjackRound::Idle
            .deal(
                hundred(),
                deck(&[Rank::King, Rank::Nine, Rank::Ten, Rank::Two, Rank::Three, Rank::Five]),
            )
            .unwrap();
        let stood = dealt.state.stand().unwrap();

        match &stood.state {
            BlackjackRound::Resolved(done) => {
                assert_eq!(done.dealer.value(), 20);
                assert_eq!(done.result, HandResult::DealerWins);
            }
            other => panic!("unexpected state {:?}", other),
        }
        assert_eq!(stood.settlement().unwrap().winnings, Money::ZERO);
    }

    #[test]
    fn test_dealer_bust_pays_double() {
        let dealt = BlackjackRound::Idle
            .deal(
                hundred(),
                deck(&[Rank::Two, Rank::Three, Rank::King, Rank::Six, Rank::Nine]),
            )
            .unwrap();
        let stood = dealt.state.stand().unwrap();
        assert_eq!(stood.settlement().unwrap().winnings, Money::from_units(200));
    }

    #[test]
    fn test_equal_totals_push() {
        let dealt = BlackjackRound::Idle
            .deal(
                hundred(),
                deck(&[Rank::King, Rank::Eight, Rank::Queen, Rank::Eight]),
            )
            .unwrap();
        let stood = dealt.state.stand().unwrap();
        assert_eq!(stood.settlement().unwrap().winnings, hundred());
    }

    #[test]
    fn test_operations_outside_player_turn_are_rejected() {
        assert!(matches!(
            BlackjackRound::Idle.hit(),
            Err(GameError::InvalidState { operation: "hit", .. })
        ));

        let dealt = BlackjackRound::Idle
            .deal(hundred(), deck(&[Rank::King, Rank::Eight, Rank::Queen, Rank::Eight]))
            .unwrap();
        let stood = dealt.state.stand().unwrap();
        assert!(matches!(
            stood.state.stand(),
            Err(GameError::InvalidState { operation: "stand", .. })
        ));
        assert!(dealt.state.deal(hundred(), deck(&[])).is_err());
    }

    #[test]
    fn test_non_positive_wager_rejected() {
        let result = BlackjackRound::Idle.deal(Money::ZERO, deck(&[Rank::Two; 4]));
        assert!(matches!(result, Err(GameError::InvalidWager(_))));
    }

    #[test]
    fn test_snapshot_hides_hole_card() {
        let dealt = BlackjackRound::Idle
            .deal(
                hundred(),
                deck(&[Rank::King, Rank::Six, Rank::Nine, Rank::Eight]),
            )
            .unwrap();
        let live = BlackjackSnapshot::from(&dealt.state);
        assert_eq!(live.dealer.len(), 1);
        assert_eq!(live.dealer_value, None);

        let done = BlackjackSnapshot::from(&dealt.state.stand().unwrap().state);
        assert_eq!(done.dealer.len(), 2);
        assert_eq!(done.dealer_value, Some(17));
    }
}
