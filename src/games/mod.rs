//! Game engines
//!
//! Each engine is a tagged round state with pure transitions. A transition never
//! touches the ledger; it returns the next state and the events it produced, and
//! the table layer settles any [`RoundEvent::Settled`] through the settlement desk.

pub mod blackjack;
pub mod cards;
pub mod crash;
pub mod rng;
pub mod roulette;
pub mod types;

pub use blackjack::{BlackjackRound, HandResult};
pub use cards::{Card, Deck, Hand, Rank, Suit};
pub use crash::{CrashPhase, CrashRound, CrashTiming};
pub use rng::{GameRng, OutcomeSource};
pub use roulette::{BetKind, Color, RouletteBet, RouletteRound, RouletteSpin};
pub use types::*;

/// Result of a pure round transition
#[derive(Debug, Clone)]
pub struct Step<S> {
    pub state: S,
    pub events: Vec<RoundEvent>,
}

impl<S> Step<S> {
    pub fn new(state: S) -> Self {
        Self {
            state,
            events: Vec::new(),
        }
    }

    pub fn with_events(state: S, events: Vec<RoundEvent>) -> Self {
        Self { state, events }
    }

    /// The settlement this transition produced, if any
    pub fn settlement(&self) -> Option<Outcome> {
        self.events.iter().find_map(|event| match event {
            RoundEvent::Settled(outcome) => Some(*outcome),
            _ => None,
        })
    }
}
