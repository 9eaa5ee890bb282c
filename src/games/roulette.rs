//! Roulette bet slip and wheel resolution

use crate::common::types::Money;
use crate::errors::GameError;
use crate::games::rng::POCKETS;
use crate::games::types::{Outcome, RoundEvent};
use crate::games::Step;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Return multiple of every even-money bet
pub const EVEN_MONEY_MULTIPLE: i64 = 2;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Black,
    Green,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    Even,
    Odd,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Range {
    /// 1-18
    Low,
    /// 19-36
    High,
}

/// What a slip entry is riding on
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", content = "target", rename_all = "lowercase")]
pub enum BetKind {
    Number(u8),
    Color(Color),
    Parity(Parity),
    Range(Range),
}

impl fmt::Display for BetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BetKind::Number(n) => write!(f, "number {}", n),
            BetKind::Color(c) => write!(f, "color {:?}", c),
            BetKind::Parity(p) => write!(f, "parity {:?}", p),
            BetKind::Range(r) => write!(f, "range {:?}", r),
        }
    }
}

/// 0 is green; on 1-36 odd pockets are red and even pockets black
pub fn pocket_color(pocket: u8) -> Color {
    match pocket {
        0 => Color::Green,
        n if n % 2 == 1 => Color::Red,
        _ => Color::Black,
    }
}

impl BetKind {
    fn validate(&self) -> Result<(), GameError> {
        match self {
            BetKind::Number(n) if *n >= POCKETS => Err(GameError::InvalidWager(format!(
                "number {} is not on the wheel",
                n
            ))),
            BetKind::Color(Color::Green) => Err(GameError::InvalidWager(
                "green is only reachable as a number bet on 0".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Whether this bet wins on `pocket`; 0 loses every outside bet
    pub fn wins(&self, pocket: u8) -> bool {
        match *self {
            BetKind::Number(n) => n == pocket,
            BetKind::Color(color) => pocket_color(pocket) == color,
            BetKind::Parity(_) | BetKind::Range(_) if pocket == 0 => false,
            BetKind::Parity(Parity::Even) => pocket % 2 == 0,
            BetKind::Parity(Parity::Odd) => pocket % 2 == 1,
            BetKind::Range(Range::Low) => pocket <= 18,
            BetKind::Range(Range::High) => pocket >= 19,
        }
    }

    /// Total return multiple of a winning bet
    pub fn multiple(&self, straight_payout: u32) -> i64 {
        match self {
            BetKind::Number(_) => i64::from(straight_payout),
            _ => EVEN_MONEY_MULTIPLE,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RouletteBet {
    pub kind: BetKind,
    pub stake: Money,
}

/// Resolved wheel result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RouletteSpin {
    pub pocket: u8,
    pub color: Color,
    pub bets: Vec<RouletteBet>,
    pub straight_payout: u32,
    pub outcome: Outcome,
}

/// Open slip plus the most recent spin
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouletteRound {
    slip: Vec<RouletteBet>,
    last_spin: Option<RouletteSpin>,
}

impl RouletteRound {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slip(&self) -> &[RouletteBet] {
        &self.slip
    }

    pub fn last_spin(&self) -> Option<&RouletteSpin> {
        self.last_spin.as_ref()
    }

    pub fn total_stake(&self) -> Money {
        self.slip.iter().map(|bet| bet.stake).sum()
    }

    /// Append a bet, checked against `balance` minus what the slip already holds
    pub fn add_bet(&self, bet: RouletteBet, balance: Money) -> Result<Step<RouletteRound>, GameError> {
        bet.kind.validate()?;
        if !bet.stake.is_positive() {
            return Err(GameError::InvalidWager(format!(
                "stake must be positive, got {}",
                bet.stake
            )));
        }

        let available = balance - self.total_stake();
        if bet.stake > available {
            return Err(GameError::InsufficientFunds {
                requested: bet.stake,
                available,
            });
        }

        let mut next = self.clone();
        next.slip.push(bet);
        Ok(Step::new(next))
    }

    pub fn clear_bets(&self) -> Step<RouletteRound> {
        Step::new(Self {
            slip: Vec::new(),
            last_spin: self.last_spin.clone(),
        })
    }

    /// Resolve the slip against `pocket`, settling once for the whole slip
    pub fn spin(&self, pocket: u8, straight_payout: u32) -> Result<Step<RouletteRound>, GameError> {
        if self.slip.is_empty() {
            return Err(GameError::InvalidWager("no bets on the slip".to_string()));
        }
        if pocket >= POCKETS {
            return Err(GameError::invalid_state("spin", format!("pocket {} off the wheel", pocket)));
        }

        let wager = self.total_stake();
        let winnings: Money = self
            .slip
            .iter()
            .filter(|bet| bet.kind.wins(pocket))
            .map(|bet| bet.stake.times(bet.kind.multiple(straight_payout)))
            .sum();
        let outcome = Outcome::new(wager, winnings);

        let spin = RouletteSpin {
            pocket,
            color: pocket_color(pocket),
            bets: self.slip.clone(),
            straight_payout,
            outcome,
        };

        Ok(Step::with_events(
            RouletteRound {
                slip: Vec::new(),
                last_spin: Some(spin),
            },
            vec![
                RoundEvent::WagerAccepted { wager },
                RoundEvent::WheelStopped { pocket },
                RoundEvent::Settled(outcome),
            ],
        ))
    }
}
