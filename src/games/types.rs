use crate::common::types::{GameKind, Money};
use crate::games::cards::Card;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Settled result of one wager
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Outcome {
    pub wager: Money,
    /// Gross amount returned to the account, never negative
    pub winnings: Money,
    /// `winnings - wager`
    pub net: Money,
}

impl Outcome {
    pub fn new(wager: Money, winnings: Money) -> Self {
        Self {
            wager,
            winnings,
            net: winnings - wager,
        }
    }

    pub fn loss(wager: Money) -> Self {
        Self::new(wager, Money::ZERO)
    }
}

/// Blackjack seat a card was dealt to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Seat {
    Player,
    Dealer,
}

/// Crash round phase without its clock data
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CrashPhaseKind {
    Waiting,
    Running,
    Crashed,
}

impl fmt::Display for CrashPhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrashPhaseKind::Waiting => write!(f, "waiting"),
            CrashPhaseKind::Running => write!(f, "running"),
            CrashPhaseKind::Crashed => write!(f, "crashed"),
        }
    }
}

/// Event emitted by a pure round transition
#[derive(Debug, Clone, PartialEq)]
pub enum RoundEvent {
    WagerAccepted { wager: Money },
    CardDrawn { seat: Seat, card: Card },
    WheelStopped { pocket: u8 },
    CountdownTick { remaining: u32 },
    PhaseChanged { round: u64, phase: CrashPhaseKind },
    CrashedAt { round: u64, crash_point: f64 },
    /// The round produced its one settlement
    Settled(Outcome),
}

/// Notification published to the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CasinoEvent {
    BalanceChanged {
        account: String,
        delta: Money,
        balance: Money,
    },
    RoundResolved {
        account: String,
        game: GameKind,
        outcome: Outcome,
    },
    BetRejected {
        account: String,
        game: GameKind,
        reason: String,
    },
    CrashPhase {
        round: u64,
        phase: CrashPhaseKind,
        multiplier: f64,
    },
}
