//! Crash round lifecycle
//!
//! `Waiting` counts down, `Running` grows the multiplier as `growth_rate^seconds`
//! until it reaches the crash point, `Crashed` pauses and then a new round begins.
//! The round is advanced by explicit `advance(dt)` calls; nothing here reads a clock.

use crate::common::types::Money;
use crate::config::CrashConfig;
use crate::errors::GameError;
use crate::games::rng::OutcomeSource;
use crate::games::types::{CrashPhaseKind, Outcome, RoundEvent};
use crate::games::Step;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Round timing and curve parameters
#[derive(Debug, Clone, PartialEq)]
pub struct CrashTiming {
    pub countdown_ticks: u32,
    pub tick: Duration,
    pub crash_pause: Duration,
    pub growth_rate: f64,
    pub gamma_shape: u32,
    pub gamma_scale: f64,
    pub min_crash_point: f64,
}

impl Default for CrashTiming {
    fn default() -> Self {
        Self::from(&CrashConfig::default())
    }
}

impl From<&CrashConfig> for CrashTiming {
    fn from(config: &CrashConfig) -> Self {
        Self {
            countdown_ticks: config.countdown_ticks,
            tick: config.tick(),
            crash_pause: config.crash_pause(),
            growth_rate: config.growth_rate,
            gamma_shape: config.gamma_shape,
            gamma_scale: config.gamma_scale,
            min_crash_point: config.min_crash_point,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CrashPhase {
    Waiting {
        ticks_left: u32,
        into_tick: Duration,
    },
    Running {
        crash_point: f64,
        elapsed: Duration,
        multiplier: f64,
    },
    Crashed {
        crash_point: f64,
        since: Duration,
    },
}

impl CrashPhase {
    pub fn kind(&self) -> CrashPhaseKind {
        match self {
            CrashPhase::Waiting { .. } => CrashPhaseKind::Waiting,
            CrashPhase::Running { .. } => CrashPhaseKind::Running,
            CrashPhase::Crashed { .. } => CrashPhaseKind::Crashed,
        }
    }

    /// Displayed multiplier; frozen at the crash point once crashed
    pub fn multiplier(&self) -> f64 {
        match *self {
            CrashPhase::Waiting { .. } => 1.0,
            CrashPhase::Running { multiplier, .. } => multiplier,
            CrashPhase::Crashed { crash_point, .. } => crash_point,
        }
    }
}

/// The one bet a participant may hold in a round
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CrashBet {
    pub wager: Money,
    /// Multiplier at cash-out, if the player got out
    pub cashed_out_at: Option<f64>,
    /// Set exactly once, by cash-out or by the crash
    pub settled: Option<Outcome>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrashRound {
    pub round: u64,
    pub phase: CrashPhase,
    pub bet: Option<CrashBet>,
}

impl CrashRound {
    /// Round `round` at the start of its countdown
    pub fn new(round: u64, timing: &CrashTiming) -> Self {
        Self {
            round,
            phase: CrashPhase::Waiting {
                ticks_left: timing.countdown_ticks,
                into_tick: Duration::ZERO,
            },
            bet: None,
        }
    }

    pub fn state_name(&self) -> String {
        self.phase.kind().to_string()
    }

    /// Open bet that has not been settled yet
    pub fn active_bet(&self) -> Option<&CrashBet> {
        self.bet.as_ref().filter(|bet| bet.settled.is_none())
    }

    /// Stake a wager during the countdown; once per round
    pub fn place_bet(&self, wager: Money) -> Result<Step<CrashRound>, GameError> {
        if !matches!(self.phase, CrashPhase::Waiting { .. }) {
            return Err(GameError::invalid_state("place_bet", self.state_name()));
        }
        if self.bet.is_some() {
            return Err(GameError::invalid_state("place_bet", "bet already placed this round"));
        }
        if !wager.is_positive() {
            return Err(GameError::InvalidWager(format!("wager must be positive, got {}", wager)));
        }

        let mut next = self.clone();
        next.bet = Some(CrashBet {
            wager,
            cashed_out_at: None,
            settled: None,
        });
        Ok(Step::with_events(next, vec![RoundEvent::WagerAccepted { wager }]))
    }

    /// Take the current multiplier. A repeat call is a no-op with no events.
    pub fn cash_out(&self) -> Result<Step<CrashRound>, GameError> {
        let multiplier = match self.phase {
            CrashPhase::Running { multiplier, .. } => multiplier,
            _ => return Err(GameError::invalid_state("cash_out", self.state_name())),
        };
        let bet = match self.bet {
            Some(bet) => bet,
            None => return Err(GameError::invalid_state("cash_out", "no bet this round")),
        };
        if bet.settled.is_some() {
            return Ok(Step::new(self.clone()));
        }

        let outcome = Outcome::new(bet.wager, bet.wager.scale(multiplier));
        let mut next = self.clone();
        next.bet = Some(CrashBet {
            wager: bet.wager,
            cashed_out_at: Some(multiplier),
            settled: Some(outcome),
        });
        Ok(Step::with_events(next, vec![RoundEvent::Settled(outcome)]))
    }

    /// Move the round clock forward by `dt`.
    ///
    /// The crash point is drawn from `source` when the round starts running. A crash
    /// is detected at most once per call, and the pause starts at that poll.
    pub fn advance(
        &self,
        dt: Duration,
        timing: &CrashTiming,
        source: &mut dyn OutcomeSource,
    ) -> Step<CrashRound> {
        let mut next = self.clone();
        let mut events = Vec::new();
        let mut remaining = dt;

        loop {
            match next.phase {
                CrashPhase::Waiting {
                    ticks_left,
                    into_tick,
                } => {
                    if ticks_left == 0 {
                        let crash_point = source.crash_point(
                            timing.gamma_shape,
                            timing.gamma_scale,
                            timing.min_crash_point,
                        );
                        next.phase = CrashPhase::Running {
                            crash_point,
                            elapsed: Duration::ZERO,
                            multiplier: 1.0,
                        };
                        events.push(RoundEvent::PhaseChanged {
                            round: next.round,
                            phase: CrashPhaseKind::Running,
                        });
                        continue;
                    }

                    let to_tick = timing.tick.saturating_sub(into_tick);
                    if remaining < to_tick {
                        next.phase = CrashPhase::Waiting {
                            ticks_left,
                            into_tick: into_tick + remaining,
                        };
                        break;
                    }
                    remaining -= to_tick;
                    let ticks_left = ticks_left - 1;
                    if ticks_left > 0 {
                        events.push(RoundEvent::CountdownTick {
                            remaining: ticks_left,
                        });
                    }
                    next.phase = CrashPhase::Waiting {
                        ticks_left,
                        into_tick: Duration::ZERO,
                    };
                }
                CrashPhase::Running {
                    crash_point,
                    elapsed,
                    ..
                } => {
                    let elapsed = elapsed + remaining;
                    let multiplier = timing.growth_rate.powf(elapsed.as_secs_f64());
                    if multiplier >= crash_point {
                        next.phase = CrashPhase::Crashed {
                            crash_point,
                            since: Duration::ZERO,
                        };
                        events.push(RoundEvent::CrashedAt {
                            round: next.round,
                            crash_point,
                        });
                        events.push(RoundEvent::PhaseChanged {
                            round: next.round,
                            phase: CrashPhaseKind::Crashed,
                        });
                        if let Some(bet) = next.bet.as_mut().filter(|bet| bet.settled.is_none()) {
                            let outcome = Outcome::loss(bet.wager);
                            bet.settled = Some(outcome);
                            events.push(RoundEvent::Settled(outcome));
                        }
                    } else {
                        next.phase = CrashPhase::Running {
                            crash_point,
                            elapsed,
                            multiplier,
                        };
                    }
                    break;
                }
                CrashPhase::Crashed { crash_point, since } => {
                    let to_reset = timing.crash_pause.saturating_sub(since);
                    if remaining < to_reset {
                        next.phase = CrashPhase::Crashed {
                            crash_point,
                            since: since + remaining,
                        };
                        break;
                    }
                    remaining -= to_reset;
                    next = CrashRound::new(next.round + 1, timing);
                    events.push(RoundEvent::PhaseChanged {
                        round: next.round,
                        phase: CrashPhaseKind::Waiting,
                    });
                }
            }
        }

        Step::with_events(next, events)
    }
}

/// Read-only view for the presentation layer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrashSnapshot {
    pub round: u64,
    pub phase: CrashPhaseKind,
    pub multiplier: f64,
    /// Countdown ticks left while waiting
    pub countdown: Option<u32>,
    /// Revealed only once the round has crashed
    pub crash_point: Option<f64>,
    pub bet: Option<CrashBet>,
    /// Most recent crash points, newest last
    pub history: Vec<f64>,
}

impl CrashSnapshot {
    pub fn new(round: &CrashRound, history: Vec<f64>) -> Self {
        Self {
            round: round.round,
            phase: round.phase.kind(),
            multiplier: round.phase.multiplier(),
            countdown: match round.phase {
                CrashPhase::Waiting { ticks_left, .. } => Some(ticks_left),
                _ => None,
            },
            crash_point: match round.phase {
                CrashPhase::Crashed { crash_point, .. } => Some(crash_point),
                _ => None,
            },
            bet: round.bet,
            history,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::cards::Card;

    /// Always crashes at a fixed multiplier
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

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    /// Timing whose multiplier reads exactly `rate` after one second of running
    fn timing(rate: f64) -> CrashTiming {
        CrashTiming {
            growth_rate: rate,
            ..CrashTiming::default()
        }
    }

    fn running(timing: &CrashTiming, crash_at: f64, wager: Option<Money>) -> CrashRound {
        let mut round = CrashRound::new(1, timing);
        if let Some(wager) = wager {
            round = round.place_bet(wager).unwrap().state;
        }
        round.advance(secs(5), timing, &mut FixedCrash(crash_at)).state
    }

    #[test]
    fn test_countdown_then_running() {
        let timing = CrashTiming::default();
        let round = CrashRound::new(1, &timing);

        let step = round.advance(secs(2), &timing, &mut FixedCrash(3.0));
        assert_eq!(
            step.state.phase,
            CrashPhase::Waiting {
                ticks_left: 3,
                into_tick: Duration::ZERO
            }
        );
        assert_eq!(
            step.events,
            vec![
                RoundEvent::CountdownTick { remaining: 4 },
                RoundEvent::CountdownTick { remaining: 3 },
            ]
        );

        let step = step.state.advance(secs(3), &timing, &mut FixedCrash(3.0));
        assert_eq!(step.state.phase.kind(), CrashPhaseKind::Running);
        assert_eq!(step.state.phase.multiplier(), 1.0);
    }

    #[test]
    fn test_multiplier_follows_growth_curve() {
        let timing = CrashTiming::default();
        let round = running(&timing, 100.0, None);
        let round = round
            .advance(secs(10), &timing, &mut FixedCrash(100.0))
            .state;
        assert!((round.phase.multiplier() - 1.05f64.powi(10)).abs() < 1e-9);
    }

    #[test]
    fn test_cash_out_scenario_pays_once() {
        let timing = timing(1.8);
        let round = running(&timing, 2.0, Some(Money::from_units(50)));

        let round = round.advance(secs(1), &timing, &mut FixedCrash(2.0)).state;
        assert_eq!(round.phase.multiplier(), 1.8);

        let first = round.cash_out().unwrap();
        let outcome = first.settlement().unwrap();
        assert_eq!(outcome.winnings, Money::from_units(90));
        assert_eq!(outcome.net, Money::from_units(40));

        let second = first.state.cash_out().unwrap();
        assert!(second.events.is_empty());
        assert_eq!(second.state.bet.unwrap().settled, Some(outcome));

        // the crash must not settle a cashed-out bet again
        let crashed = second.state.advance(secs(1), &timing, &mut FixedCrash(2.0));
        assert_eq!(crashed.state.phase.kind(), CrashPhaseKind::Crashed);
        assert!(crashed.settlement().is_none());
    }

    #[test]
    fn test_uncashed_bet_loses_at_crash() {
        let timing = CrashTiming::default();
        let round = running(&timing, 1.01, Some(Money::from_units(25)));

        let step = round.advance(secs(1), &timing, &mut FixedCrash(1.01));
        assert_eq!(step.state.phase.multiplier(), 1.01);
        assert_eq!(step.settlement(), Some(Outcome::loss(Money::from_units(25))));
        assert!(step.events.contains(&RoundEvent::CrashedAt {
            round: 1,
            crash_point: 1.01
        }));
    }

    #[test]
    fn test_tie_at_crash_point_crashes() {
        let timing = timing(2.0);
        let round = running(&timing, 2.0, Some(Money::from_units(10)));

        let step = round.advance(secs(1), &timing, &mut FixedCrash(2.0));
        assert_eq!(step.state.phase.kind(), CrashPhaseKind::Crashed);
        assert_eq!(step.settlement().unwrap().winnings, Money::ZERO);
        assert!(step.state.cash_out().is_err());
    }

    #[test]
    fn test_pause_then_new_round() {
        let timing = CrashTiming::default();
        let round = running(&timing, 1.01, None);
        let crashed = round.advance(secs(1), &timing, &mut FixedCrash(1.01)).state;

        let still = crashed.advance(secs(2), &timing, &mut FixedCrash(1.01)).state;
        assert_eq!(still.phase.kind(), CrashPhaseKind::Crashed);

        let step = still.advance(secs(1), &timing, &mut FixedCrash(1.01));
        assert_eq!(step.state.round, 2);
        assert_eq!(step.state.phase.kind(), CrashPhaseKind::Waiting);
        assert!(step.state.bet.is_none());
    }

    #[test]
    fn test_bet_rules() {
        let timing = CrashTiming::default();
        let waiting = CrashRound::new(1, &timing);

        assert!(matches!(
            waiting.place_bet(Money::ZERO),
            Err(GameError::InvalidWager(_))
        ));
        let placed = waiting.place_bet(Money::from_units(5)).unwrap().state;
        assert!(placed.place_bet(Money::from_units(5)).is_err());
        assert!(placed.cash_out().is_err());

        let running = placed.advance(secs(5), &timing, &mut FixedCrash(5.0)).state;
        assert!(matches!(
            running.place_bet(Money::from_units(5)),
            Err(GameError::InvalidState { operation: "place_bet", .. })
        ));

        let no_bet = running_without_bet(&timing);
        assert!(no_bet.cash_out().is_err());
    }

    fn running_without_bet(timing: &CrashTiming) -> CrashRound {
        running(timing, 5.0, None)
    }
}
