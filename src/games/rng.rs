//! Injected randomness for the game engines
//!
//! Engines never touch a global RNG. Everything they draw goes through
//! [`OutcomeSource`], so a seeded [`GameRng`] replays a session exactly and tests
//! can script individual draws.

use crate::games::cards::Card;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Number of pockets on the wheel (0 through 36)
pub const POCKETS: u8 = 37;

/// Source of every random draw a round makes
pub trait OutcomeSource: Send {
    /// Uniform draw from `[0, 1)`
    fn next_unit(&mut self) -> f64;

    /// Uniform pocket from `0..=36`
    fn next_pocket(&mut self) -> u8;

    /// Uniformly permute a deck in place
    fn shuffle(&mut self, cards: &mut [Card]);

    /// Gamma(`shape`, `scale`) draw floored at `floor`.
    ///
    /// Integer shape lets the draw be a sum of exponentials, each `-scale * ln(1 - u)`.
    fn crash_point(&mut self, shape: u32, scale: f64, floor: f64) -> f64 {
        let sample: f64 = (0..shape)
            .map(|_| -scale * (1.0 - self.next_unit()).ln())
            .sum();
        if sample.is_finite() {
            sample.max(floor)
        } else {
            floor
        }
    }
}

/// Default source backed by a seedable `StdRng`
pub struct GameRng {
    inner: StdRng,
}

impl GameRng {
    pub fn seeded(seed: u64) -> Self {
        Self {
            inner: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            inner: StdRng::from_entropy(),
        }
    }
}

impl OutcomeSource for GameRng {
    fn next_unit(&mut self) -> f64 {
        self.inner.gen::<f64>()
    }

    fn next_pocket(&mut self) -> u8 {
        self.inner.gen_range(0..POCKETS)
    }

    fn shuffle(&mut self, cards: &mut [Card]) {
        cards.shuffle(&mut self.inner);
    }
}
