//! Admin-tunable game settings backed by the repository

use crate::common::traits::Repository;
use crate::config::{RouletteConfig, ROULETTE_STRAIGHT_PAYOUT};
use crate::errors::{CasinoResult, ConfigurationError};
use std::sync::Arc;

/// Typed access to the game settings table
#[derive(Clone)]
pub struct GameSettings {
    repo: Arc<dyn Repository>,
    roulette: RouletteConfig,
}

impl GameSettings {
    pub fn new(repo: Arc<dyn Repository>, roulette: RouletteConfig) -> Self {
        Self { repo, roulette }
    }

    /// Write defaults for settings that are missing; existing values are kept
    pub fn seed_defaults(&self) -> CasinoResult<()> {
        if self.repo.get_setting(ROULETTE_STRAIGHT_PAYOUT)?.is_none() {
            self.repo.put_setting(
                ROULETTE_STRAIGHT_PAYOUT,
                f64::from(self.roulette.default_straight_payout),
            )?;
            tracing::debug!(
                setting = ROULETTE_STRAIGHT_PAYOUT,
                value = self.roulette.default_straight_payout,
                "Seeded default setting"
            );
        }
        Ok(())
    }

    /// Return multiple of a winning straight-number bet, as currently configured
    pub fn straight_payout(&self) -> CasinoResult<u32> {
        match self.repo.get_setting(ROULETTE_STRAIGHT_PAYOUT)? {
            Some(value) => {
                let payout = value.round();
                if payout < f64::from(self.roulette.min_straight_payout)
                    || payout > f64::from(self.roulette.max_straight_payout)
                {
                    return Err(self.out_of_range(value).into());
                }
                Ok(payout as u32)
            }
            None => Ok(self.roulette.default_straight_payout),
        }
    }

    pub fn set_straight_payout(&self, payout: u32) -> CasinoResult<()> {
        if !(self.roulette.min_straight_payout..=self.roulette.max_straight_payout).contains(&payout) {
            return Err(self.out_of_range(f64::from(payout)).into());
        }
        self.repo.put_setting(ROULETTE_STRAIGHT_PAYOUT, f64::from(payout))?;
        tracing::info!(setting = ROULETTE_STRAIGHT_PAYOUT, payout, "Game setting updated");
        Ok(())
    }

    fn out_of_range(&self, value: f64) -> ConfigurationError {
        ConfigurationError::InvalidValue {
            field: ROULETTE_STRAIGHT_PAYOUT.to_string(),
            value: value.to_string(),
            reason: format!(
                "must be within [{}, {}]",
                self.roulette.min_straight_payout, self.roulette.max_straight_payout
            ),
        }
    }
}
