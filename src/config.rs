//! Configuration management with validation and defaults
//!
//! Centralized configuration for the casino core: account economics, game
//! parameters, timers, storage backend and logging. Loaded from TOML with
//! environment variable overrides.

use crate::common::types::Money;
use crate::errors::{CasinoResult, ConfigurationError};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Name of the roulette straight-number payout setting in the settings table
pub const ROULETTE_STRAIGHT_PAYOUT: &str = "roulette_straight_payout";

/// House limits on the straight-number payout; configured bounds must lie inside
pub const STRAIGHT_PAYOUT_FLOOR: u32 = 10;
pub const STRAIGHT_PAYOUT_CEILING: u32 = 50;

/// Complete casino configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CasinoConfig {
    pub accounts: AccountsConfig,
    pub roulette: RouletteConfig,
    pub crash: CrashConfig,
    pub storage: StorageConfig,
    pub logs: LogsConfig,
    pub monitoring: MonitoringConfig,
}

/// Registration economics
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AccountsConfig {
    /// Balance granted on registration (recorded as an initial deposit)
    pub initial_balance: Money,
    /// Bonus credited to the owner of a referral code used at registration
    pub referral_bonus: Money,
    pub referral_code_length: usize,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            initial_balance: Money::from_units(1000),
            referral_bonus: Money::from_units(200),
            referral_code_length: 6,
        }
    }
}

/// Roulette payout bounds
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RouletteConfig {
    /// Total return multiple of a winning straight-number bet, seeded into settings
    pub default_straight_payout: u32,
    pub min_straight_payout: u32,
    pub max_straight_payout: u32,
    /// Winning pockets remembered for display
    pub history_len: usize,
}

impl Default for RouletteConfig {
    fn default() -> Self {
        Self {
            default_straight_payout: 35,
            min_straight_payout: 10,
            max_straight_payout: 50,
            history_len: 10,
        }
    }
}

/// Crash round timing and curve parameters
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CrashConfig {
    /// Countdown ticks in the waiting phase
    pub countdown_ticks: u32,
    /// Length of one countdown tick
    pub tick_ms: u64,
    /// How often the driver polls the multiplier while running
    pub poll_interval_ms: u64,
    /// Pause between the crash and the next waiting phase
    pub crash_pause_ms: u64,
    /// Per-second growth factor of the multiplier curve
    pub growth_rate: f64,
    pub gamma_shape: u32,
    pub gamma_scale: f64,
    /// Lowest crash point that can be drawn
    pub min_crash_point: f64,
    /// Crash points remembered for display
    pub history_len: usize,
}

impl Default for CrashConfig {
    fn default() -> Self {
        Self {
            countdown_ticks: 5,
            tick_ms: 1000,
            poll_interval_ms: 30,
            crash_pause_ms: 3000,
            growth_rate: 1.05,
            gamma_shape: 2,
            gamma_scale: 2.0,
            min_crash_point: 1.01,
            history_len: 10,
        }
    }
}

impl CrashConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn crash_pause(&self) -> Duration {
        Duration::from_millis(self.crash_pause_ms)
    }
}

/// Storage backend selection
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    RocksDb,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub data_directory: String,
    /// Whether to clear the database on startup (testing only!)
    pub clear_on_start: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::RocksDb,
            data_directory: "./DB/tablestakes".to_string(),
            clear_on_start: false,
        }
    }
}

/// Activity log reads
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogsConfig {
    /// Row cap applied when the caller does not give one
    pub default_limit: usize,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self { default_limit: 100 }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MonitoringConfig {
    pub log_level: LogLevel,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl CasinoConfig {
    /// In-memory storage and millisecond timers, for tests and simulations
    pub fn testing() -> Self {
        Self {
            crash: CrashConfig {
                tick_ms: 10,
                poll_interval_ms: 1,
                crash_pause_ms: 30,
                ..Default::default()
            },
            storage: StorageConfig {
                backend: StorageBackend::Memory,
                clear_on_start: true,
                ..Default::default()
            },
            monitoring: MonitoringConfig {
                log_level: LogLevel::Debug,
            },
            ..Default::default()
        }
    }

    /// Persistent storage that is never cleared
    pub fn production() -> Self {
        Self {
            storage: StorageConfig {
                backend: StorageBackend::RocksDb,
                data_directory: "./DB/tablestakes".to_string(),
                clear_on_start: false,
            },
            ..Default::default()
        }
    }

    /// Validate configuration for logical consistency
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.accounts.initial_balance.is_negative() {
            return Err(invalid(
                "accounts.initial_balance",
                self.accounts.initial_balance,
                "must not be negative",
            ));
        }
        if self.accounts.referral_bonus.is_negative() {
            return Err(invalid(
                "accounts.referral_bonus",
                self.accounts.referral_bonus,
                "must not be negative",
            ));
        }
        if self.accounts.referral_code_length == 0 {
            return Err(invalid("accounts.referral_code_length", 0, "must be > 0"));
        }

        let roulette = &self.roulette;
        if roulette.min_straight_payout > roulette.max_straight_payout {
            return Err(ConfigurationError::LogicalInconsistency(format!(
                "roulette payout bounds [{}, {}] are empty",
                roulette.min_straight_payout, roulette.max_straight_payout
            )));
        }
        if roulette.min_straight_payout < STRAIGHT_PAYOUT_FLOOR
            || roulette.max_straight_payout > STRAIGHT_PAYOUT_CEILING
        {
            return Err(invalid(
                "roulette.min_straight_payout/max_straight_payout",
                format!("{}/{}", roulette.min_straight_payout, roulette.max_straight_payout),
                &format!(
                    "bounds must lie within [{}, {}]",
                    STRAIGHT_PAYOUT_FLOOR, STRAIGHT_PAYOUT_CEILING
                ),
            ));
        }
        if !(roulette.min_straight_payout..=roulette.max_straight_payout)
            .contains(&roulette.default_straight_payout)
        {
            return Err(invalid(
                "roulette.default_straight_payout",
                roulette.default_straight_payout,
                "must lie within the payout bounds",
            ));
        }

        let crash = &self.crash;
        if crash.tick_ms == 0 || crash.poll_interval_ms == 0 {
            return Err(invalid("crash.tick_ms/poll_interval_ms", 0, "must be > 0"));
        }
        if !(crash.growth_rate > 1.0) {
            return Err(invalid("crash.growth_rate", crash.growth_rate, "must be > 1"));
        }
        if crash.gamma_shape == 0 || !(crash.gamma_scale > 0.0) {
            return Err(invalid(
                "crash.gamma_shape/gamma_scale",
                format!("{}/{}", crash.gamma_shape, crash.gamma_scale),
                "must both be > 0",
            ));
        }
        if !(crash.min_crash_point > 1.0) {
            return Err(invalid("crash.min_crash_point", crash.min_crash_point, "must be > 1"));
        }
        if crash.poll_interval_ms > crash.tick_ms {
            return Err(ConfigurationError::LogicalInconsistency(
                "crash poll interval is longer than a countdown tick".to_string(),
            ));
        }

        if self.logs.default_limit == 0 {
            return Err(invalid("logs.default_limit", 0, "must be > 0"));
        }
        if self.storage.backend == StorageBackend::RocksDb && self.storage.data_directory.is_empty() {
            return Err(invalid("storage.data_directory", "", "required for rocksdb"));
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.crash.poll_interval_ms)
    }
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ConfigurationError {
    ConfigurationError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Configuration loader with environment variable support
#[derive(Default)]
pub struct ConfigLoader {
    config_path: Option<String>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Set the configuration file path
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Load configuration from file and environment variables
    pub fn load(&self) -> CasinoResult<CasinoConfig> {
        let mut config = match self.config_path {
            Some(ref path) => Self::load_from_file(path)?,
            None => CasinoConfig::default(),
        };

        Self::apply_env_overrides(&mut config, |key| env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    /// Parse configuration from a TOML document
    pub fn from_toml(content: &str) -> CasinoResult<CasinoConfig> {
        toml::from_str(content)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to parse TOML: {}", e)).into())
    }

    pub fn to_toml(config: &CasinoConfig) -> CasinoResult<String> {
        toml::to_string_pretty(config)
            .map_err(|e| ConfigurationError::SaveFailed(e.to_string()).into())
    }

    fn load_from_file(path: &str) -> CasinoResult<CasinoConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to read {}: {}", path, e)))?;
        Self::from_toml(&content)
    }

    /// Apply `TABLESTAKES_*` overrides read through `lookup`
    pub fn apply_env_overrides(
        config: &mut CasinoConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> CasinoResult<()> {
        if let Some(dir) = lookup("TABLESTAKES_DATA_DIR") {
            config.storage.data_directory = dir;
        }
        if let Some(backend) = lookup("TABLESTAKES_STORAGE") {
            config.storage.backend = match backend.to_ascii_lowercase().as_str() {
                "memory" => StorageBackend::Memory,
                "rocksdb" => StorageBackend::RocksDb,
                _ => {
                    return Err(invalid("TABLESTAKES_STORAGE", backend, "expected memory or rocksdb").into())
                }
            };
        }
        if let Some(balance) = lookup("TABLESTAKES_INITIAL_BALANCE") {
            config.accounts.initial_balance = balance
                .parse()
                .map_err(|reason: String| invalid("TABLESTAKES_INITIAL_BALANCE", &balance, &reason))?;
        }
        if let Some(level) = lookup("TABLESTAKES_LOG_LEVEL") {
            config.monitoring.log_level = match level.to_ascii_lowercase().as_str() {
                "error" => LogLevel::Error,
                "warn" => LogLevel::Warn,
                "info" => LogLevel::Info,
                "debug" => LogLevel::Debug,
                "trace" => LogLevel::Trace,
                _ => return Err(invalid("TABLESTAKES_LOG_LEVEL", level, "unknown level").into()),
            };
        }

        Ok(())
    }
}
