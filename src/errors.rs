//! Error types for the tablestakes casino core
//!
//! Every failure a caller can observe is a typed, recoverable value. None of them
//! is fatal to the process, and none is raised after a ledger mutation has started.

use crate::common::types::Money;
use thiserror::Error;

/// Root error type for all casino operations
#[derive(Debug, Error)]
pub enum CasinoError {
    /// Wager, round-state and funds errors raised by the games and the ledger
    #[error("Game error: {0}")]
    Game(#[from] GameError),

    /// Registration and account lookup errors
    #[error("Account error: {0}")]
    Account(#[from] AccountError),

    /// Persistence backend errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration and game setting errors
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

/// Errors raised while placing or settling wagers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("Invalid wager: {0}")]
    InvalidWager(String),

    #[error("Insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: Money, available: Money },

    #[error("Operation '{operation}' is not valid while the round is {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },
}

/// Errors raised by account management
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountError {
    #[error("Account already exists: {0}")]
    DuplicateAccount(String),

    #[error("Unknown account: {0}")]
    UnknownAccount(String),

    #[error("Unknown referral code: {0}")]
    UnknownReferralCode(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Persistence backend errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database open failed: {0}")]
    DatabaseOpenFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Corrupted data: {0}")]
    CorruptedData(String),
}

/// Configuration loading and validation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration logical inconsistency: {0}")]
    LogicalInconsistency(String),
}

impl GameError {
    pub fn invalid_state(operation: &'static str, state: impl Into<String>) -> Self {
        GameError::InvalidState {
            operation,
            state: state.into(),
        }
    }
}

impl CasinoError {
    /// Short machine-friendly reason, used in rejection notifications
    pub fn reason_code(&self) -> &'static str {
        match self {
            CasinoError::Game(GameError::InvalidWager(_)) => "invalid_wager",
            CasinoError::Game(GameError::InsufficientFunds { .. }) => "insufficient_funds",
            CasinoError::Game(GameError::InvalidState { .. }) => "invalid_state",
            CasinoError::Account(AccountError::DuplicateAccount(_)) => "duplicate_account",
            CasinoError::Account(AccountError::UnknownAccount(_)) => "unknown_account",
            CasinoError::Account(AccountError::UnknownReferralCode(_)) => "unknown_referral_code",
            CasinoError::Account(AccountError::InvalidInput(_)) => "invalid_input",
            CasinoError::Storage(_) => "storage",
            CasinoError::Configuration(_) => "configuration",
        }
    }
}

impl From<std::io::Error> for CasinoError {
    fn from(e: std::io::Error) -> Self {
        CasinoError::Storage(StorageError::ReadFailed(e.to_string()))
    }
}

impl From<serde_json::Error> for CasinoError {
    fn from(e: serde_json::Error) -> Self {
        CasinoError::Storage(StorageError::CorruptedData(e.to_string()))
    }
}

#[cfg(feature = "persistent")]
impl From<rocksdb::Error> for CasinoError {
    fn from(e: rocksdb::Error) -> Self {
        CasinoError::Storage(StorageError::WriteFailed(e.to_string()))
    }
}

// Convenience type alias for Results
pub type CasinoResult<T> = Result<T, CasinoError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_display() {
        let error = CasinoError::from(GameError::InsufficientFunds {
            requested: Money::from_units(150),
            available: Money::from_units(100),
        });

        assert!(error.to_string().contains("Game error"));
        assert!(error.to_string().contains("150.00"));
        assert!(error.to_string().contains("100.00"));
    }

    #[test]
    fn test_invalid_state_details() {
        let error = GameError::invalid_state("hit", "resolved");
        assert!(error.to_string().contains("'hit'"));
        assert!(error.to_string().contains("resolved"));
    }

    #[test]
    fn test_error_conversion() {
        let error: CasinoError = AccountError::DuplicateAccount("ana".to_string()).into();

        match error {
            CasinoError::Account(AccountError::DuplicateAccount(name)) => assert_eq!(name, "ana"),
            _ => panic!("Expected account error"),
        }
    }

    #[test]
    fn test_error_source() {
        let error: CasinoError = StorageError::ReadFailed("disk".to_string()).into();
        assert!(error.source().is_some());
        assert_eq!(error.reason_code(), "storage");
    }
}
