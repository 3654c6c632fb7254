//! Error types for the LuckySix round engine
//!
//! Every failure is reported to the caller of the operation that detected it.
//! Disbursement failures are the exception: they are collected per player in the
//! settlement report (see [`crate::lottery::settlement`]) instead of aborting.

use crate::lottery::types::{PlayerId, RequestHandle, RoundState};

/// Root error type for all round operations
#[derive(Debug, thiserror::Error)]
pub enum LotteryError {
    /// Caller lacks the operator capability
    #[error("{caller} is not the round operator")]
    Unauthorized { caller: PlayerId },

    /// Operation attempted outside its legal state
    #[error("cannot {operation} while round is {state}")]
    InvalidState {
        operation: &'static str,
        state: RoundState,
    },

    /// Malformed number selection or wrong stake
    #[error("invalid ticket: {0}")]
    InvalidTicket(#[from] TicketError),

    /// Randomness delivered for a request that is not outstanding
    #[error("stale or unknown randomness request {handle}")]
    StaleOrUnknownRequest { handle: RequestHandle },

    /// The randomness request could not be issued
    #[error("randomness oracle unavailable: {0}")]
    OracleUnavailable(String),

    /// Round configuration rejected
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

/// Ticket validation failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TicketError {
    #[error("expected {expected} numbers, got {actual}")]
    WrongCount { expected: usize, actual: usize },

    #[error("number {0} picked more than once")]
    DuplicateNumber(u32),

    #[error("number {number} outside pool {min}..={max}")]
    OutOfRange { number: u32, min: u32, max: u32 },

    #[error("stake must be greater than zero")]
    ZeroStake,

    #[error("stake {actual} does not match ticket price {expected}")]
    StakeMismatch { expected: u64, actual: u64 },

    #[error("player already holds the maximum of {limit} tickets this round")]
    TooManyTickets { limit: usize },
}

/// Configuration and validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("pool of {pool_size} numbers cannot supply a draw of {draw_length}")]
    PoolTooSmall { pool_size: u64, draw_length: usize },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("failed to load configuration: {0}")]
    LoadFailed(String),
}

impl ConfigError {
    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::LoadFailed(format!("failed to parse TOML: {}", e))
    }
}

// Convenience type alias for Results
pub type LotteryResult<T> = Result<T, LotteryError>;
