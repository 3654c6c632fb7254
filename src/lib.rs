//! Luckysix - round-based number lottery engine
//!
//! Players pick six numbers from 1..=48 and stake an amount. When the operator
//! closes the round a seed is requested from a randomness oracle; the seed
//! expands into a 35-number draw order, and each ticket pays according to how
//! early its last number appeared.

pub mod common;
pub mod config;
pub mod errors;
pub mod lottery;
pub mod metrics;

pub use common::config::ConfigLoader;
pub use common::traits::{FundsTransfer, OperatorCheck, RandomnessPort, SingleOperator};
pub use config::LotteryConfig;
pub use errors::{ConfigError, LotteryError, LotteryResult, TicketError};
pub use lottery::{
    PlayerId, RequestHandle, RoundController, RoundEvent, RoundSnapshot, RoundState, Seed,
    SettlementReport, Ticket,
};
pub use metrics::{LotteryMetrics, MetricsSnapshot};
