//! Lucky Six round engine
//!
//! The controller drives one round at a time through IDLE, OPEN and
//! CALCULATING. Drawing, scoring and disbursement live in their own modules so
//! they can be exercised without a running round.

pub mod controller;
pub mod draw_engine;
pub mod ledger;
pub mod payout;
pub mod pending_requests;
pub mod settlement;
pub mod types;
pub mod vrf_oracle;

pub use controller::RoundController;
pub use draw_engine::{derive_sequence, DrawEngine};
pub use ledger::TicketLedger;
pub use payout::{PayoutCalculator, PayoutTable, PayoutTier, TicketOutcome};
pub use settlement::{
    InMemoryTreasury, PlayerPayout, SettlementReport, TransferError, TransferFailure,
    TransferReceipt,
};
pub use types::{PlayerId, RequestHandle, RoundEvent, RoundSnapshot, RoundState, Seed, Ticket};
pub use vrf_oracle::{spawn_delivery_loop, verify_fulfillment, Fulfillment, VrfOracle};
