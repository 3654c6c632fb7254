//! Collaborator interfaces consumed by the round engine
//!
//! The engine never talks to an oracle network, a wallet or an access-control
//! service directly; it goes through these traits so tests can substitute
//! in-memory implementations.

use crate::errors::LotteryResult;
use crate::lottery::settlement::{TransferError, TransferReceipt};
use crate::lottery::types::{PlayerId, RequestHandle};
use async_trait::async_trait;

/// Boundary to an external randomness oracle
///
/// `request` returns as soon as the request is issued. The seed is pushed back
/// later, exactly once, through `RoundController::on_randomness_ready`.
#[async_trait]
pub trait RandomnessPort: Send + Sync {
    /// Issue a randomness request for `round_id`
    ///
    /// Fails with `LotteryError::OracleUnavailable` when the request cannot be
    /// issued, e.g. because no prepaid fee remains.
    async fn request(&self, round_id: u64) -> LotteryResult<RequestHandle>;
}

/// Payment primitive used during settlement
///
/// Implementations must not call back into the round controller.
#[async_trait]
pub trait FundsTransfer: Send + Sync {
    async fn transfer(&self, to: &PlayerId, amount: u64) -> Result<TransferReceipt, TransferError>;
}

/// Capability check for operator-only actions
pub trait OperatorCheck: Send + Sync {
    fn is_operator(&self, caller: &PlayerId) -> bool;
}

/// A single fixed operator identity
#[derive(Debug, Clone)]
pub struct SingleOperator {
    operator: PlayerId,
}

impl SingleOperator {
    pub fn new(operator: impl Into<PlayerId>) -> Self {
        Self {
            operator: operator.into(),
        }
    }
}

impl OperatorCheck for SingleOperator {
    fn is_operator(&self, caller: &PlayerId) -> bool {
        *caller == self.operator
    }
}
