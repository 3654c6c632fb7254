//! Round settlement
//!
//! Settlement runs in two passes: every player's payout is computed from the
//! ledger first, then each amount is disbursed independently. A failed transfer
//! is recorded and the loop moves on, so one rejected recipient cannot strand
//! the others.

use crate::common::traits::FundsTransfer;
use crate::lottery::ledger::TicketLedger;
use crate::lottery::payout::{PayoutCalculator, TicketOutcome};
use crate::lottery::types::PlayerId;
use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};
use uuid::Uuid;

/// Amount owed to one player for the round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerPayout {
    pub player: PlayerId,
    pub tickets: Vec<TicketOutcome>,
    pub total: u64,
}

/// Proof of a completed transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub transfer_id: String,
    pub player: PlayerId,
    pub amount: u64,
}

/// Disbursement error types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum TransferError {
    #[error("insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: u64, available: u64 },

    #[error("transfer rejected: {0}")]
    Rejected(String),
}

/// A disbursement that did not go through
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferFailure {
    pub player: PlayerId,
    pub amount: u64,
    pub error: TransferError,
}

/// Outcome of settling one round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementReport {
    pub round_id: u64,
    pub drawn_sequence: Vec<u32>,
    pub payouts: Vec<PlayerPayout>,
    pub receipts: Vec<TransferReceipt>,
    pub failures: Vec<TransferFailure>,
    pub total_staked: u64,
    pub total_paid: u64,
    pub settled_at: DateTime<Utc>,
}

impl SettlementReport {
    pub fn payout_for(&self, player: &PlayerId) -> Option<&PlayerPayout> {
        self.payouts.iter().find(|p| &p.player == player)
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Score every ticket in the ledger against `drawn`
pub fn compute_payouts(
    calculator: &PayoutCalculator,
    ledger: &TicketLedger,
    drawn: &[u32],
) -> Vec<PlayerPayout> {
    ledger
        .entries()
        .map(|(player, tickets)| {
            let outcomes: Vec<TicketOutcome> = tickets
                .iter()
                .map(|t| calculator.evaluate(&t.numbers, t.stake, drawn))
                .collect();
            let total = outcomes
                .iter()
                .fold(0u64, |acc, o| acc.saturating_add(o.amount));
            PlayerPayout {
                player: player.clone(),
                tickets: outcomes,
                total,
            }
        })
        .collect()
}

/// Pay every non-zero amount, collecting receipts and failures
pub async fn disburse(
    funds: &dyn FundsTransfer,
    payouts: &[PlayerPayout],
) -> (Vec<TransferReceipt>, Vec<TransferFailure>) {
    let mut receipts = Vec::new();
    let mut failures = Vec::new();

    for payout in payouts.iter().filter(|p| p.total > 0) {
        match funds.transfer(&payout.player, payout.total).await {
            Ok(receipt) => {
                debug!("paid {} to {}", payout.total, payout.player);
                receipts.push(receipt);
            }
            Err(error) => {
                warn!("payout of {} to {} failed: {}", payout.total, payout.player, error);
                failures.push(TransferFailure {
                    player: payout.player.clone(),
                    amount: payout.total,
                    error,
                });
            }
        }
    }

    (receipts, failures)
}

/// House bankroll that pays winners and keeps their balances in memory
#[derive(Debug, Default)]
pub struct InMemoryTreasury {
    bankroll: AtomicU64,
    balances: DashMap<PlayerId, u64>,
    rejected: DashSet<PlayerId>,
}

impl InMemoryTreasury {
    pub fn new(bankroll: u64) -> Self {
        Self {
            bankroll: AtomicU64::new(bankroll),
            balances: DashMap::new(),
            rejected: DashSet::new(),
        }
    }

    pub fn bankroll(&self) -> u64 {
        self.bankroll.load(Ordering::SeqCst)
    }

    /// Winnings credited to `player` so far
    pub fn balance_of(&self, player: &PlayerId) -> u64 {
        self.balances.get(player).map(|b| *b).unwrap_or(0)
    }

    /// Refuse every future transfer to `player`
    pub fn reject(&self, player: impl Into<PlayerId>) {
        self.rejected.insert(player.into());
    }
}

#[async_trait::async_trait]
impl FundsTransfer for InMemoryTreasury {
    async fn transfer(&self, to: &PlayerId, amount: u64) -> Result<TransferReceipt, TransferError> {
        if self.rejected.contains(to) {
            return Err(TransferError::Rejected(format!("recipient {} refuses transfers", to)));
        }

        self.bankroll
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |b| b.checked_sub(amount))
            .map_err(|available| TransferError::InsufficientFunds {
                requested: amount,
                available,
            })?;

        *self.balances.entry(to.clone()).or_insert(0) += amount;

        Ok(TransferReceipt {
            transfer_id: Uuid::new_v4().to_string(),
            player: to.clone(),
            amount,
        })
    }
}
