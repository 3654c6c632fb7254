//! Round engine counters

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

pub struct LotteryMetrics {
    start_time: Instant,
    rounds_started: AtomicU64,
    rounds_settled: AtomicU64,
    rounds_reset: AtomicU64,
    tickets_entered: AtomicU64,
    tickets_rejected: AtomicU64,
    stale_deliveries: AtomicU64,
    amount_paid: AtomicU64,
    transfer_failures: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub rounds_started: u64,
    pub rounds_settled: u64,
    pub rounds_reset: u64,
    pub tickets_entered: u64,
    pub tickets_rejected: u64,
    pub stale_deliveries: u64,
    pub amount_paid: u64,
    pub transfer_failures: u64,
    pub uptime_ms: u64,
}

impl LotteryMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            rounds_started: AtomicU64::new(0),
            rounds_settled: AtomicU64::new(0),
            rounds_reset: AtomicU64::new(0),
            tickets_entered: AtomicU64::new(0),
            tickets_rejected: AtomicU64::new(0),
            stale_deliveries: AtomicU64::new(0),
            amount_paid: AtomicU64::new(0),
            transfer_failures: AtomicU64::new(0),
        }
    }

    pub fn record_round_started(&self) {
        self.rounds_started.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_round_reset(&self) {
        self.rounds_reset.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_ticket(&self) {
        self.tickets_entered.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_rejected_ticket(&self) {
        self.tickets_rejected.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_stale_delivery(&self) {
        self.stale_deliveries.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_settlement(&self, amount_paid: u64, failures: usize) {
        self.rounds_settled.fetch_add(1, Ordering::SeqCst);
        self.amount_paid.fetch_add(amount_paid, Ordering::SeqCst);
        self.transfer_failures
            .fetch_add(failures as u64, Ordering::SeqCst);
    }

    pub fn total_runtime(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rounds_started: self.rounds_started.load(Ordering::SeqCst),
            rounds_settled: self.rounds_settled.load(Ordering::SeqCst),
            rounds_reset: self.rounds_reset.load(Ordering::SeqCst),
            tickets_entered: self.tickets_entered.load(Ordering::SeqCst),
            tickets_rejected: self.tickets_rejected.load(Ordering::SeqCst),
            stale_deliveries: self.stale_deliveries.load(Ordering::SeqCst),
            amount_paid: self.amount_paid.load(Ordering::SeqCst),
            transfer_failures: self.transfer_failures.load(Ordering::SeqCst),
            uptime_ms: self.total_runtime().as_millis() as u64,
        }
    }
}

impl Default for LotteryMetrics {
    fn default() -> Self {
        Self::new()
    }
}
