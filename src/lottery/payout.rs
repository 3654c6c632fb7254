//! Match-position scoring and payout multipliers
//!
//! A ticket resolves at the draw position by which every one of its numbers has
//! appeared. Earlier resolution pays a larger multiple of the stake, looked up in
//! a [`PayoutTable`] supplied by configuration.

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};

/// One band of the payout table: positions up to and including `up_to_position`
/// (and above the previous band) pay `multiplier` times the stake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutTier {
    pub up_to_position: usize,
    pub multiplier: u64,
}

/// Ordered tiers keyed by 0-based match position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PayoutTable {
    tiers: Vec<PayoutTier>,
}

/// Classic Lucky Six odds: the sixth ball pays 10000x, the 35th pays 1x.
const LUCKY_SIX_MULTIPLIERS: [u64; 30] = [
    10_000, 7_500, 5_000, 2_500, 1_000, 500, 300, 200, 150, 100, 90, 80, 70, 60, 50, 40, 30, 25, 20,
    15, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1,
];

impl PayoutTable {
    pub fn new(tiers: Vec<PayoutTier>) -> Result<Self, ConfigError> {
        let table = Self { tiers };
        table.validate()?;
        Ok(table)
    }

    /// Table for six picks out of a 35-ball draw
    pub fn lucky_six() -> Self {
        let tiers = LUCKY_SIX_MULTIPLIERS
            .iter()
            .enumerate()
            .map(|(offset, &multiplier)| PayoutTier {
                up_to_position: 5 + offset,
                multiplier,
            })
            .collect();
        Self { tiers }
    }

    /// Table for three picks out of a ten-ball pool drawn in full
    pub fn quick_draw() -> Self {
        let tiers = vec![
            PayoutTier { up_to_position: 2, multiplier: 20 },
            PayoutTier { up_to_position: 5, multiplier: 5 },
            PayoutTier { up_to_position: 9, multiplier: 1 },
        ];
        Self { tiers }
    }

    /// Bands must be strictly increasing in position and never pay more for a
    /// later position.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tiers.is_empty() {
            return Err(ConfigError::invalid("payout_table", "at least one tier is required"));
        }
        for pair in self.tiers.windows(2) {
            let (earlier, later) = (pair[0], pair[1]);
            if later.up_to_position <= earlier.up_to_position {
                return Err(ConfigError::invalid(
                    "payout_table",
                    format!(
                        "tier positions must increase ({} after {})",
                        later.up_to_position, earlier.up_to_position
                    ),
                ));
            }
            if later.multiplier > earlier.multiplier {
                return Err(ConfigError::invalid(
                    "payout_table",
                    format!(
                        "position {} pays more than earlier position {}",
                        later.up_to_position, earlier.up_to_position
                    ),
                ));
            }
        }
        Ok(())
    }

    pub fn multiplier_for(&self, position: usize) -> u64 {
        self.tiers
            .iter()
            .find(|tier| position <= tier.up_to_position)
            .map(|tier| tier.multiplier)
            .unwrap_or(0)
    }

    /// Last position that still pays anything
    pub fn last_paying_position(&self) -> Option<usize> {
        self.tiers
            .iter()
            .rev()
            .find(|tier| tier.multiplier > 0)
            .map(|tier| tier.up_to_position)
    }
}

impl Default for PayoutTable {
    fn default() -> Self {
        Self::lucky_six()
    }
}

/// Scored result for one ticket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketOutcome {
    pub numbers: Vec<u32>,
    pub stake: u64,
    /// `None` when some number never appeared in the draw
    pub position: Option<usize>,
    pub multiplier: u64,
    pub amount: u64,
}

#[derive(Debug, Clone, Default)]
pub struct PayoutCalculator {
    table: PayoutTable,
}

impl PayoutCalculator {
    pub fn new(table: PayoutTable) -> Self {
        Self { table }
    }

    /// Position of the last ticket number to appear in `drawn`, or `None` when
    /// any number is missing (or the ticket is empty).
    pub fn score_position(ticket_numbers: &[u32], drawn: &[u32]) -> Option<usize> {
        if ticket_numbers.is_empty() {
            return None;
        }
        ticket_numbers.iter().try_fold(0usize, |latest, number| {
            drawn
                .iter()
                .position(|d| d == number)
                .map(|position| latest.max(position))
        })
    }

    /// `stake` times the tier multiplier; unresolved tickets pay nothing
    pub fn payout(&self, stake: u64, position: Option<usize>) -> u64 {
        match position {
            Some(position) => stake.saturating_mul(self.table.multiplier_for(position)),
            None => 0,
        }
    }

    pub fn evaluate(&self, numbers: &[u32], stake: u64, drawn: &[u32]) -> TicketOutcome {
        let position = Self::score_position(numbers, drawn);
        let multiplier = position.map_or(0, |p| self.table.multiplier_for(p));
        TicketOutcome {
            numbers: numbers.to_vec(),
            stake,
            position,
            multiplier,
            amount: self.payout(stake, position),
        }
    }
}
