//! Round configuration with validation and presets
//!
//! Loaded from TOML by [`crate::common::config::ConfigLoader`]; every section
//! falls back to the Lucky Six defaults when omitted.

use crate::errors::ConfigError;
use crate::lottery::draw_engine::DrawEngine;
use crate::lottery::payout::PayoutTable;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete engine configuration
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LotteryConfig {
    pub draw: DrawConfig,
    pub entry: EntryConfig,
    pub settlement: SettlementConfig,
    pub oracle: OracleConfig,
}

/// Number pool and draw geometry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawConfig {
    pub pool_min: u32,
    pub pool_max: u32,
    /// Numbers per ticket
    pub pick_count: usize,
    /// Numbers drawn per round
    pub draw_length: usize,
}

impl Default for DrawConfig {
    fn default() -> Self {
        Self {
            pool_min: 1,
            pool_max: 48,
            pick_count: 6,
            draw_length: 35,
        }
    }
}

/// Entry rules
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryConfig {
    /// Fixed ticket price; when set, every stake must equal it
    pub ticket_price: Option<u64>,
    pub max_tickets_per_player: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    /// Settle as soon as the seed is delivered instead of waiting for the operator
    pub auto_settle: bool,
    pub payout_table: PayoutTable,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            auto_settle: false,
            payout_table: PayoutTable::lucky_six(),
        }
    }
}

/// Local VRF oracle settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub fulfillment_delay_ms: u64,
    /// Requests paid for in advance; each request consumes one
    pub prepaid_requests: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            fulfillment_delay_ms: 50,
            prepaid_requests: 10,
        }
    }
}

impl OracleConfig {
    pub fn fulfillment_delay(&self) -> Duration {
        Duration::from_millis(self.fulfillment_delay_ms)
    }
}

impl LotteryConfig {
    /// 6 picks from 1..=48, 35 balls drawn, classic odds
    pub fn lucky_six() -> Self {
        Self::default()
    }

    /// Small pool where every ball is drawn, so every ticket resolves
    pub fn quick_draw() -> Self {
        Self {
            draw: DrawConfig {
                pool_min: 1,
                pool_max: 10,
                pick_count: 3,
                draw_length: 10,
            },
            settlement: SettlementConfig {
                auto_settle: false,
                payout_table: PayoutTable::quick_draw(),
            },
            oracle: OracleConfig {
                fulfillment_delay_ms: 5,
                prepaid_requests: 100,
            },
            ..Default::default()
        }
    }

    /// Validate configuration for logical consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        let engine = DrawEngine::from_config(&self.draw)?;

        if self.draw.pick_count == 0 {
            return Err(ConfigError::invalid("pick_count", "must be > 0"));
        }
        if self.draw.pick_count > engine.pool_size() {
            return Err(ConfigError::invalid(
                "pick_count",
                format!(
                    "{} distinct picks do not fit a pool of {}",
                    self.draw.pick_count,
                    engine.pool_size()
                ),
            ));
        }
        if self.draw.pick_count > self.draw.draw_length {
            return Err(ConfigError::invalid(
                "pick_count",
                format!(
                    "tickets of {} numbers can never resolve in a draw of {}",
                    self.draw.pick_count, self.draw.draw_length
                ),
            ));
        }

        if self.entry.ticket_price == Some(0) {
            return Err(ConfigError::invalid("ticket_price", "must be > 0 when set"));
        }
        if self.entry.max_tickets_per_player == Some(0) {
            return Err(ConfigError::invalid(
                "max_tickets_per_player",
                "must be > 0 when set",
            ));
        }

        self.settlement.payout_table.validate()?;

        // Every position a ticket can resolve at must pay something.
        let last_position = self.draw.draw_length - 1;
        match self.settlement.payout_table.last_paying_position() {
            Some(position) if position >= last_position => Ok(()),
            Some(position) => Err(ConfigError::invalid(
                "payout_table",
                format!(
                    "pays nothing after position {} but the draw reaches position {}",
                    position, last_position
                ),
            )),
            None => Err(ConfigError::invalid("payout_table", "no tier pays anything")),
        }
    }
}
