use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Player identifier (wallet address or account name)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl From<&str> for PlayerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for PlayerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of the active round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RoundState {
    /// No entries accepted, draw not yet requested
    Idle,
    /// Entries accepted
    Open,
    /// Entries rejected, randomness outstanding or awaiting settlement
    Calculating,
}

impl fmt::Display for RoundState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundState::Idle => write!(f, "IDLE"),
            RoundState::Open => write!(f, "OPEN"),
            RoundState::Calculating => write!(f, "CALCULATING"),
        }
    }
}

/// Opaque handle for an outstanding randomness request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestHandle(String);

impl RequestHandle {
    /// Fresh, globally unique handle
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl From<&str> for RequestHandle {
    fn from(handle: &str) -> Self {
        Self(handle.to_string())
    }
}

impl fmt::Display for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 256-bit randomness seed delivered by the oracle
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Seed([u8; 32]);

impl Seed {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Big-endian embedding of a small integer seed
    pub fn from_u64(value: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }

    /// Parse a hex string of at most 64 digits, left-padded with zeros
    pub fn from_hex(input: &str) -> Result<Self, String> {
        let digits = input.trim().trim_start_matches("0x");
        if digits.is_empty() || digits.len() > 64 {
            return Err(format!("seed must be 1..=64 hex digits, got {}", digits.len()));
        }
        let padded = format!("{:0>64}", digits);
        let decoded = hex::decode(&padded).map_err(|e| format!("invalid seed hex: {}", e))?;
        let bytes: [u8; 32] = decoded
            .try_into()
            .map_err(|_| "seed must decode to 32 bytes".to_string())?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Seed(0x{})", self.to_hex())
    }
}

impl fmt::Display for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

/// A player's number selection plus stake for the active round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub player: PlayerId,
    pub numbers: Vec<u32>,
    pub stake: u64,
}

/// Read-only view of the active round
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundSnapshot {
    pub round_id: u64,
    pub state: RoundState,
    pub players: Vec<PlayerId>,
    pub ticket_count: usize,
    /// Sum of stakes accepted this round
    pub pot: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_request: Option<RequestHandle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<Seed>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drawn_sequence: Option<Vec<u32>>,
}

/// Notifications published on every round transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundEvent {
    Started { round_id: u64 },
    TicketEntered { round_id: u64, player: PlayerId },
    Closed { round_id: u64, handle: RequestHandle },
    Drawn { round_id: u64 },
    Settled { round_id: u64, total_paid: u64, failures: usize },
    Reset { round_id: u64 },
}
