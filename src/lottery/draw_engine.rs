use crate::config::DrawConfig;
use crate::errors::ConfigError;
use crate::lottery::types::Seed;
use sha2::{Digest, Sha256};

const DRAW_DOMAIN: &[u8] = b"luckysix:draw:v1";

/// Largest pool the engine will materialize
pub const MAX_POOL_SIZE: u64 = 65_536;

/// Deterministic derivation of an ordered, duplicate-free draw from a seed
///
/// The pool `[pool_min, pool_max]` is treated as a shrinking vector. Each step
/// hashes `domain || seed || counter` with SHA-256, reduces the first eight bytes
/// into the remaining pool size by rejection sampling, and swap-removes the chosen
/// value. The same seed always yields the same sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawEngine {
    pool_min: u32,
    pool_max: u32,
    draw_length: usize,
}

impl DrawEngine {
    /// Validate the pool geometry up front so `derive` cannot fail
    pub fn new(pool_min: u32, pool_max: u32, draw_length: usize) -> Result<Self, ConfigError> {
        if pool_min > pool_max {
            return Err(ConfigError::invalid(
                "pool_min",
                format!("{} is greater than pool_max {}", pool_min, pool_max),
            ));
        }
        if draw_length == 0 {
            return Err(ConfigError::invalid("draw_length", "must be > 0"));
        }

        let pool_size = u64::from(pool_max) - u64::from(pool_min) + 1;
        if pool_size > MAX_POOL_SIZE {
            return Err(ConfigError::invalid(
                "pool_max",
                format!("pool of {} numbers exceeds {}", pool_size, MAX_POOL_SIZE),
            ));
        }
        if pool_size < draw_length as u64 {
            return Err(ConfigError::PoolTooSmall {
                pool_size,
                draw_length,
            });
        }

        Ok(Self {
            pool_min,
            pool_max,
            draw_length,
        })
    }

    pub fn from_config(config: &DrawConfig) -> Result<Self, ConfigError> {
        Self::new(config.pool_min, config.pool_max, config.draw_length)
    }

    pub fn pool_size(&self) -> usize {
        (self.pool_max - self.pool_min) as usize + 1
    }

    pub fn draw_length(&self) -> usize {
        self.draw_length
    }

    /// Derive the drawn sequence for `seed`
    pub fn derive(&self, seed: &Seed) -> Vec<u32> {
        let mut pool: Vec<u32> = (self.pool_min..=self.pool_max).collect();
        let mut drawn = Vec::with_capacity(self.draw_length);
        let mut counter = 0u64;

        while drawn.len() < self.draw_length {
            let index = next_index(seed, &mut counter, pool.len() as u64);
            drawn.push(pool.swap_remove(index));
        }

        drawn
    }
}

/// One-shot derivation without keeping an engine around
pub fn derive_sequence(
    seed: &Seed,
    pool_min: u32,
    pool_max: u32,
    draw_length: usize,
) -> Result<Vec<u32>, ConfigError> {
    Ok(DrawEngine::new(pool_min, pool_max, draw_length)?.derive(seed))
}

/// Uniform index in `0..bound`, advancing `counter` past every rejected sample
fn next_index(seed: &Seed, counter: &mut u64, bound: u64) -> usize {
    // Samples at or above `zone` would bias the modulo toward low indices.
    let zone = u64::MAX - (u64::MAX % bound);
    loop {
        let sample = stream_word(seed, *counter);
        *counter += 1;
        if sample < zone {
            return (sample % bound) as usize;
        }
    }
}

fn stream_word(seed: &Seed, counter: u64) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(DRAW_DOMAIN);
    hasher.update(seed.as_bytes());
    hasher.update(counter.to_le_bytes());
    let digest = hasher.finalize();

    let mut word = [0u8; 8];
    word.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(word)
}
