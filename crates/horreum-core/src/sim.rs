//! Tick counter and state hashing.

use serde::{Deserialize, Serialize};

/// Simulation time, in ticks.
pub type Ticks = u64;

/// Mutable simulation state tracked by the city.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimState {
    /// Incremented by 1 at the end of every step.
    pub tick: Ticks,
}

impl SimState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Result of a single `City::step` call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StepResult {
    pub commands_applied: usize,
    pub commands_rejected: usize,
    /// Storage buildings whose worker has something to do this tick.
    pub busy_workers: usize,
    pub traders_routed: usize,
    pub traders_leaving: usize,
}

// ---------------------------------------------------------------------------
// State hash
// ---------------------------------------------------------------------------

const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const PRIME: u64 = 0x0000_0100_0000_01b3;

/// 64-bit FNV-1a over the city's stock, policy and trader fields.
///
/// Two cities that hash equal after the same tick are treated as in sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(u64);

impl StateHash {
    pub fn new() -> Self {
        Self(OFFSET_BASIS)
    }

    fn absorb(&mut self, bytes: &[u8]) {
        self.0 = bytes
            .iter()
            .fold(self.0, |acc, &b| (acc ^ u64::from(b)).wrapping_mul(PRIME));
    }

    pub fn write_u8(&mut self, v: u8) {
        self.absorb(&[v]);
    }

    pub fn write_u32(&mut self, v: u32) {
        self.absorb(&v.to_le_bytes());
    }

    pub fn write_u64(&mut self, v: u64) {
        self.absorb(&v.to_le_bytes());
    }

    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}
