//! Seedable randomness for defect, rework and downtime draws.
//!
//! The engine only sees the [`RandomSource`] trait so callers can inject
//! their own generator. The default is [`SimRng`], a SplitMix64 generator:
//! fast, 8 bytes of state, identical sequences across platforms.

use crate::fixed::Fixed64;

/// A source of random bits for the simulation.
pub trait RandomSource: std::fmt::Debug {
    /// Generate the next `u64` in the sequence.
    fn next_u64(&mut self) -> u64;

    /// Returns `true` with the given probability (Fixed64 in [0, 1]).
    ///
    /// - probability <= 0 always returns false and consumes nothing
    /// - probability >= 1 always returns true and consumes nothing
    fn chance(&mut self, probability: Fixed64) -> bool {
        if probability <= Fixed64::ZERO {
            return false;
        }
        if probability >= Fixed64::ONE {
            return true;
        }
        // For p in (0,1) the raw Q32.32 bits are the fraction scaled to
        // [0, 2^32); compare against a uniform u32.
        let upper = (self.next_u64() >> 32) as u32;
        (upper as u64) < probability.to_bits() as u64
    }
}

/// SplitMix64 pseudo-random number generator.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SimRng {
    state: u64,
}

impl SimRng {
    /// Create a new RNG with the given seed.
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Get the internal state.
    ///
    /// Not part of [`Engine::state_hash`](crate::engine::Engine::state_hash):
    /// runs that never draw fingerprint alike whatever the seed.
    pub fn state(&self) -> u64 {
        self.state
    }
}

impl RandomSource for SimRng {
    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }
}
