//! Seeded linear-congruential generator
//!
//! Replaying the same sequence of operations against a fresh generator
//! yields the same outcomes.

const MULTIPLIER: u32 = 1_664_525;
const INCREMENT: u32 = 1_013_904_223;
/// 2^32, the generator modulus
const MODULUS: f64 = 4_294_967_296.0;

/// LCG with multiplier 1664525, increment 1013904223, modulus 2^32
#[derive(Debug, Clone)]
pub struct Lcg {
    state: u32,
}

impl Lcg {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Advance and return the raw 32-bit state
    pub fn next_u32(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(MULTIPLIER)
            .wrapping_add(INCREMENT);
        self.state
    }

    /// Advance and return a draw in [0, 1)
    pub fn next_f64(&mut self) -> f64 {
        f64::from(self.next_u32()) / MODULUS
    }
}
