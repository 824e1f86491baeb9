//! Simulation primitives.
//!
//! The simulation keeps its randomness behind a seeded PRNG so that a
//! match replayed with the same seed produces the same serves.

pub mod rng;

pub use rng::MatchRng;
