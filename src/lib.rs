//! # Pong Match Server
//!
//! Authoritative server for two-player online Pong matches.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      PONG MATCH SERVER                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Simulation primitives                     │
//! │  └── rng.rs      - Deterministic Xorshift128+ PRNG           │
//! │                                                              │
//! │  game/           - Match simulation (pure, no I/O)           │
//! │  ├── state.rs    - Field config, ball, paddles, score        │
//! │  ├── tick.rs     - Per-tick physics, collisions, scoring     │
//! │  └── events.rs   - Goal and match-end events                 │
//! │                                                              │
//! │  network/        - Networking and match lifecycle            │
//! │  ├── auth.rs     - JWT validation (external identity)        │
//! │  ├── protocol.rs - Wire message types                        │
//! │  ├── session.rs  - One match: slots, lifecycle, broadcast    │
//! │  ├── registry.rs - Concurrent match registry                 │
//! │  ├── sink.rs     - Result sink for finished matches          │
//! │  └── server.rs   - WebSocket gateway and tick loops          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Authority Model
//!
//! The `game/` module owns the only mutable copy of a match's physics
//! state, and it is mutated exclusively by that match's tick loop.
//! Session gateways submit commands and relay broadcasts; they never
//! touch the state directly. Serve randomness comes from a per-match
//! seeded PRNG, so a match replayed with the same seed and inputs is
//! reproducible.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use crate::core::rng::MatchRng;
pub use game::state::{GameConfig, GameState, MatchStatus, PlayerNumber};
pub use game::tick::TickOutcome;
pub use network::registry::MatchRegistry;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Simulation tick rate (Hz)
pub const TICK_RATE: u32 = 60;

/// Default points needed to win a match
pub const DEFAULT_MAX_SCORE: u32 = 11;
