//! Match Simulation
//!
//! Pure simulation code: no I/O, no clocks, no sockets. The network
//! layer drives it through [`tick::tick`] and the paddle/pause commands.
//!
//! ## Module Structure
//!
//! - `state`: field configuration, ball, paddles, score
//! - `tick`: the authoritative per-tick update
//! - `events`: events emitted by ticks

pub mod events;
pub mod state;
pub mod tick;

// Re-export key types
pub use events::GameEvent;
pub use state::{GameConfig, GameState, MatchStatus, PlayerNumber, Score};
pub use tick::{PaddleDirection, TickOutcome};
