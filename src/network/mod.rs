//! Network Layer
//!
//! WebSocket server, authentication, wire protocol, and the concurrent
//! match registry. This layer is **non-deterministic** - all game logic
//! runs through `game/`.

pub mod auth;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;
pub mod sink;

pub use auth::{validate_token, AuthConfig, AuthError, Identity, TokenClaims};
pub use protocol::{ClientMessage, ErrorCode, MatchSummary, RosterEntry, ServerMessage};
pub use registry::{MatchRegistry, RegistryError, RegistryPolicy, SharedSession};
pub use server::{GameServer, GameServerError, ServerConfig};
pub use session::{MatchSession, SessionError};
pub use sink::{LoggingSink, MatchRecord, MemorySink, ResultSink};
