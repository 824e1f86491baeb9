//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket. All
//! messages are JSON tagged unions, validated at the boundary before
//! anything reaches a match. The control plane (create / join / list)
//! and the per-match push channel share the same two enums.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::state::{GameState, PlayerNumber, Score};
use crate::game::tick::PaddleDirection;

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Create a new match (lobby channel).
    CreateMatch {
        /// Points needed to win; defaults to 11.
        max_score: Option<u32>,
    },

    /// Reserve the second slot of a waiting match (lobby channel).
    JoinMatch {
        /// Target match.
        match_id: Uuid,
    },

    /// List matches waiting for an opponent (lobby channel).
    ListMatches,

    /// Move own paddle one step (match channel).
    PaddleMove {
        /// Up or down.
        direction: PaddleDirection,
    },

    /// Suspend ticking (match channel).
    Pause,

    /// Resume ticking (match channel).
    Resume,

    /// Ping for latency measurement.
    Ping {
        /// Echoed back in the pong.
        timestamp: u64,
    },
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Match created, caller reserved as player 1.
    MatchCreated {
        /// New match id.
        match_id: Uuid,
    },

    /// Join succeeded, caller reserved as player 2.
    MatchJoined {
        /// Joined match.
        match_id: Uuid,
        /// Slot assigned to the caller.
        player_number: PlayerNumber,
    },

    /// Matches currently waiting for an opponent.
    MatchList {
        /// One summary per waiting match.
        matches: Vec<MatchSummary>,
    },

    /// Push connection accepted and bound to a slot.
    Connected {
        /// The match this connection is bound to.
        match_id: Uuid,
        /// Slot assigned to the caller.
        player_number: PlayerNumber,
        /// True until the opponent's connection is live too.
        waiting_for_opponent: bool,
    },

    /// Both connections live; simulation starting.
    MatchStarted {
        /// Roster, both slots.
        players: Vec<RosterEntry>,
    },

    /// Periodic state snapshot.
    State {
        /// Ball, paddles, score, pause flag.
        state: GameState,
    },

    /// A point was scored.
    GoalScored {
        /// Player credited with the point.
        scorer: PlayerNumber,
        /// Snapshot after the increment and re-serve.
        state: GameState,
    },

    /// Match reached the winning score.
    MatchEnded {
        /// Winner of the match.
        winner: PlayerNumber,
        /// Final score.
        final_score: Score,
        /// Seconds between activation and the finishing tick.
        duration_seconds: u64,
    },

    /// The opponent's connection dropped; the slot survives for a grace
    /// period.
    OpponentDisconnected {
        /// Slot that went dark.
        player_number: PlayerNumber,
        /// Opponent's display name.
        display_name: String,
    },

    /// The opponent re-attached within the grace period.
    OpponentReconnected {
        /// Slot that came back.
        player_number: PlayerNumber,
        /// Opponent's display name.
        display_name: String,
    },

    /// Ticking suspended.
    Paused {
        /// Display name of the initiator.
        by: String,
    },

    /// Ticking resumed.
    Resumed {
        /// Display name of the initiator.
        by: String,
    },

    /// Match abandoned without a result.
    MatchCancelled {
        /// Human-readable reason.
        reason: String,
    },

    /// Pong response.
    Pong {
        /// Client timestamp echoed back.
        timestamp: u64,
        /// Server wall clock, Unix millis.
        server_time: u64,
    },

    /// Request rejected.
    Error {
        /// Machine-readable code.
        code: ErrorCode,
        /// Human-readable message.
        message: String,
    },
}

/// Summary of a waiting match, for discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchSummary {
    /// Match id.
    pub match_id: Uuid,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Count of slots with a live connection (not merely reserved).
    pub players_connected: u8,
}

/// One participant in the match roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterEntry {
    /// Side the participant plays on.
    pub player_number: PlayerNumber,
    /// Participant's display name.
    pub display_name: String,
}

/// Error codes for rejected requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Token missing or invalid.
    NotAuthenticated,
    /// No match with that id.
    NotFound,
    /// Match is not accepting joins.
    NotJoinable,
    /// Both slots already bound.
    Full,
    /// Caller already holds a slot in this match.
    AlreadyJoined,
    /// Winning score outside the admissible range.
    InvalidMaxScore,
    /// Registry at capacity; retry later.
    ServerOverloaded,
    /// Message could not be parsed.
    InvalidInput,
    /// Internal error.
    InternalError,
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
