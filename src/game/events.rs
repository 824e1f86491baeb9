//! Game Events
//!
//! Events generated by the simulation tick. The session loop turns these
//! into protocol broadcasts in the order they were produced, so a goal is
//! always observed before the snapshot that reflects it, and nothing
//! follows the finish event.

use serde::{Deserialize, Serialize};

use crate::game::state::{PlayerNumber, Score};

/// Event emitted by a simulation tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    /// A ball crossed a goal line.
    GoalScored {
        /// Player credited with the point.
        scorer: PlayerNumber,
        /// Score after the increment.
        score: Score,
    },

    /// A score reached the match limit.
    MatchFinished {
        /// Player with the higher score.
        winner: PlayerNumber,
        /// Final score.
        score: Score,
    },
}
