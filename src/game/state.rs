//! Game State Definitions
//!
//! All state for one Pong match: field configuration, ball, paddles and
//! score. Coordinates use the classic canvas convention: origin top-left,
//! y grows downward, ball position is its top-left corner.

use serde::{Deserialize, Serialize};

/// Lowest admissible winning score.
pub const MIN_MAX_SCORE: u32 = 1;

/// Highest admissible winning score.
pub const MAX_MAX_SCORE: u32 = 21;

// =============================================================================
// PLAYER NUMBER
// =============================================================================

/// Side of the field a participant plays on.
///
/// Player 1 defends the left goal, player 2 the right. Assigned in
/// arrival order at join time and never reassigned while the match lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum PlayerNumber {
    /// Left side.
    One,
    /// Right side.
    Two,
}

impl PlayerNumber {
    /// The other side.
    pub fn opponent(self) -> PlayerNumber {
        match self {
            PlayerNumber::One => PlayerNumber::Two,
            PlayerNumber::Two => PlayerNumber::One,
        }
    }
}

impl From<PlayerNumber> for u8 {
    fn from(n: PlayerNumber) -> u8 {
        match n {
            PlayerNumber::One => 1,
            PlayerNumber::Two => 2,
        }
    }
}

impl TryFrom<u8> for PlayerNumber {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(PlayerNumber::One),
            2 => Ok(PlayerNumber::Two),
            other => Err(format!("invalid player number: {other}")),
        }
    }
}

impl std::fmt::Display for PlayerNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

// =============================================================================
// MATCH STATUS
// =============================================================================

/// Lifecycle status of a match.
///
/// `Waiting → Active → Finished`, with `Waiting → Cancelled` when a bound
/// player never attaches and `Active → Cancelled` when a disconnect is
/// not recovered within the grace period. Terminal states absorb.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// Created, fewer than two live connections.
    Waiting,
    /// Both connections live, simulation running.
    Active,
    /// A score reached the limit.
    Finished,
    /// Abandoned before a result.
    Cancelled,
}

impl MatchStatus {
    /// Whether the status admits no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, MatchStatus::Finished | MatchStatus::Cancelled)
    }
}

// =============================================================================
// FIELD CONFIGURATION
// =============================================================================

/// Fixed parameters of the playfield and match.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameConfig {
    /// Field width in game units.
    pub field_width: f32,
    /// Field height in game units.
    pub field_height: f32,
    /// Paddle thickness (the x-plane depth).
    pub paddle_width: f32,
    /// Paddle vertical extent.
    pub paddle_height: f32,
    /// Vertical distance a paddle moves per input event.
    pub paddle_speed: f32,
    /// Ball edge length (the ball is square).
    pub ball_size: f32,
    /// Horizontal serve speed.
    pub ball_speed: f32,
    /// Vertical speed when the ball strikes a paddle edge; a center hit
    /// returns flat, and the mapping between is linear.
    pub max_bounce_dy: f32,
    /// Points needed to win, in `[MIN_MAX_SCORE, MAX_MAX_SCORE]`.
    pub max_score: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            field_width: 800.0,
            field_height: 600.0,
            paddle_width: 15.0,
            paddle_height: 100.0,
            paddle_speed: 8.0,
            ball_size: 15.0,
            ball_speed: 5.0,
            max_bounce_dy: 4.0,
            max_score: crate::DEFAULT_MAX_SCORE,
        }
    }
}

impl GameConfig {
    /// Default configuration with a custom winning score.
    pub fn with_max_score(max_score: u32) -> Self {
        Self {
            max_score,
            ..Self::default()
        }
    }

    /// Highest paddle y such that the paddle stays on the field.
    pub fn paddle_max_y(&self) -> f32 {
        self.field_height - self.paddle_height
    }
}

// =============================================================================
// ENTITIES
// =============================================================================

/// Ball state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ball {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Horizontal velocity per tick.
    pub dx: f32,
    /// Vertical velocity per tick.
    pub dy: f32,
    /// Scalar serve speed.
    pub speed: f32,
}

/// Paddle state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Paddle {
    /// Top edge.
    pub y: f32,
    /// Distance moved per input event.
    pub speed: f32,
}

/// Match score.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    /// Player 1 points.
    pub player1: u32,
    /// Player 2 points.
    pub player2: u32,
}

impl Score {
    /// Points for one side.
    pub fn get(&self, player: PlayerNumber) -> u32 {
        match player {
            PlayerNumber::One => self.player1,
            PlayerNumber::Two => self.player2,
        }
    }

    /// Add one point for one side.
    pub fn increment(&mut self, player: PlayerNumber) {
        match player {
            PlayerNumber::One => self.player1 += 1,
            PlayerNumber::Two => self.player2 += 1,
        }
    }
}

// =============================================================================
// GAME STATE
// =============================================================================

/// The mutable physics state of one match.
///
/// Owned and mutated exclusively by the match's tick loop; everyone else
/// sees cloned snapshots.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GameState {
    /// Ball position and velocity.
    pub ball: Ball,
    /// Left paddle.
    pub paddle1: Paddle,
    /// Right paddle.
    pub paddle2: Paddle,
    /// Current score.
    pub score: Score,
    /// Ticking suspended by a player.
    pub is_paused: bool,
    /// Winner, set at the finishing tick.
    pub winner: Option<PlayerNumber>,
}

impl GameState {
    /// Initial state: paddles and ball centered, ball at rest.
    ///
    /// The first serve happens at activation, once both connections are
    /// live, via [`crate::game::tick::serve`].
    pub fn new(config: &GameConfig) -> Self {
        let paddle_y = (config.field_height - config.paddle_height) / 2.0;

        Self {
            ball: Ball {
                x: (config.field_width - config.ball_size) / 2.0,
                y: (config.field_height - config.ball_size) / 2.0,
                dx: 0.0,
                dy: 0.0,
                speed: config.ball_speed,
            },
            paddle1: Paddle {
                y: paddle_y,
                speed: config.paddle_speed,
            },
            paddle2: Paddle {
                y: paddle_y,
                speed: config.paddle_speed,
            },
            score: Score::default(),
            is_paused: false,
            winner: None,
        }
    }

    /// Whether a score has reached the limit.
    pub fn is_finished(&self) -> bool {
        self.winner.is_some()
    }

    /// Paddle for one side.
    pub fn paddle(&self, player: PlayerNumber) -> &Paddle {
        match player {
            PlayerNumber::One => &self.paddle1,
            PlayerNumber::Two => &self.paddle2,
        }
    }

    /// Mutable paddle for one side.
    pub fn paddle_mut(&mut self, player: PlayerNumber) -> &mut Paddle {
        match player {
            PlayerNumber::One => &mut self.paddle1,
            PlayerNumber::Two => &mut self.paddle2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_classic_field() {
        let config = GameConfig::default();
        assert_eq!(config.field_width, 800.0);
        assert_eq!(config.field_height, 600.0);
        assert_eq!(config.paddle_height, 100.0);
        assert_eq!(config.max_score, 11);
    }

    #[test]
    fn test_new_state_is_centered_and_at_rest() {
        let config = GameConfig::default();
        let state = GameState::new(&config);

        assert_eq!(state.ball.dx, 0.0);
        assert_eq!(state.ball.dy, 0.0);
        assert_eq!(state.paddle1.y, 250.0);
        assert_eq!(state.paddle2.y, 250.0);
        assert_eq!(state.score, Score::default());
        assert!(!state.is_paused);
        assert!(!state.is_finished());
    }

    #[test]
    fn test_score_accessors() {
        let mut score = Score::default();
        score.increment(PlayerNumber::Two);
        score.increment(PlayerNumber::Two);
        score.increment(PlayerNumber::One);

        assert_eq!(score.get(PlayerNumber::One), 1);
        assert_eq!(score.get(PlayerNumber::Two), 2);
    }

    #[test]
    fn test_player_number_wire_format() {
        let json = serde_json::to_string(&PlayerNumber::Two).unwrap();
        assert_eq!(json, "2");

        let parsed: PlayerNumber = serde_json::from_str("1").unwrap();
        assert_eq!(parsed, PlayerNumber::One);

        assert!(serde_json::from_str::<PlayerNumber>("3").is_err());
    }

    #[test]
    fn test_status_terminality() {
        assert!(!MatchStatus::Waiting.is_terminal());
        assert!(!MatchStatus::Active.is_terminal());
        assert!(MatchStatus::Finished.is_terminal());
        assert!(MatchStatus::Cancelled.is_terminal());
    }
}
