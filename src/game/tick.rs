//! Authoritative Simulation Tick
//!
//! One fixed-interval update of a match: integrate the ball, reflect off
//! walls and paddles, detect goals, check the terminal score. Paddle
//! movement is *not* part of the tick; it applies immediately on command
//! receipt (see [`move_paddle`]) so input latency is independent of the
//! broadcast cadence.
//!
//! Physics never fails: commands that arrive in the wrong state are
//! ignored, not errors.

use crate::core::rng::MatchRng;
use crate::game::events::GameEvent;
use crate::game::state::{GameConfig, GameState, PlayerNumber};

/// Smallest vertical serve speed; keeps serves from being dead-flat.
const MIN_SERVE_DY: f32 = 1.0;

/// Result of a tick.
#[derive(Debug, Default)]
pub struct TickOutcome {
    /// Events generated this tick, in causal order.
    pub events: Vec<GameEvent>,
    /// Whether the match finished this tick.
    pub finished: bool,
}

/// Direction of a paddle-move command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaddleDirection {
    /// Toward the top of the field.
    Up,
    /// Toward the bottom of the field.
    Down,
}

/// Re-center the ball and launch it toward a random side.
///
/// Horizontal speed is always the full serve speed (never zero), the
/// vertical component is random but bounded away from zero.
pub fn serve(state: &mut GameState, config: &GameConfig, rng: &mut MatchRng) {
    state.ball.x = (config.field_width - config.ball_size) / 2.0;
    state.ball.y = (config.field_height - config.ball_size) / 2.0;
    state.ball.speed = config.ball_speed;
    state.ball.dx = if rng.coin() {
        config.ball_speed
    } else {
        -config.ball_speed
    };

    let mut dy = rng.range_f32(-2.0, 2.0);
    if dy.abs() < MIN_SERVE_DY {
        dy = if dy < 0.0 { -MIN_SERVE_DY } else { MIN_SERVE_DY };
    }
    state.ball.dy = dy;
}

/// Apply one paddle-move command.
///
/// Moves the paddle one `paddle_speed` step, clamped to the field.
/// Ignored while paused or after the match finished.
pub fn move_paddle(
    state: &mut GameState,
    config: &GameConfig,
    player: PlayerNumber,
    direction: PaddleDirection,
) {
    if state.is_paused || state.is_finished() {
        return;
    }

    let paddle = state.paddle_mut(player);
    let movement = match direction {
        PaddleDirection::Up => -paddle.speed,
        PaddleDirection::Down => paddle.speed,
    };
    paddle.y = (paddle.y + movement).clamp(0.0, config.paddle_max_y());
}

/// Run one simulation tick.
///
/// Order: integrate, wall reflection, paddle reflection, goal detection,
/// terminal check. No-op while paused or finished.
pub fn tick(state: &mut GameState, config: &GameConfig, rng: &mut MatchRng) -> TickOutcome {
    let mut outcome = TickOutcome::default();

    if state.is_paused || state.is_finished() {
        return outcome;
    }

    integrate_ball(state);
    reflect_off_walls(state, config);
    reflect_off_paddles(state, config);

    if let Some(scorer) = detect_goal(state, config) {
        state.score.increment(scorer);
        outcome.events.push(GameEvent::GoalScored {
            scorer,
            score: state.score,
        });

        if state.score.get(scorer) >= config.max_score {
            state.winner = Some(scorer);
            outcome.finished = true;
            outcome.events.push(GameEvent::MatchFinished {
                winner: scorer,
                score: state.score,
            });
        } else {
            serve(state, config, rng);
        }
    }

    outcome
}

/// Advance the ball by its velocity.
fn integrate_ball(state: &mut GameState) {
    state.ball.x += state.ball.dx;
    state.ball.y += state.ball.dy;
}

/// Reflect off the top and bottom boundaries, no energy loss.
///
/// Position is clamped back inside the field, so the ball is always in
/// bounds when the tick ends.
fn reflect_off_walls(state: &mut GameState, config: &GameConfig) {
    let ball = &mut state.ball;
    let floor = config.field_height - config.ball_size;

    if ball.y <= 0.0 {
        ball.y = 0.0;
        ball.dy = ball.dy.abs();
    } else if ball.y >= floor {
        ball.y = floor;
        ball.dy = -ball.dy.abs();
    }
}

/// Reflect off a paddle when the ball crosses its x-plane moving toward
/// it with its vertical center inside the paddle's extent.
///
/// The `dx` sign test means a ball that already reversed this tick
/// cannot be reflected again by the same paddle, and a ball fully past
/// the goal line is out of reach (the goal check owns it). The outgoing
/// vertical velocity is a linear function of where on the paddle the
/// ball struck, symmetric about the paddle center, producing angled
/// returns.
fn reflect_off_paddles(state: &mut GameState, config: &GameConfig) {
    let ball_center = state.ball.y + config.ball_size / 2.0;

    // Left paddle (player 1)
    if state.ball.x <= config.paddle_width
        && state.ball.x + config.ball_size >= 0.0
        && state.ball.dx < 0.0
    {
        let paddle = &state.paddle1;
        if ball_center >= paddle.y && ball_center <= paddle.y + config.paddle_height {
            state.ball.dy = deflection(ball_center, paddle.y, config);
            state.ball.dx = -state.ball.dx;
            state.ball.x = config.paddle_width + 1.0;
        }
    }

    // Right paddle (player 2)
    let right_plane = config.field_width - config.paddle_width - config.ball_size;
    if state.ball.x >= right_plane && state.ball.x <= config.field_width && state.ball.dx > 0.0 {
        let paddle = &state.paddle2;
        if ball_center >= paddle.y && ball_center <= paddle.y + config.paddle_height {
            state.ball.dy = deflection(ball_center, paddle.y, config);
            state.ball.dx = -state.ball.dx;
            state.ball.x = right_plane - 1.0;
        }
    }
}

/// Linear hit-offset to vertical-velocity mapping.
///
/// Center hit returns 0, edge hits return ±`max_bounce_dy`.
fn deflection(ball_center: f32, paddle_y: f32, config: &GameConfig) -> f32 {
    let paddle_center = paddle_y + config.paddle_height / 2.0;
    let offset = (ball_center - paddle_center) / (config.paddle_height / 2.0);
    offset.clamp(-1.0, 1.0) * config.max_bounce_dy
}

/// The player who scored this tick, if the ball left the field.
fn detect_goal(state: &GameState, config: &GameConfig) -> Option<PlayerNumber> {
    if state.ball.x + config.ball_size < 0.0 {
        // Past the left goal line: player 2 scores
        Some(PlayerNumber::Two)
    } else if state.ball.x > config.field_width {
        Some(PlayerNumber::One)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::Score;
    use proptest::prelude::*;

    fn setup() -> (GameState, GameConfig, MatchRng) {
        let config = GameConfig::default();
        let state = GameState::new(&config);
        (state, config, MatchRng::new(42))
    }

    #[test]
    fn test_serve_has_nonzero_components() {
        let (mut state, config, mut rng) = setup();
        for _ in 0..100 {
            serve(&mut state, &config, &mut rng);
            assert_eq!(state.ball.dx.abs(), config.ball_speed);
            assert!(state.ball.dy.abs() >= MIN_SERVE_DY);
        }
    }

    #[test]
    fn test_serve_goes_both_ways() {
        let (mut state, config, mut rng) = setup();
        let mut left = false;
        let mut right = false;
        for _ in 0..100 {
            serve(&mut state, &config, &mut rng);
            if state.ball.dx < 0.0 {
                left = true;
            } else {
                right = true;
            }
        }
        assert!(left && right);
    }

    #[test]
    fn test_ball_integrates_by_velocity() {
        let (mut state, config, mut rng) = setup();
        state.ball.dx = 5.0;
        state.ball.dy = -2.0;
        let (x, y) = (state.ball.x, state.ball.y);

        tick(&mut state, &config, &mut rng);

        assert_eq!(state.ball.x, x + 5.0);
        assert_eq!(state.ball.y, y - 2.0);
    }

    #[test]
    fn test_top_wall_reflects_down() {
        let (mut state, config, mut rng) = setup();
        state.ball.y = 1.0;
        state.ball.dy = -3.0;
        state.ball.dx = 1.0;

        tick(&mut state, &config, &mut rng);

        assert_eq!(state.ball.y, 0.0);
        assert!(state.ball.dy > 0.0);
    }

    #[test]
    fn test_bottom_wall_reflects_up() {
        let (mut state, config, mut rng) = setup();
        state.ball.y = config.field_height - config.ball_size - 1.0;
        state.ball.dy = 3.0;
        state.ball.dx = 1.0;

        tick(&mut state, &config, &mut rng);

        assert_eq!(state.ball.y, config.field_height - config.ball_size);
        assert!(state.ball.dy < 0.0);
    }

    #[test]
    fn test_left_paddle_reflects_once() {
        let (mut state, config, mut rng) = setup();
        // Ball heading into the left paddle's plane at paddle center height
        state.ball.x = config.paddle_width + 2.0;
        state.ball.dx = -5.0;
        state.ball.y = state.paddle1.y + config.paddle_height / 2.0 - config.ball_size / 2.0;
        state.ball.dy = 0.0;

        tick(&mut state, &config, &mut rng);

        assert_eq!(state.ball.dx, 5.0);
        assert!(state.ball.x > config.paddle_width);
    }

    #[test]
    fn test_left_paddle_miss_is_not_reflected() {
        let (mut state, config, mut rng) = setup();
        state.ball.x = config.paddle_width + 2.0;
        state.ball.dx = -5.0;
        // Well below the paddle
        state.ball.y = state.paddle1.y + config.paddle_height + 50.0;
        state.ball.dy = 0.0;

        tick(&mut state, &config, &mut rng);

        assert!(state.ball.dx < 0.0);
    }

    #[test]
    fn test_right_paddle_reflects() {
        let (mut state, config, mut rng) = setup();
        let plane = config.field_width - config.paddle_width - config.ball_size;
        state.ball.x = plane - 2.0;
        state.ball.dx = 5.0;
        state.ball.y = state.paddle2.y + config.paddle_height / 2.0 - config.ball_size / 2.0;
        state.ball.dy = 0.0;

        tick(&mut state, &config, &mut rng);

        assert_eq!(state.ball.dx, -5.0);
    }

    #[test]
    fn test_no_double_bounce_when_moving_away() {
        let (mut state, config, mut rng) = setup();
        // Ball inside the left plane but already moving right: the sign
        // test must leave it alone.
        state.ball.x = config.paddle_width - 5.0;
        state.ball.dx = 2.0;
        state.ball.y = state.paddle1.y + 10.0;
        state.ball.dy = 0.0;

        tick(&mut state, &config, &mut rng);

        assert_eq!(state.ball.dx, 2.0);
    }

    #[test]
    fn test_edge_hit_returns_angled() {
        let (mut state, config, mut rng) = setup();
        state.ball.x = config.paddle_width + 2.0;
        state.ball.dx = -5.0;
        // Strike near the paddle's top edge
        state.ball.y = state.paddle1.y + 2.0 - config.ball_size / 2.0;
        state.ball.dy = 0.0;

        tick(&mut state, &config, &mut rng);

        assert!(state.ball.dx > 0.0);
        assert!(state.ball.dy < 0.0, "top-edge hit must deflect upward");
    }

    #[test]
    fn test_center_hit_returns_flat() {
        let (mut state, config, mut rng) = setup();
        state.ball.x = config.paddle_width + 2.0;
        state.ball.dx = -5.0;
        state.ball.dy = 3.0;
        // Centers line up at the contact point, after integration
        state.ball.y = state.paddle1.y + config.paddle_height / 2.0
            - config.ball_size / 2.0
            - state.ball.dy;

        tick(&mut state, &config, &mut rng);

        assert_eq!(state.ball.dy, 0.0);
    }

    #[test]
    fn test_left_goal_scores_for_player_two() {
        let (mut state, config, mut rng) = setup();
        state.ball.x = -config.ball_size;
        state.ball.dx = -5.0;
        state.ball.y = 300.0;

        let outcome = tick(&mut state, &config, &mut rng);

        assert_eq!(state.score.player2, 1);
        assert_eq!(state.score.player1, 0);
        assert!(matches!(
            outcome.events[0],
            GameEvent::GoalScored {
                scorer: PlayerNumber::Two,
                ..
            }
        ));
        // Ball was re-served to center
        assert_eq!(state.ball.x, (config.field_width - config.ball_size) / 2.0);
    }

    #[test]
    fn test_right_goal_scores_for_player_one() {
        let (mut state, config, mut rng) = setup();
        state.ball.x = config.field_width - 1.0;
        state.ball.dx = 5.0;
        state.ball.y = 300.0;

        let outcome = tick(&mut state, &config, &mut rng);

        assert_eq!(state.score.player1, 1);
        assert_eq!(outcome.events.len(), 1);
    }

    #[test]
    fn test_final_goal_finishes_match() {
        let (mut state, mut config, mut rng) = setup();
        config.max_score = 3;
        state.score = Score {
            player1: 2,
            player2: 1,
        };
        state.ball.x = config.field_width - 1.0;
        state.ball.dx = 5.0;

        let outcome = tick(&mut state, &config, &mut rng);

        assert!(outcome.finished);
        assert_eq!(state.winner, Some(PlayerNumber::One));
        assert_eq!(
            outcome.events.last(),
            Some(&GameEvent::MatchFinished {
                winner: PlayerNumber::One,
                score: Score {
                    player1: 3,
                    player2: 1,
                },
            })
        );
        // No serve after the finishing goal: the ball stays put
        assert!(state.ball.x > config.field_width);
    }

    #[test]
    fn test_no_ticks_after_finish() {
        let (mut state, mut config, mut rng) = setup();
        config.max_score = 1;
        state.ball.x = config.field_width - 1.0;
        state.ball.dx = 5.0;
        tick(&mut state, &config, &mut rng);
        assert!(state.is_finished());

        let frozen = state.clone();
        let outcome = tick(&mut state, &config, &mut rng);
        assert!(outcome.events.is_empty());
        assert_eq!(state.ball, frozen.ball);
        assert_eq!(state.score, frozen.score);
    }

    #[test]
    fn test_pause_suspends_physics() {
        let (mut state, config, mut rng) = setup();
        state.ball.dx = 5.0;
        state.is_paused = true;
        let x = state.ball.x;

        let outcome = tick(&mut state, &config, &mut rng);

        assert!(outcome.events.is_empty());
        assert_eq!(state.ball.x, x);
    }

    #[test]
    fn test_move_paddle_steps_and_clamps() {
        let (mut state, config, _) = setup();

        move_paddle(&mut state, &config, PlayerNumber::One, PaddleDirection::Up);
        assert_eq!(state.paddle1.y, 250.0 - config.paddle_speed);

        for _ in 0..200 {
            move_paddle(&mut state, &config, PlayerNumber::One, PaddleDirection::Up);
        }
        assert_eq!(state.paddle1.y, 0.0);

        for _ in 0..200 {
            move_paddle(
                &mut state,
                &config,
                PlayerNumber::Two,
                PaddleDirection::Down,
            );
        }
        assert_eq!(state.paddle2.y, config.paddle_max_y());
    }

    #[test]
    fn test_move_paddle_rejected_while_paused() {
        let (mut state, config, _) = setup();
        state.is_paused = true;
        move_paddle(
            &mut state,
            &config,
            PlayerNumber::One,
            PaddleDirection::Down,
        );
        assert_eq!(state.paddle1.y, 250.0);
    }

    proptest! {
        /// Post-tick the ball is vertically in bounds and the scores are
        /// bounded by the winning score.
        #[test]
        fn prop_ball_in_bounds_after_tick(
            x in -20.0f32..820.0,
            y in 0.0f32..585.0,
            dx in -8.0f32..8.0,
            dy in -8.0f32..8.0,
            p1 in 0.0f32..500.0,
            p2 in 0.0f32..500.0,
        ) {
            let config = GameConfig::default();
            let mut rng = MatchRng::new(7);
            let mut state = GameState::new(&config);
            state.ball.x = x;
            state.ball.y = y;
            state.ball.dx = dx;
            state.ball.dy = dy;
            state.paddle1.y = p1;
            state.paddle2.y = p2;

            tick(&mut state, &config, &mut rng);

            prop_assert!(state.ball.y >= 0.0);
            prop_assert!(state.ball.y <= config.field_height - config.ball_size);
            prop_assert!(state.score.player1 <= config.max_score);
            prop_assert!(state.score.player2 <= config.max_score);
        }

        /// Scores move by at most one per tick and never both at once.
        #[test]
        fn prop_at_most_one_goal_per_tick(
            x in -20.0f32..820.0,
            dx in -8.0f32..8.0,
        ) {
            let config = GameConfig::default();
            let mut rng = MatchRng::new(9);
            let mut state = GameState::new(&config);
            state.ball.x = x;
            state.ball.y = 300.0;
            state.ball.dx = dx;

            let before = state.score;
            tick(&mut state, &config, &mut rng);
            let gained = (state.score.player1 - before.player1)
                + (state.score.player2 - before.player2);

            prop_assert!(gained <= 1);
        }
    }
}
