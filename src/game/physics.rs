//! Ball and paddle physics

use rand::Rng;

use crate::ws::protocol::GameState;

use super::Slot;

/// Playfield width
pub const WIDTH: f32 = 800.0;
/// Playfield height
pub const HEIGHT: f32 = 600.0;
pub const PADDLE_HEIGHT: f32 = 100.0;
pub const PADDLE_WIDTH: f32 = 10.0;
pub const BALL_RADIUS: f32 = 10.0;
/// Gap between a paddle and its side wall
pub const PADDLE_OFFSET: f32 = 10.0;

/// Horizontal serve speed (units per tick)
pub const SERVE_SPEED_X: f32 = 4.0;
/// Vertical serve speed (units per tick)
pub const SERVE_SPEED_Y: f32 = 3.0;

/// Lowest allowed paddle offset is 0, highest is this
pub const PADDLE_MAX_Y: f32 = HEIGHT - PADDLE_HEIGHT;

/// Inner face of the left paddle
const LEFT_PADDLE_FACE: f32 = PADDLE_OFFSET + PADDLE_WIDTH;
/// Inner face of the right paddle
const RIGHT_PADDLE_FACE: f32 = WIDTH - PADDLE_OFFSET - PADDLE_WIDTH;

/// What happened to the rally during one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Ball still in play
    Rally,
    /// Ball left the field; the given slot scored
    Point(Slot),
}

/// Physics system for advancing a match one tick at a time
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Fresh match: ball centred and served in a random diagonal, paddles centred
    pub fn init_state<R: Rng + ?Sized>(rng: &mut R) -> GameState {
        let centred_paddle = HEIGHT / 2.0 - PADDLE_HEIGHT / 2.0;
        GameState {
            ball_x: WIDTH / 2.0,
            ball_y: HEIGHT / 2.0,
            velocity_x: Self::random_sign(rng) * SERVE_SPEED_X,
            velocity_y: Self::random_sign(rng) * SERVE_SPEED_Y,
            paddle1_y: centred_paddle,
            paddle2_y: centred_paddle,
            score1: 0,
            score2: 0,
        }
    }

    /// Advance the simulation by one tick.
    ///
    /// Steps run in a fixed order: integrate, wall bounce, left paddle,
    /// right paddle, scoring. Scoring sees the position left by the paddle
    /// checks, so a ball that is past the goal line and was not caught by a
    /// paddle this tick is a miss.
    pub fn tick<R: Rng + ?Sized>(state: &mut GameState, rng: &mut R) -> TickOutcome {
        state.ball_x += state.velocity_x;
        state.ball_y += state.velocity_y;

        // Walls only flip direction; the ball may overlap them for one tick
        if state.ball_y - BALL_RADIUS < 0.0 || state.ball_y + BALL_RADIUS > HEIGHT {
            state.velocity_y = -state.velocity_y;
        }

        if state.velocity_x < 0.0
            && state.ball_x - BALL_RADIUS < LEFT_PADDLE_FACE
            && Self::overlaps_paddle(state.ball_y, state.paddle1_y)
        {
            state.velocity_x = -state.velocity_x;
            state.ball_x = LEFT_PADDLE_FACE + BALL_RADIUS;
        }

        if state.velocity_x > 0.0
            && state.ball_x + BALL_RADIUS > RIGHT_PADDLE_FACE
            && Self::overlaps_paddle(state.ball_y, state.paddle2_y)
        {
            state.velocity_x = -state.velocity_x;
            state.ball_x = RIGHT_PADDLE_FACE - BALL_RADIUS;
        }

        if state.ball_x < 0.0 {
            state.score2 += 1;
            Self::reset_ball(state, rng);
            return TickOutcome::Point(Slot::Two);
        }

        if state.ball_x > WIDTH {
            state.score1 += 1;
            Self::reset_ball(state, rng);
            return TickOutcome::Point(Slot::One);
        }

        TickOutcome::Rally
    }

    /// Clamp a requested paddle offset into the playfield
    pub fn clamp_paddle(position: f32) -> f32 {
        if position.is_nan() {
            return 0.0;
        }
        position.clamp(0.0, PADDLE_MAX_Y)
    }

    /// Re-serve from the centre toward the side that just conceded
    fn reset_ball<R: Rng + ?Sized>(state: &mut GameState, rng: &mut R) {
        state.ball_x = WIDTH / 2.0;
        state.ball_y = HEIGHT / 2.0;
        state.velocity_x = if state.velocity_x > 0.0 {
            -SERVE_SPEED_X
        } else {
            SERVE_SPEED_X
        };
        state.velocity_y = Self::random_sign(rng) * SERVE_SPEED_Y;
    }

    fn overlaps_paddle(ball_y: f32, paddle_y: f32) -> bool {
        ball_y + BALL_RADIUS > paddle_y && ball_y - BALL_RADIUS < paddle_y + PADDLE_HEIGHT
    }

    fn random_sign<R: Rng + ?Sized>(rng: &mut R) -> f32 {
        if rng.gen_bool(0.5) {
            1.0
        } else {
            -1.0
        }
    }
}
