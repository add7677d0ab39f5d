//! Default physics and scoring constants, in logical canvas pixels per tick.

pub const CANVAS_WIDTH: f32 = 288.0;
pub const CANVAS_HEIGHT: f32 = 512.0;

pub const GRAVITY: f32 = 0.5;
pub const JUMP_VELOCITY: f32 = -7.0;

// Sprite centred at (50, 256).
pub const BIRD_X: f32 = 33.0;
pub const BIRD_Y: f32 = 244.0;
pub const BIRD_WIDTH: f32 = 34.0;
pub const BIRD_HEIGHT: f32 = 24.0;

pub const PIPE_SPAWN_X: f32 = 300.0;
pub const PIPE_VELOCITY: f32 = 5.0;
pub const PIPE_WIDTH: f32 = 52.0;
pub const PIPE_LENGTH: f32 = 320.0;
pub const PIPE_GAP: f32 = 100.0;
pub const PIPE_GAP_CENTER_MIN: i32 = 200;
pub const PIPE_GAP_CENTER_MAX: i32 = 430;
pub const PIPE_OFFSCREEN_X: f32 = -40.0;

pub const BASE_Y: f32 = 450.0;
pub const CEILING_Y: f32 = 0.0;
pub const BASE_VELOCITY: f32 = 5.0;
pub const BASE_WIDTH: f32 = 288.0;

pub const TICK_REWARD: f64 = 0.1;
pub const COLLISION_PENALTY: f64 = 1.0;
pub const PIPE_BONUS: f64 = 2.0;
pub const JUMP_THRESHOLD: f64 = 0.5;
pub const CHECKPOINT_SCORE: u32 = 30;
