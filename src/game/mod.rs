pub mod base;
pub mod bird;
pub mod controller;
pub mod evaluator;
pub mod object;
pub mod pipe;

use color_eyre::eyre::{ensure, Result};
use serde::{Deserialize, Serialize};

pub use crate::game::{
    base::Base,
    bird::Bird,
    controller::{Controller, NetworkController, Observation},
    evaluator::{Agent, EvaluatorState, GenerationEvaluator, TickReport},
    pipe::Pipe,
};
use crate::constants::game;

/// Fitness shaping applied by the evaluator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitnessConfig {
    pub tick_reward: f64,
    pub collision_penalty: f64,
    pub pipe_bonus: f64,
}

impl Default for FitnessConfig {
    fn default() -> Self {
        Self {
            tick_reward: game::TICK_REWARD,
            collision_penalty: game::COLLISION_PENALTY,
            pipe_bonus: game::PIPE_BONUS,
        }
    }
}

/// Every tunable of the simulated world. Screen y grows downwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub gravity: f32,
    pub jump_velocity: f32,
    pub bird_x: f32,
    pub bird_y: f32,
    pub bird_width: f32,
    pub bird_height: f32,
    pub pipe_spawn_x: f32,
    pub pipe_velocity: f32,
    pub pipe_width: f32,
    pub pipe_length: f32,
    pub pipe_gap: f32,
    pub pipe_gap_center_min: i32,
    pub pipe_gap_center_max: i32,
    pub pipe_offscreen_x: f32,
    pub base_y: f32,
    pub ceiling_y: f32,
    pub base_velocity: f32,
    pub base_width: f32,
    pub jump_threshold: f64,
    pub checkpoint_score: u32,
    pub fitness: FitnessConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            gravity: game::GRAVITY,
            jump_velocity: game::JUMP_VELOCITY,
            bird_x: game::BIRD_X,
            bird_y: game::BIRD_Y,
            bird_width: game::BIRD_WIDTH,
            bird_height: game::BIRD_HEIGHT,
            pipe_spawn_x: game::PIPE_SPAWN_X,
            pipe_velocity: game::PIPE_VELOCITY,
            pipe_width: game::PIPE_WIDTH,
            pipe_length: game::PIPE_LENGTH,
            pipe_gap: game::PIPE_GAP,
            pipe_gap_center_min: game::PIPE_GAP_CENTER_MIN,
            pipe_gap_center_max: game::PIPE_GAP_CENTER_MAX,
            pipe_offscreen_x: game::PIPE_OFFSCREEN_X,
            base_y: game::BASE_Y,
            ceiling_y: game::CEILING_Y,
            base_velocity: game::BASE_VELOCITY,
            base_width: game::BASE_WIDTH,
            jump_threshold: game::JUMP_THRESHOLD,
            checkpoint_score: game::CHECKPOINT_SCORE,
            fitness: FitnessConfig::default(),
        }
    }
}

impl GameConfig {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.pipe_gap_center_min < self.pipe_gap_center_max,
            "pipe gap centre range [{}, {}) is empty",
            self.pipe_gap_center_min,
            self.pipe_gap_center_max
        );
        ensure!(self.pipe_gap > 0.0, "pipe gap must be positive, got {}", self.pipe_gap);
        ensure!(self.ceiling_y < self.base_y, "ceiling {} must lie above the base {}", self.ceiling_y, self.base_y);
        ensure!(self.base_width > 0.0, "base width must be positive, got {}", self.base_width);
        ensure!(
            self.bird_width > 0.0 && self.bird_height > 0.0,
            "bird size {}x{} must be positive",
            self.bird_width,
            self.bird_height
        );
        Ok(())
    }
}
