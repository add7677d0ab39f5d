use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};

use crate::{
    constants::{
        game::{CANVAS_HEIGHT, CANVAS_WIDTH},
        scene::*,
    },
    game::{
        object::{Hitbox, Object},
        GameConfig, GenerationEvaluator, Pipe,
    },
};

/// The playfield scaled onto terminal cells, two canvas samples per cell using half blocks.
#[derive(Debug)]
pub struct Scene<'a> {
    config: &'a GameConfig,
    pipe: Option<&'a Pipe>,
    base_offset: f32,
    birds: Vec<Hitbox>,
    score: Option<u32>,
}

impl<'a> Scene<'a> {
    pub fn new<C>(evaluator: &'a GenerationEvaluator<C>) -> Self {
        Self {
            config: evaluator.config(),
            pipe: Some(evaluator.pipe()),
            base_offset: evaluator.base().x(),
            birds: evaluator.agents().iter().map(|agent| agent.bird.hitbox()).collect(),
            score: Some(evaluator.score()),
        }
    }

    /// Sky and ground only, shown while no generation is running.
    pub fn empty(config: &'a GameConfig) -> Self {
        Self { config, pipe: None, base_offset: 0.0, birds: Vec::new(), score: None }
    }

    /// Colour of the canvas point `(x, y)`. The first bird is the leader and is drawn on top.
    pub fn sample(&self, x: f32, y: f32) -> Color {
        if let Some(index) = self.birds.iter().position(|bird| bird.contains(x, y)) {
            return if index == 0 { LEADER_COLOR } else { BIRD_COLOR };
        }
        if y >= self.config.base_y {
            let stripe = ((x - self.base_offset) / BASE_STRIPE).floor() as i64;
            return if stripe.rem_euclid(2) == 0 { BASE_COLOR } else { BASE_STRIPE_COLOR };
        }
        if let Some(pipe) = self.pipe {
            for segment in pipe.segments() {
                let hitbox = segment.hitbox();
                if hitbox.contains(x, y) {
                    let edge = x < hitbox.x + PIPE_EDGE || x >= hitbox.right() - PIPE_EDGE;
                    return if edge { PIPE_EDGE_COLOR } else { PIPE_COLOR };
                }
            }
        }
        SKY_COLOR
    }
}

impl Widget for Scene<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.is_empty() {
            return;
        }
        let x_scale = CANVAS_WIDTH / area.width as f32;
        let y_scale = CANVAS_HEIGHT / (area.height as f32 * 2.0);

        for row in 0..area.height {
            let top_y = (row as f32 * 2.0 + 0.5) * y_scale;
            let bottom_y = (row as f32 * 2.0 + 1.5) * y_scale;
            for col in 0..area.width {
                let x = (col as f32 + 0.5) * x_scale;
                if let Some(cell) = buf.cell_mut((area.x + col, area.y + row)) {
                    cell.set_symbol("▀").set_fg(self.sample(x, top_y)).set_bg(self.sample(x, bottom_y));
                }
            }
        }

        if let Some(score) = self.score {
            let text = score.to_string();
            let x = area.x + area.width.saturating_sub(text.len() as u16) / 2;
            buf.set_string(x, area.y + 1, text, Style::default().fg(SCORE_COLOR).bg(SKY_COLOR));
        }
    }
}
