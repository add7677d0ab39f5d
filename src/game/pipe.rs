use rand::Rng;

use crate::game::{object::Object, GameConfig};

/// One half of a pipe pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    width: f32,
    height: f32,
    x: f32,
    y: f32,
}

impl Segment {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Segment { width, height, x, y }
    }

    pub fn move_left(&mut self, step: f32) {
        self.x -= step;
    }
}

impl Object for Segment {
    fn get_size(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    fn get_pos(&self) -> (f32, f32) {
        (self.x, self.y)
    }
}

/// A pipe pair with a gap of constant height between its segments.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipe {
    x: f32,
    gap_top: f32,
    gap_bottom: f32,
    segments: [Segment; 2],
    passed: bool,
}

impl Pipe {
    /// Spawns at the right edge with a gap centre drawn from the configured integer range.
    pub fn new<R: Rng + ?Sized>(config: &GameConfig, rng: &mut R) -> Self {
        let center = rng.gen_range(config.pipe_gap_center_min..config.pipe_gap_center_max);
        Self::with_gap_center(config, center as f32)
    }

    pub fn with_gap_center(config: &GameConfig, center: f32) -> Self {
        let x = config.pipe_spawn_x;
        let gap_top = center - config.pipe_gap / 2.0;
        let gap_bottom = gap_top + config.pipe_gap;

        let upper = Segment::new(x, gap_top - config.pipe_length, config.pipe_width, config.pipe_length);
        let lower = Segment::new(x, gap_bottom, config.pipe_width, config.pipe_length);

        Pipe { x, gap_top, gap_bottom, segments: [upper, lower], passed: false }
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    /// Lower edge of the upper segment.
    pub fn gap_top(&self) -> f32 {
        self.gap_top
    }

    /// Upper edge of the lower segment.
    pub fn gap_bottom(&self) -> f32 {
        self.gap_bottom
    }

    pub fn segments(&self) -> &[Segment; 2] {
        &self.segments
    }

    pub fn passed(&self) -> bool {
        self.passed
    }

    pub fn advance(&mut self, velocity: f32) {
        self.x -= velocity;
        for segment in self.segments.iter_mut() {
            segment.move_left(velocity);
        }
    }

    pub fn has_passed(&self, bird_x: f32) -> bool {
        bird_x > self.x
    }

    /// Returns true only on the first call after the bird column clears the pipe.
    pub fn mark_passed(&mut self, bird_x: f32) -> bool {
        if !self.passed && self.has_passed(bird_x) {
            self.passed = true;
            true
        } else {
            false
        }
    }

    pub fn is_off_screen(&self, threshold: f32) -> bool {
        self.x < threshold
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    #[test]
    fn test_gap_is_constant_and_centre_in_range() {
        let config = GameConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..10_000 {
            let pipe = Pipe::new(&config, &mut rng);
            assert_eq!(pipe.gap_bottom() - pipe.gap_top(), config.pipe_gap);
            let center = (pipe.gap_top() + pipe.gap_bottom()) / 2.0;
            assert!(center >= config.pipe_gap_center_min as f32, "centre {center} below range");
            assert!(center < config.pipe_gap_center_max as f32, "centre {center} above range");
        }
    }

    #[test]
    fn test_segments_border_the_gap() {
        let config = GameConfig::default();
        let pipe = Pipe::with_gap_center(&config, 300.0);
        let [upper, lower] = pipe.segments();
        let upper = upper.hitbox();
        let lower = lower.hitbox();
        assert_eq!(upper.bottom(), 250.0);
        assert_eq!(lower.y, 350.0);
        assert_eq!(upper.x, config.pipe_spawn_x);
        assert_eq!(lower.width, config.pipe_width);
    }

    #[test]
    fn test_advance_moves_both_segments() {
        let config = GameConfig::default();
        let mut pipe = Pipe::with_gap_center(&config, 300.0);
        pipe.advance(config.pipe_velocity);
        pipe.advance(config.pipe_velocity);
        assert_eq!(pipe.x(), config.pipe_spawn_x - 10.0);
        for segment in pipe.segments() {
            assert_eq!(segment.hitbox().x, pipe.x());
        }
    }

    #[test]
    fn test_mark_passed_fires_once() {
        let config = GameConfig::default();
        let mut pipe = Pipe::with_gap_center(&config, 300.0);
        assert!(!pipe.mark_passed(config.bird_x));
        while !pipe.has_passed(config.bird_x) {
            pipe.advance(config.pipe_velocity);
        }
        assert!(pipe.mark_passed(config.bird_x));
        assert!(!pipe.mark_passed(config.bird_x));
        assert!(pipe.passed());
    }

    #[test]
    fn test_off_screen_threshold() {
        let config = GameConfig::default();
        let mut pipe = Pipe::with_gap_center(&config, 300.0);
        pipe.advance(config.pipe_spawn_x - config.pipe_offscreen_x);
        assert!(!pipe.is_off_screen(config.pipe_offscreen_x));
        pipe.advance(1.0);
        assert!(pipe.is_off_screen(config.pipe_offscreen_x));
    }
}
