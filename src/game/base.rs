use crate::game::GameConfig;

/// Scrolling ground. Only its `y` matters to the simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct Base {
    x: f32,
    y: f32,
    width: f32,
}

impl Base {
    pub fn new(config: &GameConfig) -> Self {
        Base { x: 0.0, y: config.base_y, width: config.base_width }
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }

    pub fn advance(&mut self, velocity: f32) {
        self.x -= velocity;
        if self.x < -self.width {
            self.x = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_scroll_wraps_after_one_width() {
        let config = GameConfig::default();
        let mut base = Base::new(&config);
        let steps = (config.base_width / config.base_velocity) as usize;
        for _ in 0..steps {
            base.advance(config.base_velocity);
        }
        assert!(base.x() >= -config.base_width);
        base.advance(config.base_velocity);
        assert_eq!(base.x(), 0.0);
        assert_eq!(base.y(), config.base_y);
    }
}
