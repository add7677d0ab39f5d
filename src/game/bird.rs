use crate::game::{object::Object, pipe::Pipe, GameConfig};

#[derive(Debug, Clone, PartialEq)]
pub struct Bird {
    width: f32,
    height: f32,
    x: f32,
    y: f32,
    velocity: f32,
}

impl Bird {
    pub fn new(config: &GameConfig) -> Self {
        Self::at(config.bird_x, config.bird_y, config.bird_width, config.bird_height)
    }

    pub fn at(x: f32, y: f32, width: f32, height: f32) -> Self {
        Bird { width, height, x, y, velocity: 0.0 }
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }

    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    /// One tick of free fall. Position is never clamped.
    pub fn update(&mut self, gravity: f32) {
        self.velocity += gravity;
        self.y += self.velocity;
    }

    /// Replaces the velocity and moves by it in the same tick.
    pub fn jump(&mut self, impulse: f32) {
        self.velocity = impulse;
        self.y += self.velocity;
    }

    pub fn collides(&self, pipe: &Pipe, ceiling_y: f32, base_y: f32) -> bool {
        pipe.segments().iter().any(|segment| self.collides_with(segment)) || self.y >= base_y || self.y <= ceiling_y
    }
}

impl Object for Bird {
    fn get_size(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    fn get_pos(&self) -> (f32, f32) {
        (self.x, self.y)
    }
}
