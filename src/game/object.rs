/// Axis-aligned rectangle in canvas coordinates, `y` growing downwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hitbox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Hitbox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        (self.x..self.right()).contains(&x) && (self.y..self.bottom()).contains(&y)
    }

    /// Edges that only touch do not intersect.
    pub fn intersects(&self, other: &Hitbox) -> bool {
        interval_sec(self.x, self.right(), other.x, other.right())
            && interval_sec(self.y, self.bottom(), other.y, other.bottom())
    }
}

pub trait Object {
    fn get_size(&self) -> (f32, f32);
    fn get_pos(&self) -> (f32, f32);

    fn hitbox(&self) -> Hitbox {
        let (x, y) = self.get_pos();
        let (width, height) = self.get_size();
        Hitbox { x, y, width, height }
    }

    fn collides_with<T: Object>(&self, other: &T) -> bool {
        self.hitbox().intersects(&other.hitbox())
    }
}

fn interval_sec(l1: f32, r1: f32, l2: f32, r2: f32) -> bool {
    l1 < r2 && l2 < r1
}
