pub mod game;
pub mod scene;

/// Terminal cells reserved for the playfield.
pub const SCENE_WIDTH: u16 = 38;
pub const SCENE_HEIGHT: u16 = 34;

/// Terminal cells reserved for the side panel.
pub const HUD_WIDTH: u16 = 30;
