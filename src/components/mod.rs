pub mod help;
pub mod hud;
pub mod scene;
