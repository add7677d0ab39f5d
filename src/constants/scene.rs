use ratatui::style::Color;

pub const SKY_COLOR: Color = Color::Rgb(8, 16, 40);
pub const PIPE_COLOR: Color = Color::LightGreen;
pub const PIPE_EDGE_COLOR: Color = Color::Green;
pub const BASE_COLOR: Color = Color::Yellow;
pub const BIRD_COLOR: Color = Color::LightBlue;
pub const LEADER_COLOR: Color = Color::LightYellow;
pub const BORDER_COLOR: Color = Color::from_u32(6315991);

pub const BASE_STRIPE: f32 = 24.0;
pub const PIPE_EDGE: f32 = 4.0;
pub const BASE_STRIPE_COLOR: Color = Color::Rgb(196, 160, 72);
pub const SCORE_COLOR: Color = Color::White;
