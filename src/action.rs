use serde::Deserialize;
use strum::Display;

#[derive(Debug, Clone, PartialEq, Eq, Display, Deserialize)]
pub enum Action {
    Tick,
    Render,
    Resize(u16, u16),
    Suspend,
    Resume,
    Quit,
    ToggleShowHelp,
    TogglePause,
    SpeedUp,
    SlowDown,
    ResetSpeed,
}

impl Action {
    /// Label shown next to a key in the help overlay.
    pub fn describe(&self) -> &'static str {
        match self {
            Action::Quit => "Quit",
            Action::Suspend => "Suspend",
            Action::ToggleShowHelp => "Toggle help",
            Action::TogglePause => "Pause / resume",
            Action::SpeedUp => "Faster",
            Action::SlowDown => "Slower",
            Action::ResetSpeed => "Normal speed",
            _ => "",
        }
    }
}
