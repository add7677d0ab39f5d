use color_eyre::eyre::Result;
use ratatui::{
    layout::{Constraint, Layout, Margin},
    prelude::Rect,
    style::Style,
    widgets::{Block, BorderType, Borders},
};
use tokio::sync::mpsc;

use crate::{
    action::Action,
    components::{help::Help, hud::Hud, scene::Scene},
    config::Config,
    constants::{scene::BORDER_COLOR, HUD_WIDTH, SCENE_HEIGHT, SCENE_WIDTH},
    trainer::Trainer,
    tui,
};

pub const MAX_SPEED: u32 = 64;

pub struct App {
    config: Config,
    trainer: Trainer,
    tick_rate: f64,
    frame_rate: f64,
    should_quit: bool,
    should_suspend: bool,
    show_help: bool,
    paused: bool,
    speed: u32,
}

impl App {
    pub fn new(config: Config, trainer: Trainer) -> Self {
        Self {
            tick_rate: config.simulation.tick_rate,
            frame_rate: config.simulation.frame_rate,
            config,
            trainer,
            should_quit: false,
            should_suspend: false,
            show_help: false,
            paused: false,
            speed: 1,
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        let (action_tx, mut action_rx) = mpsc::unbounded_channel();

        let mut tui = tui::Tui::new()?;
        tui.tick_rate(self.tick_rate);
        tui.frame_rate(self.frame_rate);
        tui.enter()?;

        loop {
            if let Some(e) = tui.next().await {
                match e {
                    tui::Event::Tick => action_tx.send(Action::Tick)?,
                    tui::Event::Render => action_tx.send(Action::Render)?,
                    tui::Event::Resize(x, y) => action_tx.send(Action::Resize(x, y))?,
                    tui::Event::Key(key) => {
                        if let Some(action) = self.config.keybindings.get(&key) {
                            log::info!("Got action: {action:?}");
                            action_tx.send(action.clone())?;
                        }
                    },
                    tui::Event::Error => log::warn!("Failed to read a terminal event"),
                    tui::Event::Init => {},
                }
            }

            while let Ok(action) = action_rx.try_recv() {
                if action != Action::Tick && action != Action::Render {
                    log::debug!("{action:?}");
                }
                match action {
                    Action::Tick => self.tick()?,
                    Action::Quit => self.should_quit = true,
                    Action::Suspend => self.should_suspend = true,
                    Action::Resume => self.should_suspend = false,
                    Action::ToggleShowHelp => self.show_help = !self.show_help,
                    Action::TogglePause => self.paused = !self.paused,
                    Action::SpeedUp => self.speed = (self.speed * 2).min(MAX_SPEED),
                    Action::SlowDown => self.speed = (self.speed / 2).max(1),
                    Action::ResetSpeed => self.speed = 1,
                    Action::Resize(w, h) => {
                        tui.resize(Rect::new(0, 0, w, h))?;
                        self.render(&mut tui)?;
                    },
                    Action::Render => self.render(&mut tui)?,
                }
            }
            if self.should_suspend {
                tui.suspend()?;
                action_tx.send(Action::Resume)?;
                tui = tui::Tui::new()?;
                tui.tick_rate(self.tick_rate);
                tui.frame_rate(self.frame_rate);
                tui.enter()?;
            } else if self.should_quit {
                tui.stop()?;
                break;
            }
        }
        tui.exit()?;
        Ok(())
    }

    /// Runs `speed` simulation steps unless paused; quits once training is over.
    fn tick(&mut self) -> Result<()> {
        if self.paused {
            return Ok(());
        }
        for _ in 0..self.speed {
            if let Some(summary) = self.trainer.step()? {
                log::info!(
                    "Generation {} ended at score {} after {} ticks, best fitness {:.2}",
                    summary.generation,
                    summary.score,
                    summary.ticks,
                    summary.best_fitness
                );
            }
            if self.trainer.is_finished() {
                if let Some(best) = self.trainer.population().best_genome() {
                    log::info!("Best genome {} with fitness {:?}", best.key, best.fitness);
                }
                self.should_quit = true;
                break;
            }
        }
        Ok(())
    }

    fn render(&mut self, tui: &mut tui::Tui) -> Result<()> {
        tui.draw(|f| {
            let area = f.area();

            let [_, area, _] =
                Layout::vertical([Constraint::Fill(1), Constraint::Length(SCENE_HEIGHT + 2), Constraint::Fill(1)])
                    .areas(area);
            let [_, scene_area, hud_area, _] = Layout::horizontal([
                Constraint::Fill(1),
                Constraint::Length(SCENE_WIDTH + 2),
                Constraint::Length(HUD_WIDTH),
                Constraint::Fill(1),
            ])
            .areas(area);

            let border = Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(BORDER_COLOR));
            f.render_widget(border, scene_area);

            let scene_area = scene_area.inner(Margin { horizontal: 1, vertical: 1 });
            match self.trainer.evaluator() {
                Some(evaluator) => f.render_widget(Scene::new(evaluator), scene_area),
                None => f.render_widget(Scene::empty(&self.config.game), scene_area),
            }
            f.render_widget(Hud::new(&self.trainer, self.speed, self.paused), hud_area);

            if self.show_help {
                f.render_widget(Help::new(&self.config.keybindings), scene_area);
            }
        })?;

        Ok(())
    }
}
