use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Color, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Sparkline, Widget},
};

use crate::{constants::scene::BORDER_COLOR, trainer::Trainer};

/// Side panel with the running generation and the population's progress.
pub struct Hud<'a> {
    trainer: &'a Trainer,
    speed: u32,
    paused: bool,
}

impl<'a> Hud<'a> {
    pub fn new(trainer: &'a Trainer, speed: u32, paused: bool) -> Self {
        Self { trainer, speed, paused }
    }

    fn lines(&self) -> Vec<Line<'static>> {
        let population = self.trainer.population();
        let evaluator = self.trainer.evaluator();
        let field = |name: &str, value: String| {
            Line::from(vec![Span::styled(format!("{name:<14}"), Style::new().fg(Color::Gray)), Span::raw(value).bold()])
        };

        let score = evaluator.map_or(0, |evaluator| evaluator.score());
        let alive = evaluator.map_or(0, |evaluator| evaluator.alive());
        let leader = evaluator.and_then(|evaluator| evaluator.leader()).map(|agent| agent.fitness);
        let best = population.best_genome().and_then(|genome| genome.fitness);
        let format_fitness = |fitness: Option<f64>| fitness.map_or_else(|| "--".to_string(), |f| format!("{f:.1}"));
        let statistics = population.statistics();
        let spread = match (statistics.fitness_mean().last(), statistics.fitness_stdev().last()) {
            (Some(mean), Some(stdev)) => format!("{mean:.1} ± {stdev:.1}"),
            _ => "--".to_string(),
        };

        // Generations are shown counting from 1; a finished run stays on the last one.
        let generation = (population.generation() + 1).min(self.trainer.generations());

        let mut lines = vec![
            field("Score", score.to_string()),
            field("Generation", format!("{generation} / {}", self.trainer.generations())),
            field("Birds Alive", format!("{alive} / {}", population.members().len())),
            field("Leader", format_fitness(leader)),
            field("Best fitness", format_fitness(best)),
            field("Mean fitness", spread),
            field("Species", population.species().len().to_string()),
            field("Speed", format!("x{}", self.speed)),
        ];
        if let Some(summary) = self.trainer.last_summary() {
            lines.push(field("Last gen", format!("score {} in {} ticks", summary.score, summary.ticks)));
        }
        lines.push(Line::default());
        if self.trainer.is_finished() {
            lines.push(Line::from("Training finished").green().bold());
        } else if self.paused {
            lines.push(Line::from("Paused").yellow().bold());
        }
        lines
    }
}

impl Widget for Hud<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(" NEAT ")
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::new().fg(BORDER_COLOR));
        let inner = block.inner(area);
        block.render(area, buf);

        let lines = self.lines();
        let [text_area, chart_area] =
            Layout::vertical([Constraint::Length(lines.len() as u16), Constraint::Fill(1)]).areas(inner);
        Paragraph::new(lines).render(text_area, buf);

        let history: Vec<u64> = self
            .trainer
            .population()
            .statistics()
            .best_fitness()
            .into_iter()
            .map(|fitness| fitness.max(0.0).round() as u64)
            .collect();
        let visible = history.len().saturating_sub(chart_area.width as usize);
        Sparkline::default()
            .block(Block::default().title("Best fitness per generation").borders(Borders::TOP))
            .data(&history[visible..])
            .style(Style::new().fg(Color::LightYellow))
            .render(chart_area, buf);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{checkpoint::Checkpointer, game::GameConfig, neat::config::tests::flappy_config};

    fn row(buf: &Buffer, y: u16) -> String {
        (0..buf.area.width).map(|x| buf[(x, y)].symbol()).collect()
    }

    #[test]
    fn test_hud_lists_population_state() {
        let dir = tempfile::tempdir().unwrap();
        let checkpointer = Checkpointer::new(dir.path().join("best.json"));
        let mut trainer = Trainer::new(flappy_config(), GameConfig::default(), checkpointer, 100, Some(1));
        trainer.step().unwrap();

        let area = Rect::new(0, 0, 30, 20);
        let mut buf = Buffer::empty(area);
        Hud::new(&trainer, 4, true).render(area, &mut buf);

        let text: Vec<String> = (0..area.height).map(|y| row(&buf, y)).collect();
        assert!(text[1].contains("Score") && text[1].contains('0'), "{text:?}");
        assert!(text[2].contains("1 / 100"), "{text:?}");
        assert!(text[3].contains("50 / 50"), "{text:?}");
        assert!(text[6].contains("Mean fitness") && text[6].contains("--"), "{text:?}");
        assert!(text[8].contains("x4"), "{text:?}");
        assert!(text.iter().any(|line| line.contains("Paused")), "{text:?}");
        assert_eq!(text.iter().filter(|line| line.contains("Last gen")).count(), 0);
    }

    #[test]
    fn test_finished_run_shows_last_generation() {
        let dir = tempfile::tempdir().unwrap();
        let mut neat = flappy_config();
        neat.pop_size = 8;
        let lethal = GameConfig { pipe_gap: 1.0, ..GameConfig::default() };
        let mut trainer = Trainer::new(neat, lethal, Checkpointer::new(dir.path().join("best.json")), 2, Some(11));
        for _ in 0..10_000 {
            if trainer.is_finished() {
                break;
            }
            trainer.step().unwrap();
        }
        assert!(trainer.is_finished());

        let area = Rect::new(0, 0, 30, 20);
        let mut buf = Buffer::empty(area);
        Hud::new(&trainer, 1, false).render(area, &mut buf);

        let text: Vec<String> = (0..area.height).map(|y| row(&buf, y)).collect();
        assert!(text[2].contains("2 / 2"), "{text:?}");
        assert!(text.iter().any(|line| line.contains("Training finished")), "{text:?}");
    }
}
