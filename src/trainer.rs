use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicBool, Ordering},
};

use color_eyre::eyre::{bail, Result};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::info;

use crate::{
    checkpoint::{Checkpointer, NetworkSnapshot},
    game::{EvaluatorState, GameConfig, GenerationEvaluator, NetworkController, TickReport},
    neat::{
        config::GenomeConfig, FeedForwardNetwork, GenerationOutcome, Genome, GenomeKey, LogReporter, NeatConfig,
        Population,
    },
};

pub type NetworkEvaluator = GenerationEvaluator<NetworkController>;

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSummary {
    pub generation: usize,
    pub score: u32,
    pub ticks: u64,
    pub best_fitness: f64,
    pub solved: bool,
}

fn spawn_evaluator(
    members: &BTreeMap<GenomeKey, Genome>,
    genome_config: &GenomeConfig,
    game: &GameConfig,
    generation: usize,
    rng: &mut ChaCha8Rng,
) -> NetworkEvaluator {
    let agents = members
        .iter()
        .map(|(&key, genome)| (key, NetworkController::new(FeedForwardNetwork::create(genome, genome_config))));
    GenerationEvaluator::new(game.clone(), agents, generation, ChaCha8Rng::seed_from_u64(rng.gen()))
}

/// One evaluator tick, saving the leading network whenever a checkpoint falls due.
fn advance(evaluator: &mut NetworkEvaluator, checkpointer: &Checkpointer) -> Result<TickReport> {
    let report = evaluator.step()?;
    if report.checkpoint_due {
        if let Some(leader) = evaluator.leader() {
            let network = leader.controller.network();
            let snapshot = NetworkSnapshot::new(leader.key, evaluator.generation(), evaluator.score(), network);
            checkpointer.write(&snapshot)?;
        }
    }
    Ok(report)
}

/// Couples the population with one generation evaluator at a time.
pub struct Trainer {
    population: Population,
    game: GameConfig,
    checkpointer: Checkpointer,
    generations: usize,
    evaluator: Option<NetworkEvaluator>,
    last_summary: Option<GenerationSummary>,
    finished: bool,
    rng: ChaCha8Rng,
}

impl Trainer {
    pub fn new(
        neat: NeatConfig,
        game: GameConfig,
        checkpointer: Checkpointer,
        generations: usize,
        seed: Option<u64>,
    ) -> Self {
        let mut rng = seed.map_or_else(ChaCha8Rng::from_entropy, ChaCha8Rng::seed_from_u64);
        let mut population = Population::new(neat, ChaCha8Rng::seed_from_u64(rng.gen()));
        population.add_reporter(Box::new(LogReporter::new(true)));
        Trainer {
            population,
            game,
            checkpointer,
            generations,
            evaluator: None,
            last_summary: None,
            finished: generations == 0,
            rng,
        }
    }

    fn spawn_generation(&mut self) -> NetworkEvaluator {
        self.population.start_generation();
        spawn_evaluator(
            self.population.members(),
            &self.population.config().genome,
            &self.game,
            self.population.generation(),
            &mut self.rng,
        )
    }

    /// Advances the current generation by one tick, starting a generation first if none is
    /// running. Returns a summary on the tick that ends a generation.
    pub fn step(&mut self) -> Result<Option<GenerationSummary>> {
        if self.finished {
            return Ok(None);
        }
        if self.evaluator.is_none() {
            let evaluator = self.spawn_generation();
            self.evaluator = Some(evaluator);
        }
        let Some(evaluator) = self.evaluator.as_mut() else {
            return Ok(None);
        };
        if evaluator.state() == EvaluatorState::Running
            && advance(evaluator, &self.checkpointer)?.state == EvaluatorState::Running
        {
            return Ok(None);
        }

        let Some(evaluator) = self.evaluator.take() else {
            return Ok(None);
        };
        let (generation, score, ticks) = (evaluator.generation(), evaluator.score(), evaluator.ticks());
        let fitness = evaluator.into_fitness();
        let best_fitness = fitness.iter().map(|(_, value)| *value).fold(f64::NEG_INFINITY, f64::max);
        self.population.assign_fitness(fitness)?;

        let solved = matches!(self.population.conclude_generation()?, GenerationOutcome::Solved(_));
        if solved || self.population.generation() >= self.generations {
            self.finished = true;
            info!(generation, solved, "training finished");
        }

        let summary = GenerationSummary { generation, score, ticks, best_fitness, solved };
        self.last_summary = Some(summary.clone());
        Ok(Some(summary))
    }

    /// Trains without rendering until the generation cap, the fitness threshold, or `shutdown`.
    /// Returns `None` when interrupted.
    pub fn run_headless(self, shutdown: &AtomicBool) -> Result<Option<Genome>> {
        let Trainer { mut population, game, checkpointer, generations, mut rng, .. } = self;
        let result = population.run(
            |members, genome_config, generation| {
                let mut evaluator = spawn_evaluator(members, genome_config, &game, generation, &mut rng);
                while evaluator.state() == EvaluatorState::Running {
                    if shutdown.load(Ordering::Relaxed) {
                        bail!("interrupted during generation {generation}");
                    }
                    advance(&mut evaluator, &checkpointer)?;
                }
                info!(generation, score = evaluator.score(), ticks = evaluator.ticks(), "generation evaluated");
                for (key, fitness) in evaluator.into_fitness() {
                    if let Some(genome) = members.get_mut(&key) {
                        genome.fitness = Some(fitness);
                    }
                }
                Ok(())
            },
            Some(generations),
        );

        match result {
            Err(_) if shutdown.load(Ordering::Relaxed) => {
                info!("training interrupted");
                Ok(None)
            },
            other => other,
        }
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    pub fn evaluator(&self) -> Option<&NetworkEvaluator> {
        self.evaluator.as_ref()
    }

    pub fn last_summary(&self) -> Option<&GenerationSummary> {
        self.last_summary.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn generations(&self) -> usize {
        self.generations
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::neat::config::tests::flappy_config;

    /// A gap no bird fits through, so every generation ends before the first pipe clears.
    fn lethal_game() -> GameConfig {
        GameConfig { pipe_gap: 1.0, ..GameConfig::default() }
    }

    fn trainer(generations: usize, checkpoint: &std::path::Path) -> Trainer {
        let mut neat = flappy_config();
        neat.pop_size = 8;
        Trainer::new(neat, lethal_game(), Checkpointer::new(checkpoint), generations, Some(11))
    }

    #[test]
    fn test_step_runs_until_generation_cap() {
        let dir = tempfile::tempdir().unwrap();
        let mut trainer = trainer(2, &dir.path().join("best.json"));

        let mut summaries = Vec::new();
        let mut ticks = 0;
        while !trainer.is_finished() {
            if let Some(summary) = trainer.step().unwrap() {
                summaries.push(summary);
            }
            ticks += 1;
            assert!(ticks < 10_000, "generation never ended");
        }

        assert_eq!(summaries.iter().map(|s| s.generation).collect::<Vec<_>>(), vec![0, 1]);
        assert!(summaries.iter().all(|s| s.score == 0 && !s.solved));
        assert_eq!(trainer.population().generation(), 2);
        assert_eq!(trainer.last_summary(), summaries.last());
        assert!(trainer.evaluator().is_none());
        assert_eq!(trainer.step().unwrap(), None);
        assert!(!dir.path().join("best.json").exists());
    }

    #[test]
    fn test_evaluator_exposes_the_running_generation() {
        let dir = tempfile::tempdir().unwrap();
        let mut trainer = trainer(1, &dir.path().join("best.json"));
        assert_eq!(trainer.step().unwrap(), None);
        let evaluator = trainer.evaluator().unwrap();
        assert_eq!(evaluator.generation(), 0);
        assert_eq!(evaluator.ticks(), 1);
        assert_eq!(evaluator.fitness_by_key().len(), 8);
    }

    #[test]
    fn test_headless_returns_best_genome() {
        let dir = tempfile::tempdir().unwrap();
        let best = trainer(2, &dir.path().join("best.json")).run_headless(&AtomicBool::new(false)).unwrap();
        assert!(best.and_then(|genome| genome.fitness).is_some());
    }

    #[test]
    fn test_headless_stops_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let best = trainer(5, &dir.path().join("best.json")).run_headless(&AtomicBool::new(true)).unwrap();
        assert_eq!(best, None);
    }

    #[test]
    fn test_checkpoint_captures_the_leader_once_per_score() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("best.json");
        let game = GameConfig { checkpoint_score: 0, pipe_gap: 400.0, ..GameConfig::default() };
        let mut trainer = Trainer::new(flappy_config(), game, Checkpointer::new(&path), 20, Some(11));

        let mut ticks = 0;
        while !path.exists() {
            assert!(!trainer.is_finished(), "no bird ever cleared a pipe");
            trainer.step().unwrap();
            ticks += 1;
            assert!(ticks < 200_000, "checkpoint never written");
        }

        let evaluator = trainer.evaluator().unwrap();
        let snapshot: NetworkSnapshot = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(Some(snapshot.genome), evaluator.leader().map(|leader| leader.key));
        assert_eq!(snapshot.score, evaluator.score());
        assert_eq!(snapshot.generation, evaluator.generation());
        assert_eq!(snapshot.score, 1);

        // Nothing else is written until the score moves on.
        let (generation, score) = (evaluator.generation(), evaluator.score());
        std::fs::remove_file(&path).unwrap();
        for _ in 0..10_000 {
            trainer.step().unwrap();
            match trainer.evaluator() {
                Some(evaluator) if evaluator.generation() == generation && evaluator.score() == score => {
                    assert!(!path.exists(), "checkpoint rewritten at score {score}");
                },
                Some(evaluator) if evaluator.generation() == generation && evaluator.alive() > 0 => {
                    assert!(path.exists());
                    break;
                },
                _ => break,
            }
        }
    }
}
