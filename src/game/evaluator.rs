use color_eyre::eyre::{bail, Result, WrapErr};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::{debug, info, trace};

use crate::{
    checkpoint::CheckpointPolicy,
    game::{Base, Bird, Controller, GameConfig, Observation, Pipe},
    neat::GenomeKey,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum EvaluatorState {
    Running,
    Terminated,
}

/// Controller, fitness and bird of one genome, removed together.
pub struct Agent<C> {
    pub key: GenomeKey,
    pub controller: C,
    pub fitness: f64,
    pub bird: Bird,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    pub tick: u64,
    pub collided: usize,
    pub pipe_cleared: bool,
    pub checkpoint_due: bool,
    pub alive: usize,
    pub state: EvaluatorState,
}

/// Runs one generation of agents against a shared pipe stream.
pub struct GenerationEvaluator<C> {
    config: GameConfig,
    generation: usize,
    state: EvaluatorState,
    score: u32,
    ticks: u64,
    agents: Vec<Agent<C>>,
    retired: Vec<(GenomeKey, f64)>,
    pipe: Pipe,
    base: Base,
    checkpoint: CheckpointPolicy,
    rng: ChaCha8Rng,
}

impl<C: Controller> GenerationEvaluator<C> {
    pub fn new<I>(config: GameConfig, agents: I, generation: usize, mut rng: ChaCha8Rng) -> Self
    where
        I: IntoIterator<Item = (GenomeKey, C)>,
    {
        let agents: Vec<Agent<C>> = agents
            .into_iter()
            .map(|(key, controller)| Agent { key, controller, fitness: 0.0, bird: Bird::new(&config) })
            .collect();
        let state = if agents.is_empty() { EvaluatorState::Terminated } else { EvaluatorState::Running };
        let pipe = Pipe::new(&config, &mut rng);
        let base = Base::new(&config);
        let checkpoint = CheckpointPolicy::new(config.checkpoint_score);

        GenerationEvaluator {
            config,
            generation,
            state,
            score: 0,
            ticks: 0,
            agents,
            retired: Vec::new(),
            pipe,
            base,
            checkpoint,
            rng,
        }
    }

    pub fn step(&mut self) -> Result<TickReport> {
        if self.state == EvaluatorState::Terminated {
            bail!("generation {} already terminated after {} ticks", self.generation, self.ticks);
        }
        self.ticks += 1;

        let fitness = &self.config.fitness;
        for agent in self.agents.iter_mut() {
            agent.bird.update(self.config.gravity);
            agent.fitness += fitness.tick_reward;

            let observation = Observation::new(agent.bird.y(), self.pipe.gap_top(), self.pipe.gap_bottom());
            let output = agent
                .controller
                .decide(&observation)
                .wrap_err_with(|| format!("controller of genome {} failed", agent.key))?;
            if output > self.config.jump_threshold {
                agent.bird.jump(self.config.jump_velocity);
            }
        }

        // Every live agent is tested before any is removed.
        let (ceiling_y, base_y) = (self.config.ceiling_y, self.config.base_y);
        let pipe = &self.pipe;
        let (crashed, survivors): (Vec<_>, Vec<_>) = std::mem::take(&mut self.agents)
            .into_iter()
            .partition(|agent| agent.bird.collides(pipe, ceiling_y, base_y));
        self.agents = survivors;

        let collided = crashed.len();
        for agent in crashed {
            let fitness = agent.fitness - self.config.fitness.collision_penalty;
            trace!(genome = agent.key, y = agent.bird.y(), fitness, "bird collided");
            self.retired.push((agent.key, fitness));
        }

        let pipe_cleared = self.pipe.is_off_screen(self.config.pipe_offscreen_x);
        if pipe_cleared {
            self.score += 1;
            for agent in self.agents.iter_mut() {
                agent.fitness += self.config.fitness.pipe_bonus;
            }
            self.pipe = Pipe::new(&self.config, &mut self.rng);
            debug!(score = self.score, gap_top = self.pipe.gap_top(), "pipe cleared");
        }

        let checkpoint_due = !self.agents.is_empty() && self.checkpoint.should_write(self.score);

        self.pipe.advance(self.config.pipe_velocity);
        if self.pipe.mark_passed(self.config.bird_x) {
            debug!(x = self.pipe.x(), "pipe passed the bird column");
        }
        self.base.advance(self.config.base_velocity);

        if self.agents.is_empty() {
            self.state = EvaluatorState::Terminated;
            info!(generation = self.generation, score = self.score, ticks = self.ticks, "generation terminated");
        }

        Ok(TickReport {
            tick: self.ticks,
            collided,
            pipe_cleared,
            checkpoint_due,
            alive: self.agents.len(),
            state: self.state,
        })
    }
}

impl<C> GenerationEvaluator<C> {
    pub fn state(&self) -> EvaluatorState {
        self.state
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn alive(&self) -> usize {
        self.agents.len()
    }

    pub fn agents(&self) -> &[Agent<C>] {
        &self.agents
    }

    /// First live agent, the one a checkpoint captures.
    pub fn leader(&self) -> Option<&Agent<C>> {
        self.agents.first()
    }

    pub fn pipe(&self) -> &Pipe {
        &self.pipe
    }

    pub fn base(&self) -> &Base {
        &self.base
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    #[cfg(test)]
    pub fn fitness_of(&self, key: GenomeKey) -> Option<f64> {
        self.agents
            .iter()
            .map(|agent| (agent.key, agent.fitness))
            .chain(self.retired.iter().copied())
            .find_map(|(k, fitness)| (k == key).then_some(fitness))
    }

    /// Fitness of every genome, live or retired.
    #[cfg(test)]
    pub fn fitness_by_key(&self) -> std::collections::HashMap<GenomeKey, f64> {
        self.agents.iter().map(|agent| (agent.key, agent.fitness)).chain(self.retired.iter().copied()).collect()
    }

    pub fn into_fitness(self) -> Vec<(GenomeKey, f64)> {
        let mut fitness = self.retired;
        fitness.extend(self.agents.into_iter().map(|agent| (agent.key, agent.fitness)));
        fitness
    }
}
