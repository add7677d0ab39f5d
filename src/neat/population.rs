use std::collections::BTreeMap;

use color_eyre::eyre::{bail, ensure, eyre, Result};
use rand_chacha::ChaCha8Rng;

use crate::neat::{
    config::{GenomeConfig, NeatConfig},
    genome::Genome,
    reporting::{Reporter, ReporterSet, Statistics},
    reproduction::Reproduction,
    species::SpeciesSet,
    GenomeKey,
};

#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    Continue,
    /// The fitness criterion met the threshold; carries that generation's best genome.
    Solved(Genome),
}

/// Owns the evolving genomes and drives one generation at a time.
///
/// The caller evaluates [`Population::members`] between [`Population::start_generation`] and
/// [`Population::conclude_generation`], or hands an evaluation callback to [`Population::run`].
pub struct Population {
    config: NeatConfig,
    members: BTreeMap<GenomeKey, Genome>,
    species: SpeciesSet,
    reproduction: Reproduction,
    reporters: ReporterSet,
    statistics: Statistics,
    generation: usize,
    best_genome: Option<Genome>,
    rng: ChaCha8Rng,
}

impl Population {
    pub fn new(config: NeatConfig, mut rng: ChaCha8Rng) -> Self {
        let mut reproduction = Reproduction::new(&config);
        let members = reproduction.create_new(&config, config.pop_size, &mut rng);
        let mut species = SpeciesSet::new(config.species_set.clone());
        species.speciate(&config.genome, &members, 0);
        Population {
            config,
            members,
            species,
            reproduction,
            reporters: ReporterSet::default(),
            statistics: Statistics::default(),
            generation: 0,
            best_genome: None,
            rng,
        }
    }

    pub fn add_reporter(&mut self, reporter: Box<dyn Reporter>) {
        self.reporters.add(reporter);
    }

    /// Clears last generation's fitness so every member has to be evaluated again.
    pub fn start_generation(&mut self) {
        for genome in self.members.values_mut() {
            genome.fitness = None;
        }
        self.reporters.start_generation(self.generation);
    }

    pub fn assign_fitness(&mut self, fitness: impl IntoIterator<Item = (GenomeKey, f64)>) -> Result<()> {
        for (key, value) in fitness {
            let genome = self.members.get_mut(&key).ok_or_else(|| eyre!("genome {key} is not in the population"))?;
            genome.fitness = Some(value);
        }
        Ok(())
    }

    /// Reports on the evaluated generation, then either stops on the fitness threshold or breeds
    /// and speciates the next one.
    pub fn conclude_generation(&mut self) -> Result<GenerationOutcome> {
        let mut fitnesses = Vec::with_capacity(self.members.len());
        let mut best: Option<&Genome> = None;
        for genome in self.members.values() {
            let Some(fitness) = genome.fitness else {
                bail!("genome {} was not assigned a fitness in generation {}", genome.key, self.generation);
            };
            fitnesses.push(fitness);
            if best.and_then(|b| b.fitness).map_or(true, |b| fitness > b) {
                best = Some(genome);
            }
        }
        let best = best.cloned().ok_or_else(|| eyre!("population is empty in generation {}", self.generation))?;

        self.reporters.post_evaluate(&self.config, &self.members, &self.species, &best);
        self.statistics.post_evaluate(&self.config, &self.members, &self.species, &best);

        if self.best_genome.as_ref().and_then(|b| b.fitness).map_or(true, |b| best.fitness.is_some_and(|f| f > b)) {
            self.best_genome = Some(best.clone());
        }

        if !self.config.no_fitness_termination
            && self.config.fitness_criterion.apply(&fitnesses) >= self.config.fitness_threshold
        {
            self.reporters.found_solution(&self.config, self.generation, &best);
            return Ok(GenerationOutcome::Solved(best));
        }

        self.members = self.reproduction.reproduce(
            &self.config,
            &mut self.species,
            &self.members,
            self.generation,
            &mut self.reporters,
            &mut self.rng,
        );

        if self.members.is_empty() {
            self.reporters.complete_extinction();
            if !self.config.reset_on_extinction {
                bail!("every species went extinct in generation {}", self.generation);
            }
            self.members = self.reproduction.create_new(&self.config, self.config.pop_size, &mut self.rng);
        }

        let (mean, stdev) = self.species.speciate(&self.config.genome, &self.members, self.generation);
        self.reporters.info(&format!("Mean genetic distance {mean:.3}, standard deviation {stdev:.3}"));
        self.reporters.end_generation(&self.config, &self.members, &self.species);

        self.generation += 1;
        Ok(GenerationOutcome::Continue)
    }

    /// Runs up to `generations` generations, or until the fitness threshold is met when no cap is
    /// given. `evaluate` must assign a fitness to every member.
    pub fn run<F>(&mut self, mut evaluate: F, generations: Option<usize>) -> Result<Option<Genome>>
    where
        F: FnMut(&mut BTreeMap<GenomeKey, Genome>, &GenomeConfig, usize) -> Result<()>,
    {
        ensure!(
            generations.is_some() || !self.config.no_fitness_termination,
            "cannot run without a generation limit when fitness termination is disabled"
        );

        let mut completed = 0;
        while generations.map_or(true, |limit| completed < limit) {
            completed += 1;
            self.start_generation();
            evaluate(&mut self.members, &self.config.genome, self.generation)?;
            if let GenerationOutcome::Solved(_) = self.conclude_generation()? {
                break;
            }
        }

        if self.config.no_fitness_termination {
            if let Some(best) = &self.best_genome {
                self.reporters.found_solution(&self.config, self.generation, best);
            }
        }
        Ok(self.best_genome.clone())
    }

    pub fn members(&self) -> &BTreeMap<GenomeKey, Genome> {
        &self.members
    }

    pub fn species(&self) -> &SpeciesSet {
        &self.species
    }

    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Fittest genome seen in any concluded generation.
    pub fn best_genome(&self) -> Option<&Genome> {
        self.best_genome.as_ref()
    }

    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    pub fn config(&self) -> &NeatConfig {
        &self.config
    }
}
