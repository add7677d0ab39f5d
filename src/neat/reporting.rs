use std::{
    collections::{BTreeMap, VecDeque},
    time::Instant,
};

use tracing::info;

use crate::neat::{
    activation::{mean, stdev},
    config::NeatConfig,
    genome::Genome,
    species::{Species, SpeciesSet},
    GenomeKey, SpeciesKey,
};

/// Hooks called by the population at fixed points of each generation.
pub trait Reporter {
    fn start_generation(&mut self, _generation: usize) {}

    fn end_generation(
        &mut self,
        _config: &NeatConfig,
        _population: &BTreeMap<GenomeKey, Genome>,
        _species: &SpeciesSet,
    ) {
    }

    fn post_evaluate(
        &mut self,
        _config: &NeatConfig,
        _population: &BTreeMap<GenomeKey, Genome>,
        _species: &SpeciesSet,
        _best: &Genome,
    ) {
    }

    fn complete_extinction(&mut self) {}

    fn found_solution(&mut self, _config: &NeatConfig, _generation: usize, _best: &Genome) {}

    fn species_stagnant(&mut self, _key: SpeciesKey, _species: &Species) {}

    fn info(&mut self, _message: &str) {}
}

#[derive(Default)]
pub struct ReporterSet {
    reporters: Vec<Box<dyn Reporter>>,
}

impl ReporterSet {
    pub fn add(&mut self, reporter: Box<dyn Reporter>) {
        self.reporters.push(reporter);
    }
}

impl Reporter for ReporterSet {
    fn start_generation(&mut self, generation: usize) {
        self.reporters.iter_mut().for_each(|r| r.start_generation(generation));
    }

    fn end_generation(&mut self, config: &NeatConfig, population: &BTreeMap<GenomeKey, Genome>, species: &SpeciesSet) {
        self.reporters.iter_mut().for_each(|r| r.end_generation(config, population, species));
    }

    fn post_evaluate(
        &mut self,
        config: &NeatConfig,
        population: &BTreeMap<GenomeKey, Genome>,
        species: &SpeciesSet,
        best: &Genome,
    ) {
        self.reporters.iter_mut().for_each(|r| r.post_evaluate(config, population, species, best));
    }

    fn complete_extinction(&mut self) {
        self.reporters.iter_mut().for_each(|r| r.complete_extinction());
    }

    fn found_solution(&mut self, config: &NeatConfig, generation: usize, best: &Genome) {
        self.reporters.iter_mut().for_each(|r| r.found_solution(config, generation, best));
    }

    fn species_stagnant(&mut self, key: SpeciesKey, species: &Species) {
        self.reporters.iter_mut().for_each(|r| r.species_stagnant(key, species));
    }

    fn info(&mut self, message: &str) {
        self.reporters.iter_mut().for_each(|r| r.info(message));
    }
}

fn fitnesses(population: &BTreeMap<GenomeKey, Genome>) -> Vec<f64> {
    population.values().filter_map(|genome| genome.fitness).collect()
}

/// Per-generation progress as `tracing` events.
pub struct LogReporter {
    show_species_detail: bool,
    generation: usize,
    generation_start: Option<Instant>,
    generation_times: VecDeque<f64>,
    num_extinctions: usize,
}

impl LogReporter {
    pub fn new(show_species_detail: bool) -> Self {
        LogReporter {
            show_species_detail,
            generation: 0,
            generation_start: None,
            generation_times: VecDeque::with_capacity(10),
            num_extinctions: 0,
        }
    }
}

impl Reporter for LogReporter {
    fn start_generation(&mut self, generation: usize) {
        self.generation = generation;
        info!("****** Running generation {generation} ******");
        self.generation_start = Some(Instant::now());
    }

    fn end_generation(&mut self, _config: &NeatConfig, population: &BTreeMap<GenomeKey, Genome>, species: &SpeciesSet) {
        if self.show_species_detail {
            info!("Population of {} members in {} species:", population.len(), species.len());
            info!("   ID   age  size   fitness   adj fit  stag");
            info!("  ====  ===  ====  =========  =======  ====");
            for (sid, s) in species.species() {
                let age = self.generation.saturating_sub(s.created);
                let fitness = s.fitness.map_or_else(|| "--".to_string(), |f| format!("{f:.3}"));
                let adjusted = s.adjusted_fitness.map_or_else(|| "--".to_string(), |f| format!("{f:.3}"));
                let stagnation = self.generation.saturating_sub(s.last_improved);
                info!("  {sid:>4}  {age:>3}  {:>4}  {fitness:>9}  {adjusted:>7}  {stagnation:>4}", s.members.len());
            }
        } else {
            info!("Population of {} members in {} species", population.len(), species.len());
        }

        if let Some(start) = self.generation_start.take() {
            if self.generation_times.len() == 10 {
                self.generation_times.pop_front();
            }
            let elapsed = start.elapsed().as_secs_f64();
            self.generation_times.push_back(elapsed);
            let average = self.generation_times.iter().sum::<f64>() / self.generation_times.len() as f64;
            info!("Total extinctions: {}", self.num_extinctions);
            if self.generation_times.len() > 1 {
                info!("Generation time: {elapsed:.3} sec ({average:.3} average)");
            } else {
                info!("Generation time: {elapsed:.3} sec");
            }
        }
    }

    fn post_evaluate(
        &mut self,
        _config: &NeatConfig,
        population: &BTreeMap<GenomeKey, Genome>,
        species: &SpeciesSet,
        best: &Genome,
    ) {
        let fitness = fitnesses(population);
        info!("Population's average fitness: {:3.5} stdev: {:3.5}", mean(&fitness), stdev(&fitness));
        let species_id = species.species_of(best.key).map_or_else(|| "--".to_string(), |sid| sid.to_string());
        info!(
            "Best fitness: {:3.5} - size: {:?} - species {species_id} - id {}",
            best.fitness.unwrap_or_default(),
            best.size(),
            best.key
        );
    }

    fn complete_extinction(&mut self) {
        self.num_extinctions += 1;
        info!("All species extinct.");
    }

    fn found_solution(&mut self, _config: &NeatConfig, generation: usize, best: &Genome) {
        info!("Best individual in generation {generation} meets fitness threshold - complexity: {:?}", best.size());
    }

    fn species_stagnant(&mut self, key: SpeciesKey, species: &Species) {
        if self.show_species_detail {
            info!("Species {key} with {} members is stagnated: removing it", species.members.len());
        }
    }

    fn info(&mut self, message: &str) {
        info!("{message}");
    }
}

/// Fitness history kept for display and inspection.
#[derive(Debug, Default, Clone)]
pub struct Statistics {
    most_fit_genomes: Vec<Genome>,
    generation_statistics: Vec<BTreeMap<SpeciesKey, BTreeMap<GenomeKey, f64>>>,
}

impl Statistics {
    fn fitness_stat(&self, stat: fn(&[f64]) -> f64) -> Vec<f64> {
        self.generation_statistics
            .iter()
            .map(|species| {
                let values: Vec<f64> = species.values().flat_map(|members| members.values().copied()).collect();
                stat(&values)
            })
            .collect()
    }

    pub fn fitness_mean(&self) -> Vec<f64> {
        self.fitness_stat(mean)
    }

    pub fn fitness_stdev(&self) -> Vec<f64> {
        self.fitness_stat(stdev)
    }

    /// Fitness of each generation's best genome.
    pub fn best_fitness(&self) -> Vec<f64> {
        self.most_fit_genomes.iter().map(|genome| genome.fitness.unwrap_or_default()).collect()
    }

    /// Best genome ever evaluated.
    pub fn best_genome(&self) -> Option<&Genome> {
        self.most_fit_genomes
            .iter()
            .max_by(|a, b| a.fitness.unwrap_or(f64::MIN).total_cmp(&b.fitness.unwrap_or(f64::MIN)))
    }
}

impl Reporter for Statistics {
    fn post_evaluate(
        &mut self,
        _config: &NeatConfig,
        population: &BTreeMap<GenomeKey, Genome>,
        species: &SpeciesSet,
        best: &Genome,
    ) {
        self.most_fit_genomes.push(best.clone());
        let stats = species
            .species()
            .iter()
            .map(|(&sid, s)| {
                let members = s
                    .members
                    .iter()
                    .filter_map(|key| population.get(key).and_then(|genome| genome.fitness.map(|f| (*key, f))))
                    .collect();
                (sid, members)
            })
            .collect();
        self.generation_statistics.push(stats);
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, rc::Rc};

    use pretty_assertions::assert_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::neat::{config::tests::flappy_config, genome::NodeIndexer};

    struct Recorder(Rc<RefCell<Vec<String>>>);

    impl Reporter for Recorder {
        fn start_generation(&mut self, generation: usize) {
            self.0.borrow_mut().push(format!("start {generation}"));
        }

        fn info(&mut self, message: &str) {
            self.0.borrow_mut().push(message.to_string());
        }
    }

    #[test]
    fn test_reporter_set_fans_out() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut set = ReporterSet::default();
        set.add(Box::new(Recorder(log.clone())));
        set.add(Box::new(Recorder(log.clone())));
        set.add(Box::new(LogReporter::new(true)));
        set.start_generation(3);
        set.info("hello");
        set.complete_extinction();
        assert_eq!(*log.borrow(), vec!["start 3", "start 3", "hello", "hello"]);
    }

    #[test]
    fn test_statistics_track_generations() {
        let config = flappy_config();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut indexer = NodeIndexer::default();
        let mut population: BTreeMap<GenomeKey, Genome> = (1..=4)
            .map(|key| (key, Genome::configure_new(key, &config.genome, &mut indexer, &mut rng)))
            .collect();
        let mut species = SpeciesSet::new(config.species_set.clone());
        species.speciate(&config.genome, &population, 0);

        let mut statistics = Statistics::default();
        for generation in 0..2 {
            for (key, genome) in population.iter_mut() {
                genome.fitness = Some((*key + generation) as f64);
            }
            let best = population[&4].clone();
            statistics.post_evaluate(&config, &population, &species, &best);
        }

        assert_eq!(statistics.fitness_mean(), vec![2.5, 3.5]);
        assert_eq!(statistics.fitness_stdev().len(), 2);
        assert_eq!(statistics.best_fitness(), vec![4.0, 5.0]);
        assert_eq!(statistics.best_genome().and_then(|genome| genome.fitness), Some(5.0));
    }
}
