use std::collections::BTreeMap;

use rand::{seq::SliceRandom, Rng};

use crate::neat::{
    activation::mean,
    config::{NeatConfig, ReproductionConfig},
    genome::{Genome, NodeIndexer},
    reporting::Reporter,
    species::SpeciesSet,
    stagnation::Stagnation,
    GenomeKey,
};

/// Splits `pop_size` between species in proportion to adjusted fitness, moving each species at most
/// halfway from its previous size per generation.
pub fn compute_spawn(
    adjusted_fitness: &[f64],
    previous_sizes: &[usize],
    pop_size: usize,
    min_species_size: usize,
) -> Vec<usize> {
    let af_sum: f64 = adjusted_fitness.iter().sum();
    let spawn: Vec<i64> = adjusted_fitness
        .iter()
        .zip(previous_sizes)
        .map(|(&af, &previous)| {
            let target = if af_sum > 0.0 {
                (min_species_size as f64).max(af / af_sum * pop_size as f64)
            } else {
                min_species_size as f64
            };
            let delta = (target - previous as f64) * 0.5;
            let rounded = delta.round_ties_even() as i64;
            let previous = previous as i64;
            if rounded != 0 {
                previous + rounded
            } else if delta > 0.0 {
                previous + 1
            } else if delta < 0.0 {
                previous - 1
            } else {
                previous
            }
        })
        .collect();

    let total: i64 = spawn.iter().sum();
    if total <= 0 {
        return vec![min_species_size; spawn.len()];
    }
    let norm = pop_size as f64 / total as f64;
    spawn.into_iter().map(|n| ((n as f64 * norm).round_ties_even().max(0.0) as usize).max(min_species_size)).collect()
}

/// Produces each new generation and owns the genome and node key counters.
#[derive(Debug, Clone)]
pub struct Reproduction {
    config: ReproductionConfig,
    stagnation: Stagnation,
    next_genome_key: GenomeKey,
    node_indexer: NodeIndexer,
}

impl Reproduction {
    pub fn new(config: &NeatConfig) -> Self {
        Reproduction {
            config: config.reproduction.clone(),
            stagnation: Stagnation::new(config.stagnation.clone()),
            next_genome_key: 1,
            node_indexer: NodeIndexer::default(),
        }
    }

    fn next_key(&mut self) -> GenomeKey {
        let key = self.next_genome_key;
        self.next_genome_key += 1;
        key
    }

    pub fn create_new<R: Rng + ?Sized>(
        &mut self,
        config: &NeatConfig,
        count: usize,
        rng: &mut R,
    ) -> BTreeMap<GenomeKey, Genome> {
        (0..count)
            .map(|_| {
                let key = self.next_key();
                (key, Genome::configure_new(key, &config.genome, &mut self.node_indexer, rng))
            })
            .collect()
    }

    /// Drops stagnant species, keeps each survivor's elites unchanged and fills the rest of its
    /// quota with mutated offspring of its top `survival_threshold` members.
    ///
    /// Returns an empty population, and clears `species`, when every species stagnated.
    pub fn reproduce<R: Rng + ?Sized>(
        &mut self,
        config: &NeatConfig,
        species: &mut SpeciesSet,
        population: &BTreeMap<GenomeKey, Genome>,
        generation: usize,
        reporters: &mut dyn Reporter,
        rng: &mut R,
    ) -> BTreeMap<GenomeKey, Genome> {
        let mut all_fitnesses = Vec::new();
        let mut remaining = Vec::new();
        for (sid, stagnant) in self.stagnation.update(species, population, generation) {
            let Some(s) = species.species().get(&sid) else {
                continue;
            };
            if stagnant {
                reporters.species_stagnant(sid, s);
            } else {
                all_fitnesses.extend(s.fitnesses(population));
                remaining.push(sid);
            }
        }

        if remaining.is_empty() {
            species.species_mut().clear();
            return BTreeMap::new();
        }

        let min_fitness = all_fitnesses.iter().copied().fold(f64::INFINITY, f64::min);
        let max_fitness = all_fitnesses.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let fitness_range = (max_fitness - min_fitness).max(1.0);

        let mut adjusted = Vec::with_capacity(remaining.len());
        let mut previous_sizes = Vec::with_capacity(remaining.len());
        for sid in &remaining {
            if let Some(s) = species.species_mut().get_mut(sid) {
                let af = (mean(&s.fitnesses(population)) - min_fitness) / fitness_range;
                s.adjusted_fitness = Some(af);
                adjusted.push(af);
                previous_sizes.push(s.members.len());
            }
        }
        reporters.info(&format!("Average adjusted fitness: {:.3}", mean(&adjusted)));

        let min_species_size = self.config.min_species_size.max(self.config.elitism);
        let spawn_amounts = compute_spawn(&adjusted, &previous_sizes, config.pop_size, min_species_size);

        let mut previous = std::mem::take(species.species_mut());
        let mut offspring = BTreeMap::new();
        for (sid, spawn) in remaining.into_iter().zip(spawn_amounts) {
            let Some(mut s) = previous.remove(&sid) else {
                continue;
            };
            let mut spawn = spawn.max(self.config.elitism);

            let mut old_members: Vec<&Genome> = s.members.iter().filter_map(|key| population.get(key)).collect();
            old_members.sort_by(|a, b| b.fitness.unwrap_or(f64::MIN).total_cmp(&a.fitness.unwrap_or(f64::MIN)));
            s.members.clear();
            species.species_mut().insert(sid, s);

            for elite in old_members.iter().take(self.config.elitism) {
                offspring.insert(elite.key, (*elite).clone());
                spawn = spawn.saturating_sub(1);
            }
            if spawn == 0 {
                continue;
            }

            let cutoff = ((self.config.survival_threshold * old_members.len() as f64).ceil() as usize).max(2);
            old_members.truncate(cutoff);

            for _ in 0..spawn {
                let (Some(&first), Some(&second)) = (old_members.choose(rng), old_members.choose(rng)) else {
                    break;
                };
                let key = self.next_key();
                let mut child = Genome::configure_crossover(key, first, second, rng);
                child.mutate(&config.genome, &mut self.node_indexer, rng);
                offspring.insert(key, child);
            }
        }
        offspring
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::neat::{config::tests::flappy_config, reporting::ReporterSet};

    #[test]
    fn test_spawn_moves_halfway_towards_share() {
        assert_eq!(compute_spawn(&[1.0, 0.0], &[10, 10], 20, 2), vec![14, 6]);
    }

    #[test]
    fn test_spawn_without_fitness_signal() {
        assert_eq!(compute_spawn(&[0.0, 0.0], &[10, 10], 20, 2), vec![10, 10]);
    }

    #[test]
    fn test_spawn_respects_minimum_size() {
        let spawn = compute_spawn(&[0.9, 0.1, 0.0], &[40, 5, 5], 50, 2);
        assert!(spawn.iter().all(|&n| n >= 2));
        let total: usize = spawn.iter().sum();
        assert!((48..=52).contains(&total), "{spawn:?}");
    }

    #[test]
    fn test_create_new_assigns_fresh_keys() {
        let config = flappy_config();
        let mut reproduction = Reproduction::new(&config);
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let first = reproduction.create_new(&config, 3, &mut rng);
        let second = reproduction.create_new(&config, 2, &mut rng);
        assert_eq!(first.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(second.keys().copied().collect::<Vec<_>>(), vec![4, 5]);
    }

    #[test]
    fn test_reproduce_keeps_elites_and_fills_population() {
        let config = flappy_config();
        let mut reproduction = Reproduction::new(&config);
        let mut rng = ChaCha8Rng::seed_from_u64(12);
        let mut population = reproduction.create_new(&config, config.pop_size, &mut rng);
        for (key, genome) in population.iter_mut() {
            genome.fitness = Some(*key as f64);
        }
        let mut species = SpeciesSet::new(config.species_set.clone());
        species.speciate(&config.genome, &population, 0);

        let mut reporters = ReporterSet::default();
        let offspring = reproduction.reproduce(&config, &mut species, &population, 0, &mut reporters, &mut rng);

        let best = *population.keys().next_back().unwrap();
        assert!(offspring.contains_key(&best), "the fittest genome survives unchanged");
        assert_eq!(offspring[&best], population[&best]);
        let fresh = offspring.keys().filter(|key| !population.contains_key(key)).count();
        assert!(fresh > 0);
        assert!(offspring.keys().filter(|key| !population.contains_key(key)).all(|&key| key > config.pop_size as u64));
        let size = offspring.len() as i64;
        assert!((size - config.pop_size as i64).abs() <= species.len() as i64 * 2, "population drifted to {size}");
        assert!(species.species().values().all(|s| s.members.is_empty() && s.adjusted_fitness.is_some()));
    }

    #[test]
    fn test_all_stagnant_clears_species() {
        let mut config = flappy_config();
        config.stagnation.max_stagnation = 1;
        config.stagnation.species_elitism = 0;
        config.species_set.compatibility_threshold = 1000.0;
        let mut reproduction = Reproduction::new(&config);
        let mut rng = ChaCha8Rng::seed_from_u64(13);
        let mut population = reproduction.create_new(&config, 10, &mut rng);
        for genome in population.values_mut() {
            genome.fitness = Some(1.0);
        }
        let mut species = SpeciesSet::new(config.species_set.clone());
        species.speciate(&config.genome, &population, 0);
        let mut reporters = ReporterSet::default();

        let next = reproduction.reproduce(&config, &mut species, &population, 0, &mut reporters, &mut rng);
        assert!(!next.is_empty());
        let mut carried = next.clone();
        for genome in carried.values_mut() {
            genome.fitness = Some(1.0);
        }
        species.speciate(&config.genome, &carried, 1);
        let extinct = reproduction.reproduce(&config, &mut species, &carried, 1, &mut reporters, &mut rng);
        assert!(extinct.is_empty());
        assert!(species.is_empty());
    }
}
