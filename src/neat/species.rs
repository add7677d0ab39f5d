use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::neat::{
    config::{GenomeConfig, SpeciesSetConfig},
    genome::Genome,
    GenomeKey, SpeciesKey,
};

#[derive(Debug, Clone)]
pub struct Species {
    pub key: SpeciesKey,
    pub created: usize,
    pub last_improved: usize,
    pub representative: Genome,
    pub members: Vec<GenomeKey>,
    pub fitness: Option<f64>,
    pub adjusted_fitness: Option<f64>,
    pub fitness_history: Vec<f64>,
}

impl Species {
    pub fn new(key: SpeciesKey, generation: usize, representative: Genome) -> Self {
        Species {
            key,
            created: generation,
            last_improved: generation,
            representative,
            members: Vec::new(),
            fitness: None,
            adjusted_fitness: None,
            fitness_history: Vec::new(),
        }
    }

    pub fn fitnesses(&self, population: &BTreeMap<GenomeKey, Genome>) -> Vec<f64> {
        self.members.iter().filter_map(|key| population.get(key)).filter_map(|genome| genome.fitness).collect()
    }
}

/// Memoised symmetric genome distances for one speciation pass.
pub struct DistanceCache<'a> {
    config: &'a GenomeConfig,
    distances: HashMap<(GenomeKey, GenomeKey), f64>,
}

impl<'a> DistanceCache<'a> {
    pub fn new(config: &'a GenomeConfig) -> Self {
        DistanceCache { config, distances: HashMap::new() }
    }

    pub fn distance(&mut self, first: &Genome, second: &Genome) -> f64 {
        if let Some(&d) = self.distances.get(&(first.key, second.key)) {
            return d;
        }
        let d = first.distance(second, self.config);
        self.distances.insert((first.key, second.key), d);
        self.distances.insert((second.key, first.key), d);
        d
    }

    pub fn mean(&self) -> f64 {
        if self.distances.is_empty() {
            return 0.0;
        }
        self.distances.values().sum::<f64>() / self.distances.len() as f64
    }

    pub fn stdev(&self) -> f64 {
        let values: Vec<f64> = self.distances.values().copied().collect();
        crate::neat::activation::stdev(&values)
    }
}

#[derive(Debug, Clone)]
pub struct SpeciesSet {
    config: SpeciesSetConfig,
    species: BTreeMap<SpeciesKey, Species>,
    genome_to_species: HashMap<GenomeKey, SpeciesKey>,
    next_key: SpeciesKey,
}

impl SpeciesSet {
    pub fn new(config: SpeciesSetConfig) -> Self {
        SpeciesSet { config, species: BTreeMap::new(), genome_to_species: HashMap::new(), next_key: 1 }
    }

    pub fn species(&self) -> &BTreeMap<SpeciesKey, Species> {
        &self.species
    }

    pub(crate) fn species_mut(&mut self) -> &mut BTreeMap<SpeciesKey, Species> {
        &mut self.species
    }

    pub fn len(&self) -> usize {
        self.species.len()
    }

    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }

    pub fn species_of(&self, genome: GenomeKey) -> Option<SpeciesKey> {
        self.genome_to_species.get(&genome).copied()
    }

    /// Each existing species keeps its closest genome as the new representative; everything else
    /// joins the closest compatible representative or founds a species. Species left without any
    /// genome to represent them are dropped. Returns the mean and stdev of computed distances.
    pub fn speciate(
        &mut self,
        genome_config: &GenomeConfig,
        population: &BTreeMap<GenomeKey, Genome>,
        generation: usize,
    ) -> (f64, f64) {
        let threshold = self.config.compatibility_threshold;
        let mut unspeciated: BTreeSet<GenomeKey> = population.keys().copied().collect();
        let mut distances = DistanceCache::new(genome_config);
        let mut representatives: BTreeMap<SpeciesKey, GenomeKey> = BTreeMap::new();
        let mut members: BTreeMap<SpeciesKey, Vec<GenomeKey>> = BTreeMap::new();

        for (&sid, species) in &self.species {
            let closest = unspeciated
                .iter()
                .filter_map(|key| population.get(key))
                .map(|genome| (distances.distance(&species.representative, genome), genome.key))
                .min_by(|a, b| a.0.total_cmp(&b.0));
            if let Some((_, rid)) = closest {
                representatives.insert(sid, rid);
                members.insert(sid, vec![rid]);
                unspeciated.remove(&rid);
            }
        }

        while let Some(gid) = unspeciated.pop_first() {
            let Some(genome) = population.get(&gid) else {
                continue;
            };
            let closest = representatives
                .iter()
                .filter_map(|(&sid, rid)| population.get(rid).map(|rep| (distances.distance(rep, genome), sid)))
                .filter(|(d, _)| *d < threshold)
                .min_by(|a, b| a.0.total_cmp(&b.0));
            match closest {
                Some((_, sid)) => members.entry(sid).or_default().push(gid),
                None => {
                    let sid = self.next_key;
                    self.next_key += 1;
                    representatives.insert(sid, gid);
                    members.insert(sid, vec![gid]);
                }
            }
        }

        self.genome_to_species.clear();
        let mut previous = std::mem::take(&mut self.species);
        for (sid, rid) in representatives {
            let Some(representative) = population.get(&rid).cloned() else {
                continue;
            };
            let mut species =
                previous.remove(&sid).unwrap_or_else(|| Species::new(sid, generation, representative.clone()));
            let species_members = members.remove(&sid).unwrap_or_default();
            for &gid in &species_members {
                self.genome_to_species.insert(gid, sid);
            }
            species.representative = representative;
            species.members = species_members;
            self.species.insert(sid, species);
        }

        (distances.mean(), distances.stdev())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::neat::{config::tests::flappy_config, genome::NodeIndexer};

    fn population(count: u64, seed: u64) -> (BTreeMap<GenomeKey, Genome>, GenomeConfig) {
        let config = flappy_config().genome;
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut indexer = NodeIndexer::default();
        let population =
            (1..=count).map(|key| (key, Genome::configure_new(key, &config, &mut indexer, &mut rng))).collect();
        (population, config)
    }

    #[test]
    fn test_every_genome_is_assigned_exactly_once() {
        let (population, config) = population(30, 1);
        let mut set = SpeciesSet::new(SpeciesSetConfig { compatibility_threshold: 0.5 });
        set.speciate(&config, &population, 0);

        let assigned: usize = set.species().values().map(|species| species.members.len()).sum();
        assert_eq!(assigned, 30);
        for key in population.keys() {
            let sid = set.species_of(*key).unwrap();
            assert!(set.species()[&sid].members.contains(key));
        }
    }

    #[test]
    fn test_threshold_controls_species_count() {
        let (population, config) = population(20, 2);
        let mut loose = SpeciesSet::new(SpeciesSetConfig { compatibility_threshold: 1000.0 });
        loose.speciate(&config, &population, 0);
        assert_eq!(loose.len(), 1);

        let mut strict = SpeciesSet::new(SpeciesSetConfig { compatibility_threshold: 0.0 });
        strict.speciate(&config, &population, 0);
        assert_eq!(strict.len(), 20);
    }

    #[test]
    fn test_species_persist_across_generations() {
        let (population, config) = population(10, 3);
        let mut set = SpeciesSet::new(SpeciesSetConfig { compatibility_threshold: 1000.0 });
        set.speciate(&config, &population, 0);
        let first = *set.species().keys().next().unwrap();

        let (next, _) = population_with_offset(10, 4);
        set.speciate(&config, &next, 1);
        assert_eq!(set.species().keys().copied().collect::<Vec<_>>(), vec![first]);
        assert_eq!(set.species()[&first].created, 0);
        assert_eq!(set.species()[&first].members.len(), 10);
    }

    #[test]
    fn test_species_without_genomes_are_dropped() {
        let (population, config) = population(6, 5);
        let mut set = SpeciesSet::new(SpeciesSetConfig { compatibility_threshold: 0.0 });
        set.speciate(&config, &population, 0);
        assert_eq!(set.len(), 6);

        let survivors: BTreeMap<GenomeKey, Genome> = population.into_iter().take(2).collect();
        set.speciate(&config, &survivors, 1);
        assert_eq!(set.len(), 2);
        assert!(set.species().values().all(|species| species.members.len() == 1));
    }

    #[test]
    fn test_distance_cache_is_symmetric() {
        let (population, config) = population(2, 6);
        let mut cache = DistanceCache::new(&config);
        let d1 = cache.distance(&population[&1], &population[&2]);
        let d2 = cache.distance(&population[&2], &population[&1]);
        assert_eq!(d1, d2);
        assert_eq!(cache.distances.len(), 2);
        assert_eq!(cache.mean(), d1);
    }

    fn population_with_offset(count: u64, seed: u64) -> (BTreeMap<GenomeKey, Genome>, GenomeConfig) {
        let (population, config) = population(count, seed);
        let shifted = population
            .into_values()
            .map(|mut genome| {
                genome.key += 100;
                (genome.key, genome)
            })
            .collect();
        (shifted, config)
    }
}
