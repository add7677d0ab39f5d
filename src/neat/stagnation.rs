use std::collections::BTreeMap;

use crate::neat::{config::StagnationConfig, genome::Genome, species::SpeciesSet, GenomeKey, SpeciesKey};

#[derive(Debug, Clone)]
pub struct Stagnation {
    config: StagnationConfig,
}

impl Stagnation {
    pub fn new(config: StagnationConfig) -> Self {
        Stagnation { config }
    }

    /// Records this generation's species fitness and flags species that have not improved for
    /// `max_stagnation` generations. The `species_elitism` best species are never flagged, and
    /// flagging stops once only that many non-stagnant species remain.
    ///
    /// Returned in ascending species fitness.
    pub fn update(
        &self,
        species_set: &mut SpeciesSet,
        population: &BTreeMap<GenomeKey, Genome>,
        generation: usize,
    ) -> Vec<(SpeciesKey, bool)> {
        let mut ranked: Vec<(SpeciesKey, f64, usize)> = Vec::new();
        for (&sid, species) in species_set.species_mut().iter_mut() {
            let previous = species.fitness_history.iter().copied().fold(-f64::MAX, f64::max);
            let fitness = self.config.species_fitness_func.apply(&species.fitnesses(population));
            species.fitness = Some(fitness);
            species.fitness_history.push(fitness);
            species.adjusted_fitness = None;
            if fitness > previous {
                species.last_improved = generation;
            }
            ranked.push((sid, fitness, species.last_improved));
        }
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1));

        let total = ranked.len();
        let mut non_stagnant = total;
        ranked
            .into_iter()
            .enumerate()
            .map(|(index, (sid, _, last_improved))| {
                let stagnant_time = generation.saturating_sub(last_improved);
                let mut stagnant =
                    non_stagnant > self.config.species_elitism && stagnant_time >= self.config.max_stagnation;
                if total - index <= self.config.species_elitism {
                    stagnant = false;
                }
                if stagnant {
                    non_stagnant -= 1;
                }
                (sid, stagnant)
            })
            .collect()
    }
}
