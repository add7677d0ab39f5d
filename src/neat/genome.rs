use std::collections::{BTreeMap, HashSet};

use rand::{seq::SliceRandom, Rng};

use crate::neat::{
    config::{GenomeConfig, InitialConnection},
    genes::{ConnectionGene, NodeGene},
    ConnectionKey, GenomeKey, NodeKey,
};

/// Hands out hidden node keys. Shared by every genome of a run so split nodes never collide.
#[derive(Debug, Clone, Default)]
pub struct NodeIndexer {
    next: Option<NodeKey>,
}

impl NodeIndexer {
    pub fn next_key(&mut self, nodes: &BTreeMap<NodeKey, NodeGene>) -> NodeKey {
        let floor = nodes.keys().next_back().map_or(0, |max| max + 1);
        let key = self.next.map_or(floor, |next| next.max(floor));
        self.next = Some(key + 1);
        key
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Genome {
    pub key: GenomeKey,
    pub nodes: BTreeMap<NodeKey, NodeGene>,
    pub connections: BTreeMap<ConnectionKey, ConnectionGene>,
    pub fitness: Option<f64>,
}

impl Genome {
    pub fn new(key: GenomeKey) -> Self {
        Genome { key, nodes: BTreeMap::new(), connections: BTreeMap::new(), fitness: None }
    }

    /// Output nodes, `num_hidden` hidden nodes, then the configured initial wiring.
    pub fn configure_new<R: Rng + ?Sized>(
        key: GenomeKey,
        config: &GenomeConfig,
        indexer: &mut NodeIndexer,
        rng: &mut R,
    ) -> Self {
        let mut genome = Genome::new(key);
        for &output in &config.output_keys {
            genome.nodes.insert(output, NodeGene::new(output, config, rng));
        }
        for _ in 0..config.num_hidden {
            let node = indexer.next_key(&genome.nodes);
            genome.nodes.insert(node, NodeGene::new(node, config, rng));
        }

        match config.initial_connection {
            InitialConnection::Unconnected => {}
            InitialConnection::FsNeatNoHidden => genome.connect_fs_neat(config, false, rng),
            InitialConnection::FsNeatHidden => genome.connect_fs_neat(config, true, rng),
            InitialConnection::FullNoDirect => genome.connect_full(config, false, rng),
            InitialConnection::FullDirect => genome.connect_full(config, true, rng),
            InitialConnection::PartialNoDirect(p) => genome.connect_partial(config, false, p, rng),
            InitialConnection::PartialDirect(p) => genome.connect_partial(config, true, p, rng),
        }
        genome
    }

    /// Homologous genes mix attributes; disjoint and excess genes come from the fitter parent.
    pub fn configure_crossover<R: Rng + ?Sized>(key: GenomeKey, first: &Genome, second: &Genome, rng: &mut R) -> Self {
        let (fitter, other) =
            if first.fitness_or_min() > second.fitness_or_min() { (first, second) } else { (second, first) };
        let mut child = Genome::new(key);

        for (key, gene) in &fitter.connections {
            let gene = match other.connections.get(key) {
                Some(homologue) => gene.crossover(homologue, rng),
                None => gene.clone(),
            };
            child.connections.insert(*key, gene);
        }
        for (key, gene) in &fitter.nodes {
            let gene = match other.nodes.get(key) {
                Some(homologue) => gene.crossover(homologue, rng),
                None => gene.clone(),
            };
            child.nodes.insert(*key, gene);
        }
        child
    }

    fn fitness_or_min(&self) -> f64 {
        self.fitness.unwrap_or(f64::MIN)
    }

    pub fn mutate<R: Rng + ?Sized>(&mut self, config: &GenomeConfig, indexer: &mut NodeIndexer, rng: &mut R) {
        if config.single_structural_mutation {
            let total = config.node_add_prob + config.node_delete_prob + config.conn_add_prob + config.conn_delete_prob;
            let div = total.max(1.0);
            let r: f64 = rng.gen();
            if r < config.node_add_prob / div {
                self.mutate_add_node(config, indexer, rng);
            } else if r < (config.node_add_prob + config.node_delete_prob) / div {
                self.mutate_delete_node(config, rng);
            } else if r < (config.node_add_prob + config.node_delete_prob + config.conn_add_prob) / div {
                self.mutate_add_connection(config, rng);
            } else if r < total / div {
                self.mutate_delete_connection(rng);
            }
        } else {
            if rng.gen::<f64>() < config.node_add_prob {
                self.mutate_add_node(config, indexer, rng);
            }
            if rng.gen::<f64>() < config.node_delete_prob {
                self.mutate_delete_node(config, rng);
            }
            if rng.gen::<f64>() < config.conn_add_prob {
                self.mutate_add_connection(config, rng);
            }
            if rng.gen::<f64>() < config.conn_delete_prob {
                self.mutate_delete_connection(rng);
            }
        }

        for gene in self.connections.values_mut() {
            gene.mutate(config, rng);
        }
        for gene in self.nodes.values_mut() {
            gene.mutate(config, rng);
        }
    }

    /// Splits a random connection: in -> new (weight 1), new -> out (old weight). The old one is disabled.
    pub fn mutate_add_node<R: Rng + ?Sized>(
        &mut self,
        config: &GenomeConfig,
        indexer: &mut NodeIndexer,
        rng: &mut R,
    ) -> Option<NodeKey> {
        let keys: Vec<ConnectionKey> = self.connections.keys().copied().collect();
        let Some(&split) = keys.choose(rng) else {
            if config.structural_mutation_surer {
                self.mutate_add_connection(config, rng);
            }
            return None;
        };

        let weight = self.connections.get_mut(&split).map(|gene| {
            gene.enabled = false;
            gene.weight
        })?;

        let node = indexer.next_key(&self.nodes);
        self.nodes.insert(node, NodeGene::new(node, config, rng));
        let (input, output) = split;
        self.add_connection(input, node, 1.0, true);
        self.add_connection(node, output, weight, true);
        Some(node)
    }

    pub fn add_connection(&mut self, input: NodeKey, output: NodeKey, weight: f64, enabled: bool) {
        let key = (input, output);
        self.connections.insert(key, ConnectionGene { key, weight, enabled });
    }

    /// Returns the new connection key, if one was added.
    pub fn mutate_add_connection<R: Rng + ?Sized>(
        &mut self,
        config: &GenomeConfig,
        rng: &mut R,
    ) -> Option<ConnectionKey> {
        let outputs: Vec<NodeKey> = self.nodes.keys().copied().collect();
        let &out_node = outputs.choose(rng)?;
        let inputs: Vec<NodeKey> = outputs.iter().chain(config.input_keys.iter()).copied().collect();
        let &in_node = inputs.choose(rng)?;
        let key = (in_node, out_node);

        if let Some(existing) = self.connections.get_mut(&key) {
            if config.structural_mutation_surer {
                existing.enabled = true;
            }
            return None;
        }
        if config.output_keys.contains(&in_node) && config.output_keys.contains(&out_node) {
            return None;
        }
        if config.feed_forward && creates_cycle(self.connections.keys(), key) {
            return None;
        }

        self.connections.insert(key, ConnectionGene::new(key, config, rng));
        Some(key)
    }

    /// Removes a random non-output node and every connection touching it.
    pub fn mutate_delete_node<R: Rng + ?Sized>(&mut self, config: &GenomeConfig, rng: &mut R) -> Option<NodeKey> {
        let available: Vec<NodeKey> =
            self.nodes.keys().copied().filter(|key| !config.output_keys.contains(key)).collect();
        let &node = available.choose(rng)?;
        self.connections.retain(|&(input, output), _| input != node && output != node);
        self.nodes.remove(&node);
        Some(node)
    }

    pub fn mutate_delete_connection<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<ConnectionKey> {
        let keys: Vec<ConnectionKey> = self.connections.keys().copied().collect();
        let &key = keys.choose(rng)?;
        self.connections.remove(&key);
        Some(key)
    }

    /// Gene-wise distance plus a penalty per disjoint gene, normalised by the larger genome.
    pub fn distance(&self, other: &Genome, config: &GenomeConfig) -> f64 {
        let disjoint = config.compatibility_disjoint_coefficient;

        let mut node_distance = 0.0;
        if !self.nodes.is_empty() || !other.nodes.is_empty() {
            let mut disjoint_nodes = other.nodes.keys().filter(|key| !self.nodes.contains_key(key)).count();
            for (key, gene) in &self.nodes {
                match other.nodes.get(key) {
                    Some(homologue) => node_distance += gene.distance(homologue, config),
                    None => disjoint_nodes += 1,
                }
            }
            let max_nodes = self.nodes.len().max(other.nodes.len()) as f64;
            node_distance = (node_distance + disjoint * disjoint_nodes as f64) / max_nodes;
        }

        let mut connection_distance = 0.0;
        if !self.connections.is_empty() || !other.connections.is_empty() {
            let mut disjoint_connections =
                other.connections.keys().filter(|key| !self.connections.contains_key(key)).count();
            for (key, gene) in &self.connections {
                match other.connections.get(key) {
                    Some(homologue) => connection_distance += gene.distance(homologue, config),
                    None => disjoint_connections += 1,
                }
            }
            let max_connections = self.connections.len().max(other.connections.len()) as f64;
            connection_distance = (connection_distance + disjoint * disjoint_connections as f64) / max_connections;
        }

        node_distance + connection_distance
    }

    /// Node count and enabled connection count.
    pub fn size(&self) -> (usize, usize) {
        (self.nodes.len(), self.connections.values().filter(|gene| gene.enabled).count())
    }

    fn hidden_keys(&self, config: &GenomeConfig) -> Vec<NodeKey> {
        self.nodes.keys().copied().filter(|key| !config.output_keys.contains(key)).collect()
    }

    fn full_connections(&self, config: &GenomeConfig, direct: bool) -> Vec<ConnectionKey> {
        let hidden = self.hidden_keys(config);
        let mut connections = Vec::new();
        for &input in &config.input_keys {
            for &node in &hidden {
                connections.push((input, node));
            }
        }
        for &node in &hidden {
            for &output in &config.output_keys {
                connections.push((node, output));
            }
        }
        if direct || hidden.is_empty() {
            for &input in &config.input_keys {
                for &output in &config.output_keys {
                    connections.push((input, output));
                }
            }
        }
        connections
    }

    fn connect_full<R: Rng + ?Sized>(&mut self, config: &GenomeConfig, direct: bool, rng: &mut R) {
        for key in self.full_connections(config, direct) {
            self.connections.insert(key, ConnectionGene::new(key, config, rng));
        }
    }

    fn connect_partial<R: Rng + ?Sized>(&mut self, config: &GenomeConfig, direct: bool, probability: f64, rng: &mut R) {
        let mut all = self.full_connections(config, direct);
        all.shuffle(rng);
        let count = (probability * all.len() as f64).round_ties_even() as usize;
        for key in all.into_iter().take(count) {
            self.connections.insert(key, ConnectionGene::new(key, config, rng));
        }
    }

    /// One random input wired to every output, and to every hidden node when `hidden` is set.
    fn connect_fs_neat<R: Rng + ?Sized>(&mut self, config: &GenomeConfig, hidden: bool, rng: &mut R) {
        let Some(&input) = config.input_keys.choose(rng) else {
            return;
        };
        let targets: Vec<NodeKey> =
            if hidden { self.nodes.keys().copied().collect() } else { config.output_keys.clone() };
        for output in targets {
            let key = (input, output);
            self.connections.insert(key, ConnectionGene::new(key, config, rng));
        }
    }
}

/// True if adding `test` to a graph made of `connections` would close a cycle.
pub fn creates_cycle<'a, I>(connections: I, test: ConnectionKey) -> bool
where
    I: IntoIterator<Item = &'a ConnectionKey>,
{
    let (input, output) = test;
    if input == output {
        return true;
    }
    let connections: Vec<ConnectionKey> = connections.into_iter().copied().collect();
    let mut visited = HashSet::from([output]);
    loop {
        let mut added = 0;
        for &(a, b) in &connections {
            if visited.contains(&a) && !visited.contains(&b) {
                if b == input {
                    return true;
                }
                visited.insert(b);
                added += 1;
            }
        }
        if added == 0 {
            return false;
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::neat::config::tests::flappy_config;

    fn fresh(key: GenomeKey, seed: u64) -> (Genome, GenomeConfig, NodeIndexer, ChaCha8Rng) {
        let config = flappy_config().genome;
        let mut indexer = NodeIndexer::default();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let genome = Genome::configure_new(key, &config, &mut indexer, &mut rng);
        (genome, config, indexer, rng)
    }

    #[test]
    fn test_full_connection_without_hidden_links_inputs_to_outputs() {
        let (genome, _, _, _) = fresh(1, 0);
        assert_eq!(genome.nodes.keys().copied().collect::<Vec<_>>(), vec![0]);
        assert_eq!(genome.connections.keys().copied().collect::<Vec<_>>(), vec![(-3, 0), (-2, 0), (-1, 0)]);
        assert_eq!(genome.size(), (1, 3));
    }

    #[test]
    fn test_hidden_nodes_with_full_nodirect() {
        let mut config = flappy_config().genome;
        config.num_hidden = 2;
        let mut indexer = NodeIndexer::default();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let genome = Genome::configure_new(1, &config, &mut indexer, &mut rng);
        assert_eq!(genome.nodes.keys().copied().collect::<Vec<_>>(), vec![0, 1, 2]);
        // 3 inputs x 2 hidden + 2 hidden x 1 output, no direct input -> output links.
        assert_eq!(genome.connections.len(), 8);
        assert!(!genome.connections.contains_key(&(-1, 0)));

        config.initial_connection = InitialConnection::FullDirect;
        let direct = Genome::configure_new(2, &config, &mut indexer, &mut rng);
        assert_eq!(direct.connections.len(), 11);
        assert_eq!(direct.nodes.keys().copied().collect::<Vec<_>>(), vec![0, 3, 4]);
    }

    #[test]
    fn test_partial_connection_count() {
        let mut config = flappy_config().genome;
        config.initial_connection = InitialConnection::PartialNoDirect(0.5);
        config.num_inputs = 4;
        config.input_keys = vec![-1, -2, -3, -4];
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let genome = Genome::configure_new(1, &config, &mut NodeIndexer::default(), &mut rng);
        assert_eq!(genome.connections.len(), 2);
    }

    #[test]
    fn test_add_node_splits_connection() {
        let (mut genome, config, mut indexer, mut rng) = fresh(1, 5);
        let node = genome.mutate_add_node(&config, &mut indexer, &mut rng).unwrap();
        assert_eq!(node, 1);
        assert_eq!(genome.connections.len(), 5);
        assert_eq!(genome.size(), (2, 4));

        let split = genome.connections.values().find(|gene| !gene.enabled).unwrap().clone();
        let (input, output) = split.key;
        assert_eq!(genome.connections[&(input, node)].weight, 1.0);
        assert_eq!(genome.connections[&(node, output)].weight, split.weight);
    }

    #[test]
    fn test_indexer_is_shared_across_genomes() {
        let (mut first, config, mut indexer, mut rng) = fresh(1, 5);
        let mut second = first.clone();
        let a = first.mutate_add_node(&config, &mut indexer, &mut rng).unwrap();
        let b = second.mutate_add_node(&config, &mut indexer, &mut rng).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_delete_node_removes_touching_connections() {
        let (mut genome, config, mut indexer, mut rng) = fresh(1, 5);
        let node = genome.mutate_add_node(&config, &mut indexer, &mut rng).unwrap();
        assert_eq!(genome.mutate_delete_node(&config, &mut rng), Some(node));
        assert_eq!(genome.size(), (1, 2));
        assert!(genome.connections.keys().all(|&(a, b)| a != node && b != node));
        // Outputs are never deleted.
        assert_eq!(genome.mutate_delete_node(&config, &mut rng), None);
    }

    #[test]
    fn test_add_connection_rejects_cycles() {
        let (mut genome, config, mut indexer, mut rng) = fresh(1, 9);
        genome.mutate_add_node(&config, &mut indexer, &mut rng);
        for _ in 0..500 {
            genome.mutate_add_connection(&config, &mut rng);
        }
        for &key in genome.connections.keys() {
            let others: Vec<ConnectionKey> = genome.connections.keys().copied().filter(|&k| k != key).collect();
            assert!(!creates_cycle(&others, key), "{key:?} closes a cycle");
        }
        assert!(!genome.connections.contains_key(&(0, 0)));
    }

    #[test]
    fn test_creates_cycle() {
        let connections = vec![(-1, 1), (1, 2), (2, 0)];
        assert!(creates_cycle(&connections, (0, 0)));
        assert!(creates_cycle(&connections, (2, 1)));
        assert!(creates_cycle(&connections, (0, 1)));
        assert!(!creates_cycle(&connections, (-1, 2)));
        assert!(!creates_cycle(&connections, (1, 0)));
    }

    #[test]
    fn test_distance() {
        let (genome, config, mut indexer, mut rng) = fresh(1, 3);
        assert_eq!(genome.distance(&genome, &config), 0.0);

        let mut other = genome.clone();
        other.mutate_add_node(&config, &mut indexer, &mut rng);
        // One disjoint node over two, two disjoint connections plus one disabled homologue over five.
        let expected = 1.0 / 2.0 + (2.0 + (1.0 * 0.5)) / 5.0;
        assert!((genome.distance(&other, &config) - expected).abs() < 1e-12);
        assert!((other.distance(&genome, &config) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_crossover_takes_structure_from_fitter_parent() {
        let (mut weak, config, mut indexer, mut rng) = fresh(1, 4);
        let mut strong = weak.clone();
        strong.key = 2;
        strong.mutate_add_node(&config, &mut indexer, &mut rng);
        strong.fitness = Some(10.0);
        weak.fitness = Some(1.0);

        let child = Genome::configure_crossover(3, &weak, &strong, &mut rng);
        assert_eq!(child.key, 3);
        assert_eq!(child.fitness, None);
        assert_eq!(child.nodes.keys().collect::<Vec<_>>(), strong.nodes.keys().collect::<Vec<_>>());
        assert_eq!(child.connections.keys().collect::<Vec<_>>(), strong.connections.keys().collect::<Vec<_>>());

        let reversed = Genome::configure_crossover(4, &strong, &weak, &mut rng);
        assert_eq!(reversed.connections.len(), strong.connections.len());
    }

    #[test]
    fn test_mutation_keeps_genome_acyclic_and_outputs_present() {
        let (mut genome, config, mut indexer, mut rng) = fresh(1, 21);
        for _ in 0..200 {
            genome.mutate(&config, &mut indexer, &mut rng);
            assert!(genome.nodes.contains_key(&0));
        }
        for &key in genome.connections.keys() {
            let others: Vec<ConnectionKey> = genome.connections.keys().copied().filter(|&k| k != key).collect();
            assert!(!creates_cycle(&others, key));
        }
    }
}
