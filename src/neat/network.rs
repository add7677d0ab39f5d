use std::collections::{BTreeSet, HashMap};

use color_eyre::eyre::{ensure, Result};

use crate::neat::{
    activation::{Activation, Aggregation},
    config::GenomeConfig,
    genome::Genome,
    ConnectionKey, NodeKey,
};

/// Nodes an output depends on, excluding inputs. Outputs are always included.
pub fn required_for_output(
    inputs: &[NodeKey],
    outputs: &[NodeKey],
    connections: &[ConnectionKey],
) -> BTreeSet<NodeKey> {
    let mut required: BTreeSet<NodeKey> = outputs.iter().copied().collect();
    let mut frontier = required.clone();
    loop {
        let reached: BTreeSet<NodeKey> = connections
            .iter()
            .filter(|(a, b)| frontier.contains(b) && !frontier.contains(a))
            .map(|&(a, _)| a)
            .collect();
        if reached.is_empty() {
            break;
        }
        let layer: BTreeSet<NodeKey> = reached.iter().copied().filter(|node| !inputs.contains(node)).collect();
        if layer.is_empty() {
            break;
        }
        required.extend(layer);
        frontier.extend(reached);
    }
    required
}

/// Groups required nodes into layers whose inputs are all computed by earlier layers.
pub fn feed_forward_layers(
    inputs: &[NodeKey],
    outputs: &[NodeKey],
    connections: &[ConnectionKey],
) -> Vec<BTreeSet<NodeKey>> {
    let required = required_for_output(inputs, outputs, connections);
    let mut layers = Vec::new();
    let mut computed: BTreeSet<NodeKey> = inputs.iter().copied().collect();
    loop {
        let candidates: BTreeSet<NodeKey> = connections
            .iter()
            .filter(|(a, b)| computed.contains(a) && !computed.contains(b))
            .map(|&(_, b)| b)
            .collect();
        let layer: BTreeSet<NodeKey> = candidates
            .into_iter()
            .filter(|node| required.contains(node))
            .filter(|node| connections.iter().filter(|(_, b)| b == node).all(|(a, _)| computed.contains(a)))
            .collect();
        if layer.is_empty() {
            break;
        }
        computed.extend(layer.iter().copied());
        layers.push(layer);
    }
    layers
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeEval {
    pub node: NodeKey,
    pub activation: Activation,
    pub aggregation: Aggregation,
    pub bias: f64,
    pub response: f64,
    pub links: Vec<(NodeKey, f64)>,
}

/// Phenotype of a genome. Only enabled connections that reach an output are evaluated.
#[derive(Debug, Clone)]
pub struct FeedForwardNetwork {
    input_nodes: Vec<NodeKey>,
    output_nodes: Vec<NodeKey>,
    node_evals: Vec<NodeEval>,
    values: HashMap<NodeKey, f64>,
}

impl FeedForwardNetwork {
    pub fn create(genome: &Genome, config: &GenomeConfig) -> Self {
        Self::from_genome(genome, &config.input_keys, &config.output_keys)
    }

    pub fn from_genome(genome: &Genome, inputs: &[NodeKey], outputs: &[NodeKey]) -> Self {
        let connections: Vec<ConnectionKey> =
            genome.connections.values().filter(|gene| gene.enabled).map(|gene| gene.key).collect();

        let mut node_evals = Vec::new();
        for layer in feed_forward_layers(inputs, outputs, &connections) {
            for node in layer {
                let links = connections
                    .iter()
                    .filter(|(_, out)| *out == node)
                    .filter_map(|key| genome.connections.get(key).map(|gene| (key.0, gene.weight)))
                    .collect();
                let Some(gene) = genome.nodes.get(&node) else {
                    continue;
                };
                node_evals.push(NodeEval {
                    node,
                    activation: gene.activation,
                    aggregation: gene.aggregation,
                    bias: gene.bias,
                    response: gene.response,
                    links,
                });
            }
        }

        let values = inputs.iter().chain(outputs.iter()).map(|&key| (key, 0.0)).collect();
        FeedForwardNetwork { input_nodes: inputs.to_vec(), output_nodes: outputs.to_vec(), node_evals, values }
    }

    pub fn activate(&mut self, inputs: &[f64]) -> Result<Vec<f64>> {
        ensure!(
            inputs.len() == self.input_nodes.len(),
            "expected {} inputs, got {}",
            self.input_nodes.len(),
            inputs.len()
        );
        for (&node, &value) in self.input_nodes.iter().zip(inputs) {
            self.values.insert(node, value);
        }

        for eval in &self.node_evals {
            let weighted: Vec<f64> = eval
                .links
                .iter()
                .map(|(input, weight)| self.values.get(input).copied().unwrap_or(0.0) * weight)
                .collect();
            let total = eval.aggregation.apply(&weighted);
            self.values.insert(eval.node, eval.activation.apply(eval.bias + eval.response * total));
        }

        Ok(self.output_nodes.iter().map(|node| self.values.get(node).copied().unwrap_or(0.0)).collect())
    }

    pub fn input_nodes(&self) -> &[NodeKey] {
        &self.input_nodes
    }

    pub fn output_nodes(&self) -> &[NodeKey] {
        &self.output_nodes
    }

    pub fn node_evals(&self) -> &[NodeEval] {
        &self.node_evals
    }
}
