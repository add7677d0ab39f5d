use rand::Rng;

use crate::neat::{
    activation::{Activation, Aggregation},
    config::GenomeConfig,
    ConnectionKey, NodeKey,
};

#[derive(Debug, Clone, PartialEq)]
pub struct NodeGene {
    pub key: NodeKey,
    pub bias: f64,
    pub response: f64,
    pub activation: Activation,
    pub aggregation: Aggregation,
}

impl NodeGene {
    pub fn new<R: Rng + ?Sized>(key: NodeKey, config: &GenomeConfig, rng: &mut R) -> Self {
        NodeGene {
            key,
            bias: config.bias.init_value(rng),
            response: config.response.init_value(rng),
            activation: config.activation.init_value(rng),
            aggregation: config.aggregation.init_value(rng),
        }
    }

    pub fn mutate<R: Rng + ?Sized>(&mut self, config: &GenomeConfig, rng: &mut R) {
        self.bias = config.bias.mutate_value(self.bias, rng);
        self.response = config.response.mutate_value(self.response, rng);
        self.activation = config.activation.mutate_value(self.activation, rng);
        self.aggregation = config.aggregation.mutate_value(self.aggregation, rng);
    }

    pub fn distance(&self, other: &NodeGene, config: &GenomeConfig) -> f64 {
        let mut d = (self.bias - other.bias).abs() + (self.response - other.response).abs();
        if self.activation != other.activation {
            d += 1.0;
        }
        if self.aggregation != other.aggregation {
            d += 1.0;
        }
        d * config.compatibility_weight_coefficient
    }

    /// Each attribute comes from either parent with equal probability.
    pub fn crossover<R: Rng + ?Sized>(&self, other: &NodeGene, rng: &mut R) -> NodeGene {
        NodeGene {
            key: self.key,
            bias: pick(rng, self.bias, other.bias),
            response: pick(rng, self.response, other.response),
            activation: pick(rng, self.activation, other.activation),
            aggregation: pick(rng, self.aggregation, other.aggregation),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionGene {
    pub key: ConnectionKey,
    pub weight: f64,
    pub enabled: bool,
}

impl ConnectionGene {
    pub fn new<R: Rng + ?Sized>(key: ConnectionKey, config: &GenomeConfig, rng: &mut R) -> Self {
        ConnectionGene { key, weight: config.weight.init_value(rng), enabled: config.enabled.init_value(rng) }
    }

    pub fn mutate<R: Rng + ?Sized>(&mut self, config: &GenomeConfig, rng: &mut R) {
        self.weight = config.weight.mutate_value(self.weight, rng);
        self.enabled = config.enabled.mutate_value(self.enabled, rng);
    }

    pub fn distance(&self, other: &ConnectionGene, config: &GenomeConfig) -> f64 {
        let mut d = (self.weight - other.weight).abs();
        if self.enabled != other.enabled {
            d += 1.0;
        }
        d * config.compatibility_weight_coefficient
    }

    pub fn crossover<R: Rng + ?Sized>(&self, other: &ConnectionGene, rng: &mut R) -> ConnectionGene {
        ConnectionGene {
            key: self.key,
            weight: pick(rng, self.weight, other.weight),
            enabled: pick(rng, self.enabled, other.enabled),
        }
    }
}

fn pick<T, R: Rng + ?Sized>(rng: &mut R, first: T, second: T) -> T {
    if rng.gen_bool(0.5) {
        first
    } else {
        second
    }
}
