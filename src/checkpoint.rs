use std::{
    fs,
    path::{Path, PathBuf},
};

use color_eyre::eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::neat::{
    activation::{Activation, Aggregation},
    network::FeedForwardNetwork,
    GenomeKey, NodeKey,
};

pub const SNAPSHOT_VERSION: u32 = 1;

/// Fires once per distinct score above the threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointPolicy {
    threshold: u32,
    last_written: Option<u32>,
}

impl CheckpointPolicy {
    pub fn new(threshold: u32) -> Self {
        CheckpointPolicy { threshold, last_written: None }
    }

    pub fn should_write(&mut self, score: u32) -> bool {
        if score <= self.threshold || self.last_written == Some(score) {
            return false;
        }
        self.last_written = Some(score);
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub node: NodeKey,
    pub activation: Activation,
    pub aggregation: Aggregation,
    pub bias: f64,
    pub response: f64,
    pub links: Vec<(NodeKey, f64)>,
}

/// Everything needed to rebuild the evaluated network without the genome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    pub version: u32,
    pub genome: GenomeKey,
    pub generation: usize,
    pub score: u32,
    pub inputs: Vec<NodeKey>,
    pub outputs: Vec<NodeKey>,
    pub nodes: Vec<NodeSnapshot>,
}

impl NetworkSnapshot {
    pub fn new(genome: GenomeKey, generation: usize, score: u32, network: &FeedForwardNetwork) -> Self {
        let nodes = network
            .node_evals()
            .iter()
            .map(|eval| NodeSnapshot {
                node: eval.node,
                activation: eval.activation,
                aggregation: eval.aggregation,
                bias: eval.bias,
                response: eval.response,
                links: eval.links.clone(),
            })
            .collect();

        NetworkSnapshot {
            version: SNAPSHOT_VERSION,
            genome,
            generation,
            score,
            inputs: network.input_nodes().to_vec(),
            outputs: network.output_nodes().to_vec(),
            nodes,
        }
    }
}

/// Overwrites a single JSON file on every trigger.
#[derive(Debug, Clone)]
pub struct Checkpointer {
    path: PathBuf,
}

impl Checkpointer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Checkpointer { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, snapshot: &NetworkSnapshot) -> Result<()> {
        let json = serde_json::to_string_pretty(snapshot)?;
        fs::write(&self.path, json)
            .wrap_err_with(|| format!("failed to write checkpoint to {}", self.path.display()))?;
        debug!(
            genome = snapshot.genome,
            generation = snapshot.generation,
            score = snapshot.score,
            "checkpoint written to {}",
            self.path.display()
        );
        Ok(())
    }
}
