//! NeuroEvolution of Augmenting Topologies.
//!
//! Reads the classic `config.feedforward.txt` hyperparameter file and evolves feed-forward
//! networks: genomes are speciated by compatibility distance, stagnant species are dropped and
//! the rest reproduce in proportion to their adjusted fitness.

pub mod activation;
pub mod config;
pub mod genes;
pub mod genome;
pub mod network;
pub mod population;
pub mod reporting;
pub mod reproduction;
pub mod species;
pub mod stagnation;

pub use self::{
    config::NeatConfig,
    genome::Genome,
    network::FeedForwardNetwork,
    population::{GenerationOutcome, Population},
    reporting::{LogReporter, Reporter},
};

/// Inputs are keyed `-1..=-n`, outputs `0..m`, hidden nodes above that.
pub type NodeKey = i64;
pub type ConnectionKey = (NodeKey, NodeKey);
pub type GenomeKey = u64;
pub type SpeciesKey = u64;
