use color_eyre::eyre::{eyre, Result};

use crate::neat::network::FeedForwardNetwork;

/// What a controller sees each tick. Distances are absolute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub bird_y: f64,
    pub gap_top_distance: f64,
    pub gap_bottom_distance: f64,
}

impl Observation {
    pub fn new(bird_y: f32, gap_top: f32, gap_bottom: f32) -> Self {
        Observation {
            bird_y: bird_y as f64,
            gap_top_distance: (bird_y - gap_top).abs() as f64,
            gap_bottom_distance: (bird_y - gap_bottom).abs() as f64,
        }
    }

    pub fn inputs(&self) -> [f64; 3] {
        [self.bird_y, self.gap_top_distance, self.gap_bottom_distance]
    }
}

/// Maps an observation to a scalar. The evaluator jumps when it exceeds the threshold.
pub trait Controller {
    fn decide(&mut self, observation: &Observation) -> Result<f64>;
}

pub struct NetworkController {
    network: FeedForwardNetwork,
}

impl NetworkController {
    pub fn new(network: FeedForwardNetwork) -> Self {
        NetworkController { network }
    }

    pub fn network(&self) -> &FeedForwardNetwork {
        &self.network
    }
}

impl Controller for NetworkController {
    fn decide(&mut self, observation: &Observation) -> Result<f64> {
        let outputs = self.network.activate(&observation.inputs())?;
        outputs.first().copied().ok_or_else(|| eyre!("network produced no outputs"))
    }
}

impl<F> Controller for F
where
    F: FnMut(&Observation) -> Result<f64>,
{
    fn decide(&mut self, observation: &Observation) -> Result<f64> {
        self(observation)
    }
}
