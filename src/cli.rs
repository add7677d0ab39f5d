use std::path::PathBuf;

use clap::Parser;

use crate::config::SimulationConfig;

#[derive(Parser, Debug, Default)]
#[command(author, version, about)]
pub struct Cli {
    /// Train without the terminal UI, logging progress to stdout
    #[arg(long)]
    pub headless: bool,

    /// Number of generations to evolve
    #[arg(short, long, value_name = "N")]
    pub generations: Option<usize>,

    /// Seed for a reproducible run
    #[arg(short, long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Simulation ticks per second
    #[arg(short, long, value_name = "FLOAT", value_parser = positive_rate)]
    pub tick_rate: Option<f64>,

    /// Frames per second
    #[arg(short, long, value_name = "FLOAT", value_parser = positive_rate)]
    pub frame_rate: Option<f64>,

    /// Where the best network is saved once a checkpoint score is reached
    #[arg(long, value_name = "PATH")]
    pub checkpoint: Option<PathBuf>,
}

fn positive_rate(raw: &str) -> Result<f64, String> {
    let rate: f64 = raw.parse().map_err(|_| format!("`{raw}` is not a number"))?;
    if rate.is_finite() && rate > 0.0 {
        Ok(rate)
    } else {
        Err(format!("rate must be positive, got {rate}"))
    }
}

impl Cli {
    /// Flags win over the configuration file.
    pub fn apply(&self, simulation: &mut SimulationConfig) {
        if let Some(generations) = self.generations {
            simulation.generations = generations;
        }
        if self.seed.is_some() {
            simulation.seed = self.seed;
        }
        if let Some(tick_rate) = self.tick_rate {
            simulation.tick_rate = tick_rate;
        }
        if let Some(frame_rate) = self.frame_rate {
            simulation.frame_rate = frame_rate;
        }
        if let Some(checkpoint) = &self.checkpoint {
            simulation.checkpoint_path = checkpoint.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_no_flags_keep_configuration() {
        let cli = Cli::try_parse_from(["flappy-neat"]).unwrap();
        let mut simulation = SimulationConfig::default();
        cli.apply(&mut simulation);
        assert_eq!(simulation, SimulationConfig::default());
        assert!(!cli.headless);
    }

    #[test]
    fn test_flags_override_configuration() {
        let cli = Cli::try_parse_from(["flappy-neat", "--headless", "-g", "5", "--seed", "9", "--tick-rate", "120"])
            .unwrap();
        let mut simulation = SimulationConfig::default();
        cli.apply(&mut simulation);
        assert!(cli.headless);
        assert_eq!(simulation.generations, 5);
        assert_eq!(simulation.seed, Some(9));
        assert_eq!(simulation.tick_rate, 120.0);
        assert_eq!(simulation.frame_rate, 60.0);
    }

    #[test]
    fn test_non_positive_rates_are_rejected() {
        assert!(Cli::try_parse_from(["flappy-neat", "--tick-rate", "0"]).is_err());
        assert!(Cli::try_parse_from(["flappy-neat", "--frame-rate=-5"]).is_err());
        assert!(Cli::try_parse_from(["flappy-neat", "--frame-rate", "fast"]).is_err());
        let cli = Cli::try_parse_from(["flappy-neat", "-f", "0.5"]).unwrap();
        assert_eq!(cli.frame_rate, Some(0.5));
    }
}
