//! Hyperparameters in the classic NEAT INI layout.
//!
//! ```ini
//! [NEAT]
//! fitness_criterion = max
//! ...
//! [DefaultGenome]
//! [DefaultSpeciesSet]
//! [DefaultStagnation]
//! [DefaultReproduction]
//! ```
//!
//! Every value arrives as a string and is checked here once, so the rest of the crate works with
//! typed and validated settings.

use std::{path::Path, str::FromStr};

use color_eyre::eyre::{bail, ensure, eyre, Result, WrapErr};
use config::{File, FileFormat};
use rand::{seq::SliceRandom, Rng};
use rand_distr::{Distribution, Normal};
use serde::Deserialize;
use strum::{Display, EnumString};

use crate::neat::{
    activation::{mean, median, Activation, Aggregation},
    NodeKey,
};

/// Reduces a set of fitness values to one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Statistic {
    Max,
    Min,
    Mean,
    Median,
}

impl Statistic {
    pub fn apply(self, values: &[f64]) -> f64 {
        match self {
            Statistic::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Statistic::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Statistic::Mean => mean(values),
            Statistic::Median => median(values),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum InitType {
    Gaussian,
    Normal,
    Uniform,
}

pub(crate) fn gauss<R: Rng + ?Sized>(rng: &mut R, mean: f64, stdev: f64) -> f64 {
    match Normal::new(mean, stdev) {
        Ok(normal) => normal.sample(rng),
        Err(_) => mean,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FloatAttribute {
    pub init_mean: f64,
    pub init_stdev: f64,
    pub init_type: InitType,
    pub min_value: f64,
    pub max_value: f64,
    pub mutate_power: f64,
    pub mutate_rate: f64,
    pub replace_rate: f64,
}

impl FloatAttribute {
    fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min_value, self.max_value)
    }

    pub fn init_value<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self.init_type {
            InitType::Gaussian | InitType::Normal => self.clamp(gauss(rng, self.init_mean, self.init_stdev)),
            InitType::Uniform => {
                let low = self.min_value.max(self.init_mean - 2.0 * self.init_stdev);
                let high = self.max_value.min(self.init_mean + 2.0 * self.init_stdev);
                if low < high {
                    rng.gen_range(low..=high)
                } else {
                    low
                }
            }
        }
    }

    /// Perturb with probability `mutate_rate`, otherwise re-draw with probability `replace_rate`.
    pub fn mutate_value<R: Rng + ?Sized>(&self, value: f64, rng: &mut R) -> f64 {
        let r: f64 = rng.gen();
        if r < self.mutate_rate {
            return self.clamp(value + gauss(rng, 0.0, self.mutate_power));
        }
        if r < self.replace_rate + self.mutate_rate {
            return self.init_value(rng);
        }
        value
    }

    fn validate(&self, name: &str) -> Result<()> {
        ensure!(
            self.min_value <= self.max_value,
            "{name}: min_value {} exceeds max_value {}",
            self.min_value,
            self.max_value
        );
        ensure!(self.init_stdev >= 0.0, "{name}: init_stdev must not be negative");
        ensure!(self.mutate_power >= 0.0, "{name}: mutate_power must not be negative");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoolAttribute {
    /// `None` draws uniformly.
    pub default: Option<bool>,
    pub mutate_rate: f64,
    pub rate_to_true_add: f64,
    pub rate_to_false_add: f64,
}

impl BoolAttribute {
    pub fn init_value<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        self.default.unwrap_or_else(|| rng.gen_bool(0.5))
    }

    /// A mutation re-draws the value, so it may land on the same one.
    pub fn mutate_value<R: Rng + ?Sized>(&self, value: bool, rng: &mut R) -> bool {
        let rate = self.mutate_rate + if value { self.rate_to_false_add } else { self.rate_to_true_add };
        if rate > 0.0 && rng.gen::<f64>() < rate {
            return rng.gen::<f64>() < 0.5;
        }
        value
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceAttribute<T> {
    /// `None` picks from `options`.
    pub default: Option<T>,
    pub options: Vec<T>,
    pub mutate_rate: f64,
}

impl<T: Copy + Default> ChoiceAttribute<T> {
    pub fn init_value<R: Rng + ?Sized>(&self, rng: &mut R) -> T {
        self.default.or_else(|| self.options.choose(rng).copied()).unwrap_or_default()
    }

    pub fn mutate_value<R: Rng + ?Sized>(&self, value: T, rng: &mut R) -> T {
        if self.mutate_rate > 0.0 && rng.gen::<f64>() < self.mutate_rate {
            return self.options.choose(rng).copied().unwrap_or(value);
        }
        value
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InitialConnection {
    Unconnected,
    FsNeatNoHidden,
    FsNeatHidden,
    FullNoDirect,
    FullDirect,
    PartialNoDirect(f64),
    PartialDirect(f64),
}

impl FromStr for InitialConnection {
    type Err = color_eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        let mut words = s.split_whitespace();
        let kind = words.next().unwrap_or("unconnected").to_lowercase();
        let raw_probability = words.next();
        let probability = || -> Result<f64> {
            let raw = raw_probability.ok_or_else(|| eyre!("initial_connection '{s}' needs a probability"))?;
            let p: f64 = raw.parse().wrap_err_with(|| format!("invalid connection probability '{raw}'"))?;
            ensure!((0.0..=1.0).contains(&p), "connection probability {p} outside [0, 1]");
            Ok(p)
        };
        Ok(match kind.as_str() {
            "unconnected" => InitialConnection::Unconnected,
            "fs_neat" | "fs_neat_nohidden" => InitialConnection::FsNeatNoHidden,
            "fs_neat_hidden" => InitialConnection::FsNeatHidden,
            "full" | "full_nodirect" => InitialConnection::FullNoDirect,
            "full_direct" => InitialConnection::FullDirect,
            "partial" | "partial_nodirect" => InitialConnection::PartialNoDirect(probability()?),
            "partial_direct" => InitialConnection::PartialDirect(probability()?),
            other => bail!("unknown initial_connection '{other}'"),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenomeConfig {
    pub num_inputs: usize,
    pub num_outputs: usize,
    pub num_hidden: usize,
    pub feed_forward: bool,
    pub initial_connection: InitialConnection,
    pub compatibility_disjoint_coefficient: f64,
    pub compatibility_weight_coefficient: f64,
    pub conn_add_prob: f64,
    pub conn_delete_prob: f64,
    pub node_add_prob: f64,
    pub node_delete_prob: f64,
    pub single_structural_mutation: bool,
    pub structural_mutation_surer: bool,
    pub bias: FloatAttribute,
    pub response: FloatAttribute,
    pub weight: FloatAttribute,
    pub activation: ChoiceAttribute<Activation>,
    pub aggregation: ChoiceAttribute<Aggregation>,
    pub enabled: BoolAttribute,
    pub input_keys: Vec<NodeKey>,
    pub output_keys: Vec<NodeKey>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesSetConfig {
    pub compatibility_threshold: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StagnationConfig {
    pub species_fitness_func: Statistic,
    pub max_stagnation: usize,
    pub species_elitism: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReproductionConfig {
    pub elitism: usize,
    pub survival_threshold: f64,
    pub min_species_size: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NeatConfig {
    pub fitness_criterion: Statistic,
    pub fitness_threshold: f64,
    pub pop_size: usize,
    pub reset_on_extinction: bool,
    pub no_fitness_termination: bool,
    pub genome: GenomeConfig,
    pub species_set: SpeciesSetConfig,
    pub stagnation: StagnationConfig,
    pub reproduction: ReproductionConfig,
}

impl NeatConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw: RawConfig = config::Config::builder()
            .add_source(File::from(path).format(FileFormat::Ini))
            .build()
            .and_then(|c| c.try_deserialize())
            .wrap_err_with(|| format!("failed to read NEAT parameters from {}", path.display()))?;
        Self::try_from(raw).wrap_err_with(|| format!("invalid NEAT parameters in {}", path.display()))
    }

    #[cfg(test)]
    pub fn from_ini_str(contents: &str) -> Result<Self> {
        let raw: RawConfig = config::Config::builder()
            .add_source(File::from_str(contents, FileFormat::Ini))
            .build()?
            .try_deserialize()?;
        Self::try_from(raw)
    }
}

fn true_string() -> String {
    "true".into()
}

fn gaussian() -> String {
    "gaussian".into()
}

fn mean_string() -> String {
    "mean".into()
}

fn default_max_stagnation() -> usize {
    15
}

fn default_survival_threshold() -> f64 {
    0.2
}

fn default_min_species_size() -> usize {
    1
}

fn unconnected() -> String {
    "unconnected".into()
}

fn one() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(rename = "NEAT", alias = "neat")]
    neat: RawNeat,
    #[serde(rename = "DefaultGenome", alias = "defaultgenome")]
    genome: RawGenome,
    #[serde(rename = "DefaultSpeciesSet", alias = "defaultspeciesset")]
    species_set: RawSpeciesSet,
    #[serde(rename = "DefaultStagnation", alias = "defaultstagnation")]
    stagnation: RawStagnation,
    #[serde(rename = "DefaultReproduction", alias = "defaultreproduction")]
    reproduction: RawReproduction,
}

#[derive(Debug, Deserialize)]
struct RawNeat {
    fitness_criterion: String,
    fitness_threshold: f64,
    pop_size: usize,
    reset_on_extinction: bool,
    #[serde(default)]
    no_fitness_termination: bool,
}

#[derive(Debug, Deserialize)]
struct RawGenome {
    num_inputs: usize,
    num_outputs: usize,
    num_hidden: usize,
    feed_forward: bool,
    #[serde(default = "unconnected")]
    initial_connection: String,
    compatibility_disjoint_coefficient: f64,
    compatibility_weight_coefficient: f64,
    conn_add_prob: f64,
    conn_delete_prob: f64,
    node_add_prob: f64,
    node_delete_prob: f64,
    #[serde(default)]
    single_structural_mutation: bool,
    #[serde(default)]
    structural_mutation_surer: Option<String>,

    bias_init_mean: f64,
    bias_init_stdev: f64,
    #[serde(default = "gaussian")]
    bias_init_type: String,
    bias_max_value: f64,
    bias_min_value: f64,
    bias_mutate_power: f64,
    bias_mutate_rate: f64,
    bias_replace_rate: f64,

    #[serde(default = "one")]
    response_init_mean: f64,
    #[serde(default)]
    response_init_stdev: f64,
    #[serde(default = "gaussian")]
    response_init_type: String,
    #[serde(default = "one")]
    response_max_value: f64,
    #[serde(default = "one")]
    response_min_value: f64,
    #[serde(default)]
    response_mutate_power: f64,
    #[serde(default)]
    response_mutate_rate: f64,
    #[serde(default)]
    response_replace_rate: f64,

    weight_init_mean: f64,
    weight_init_stdev: f64,
    #[serde(default = "gaussian")]
    weight_init_type: String,
    weight_max_value: f64,
    weight_min_value: f64,
    weight_mutate_power: f64,
    weight_mutate_rate: f64,
    weight_replace_rate: f64,

    activation_default: String,
    activation_options: String,
    activation_mutate_rate: f64,
    aggregation_default: String,
    aggregation_options: String,
    aggregation_mutate_rate: f64,

    #[serde(default = "true_string")]
    enabled_default: String,
    enabled_mutate_rate: f64,
    #[serde(default)]
    enabled_rate_to_true_add: f64,
    #[serde(default)]
    enabled_rate_to_false_add: f64,
}

#[derive(Debug, Deserialize)]
struct RawSpeciesSet {
    compatibility_threshold: f64,
}

#[derive(Debug, Deserialize)]
struct RawStagnation {
    #[serde(default = "mean_string")]
    species_fitness_func: String,
    #[serde(default = "default_max_stagnation")]
    max_stagnation: usize,
    #[serde(default)]
    species_elitism: usize,
}

#[derive(Debug, Deserialize)]
struct RawReproduction {
    #[serde(default)]
    elitism: usize,
    #[serde(default = "default_survival_threshold")]
    survival_threshold: f64,
    #[serde(default = "default_min_species_size")]
    min_species_size: usize,
}

fn parse_named<T: FromStr>(value: &str, key: &str) -> Result<T> {
    value.trim().to_lowercase().parse().map_err(|_| eyre!("unknown {key} '{value}'"))
}

/// `random` and `none` leave the choice to the options list.
fn parse_choice<T: FromStr + Copy>(
    default: &str,
    options: &str,
    mutate_rate: f64,
    key: &str,
) -> Result<ChoiceAttribute<T>> {
    let options = options.split_whitespace().map(|name| parse_named(name, key)).collect::<Result<Vec<T>>>()?;
    ensure!(!options.is_empty(), "{key}_options must name at least one function");
    let default = match default.trim().to_lowercase().as_str() {
        "random" | "none" | "" => None,
        name => Some(parse_named(name, key)?),
    };
    Ok(ChoiceAttribute { default, options, mutate_rate })
}

fn parse_bool_default(value: &str) -> Result<Option<bool>> {
    match value.trim().to_lowercase().as_str() {
        "1" | "on" | "yes" | "true" => Ok(Some(true)),
        "0" | "off" | "no" | "false" => Ok(Some(false)),
        "random" | "none" => Ok(None),
        other => bail!("unknown enabled_default '{other}'"),
    }
}

fn parse_surer(value: Option<&str>) -> Result<bool> {
    match value.map(|v| v.trim().to_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "1" | "on" | "yes" | "true" => Ok(true),
            "0" | "off" | "no" | "false" | "default" => Ok(false),
            other => bail!("unknown structural_mutation_surer '{other}'"),
        },
    }
}

impl TryFrom<RawConfig> for NeatConfig {
    type Error = color_eyre::Report;

    fn try_from(raw: RawConfig) -> Result<Self> {
        let g = raw.genome;
        ensure!(g.feed_forward, "only feed-forward networks are supported, set feed_forward = True");
        ensure!(g.num_inputs > 0, "num_inputs must be positive");
        ensure!(g.num_outputs > 0, "num_outputs must be positive");
        ensure!(raw.neat.pop_size > 0, "pop_size must be positive");
        ensure!(
            raw.reproduction.survival_threshold > 0.0 && raw.reproduction.survival_threshold <= 1.0,
            "survival_threshold {} outside (0, 1]",
            raw.reproduction.survival_threshold
        );

        let bias = FloatAttribute {
            init_mean: g.bias_init_mean,
            init_stdev: g.bias_init_stdev,
            init_type: parse_named(&g.bias_init_type, "bias_init_type")?,
            min_value: g.bias_min_value,
            max_value: g.bias_max_value,
            mutate_power: g.bias_mutate_power,
            mutate_rate: g.bias_mutate_rate,
            replace_rate: g.bias_replace_rate,
        };
        let response = FloatAttribute {
            init_mean: g.response_init_mean,
            init_stdev: g.response_init_stdev,
            init_type: parse_named(&g.response_init_type, "response_init_type")?,
            min_value: g.response_min_value,
            max_value: g.response_max_value,
            mutate_power: g.response_mutate_power,
            mutate_rate: g.response_mutate_rate,
            replace_rate: g.response_replace_rate,
        };
        let weight = FloatAttribute {
            init_mean: g.weight_init_mean,
            init_stdev: g.weight_init_stdev,
            init_type: parse_named(&g.weight_init_type, "weight_init_type")?,
            min_value: g.weight_min_value,
            max_value: g.weight_max_value,
            mutate_power: g.weight_mutate_power,
            mutate_rate: g.weight_mutate_rate,
            replace_rate: g.weight_replace_rate,
        };
        bias.validate("bias")?;
        response.validate("response")?;
        weight.validate("weight")?;

        let genome = GenomeConfig {
            num_inputs: g.num_inputs,
            num_outputs: g.num_outputs,
            num_hidden: g.num_hidden,
            feed_forward: g.feed_forward,
            initial_connection: g.initial_connection.parse()?,
            compatibility_disjoint_coefficient: g.compatibility_disjoint_coefficient,
            compatibility_weight_coefficient: g.compatibility_weight_coefficient,
            conn_add_prob: g.conn_add_prob,
            conn_delete_prob: g.conn_delete_prob,
            node_add_prob: g.node_add_prob,
            node_delete_prob: g.node_delete_prob,
            single_structural_mutation: g.single_structural_mutation,
            structural_mutation_surer: parse_surer(g.structural_mutation_surer.as_deref())?,
            bias,
            response,
            weight,
            activation: parse_choice(
                &g.activation_default,
                &g.activation_options,
                g.activation_mutate_rate,
                "activation",
            )?,
            aggregation: parse_choice(
                &g.aggregation_default,
                &g.aggregation_options,
                g.aggregation_mutate_rate,
                "aggregation",
            )?,
            enabled: BoolAttribute {
                default: parse_bool_default(&g.enabled_default)?,
                mutate_rate: g.enabled_mutate_rate,
                rate_to_true_add: g.enabled_rate_to_true_add,
                rate_to_false_add: g.enabled_rate_to_false_add,
            },
            input_keys: (1..=g.num_inputs as NodeKey).map(|i| -i).collect(),
            output_keys: (0..g.num_outputs as NodeKey).collect(),
        };

        Ok(NeatConfig {
            fitness_criterion: parse_named(&raw.neat.fitness_criterion, "fitness_criterion")?,
            fitness_threshold: raw.neat.fitness_threshold,
            pop_size: raw.neat.pop_size,
            reset_on_extinction: raw.neat.reset_on_extinction,
            no_fitness_termination: raw.neat.no_fitness_termination,
            genome,
            species_set: SpeciesSetConfig { compatibility_threshold: raw.species_set.compatibility_threshold },
            stagnation: StagnationConfig {
                species_fitness_func: parse_named(&raw.stagnation.species_fitness_func, "species_fitness_func")?,
                max_stagnation: raw.stagnation.max_stagnation,
                species_elitism: raw.stagnation.species_elitism,
            },
            reproduction: ReproductionConfig {
                elitism: raw.reproduction.elitism,
                survival_threshold: raw.reproduction.survival_threshold,
                min_species_size: raw.reproduction.min_species_size,
            },
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    /// The shipped parameter file, shared by the NEAT tests.
    pub(crate) const FLAPPY_INI: &str = include_str!("../../config.feedforward.txt");

    pub(crate) fn flappy_config() -> NeatConfig {
        NeatConfig::from_ini_str(FLAPPY_INI).unwrap()
    }

    #[test]
    fn test_parse_shipped_parameters() {
        let config = flappy_config();
        assert_eq!(config.fitness_criterion, Statistic::Max);
        assert_eq!(config.fitness_threshold, 100.0);
        assert_eq!(config.pop_size, 50);
        assert!(!config.reset_on_extinction);
        assert_eq!(config.genome.num_inputs, 3);
        assert_eq!(config.genome.input_keys, vec![-1, -2, -3]);
        assert_eq!(config.genome.output_keys, vec![0]);
        assert_eq!(config.genome.activation.default, Some(Activation::Tanh));
        assert_eq!(config.genome.activation.options, vec![Activation::Tanh]);
        assert_eq!(config.genome.aggregation.default, Some(Aggregation::Sum));
        assert_eq!(config.genome.initial_connection, InitialConnection::FullNoDirect);
        assert_eq!(config.genome.enabled.default, Some(true));
        assert_eq!(config.genome.weight.init_type, InitType::Gaussian);
        assert_eq!(config.species_set.compatibility_threshold, 3.0);
        assert_eq!(config.stagnation.max_stagnation, 20);
        assert_eq!(config.stagnation.species_elitism, 2);
        assert_eq!(config.reproduction.elitism, 2);
        assert_eq!(config.reproduction.survival_threshold, 0.2);
    }

    #[test]
    fn test_recurrent_networks_rejected() {
        let ini = FLAPPY_INI.replace("feed_forward            = True", "feed_forward            = False");
        assert_ne!(ini, FLAPPY_INI);
        let error = NeatConfig::from_ini_str(&ini).unwrap_err();
        assert!(error.to_string().contains("feed-forward"));
    }

    #[test]
    fn test_unknown_activation_rejected() {
        let ini = FLAPPY_INI.replace("activation_options      = tanh", "activation_options      = tanh swish");
        assert_ne!(ini, FLAPPY_INI);
        assert!(NeatConfig::from_ini_str(&ini).is_err());
    }

    #[test]
    fn test_initial_connection_variants() {
        assert_eq!("full_direct".parse::<InitialConnection>().unwrap(), InitialConnection::FullDirect);
        assert_eq!(
            "partial_nodirect 0.5".parse::<InitialConnection>().unwrap(),
            InitialConnection::PartialNoDirect(0.5)
        );
        assert!("partial_direct".parse::<InitialConnection>().is_err());
        assert!("partial_direct 1.5".parse::<InitialConnection>().is_err());
        assert!("sparse".parse::<InitialConnection>().is_err());
    }

    #[test]
    fn test_float_attribute_respects_bounds() {
        let attribute = FloatAttribute {
            init_mean: 0.0,
            init_stdev: 10.0,
            init_type: InitType::Gaussian,
            min_value: -1.0,
            max_value: 1.0,
            mutate_power: 5.0,
            mutate_rate: 1.0,
            replace_rate: 0.0,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..1000 {
            let value = attribute.init_value(&mut rng);
            assert!((-1.0..=1.0).contains(&value));
            let mutated = attribute.mutate_value(value, &mut rng);
            assert!((-1.0..=1.0).contains(&mutated));
        }
    }

    #[test]
    fn test_zero_rates_never_mutate() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let choice =
            ChoiceAttribute { default: None, options: vec![Activation::Tanh, Activation::Relu], mutate_rate: 0.0 };
        let flag =
            BoolAttribute { default: Some(true), mutate_rate: 0.0, rate_to_true_add: 0.0, rate_to_false_add: 0.0 };
        for _ in 0..100 {
            assert_eq!(choice.mutate_value(Activation::Sigmoid, &mut rng), Activation::Sigmoid);
            assert!(flag.mutate_value(true, &mut rng));
            assert!(choice.options.contains(&choice.init_value(&mut rng)));
        }
    }

    #[test]
    fn test_statistics() {
        let values = [1.0, 5.0, 3.0];
        assert_eq!(Statistic::Max.apply(&values), 5.0);
        assert_eq!(Statistic::Min.apply(&values), 1.0);
        assert_eq!(Statistic::Mean.apply(&values), 3.0);
        assert_eq!(Statistic::Median.apply(&values), 3.0);
        assert_eq!("median".parse::<Statistic>().unwrap(), Statistic::Median);
    }
}
