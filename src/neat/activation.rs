use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Sigmoid,
    Tanh,
    Sin,
    Gauss,
    Relu,
    Elu,
    Lelu,
    Selu,
    Softplus,
    Identity,
    Clamped,
    Inv,
    Log,
    Exp,
    Abs,
    Hat,
    Square,
    Cube,
}

const SELU_LAMBDA: f64 = 1.050_700_987_355_480_5;
const SELU_ALPHA: f64 = 1.673_263_242_354_377_3;
const LELU_LEAK: f64 = 0.005;

impl Activation {
    /// Inputs to the squashing functions are scaled and clamped so `exp` never overflows.
    pub fn apply(self, z: f64) -> f64 {
        match self {
            Activation::Sigmoid => {
                let z = (5.0 * z).clamp(-60.0, 60.0);
                1.0 / (1.0 + (-z).exp())
            }
            Activation::Tanh => (2.5 * z).clamp(-60.0, 60.0).tanh(),
            Activation::Sin => (5.0 * z).clamp(-60.0, 60.0).sin(),
            Activation::Gauss => {
                let z = z.clamp(-3.4, 3.4);
                (-5.0 * z * z).exp()
            }
            Activation::Relu => z.max(0.0),
            Activation::Elu => {
                if z > 0.0 {
                    z
                } else {
                    z.exp() - 1.0
                }
            }
            Activation::Lelu => {
                if z > 0.0 {
                    z
                } else {
                    LELU_LEAK * z
                }
            }
            Activation::Selu => {
                if z > 0.0 {
                    SELU_LAMBDA * z
                } else {
                    SELU_LAMBDA * SELU_ALPHA * (z.exp() - 1.0)
                }
            }
            Activation::Softplus => {
                let z = (5.0 * z).clamp(-60.0, 60.0);
                0.2 * (1.0 + z.exp()).ln()
            }
            Activation::Identity => z,
            Activation::Clamped => z.clamp(-1.0, 1.0),
            Activation::Inv => {
                if z == 0.0 {
                    0.0
                } else {
                    1.0 / z
                }
            }
            Activation::Log => z.max(1e-7).ln(),
            Activation::Exp => z.clamp(-60.0, 60.0).exp(),
            Activation::Abs => z.abs(),
            Activation::Hat => (1.0 - z.abs()).max(0.0),
            Activation::Square => z * z,
            Activation::Cube => z * z * z,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    #[default]
    Sum,
    Product,
    Max,
    Min,
    Maxabs,
    Median,
    Mean,
}

impl Aggregation {
    /// Empty input aggregates to the identity of the operation, or 0.
    pub fn apply(self, values: &[f64]) -> f64 {
        if values.is_empty() {
            return match self {
                Aggregation::Product => 1.0,
                _ => 0.0,
            };
        }
        match self {
            Aggregation::Sum => values.iter().sum(),
            Aggregation::Product => values.iter().product(),
            Aggregation::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Aggregation::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Aggregation::Maxabs => {
                values.iter().copied().fold(0.0, |best, v| if v.abs() > best.abs() { v } else { best })
            }
            Aggregation::Median => median(values),
            Aggregation::Mean => mean(values),
        }
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Even-length input averages the two middle values.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    }
}

/// Population standard deviation.
pub fn stdev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use strum::IntoEnumIterator;

    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_squashing_functions_at_zero() {
        assert_eq!(Activation::Sigmoid.apply(0.0), 0.5);
        assert_eq!(Activation::Tanh.apply(0.0), 0.0);
        assert_eq!(Activation::Gauss.apply(0.0), 1.0);
        assert_eq!(Activation::Hat.apply(0.0), 1.0);
        assert!(close(Activation::Softplus.apply(0.0), 0.2 * 2f64.ln()));
    }

    #[test]
    fn test_scaling_matches_steepened_curves() {
        assert!(close(Activation::Tanh.apply(0.4), 1f64.tanh()));
        assert!(close(Activation::Sigmoid.apply(0.2), 1.0 / (1.0 + (-1f64).exp())));
        assert!(close(Activation::Gauss.apply(1.0), (-5f64).exp()));
    }

    #[test]
    fn test_extreme_inputs_stay_finite() {
        for activation in Activation::iter() {
            for z in [-1e308, -1e6, 1e6, 1e308] {
                let value = activation.apply(z);
                let unbounded = matches!(
                    activation,
                    Activation::Identity
                        | Activation::Relu
                        | Activation::Lelu
                        | Activation::Selu
                        | Activation::Abs
                        | Activation::Square
                        | Activation::Cube
                );
                assert!(value.is_finite() || unbounded, "{activation}({z}) = {value}");
            }
        }
        assert_eq!(Activation::Sigmoid.apply(1e6), 1.0 / (1.0 + (-60f64).exp()));
        assert_eq!(Activation::Clamped.apply(-3.0), -1.0);
        assert_eq!(Activation::Inv.apply(0.0), 0.0);
        assert_eq!(Activation::Log.apply(-1.0), 1e-7f64.ln());
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("tanh".parse::<Activation>().unwrap(), Activation::Tanh);
        assert_eq!("maxabs".parse::<Aggregation>().unwrap(), Aggregation::Maxabs);
        assert!("swish".parse::<Activation>().is_err());
        assert_eq!(Activation::Softplus.to_string(), "softplus");
    }

    #[test]
    fn test_aggregations() {
        let values = [1.0, -4.0, 2.5, 0.5];
        assert_eq!(Aggregation::Sum.apply(&values), 0.0);
        assert_eq!(Aggregation::Product.apply(&values), -5.0);
        assert_eq!(Aggregation::Max.apply(&values), 2.5);
        assert_eq!(Aggregation::Min.apply(&values), -4.0);
        assert_eq!(Aggregation::Maxabs.apply(&values), -4.0);
        assert_eq!(Aggregation::Median.apply(&values), 0.75);
        assert_eq!(Aggregation::Mean.apply(&values), 0.0);
        assert_eq!(Aggregation::Product.apply(&[]), 1.0);
        assert_eq!(Aggregation::Max.apply(&[]), 0.0);
    }

    #[test]
    fn test_population_stdev() {
        assert_eq!(stdev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]), 2.0);
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
    }
}
