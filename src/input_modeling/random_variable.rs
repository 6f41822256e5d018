//! Random variables underpin the stochastic model behaviors.  The
//! distributions used by the simulation models are wrapped in the
//! `Continuous` enum; both are parameterized by their mean, so a model can
//! swap one for the other without rescaling its configuration.

use rand::Rng;
use rand_distr::{Distribution, Exp, Weibull};
use serde::{Deserialize, Serialize};

use crate::utils::errors::SimulationError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Continuous {
    Exp { mean: f64 },
    Weibull { shape: f64, mean: f64 },
}

impl Continuous {
    /// The generation of random variates drives stochastic behaviors during
    /// simulation execution.  This function requires the random number
    /// generator of the simulation, and produces a f64 random variate.
    pub fn random_variate<R: Rng>(&self, rng: &mut R) -> Result<f64, SimulationError> {
        match self {
            Continuous::Exp { mean } => Ok(Exp::new(1.0 / mean)?.sample(rng)),
            Continuous::Weibull { shape, mean } => {
                // scale chosen so that the distribution mean equals `mean`
                let scale = mean / libm::tgamma(1.0 + 1.0 / shape);
                Ok(Weibull::new(scale, *shape)?.sample(rng))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input_modeling::rng::seeded;

    fn empirical_mean(variable: Continuous, sample_size: usize) -> f64 {
        let mut rng = seeded(Some(271_828));
        (0..sample_size)
            .map(|_| variable.random_variate(&mut rng).unwrap())
            .sum::<f64>()
            / (sample_size as f64)
    }

    #[test]
    fn exponential_samples_match_expectation() {
        let mean = empirical_mean(Continuous::Exp { mean: 2.0 }, 100_000);
        assert!((mean - 2.0).abs() / 2.0 < 0.025);
    }

    #[test]
    fn weibull_samples_match_the_requested_mean() {
        let variable = Continuous::Weibull {
            shape: 1.5,
            mean: 3.0,
        };
        let mean = empirical_mean(variable, 100_000);
        assert!((mean - 3.0).abs() / 3.0 < 0.025);
    }

    #[test]
    fn heavy_tailed_weibull_still_matches_the_requested_mean() {
        let variable = Continuous::Weibull {
            shape: 0.5,
            mean: 1.0,
        };
        let mean = empirical_mean(variable, 400_000);
        assert!((mean - 1.0).abs() < 0.05);
    }

    #[test]
    fn unit_shape_weibull_reduces_to_the_exponential() {
        // shape 1 makes the scale equal the mean, i.e. Exp(1/mean)
        let variable = Continuous::Weibull {
            shape: 1.0,
            mean: 2.0,
        };
        let mean = empirical_mean(variable, 100_000);
        assert!((mean - 2.0).abs() / 2.0 < 0.025);
    }
}
