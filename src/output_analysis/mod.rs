//! The output analysis module provides simple statistical summaries of
//! simulation outputs.  Independent, identically-distributed samples are
//! summarized with `IndependentSample`; statistics accumulated during a run
//! are kept as a `RunningMean`.

use num_traits::Float;
use serde::{Deserialize, Serialize};

use crate::utils::errors::SimulationError;

fn sum<T: Float>(points: &[T]) -> T
where
    f64: Into<T>,
{
    points.iter().fold(0.0.into(), |sum, point| sum + *point)
}

/// This function calculates the sample mean from a set of points - a simple
/// arithmetic mean.
fn sample_mean<T: Float>(points: &[T]) -> Result<T, SimulationError>
where
    f64: Into<T>,
{
    Ok(sum(points) / usize_to_float(points.len())?)
}

/// This function calculates sample variance, given a set of points and the
/// sample mean.
fn sample_variance<T: Float>(points: &[T], mean: &T) -> Result<T, SimulationError>
where
    f64: Into<T>,
{
    Ok(points
        .iter()
        .fold(0.0.into(), |acc, point| acc + (*point - *mean).powi(2))
        / usize_to_float(points.len())?)
}

/// This function converts a usize to a Float, with an associated
/// `SimulationError` returned for failed conversions
fn usize_to_float<T: Float>(unconv: usize) -> Result<T, SimulationError> {
    T::from(unconv).ok_or(SimulationError::FloatConvError)
}

/// The independent sample is for independent, identically-distributed (IID)
/// samples, or where treating the data as an IID sample is determined to be
/// reasonable.  Typically this will be replication-level data, such as the
/// mean time in system from a set of seeded simulation runs.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct IndependentSample<T> {
    points: Vec<T>,
    mean: T,
    variance: T,
}

impl<T: Float> IndependentSample<T>
where
    f64: Into<T>,
{
    /// This constructor method creates an `IndependentSample` from a vector
    /// of floating point values.
    pub fn post(points: Vec<T>) -> Result<IndependentSample<T>, SimulationError> {
        if points.is_empty() {
            return Err(SimulationError::EmptySample);
        }
        let mean = sample_mean(&points)?;
        let variance = sample_variance(&points, &mean)?;
        Ok(IndependentSample {
            points,
            mean,
            variance,
        })
    }

    pub fn mean(&self) -> T {
        self.mean
    }

    pub fn variance(&self) -> T {
        self.variance
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// A running arithmetic mean, updated one observation at a time during
/// simulation execution.  The mean of zero observations is reported as 0.
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize)]
pub struct RunningMean {
    count: u64,
    total: f64,
}

impl RunningMean {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, point: f64) {
        self.count += 1;
        self.total += point;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn independent_sample_summarizes_points() {
        let sample = IndependentSample::post(vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(sample.mean(), 2.5);
        assert_eq!(sample.variance(), 1.25);
        assert_eq!(sample.len(), 4);
    }

    #[test]
    fn empty_samples_are_rejected() {
        let points: Vec<f64> = Vec::new();
        assert!(matches!(
            IndependentSample::post(points),
            Err(SimulationError::EmptySample)
        ));
    }

    #[test]
    fn running_mean_matches_the_batch_mean() {
        let mut running = RunningMean::new();
        for point in [2.0, 4.0, 9.0] {
            running.push(point);
        }
        assert_eq!(running.count(), 3);
        assert_eq!(running.mean(), 5.0);
    }

    #[test]
    fn running_mean_of_nothing_is_zero() {
        assert_eq!(RunningMean::new().mean(), 0.0);
    }
}
