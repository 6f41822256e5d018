//! The input modeling module provides a foundation for configurable model
//! behaviors.  The module includes the random variable distributions used by
//! the simulation models and a structure around random number generation.

pub mod random_variable;
pub mod rng;

pub use random_variable::Continuous as ContinuousRandomVariable;
pub use rng::{seeded, SimulationRng};
