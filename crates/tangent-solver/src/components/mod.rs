//! Built numerical components of a solution graph.

pub mod algorithm;
pub mod integrator;
pub mod soe;
pub mod wrapper;

pub use algorithm::{AlgorithmBuilder, ConvergenceTest, IterationMetrics, SolutionAlgorithm};
pub use integrator::{Integrator, IntegratorBuilder};
pub use soe::{EigenPairs, EigenSystem, SystemOfEquations};
pub use wrapper::ModelWrapper;
