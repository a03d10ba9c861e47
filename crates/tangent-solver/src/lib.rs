//! Solution-strategy composition and load-combination batch execution.
//!
//! This crate turns a [`SolutionStrategyConfig`] — constraint handling,
//! DOF numbering, solution algorithm, convergence test, integrator, system
//! of equations and solver, analysis family — into a built object graph,
//! and drives it once per named load combination with strict isolation
//! between combinations: reset, attach, solve, always detach.
//!
//! Entry points: [`SolutionStrategy`] for a single strategy,
//! [`CombinationRunner`] for batches, [`LinearBucklingAnalysis`] for the
//! coupled static/eigen buckling composite, and [`presets`] for the
//! catalog of named configurations.

pub mod analysis;
pub mod buckling;
pub mod components;
pub mod config;
pub mod error;
pub mod presets;
pub mod registry;
pub mod runner;
pub mod strategy;

pub use analysis::{Analysis, AnalysisOutcome, SoeHandle};
pub use buckling::{BucklingResults, BucklingState, LinearBucklingAnalysis};
pub use components::{
    AlgorithmBuilder, ConvergenceTest, EigenPairs, EigenSystem, Integrator, IntegratorBuilder,
    ModelWrapper, SolutionAlgorithm, SystemOfEquations,
};
pub use config::{
    AlgorithmKind, AnalysisFamily, ConstraintHandlerKind, ConvergenceTestKind,
    ConvergenceTestSpec, IntegratorKind, LineSearchMethod, NumbererKind, SoeKind,
    SolutionStrategyConfig, SolverKind,
};
pub use error::{Result, SolveStatus, StrategyError};
pub use registry::ComponentRegistry;
pub use runner::{BatchReport, CombinationResult, CombinationRunner};
pub use strategy::{SolutionGraph, SolutionStrategy, SolveOptions};
