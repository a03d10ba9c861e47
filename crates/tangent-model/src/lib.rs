//! Model context for the tangent solution-strategy engine.
//!
//! This crate carries everything the strategy engine consumes from the model
//! side: the [`Domain`] state container (load cases, committed/trial solution
//! state, current time, the attached-combination slot), and the
//! [`ModelBackend`] trait behind which element-level assembly is supplied by
//! the caller.

pub mod backend;
pub mod domain;
pub mod error;
pub mod loads;

pub use backend::{ModelBackend, MpConstraint, SparseTriplets, SpConstraint};
pub use domain::Domain;
pub use error::{ModelError, Result};
pub use loads::{ComboTerm, LoadCaseRegistry, LoadCombination, LoadPattern, NodalLoad};
