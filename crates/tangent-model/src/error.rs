//! Error types for tangent-model

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ModelError>;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("unknown load pattern: {0}")]
    UnknownPattern(String),

    #[error("unknown load combination: {0}")]
    UnknownCombination(String),

    #[error("load combination already defined: {0}")]
    DuplicateCombination(String),

    #[error("combination '{attached}' is already attached; detach it before attaching '{requested}'")]
    CombinationAttached { attached: String, requested: String },

    #[error("invalid combination expression '{expr}': {detail}")]
    InvalidExpression { expr: String, detail: String },

    #[error("node {node} does not exist in the model")]
    InvalidNode { node: usize },

    #[error("local DOF {dof} out of range for a model with {dofs_per_node} DOFs per node")]
    InvalidDof { dof: usize, dofs_per_node: usize },
}
