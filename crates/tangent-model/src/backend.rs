//! Numeric-kernel trait boundary between the model context and the
//! solution-strategy engine.
//!
//! Element-level assembly lives behind [`ModelBackend`]: the engine never
//! touches elements, sections or materials, it only consumes assembled COO
//! triplets and dense vectors. Callers (and the test suites) supply concrete
//! backends for their models.

use nalgebra::{DMatrix, DVector};

/// Sparse matrix in COO (coordinate/triplet) format.
///
/// Backend-agnostic interchange format between element assembly and the
/// system-of-equations layer. Duplicate entries accumulate.
#[derive(Debug, Clone)]
pub struct SparseTriplets {
    pub nrows: usize,
    pub ncols: usize,
    pub row_indices: Vec<usize>,
    pub col_indices: Vec<usize>,
    pub values: Vec<f64>,
}

impl SparseTriplets {
    /// An empty square matrix of dimension `n`.
    pub fn zeros(n: usize) -> Self {
        Self {
            nrows: n,
            ncols: n,
            row_indices: Vec::new(),
            col_indices: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Append one entry; duplicates accumulate on materialization.
    pub fn push(&mut self, row: usize, col: usize, value: f64) {
        debug_assert!(row < self.nrows && col < self.ncols);
        self.row_indices.push(row);
        self.col_indices.push(col);
        self.values.push(value);
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Materialize as a dense matrix, accumulating duplicates.
    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut m = DMatrix::zeros(self.nrows, self.ncols);
        for i in 0..self.nnz() {
            m[(self.row_indices[i], self.col_indices[i])] += self.values[i];
        }
        m
    }
}

/// A single-point constraint: one global DOF held at a prescribed value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpConstraint {
    pub dof: usize,
    pub value: f64,
}

impl SpConstraint {
    pub fn fixed(dof: usize) -> Self {
        Self { dof, value: 0.0 }
    }
}

/// A multi-point constraint tying a slave DOF to a weighted sum of masters:
/// `u_slave = sum(coef_i * u_master_i)`.
#[derive(Debug, Clone, PartialEq)]
pub struct MpConstraint {
    pub slave: usize,
    pub masters: Vec<(usize, f64)>,
}

/// Assembled-quantity supplier for a finite-element model.
///
/// All matrices are in global DOF space (`num_dofs` = `num_nodes` *
/// `dofs_per_node`); constraint handling and equation numbering are the
/// engine's concern, not the backend's.
pub trait ModelBackend {
    /// Number of nodes in the model.
    fn num_nodes(&self) -> usize;

    /// Degrees of freedom carried by every node.
    fn dofs_per_node(&self) -> usize;

    /// Total number of global DOFs.
    fn num_dofs(&self) -> usize {
        self.num_nodes() * self.dofs_per_node()
    }

    /// Tangent stiffness at displacement state `u`.
    fn stiffness(&self, u: &DVector<f64>) -> SparseTriplets;

    /// Internal resisting forces at displacement state `u`.
    fn internal_forces(&self, u: &DVector<f64>) -> DVector<f64>;

    /// Mass matrix. Empty for statics-only models.
    fn mass(&self) -> SparseTriplets {
        SparseTriplets::zeros(self.num_dofs())
    }

    /// Geometric stiffness at displacement state `u`. Empty unless the
    /// model supports buckling extraction.
    fn geometric_stiffness(&self, _u: &DVector<f64>) -> SparseTriplets {
        SparseTriplets::zeros(self.num_dofs())
    }

    /// Single-point constraints (supports).
    fn single_point_constraints(&self) -> Vec<SpConstraint> {
        Vec::new()
    }

    /// Multi-point constraints (slave/master couplings).
    fn multi_point_constraints(&self) -> Vec<MpConstraint> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triplets_accumulate_duplicates() {
        let mut t = SparseTriplets::zeros(2);
        t.push(0, 0, 1.5);
        t.push(0, 0, 0.5);
        t.push(1, 0, -1.0);
        let m = t.to_dense();
        assert_eq!(m[(0, 0)], 2.0);
        assert_eq!(m[(1, 0)], -1.0);
        assert_eq!(m[(1, 1)], 0.0);
    }
}
