//! System of equations and its paired solver.
//!
//! The linear system holds one assembled matrix and right-hand side in
//! equation space; the eigen system holds a matrix pair. All storage kinds
//! factor through a dense core: band and sparse assemblies are materialized
//! dense at factor time, which is adequate up to ~10,000 equations. The
//! generalized eigen solve is a Cholesky transform to a standard symmetric
//! problem, factoring whichever side of the pair is positive definite.

use nalgebra::linalg::Cholesky;
use nalgebra::{DMatrix, DVector};
use nalgebra_lapack::SymmetricEigen;

use crate::config::{SoeKind, SolverKind};
use crate::error::SolveStatus;

/// Linear system `A x = b` in equation space.
#[derive(Debug)]
pub struct SystemOfEquations {
    kind: SoeKind,
    solver: SolverKind,
    neq: usize,
    a: DMatrix<f64>,
    b: DVector<f64>,
    x: DVector<f64>,
}

impl SystemOfEquations {
    pub fn new(kind: SoeKind, solver: SolverKind, neq: usize) -> Self {
        Self {
            kind,
            solver,
            neq,
            a: DMatrix::zeros(neq, neq),
            b: DVector::zeros(neq),
            x: DVector::zeros(neq),
        }
    }

    pub fn neq(&self) -> usize {
        self.neq
    }

    pub fn set_matrix(&mut self, a: DMatrix<f64>) {
        debug_assert_eq!(a.nrows(), self.neq);
        self.a = a;
    }

    pub fn set_rhs(&mut self, b: DVector<f64>) {
        debug_assert_eq!(b.len(), self.neq);
        self.b = b;
    }

    pub fn rhs(&self) -> &DVector<f64> {
        &self.b
    }

    pub fn rhs_norm(&self) -> f64 {
        self.b.norm()
    }

    /// Factor and solve for the current right-hand side.
    pub fn solve(&mut self) -> std::result::Result<(), SolveStatus> {
        log::debug!(
            "factoring {} system ({} equations, {} storage)",
            self.solver.name(),
            self.neq,
            self.kind.name()
        );
        if matches!(self.kind, SoeKind::BandGeneral) {
            log::debug!("semi-bandwidth {}", self.bandwidth());
        }
        let x = self
            .a
            .clone()
            .lu()
            .solve(&self.b)
            .ok_or(SolveStatus::SingularSystem)?;
        self.x = x;
        Ok(())
    }

    pub fn solution(&self) -> &DVector<f64> {
        &self.x
    }

    /// Semi-bandwidth of the assembled matrix; logged by band storage.
    pub fn bandwidth(&self) -> usize {
        let mut bw = 0;
        for i in 0..self.neq {
            for j in 0..self.neq {
                if self.a[(i, j)] != 0.0 {
                    bw = bw.max(i.abs_diff(j));
                }
            }
        }
        bw
    }
}

/// Eigenvalues and eigenvectors from an extraction, sorted ascending.
/// Eigenvectors are columns, already expanded to full DOF space by the
/// analysis that ran the extraction.
#[derive(Debug, Clone)]
pub struct EigenPairs {
    pub eigenvalues: Vec<f64>,
    pub eigenvectors: DMatrix<f64>,
}

impl EigenPairs {
    pub fn num_modes(&self) -> usize {
        self.eigenvalues.len()
    }

    pub fn mode_shape(&self, mode: usize) -> Option<DVector<f64>> {
        if mode >= self.num_modes() {
            return None;
        }
        Some(self.eigenvectors.column(mode).into())
    }
}

/// Generalized eigen system `A phi = lambda B phi`.
#[derive(Debug)]
pub struct EigenSystem {
    kind: SoeKind,
    neq: usize,
    a: DMatrix<f64>,
    b: DMatrix<f64>,
}

impl EigenSystem {
    pub fn new(kind: SoeKind, neq: usize) -> Self {
        Self {
            kind,
            neq,
            a: DMatrix::zeros(neq, neq),
            b: DMatrix::zeros(neq, neq),
        }
    }

    pub fn neq(&self) -> usize {
        self.neq
    }

    pub fn set_pair(&mut self, a: DMatrix<f64>, b: DMatrix<f64>) {
        debug_assert_eq!(a.nrows(), self.neq);
        debug_assert_eq!(b.nrows(), self.neq);
        self.a = a;
        self.b = b;
    }

    /// Extract up to `num_modes` eigenpairs, smallest eigenvalues first.
    ///
    /// Tries `B = L L^T` and solves the standard problem on
    /// `L^-1 A L^-T`; when `B` is not positive definite (a geometric
    /// stiffness usually is not), the pair is inverted and `A` is factored
    /// instead, with eigenvalues mapped back as `lambda = 1/mu`.
    pub fn solve(&mut self, num_modes: usize) -> std::result::Result<EigenPairs, SolveStatus> {
        log::debug!(
            "eigen extraction: {} modes from {} pair ({} equations)",
            num_modes,
            self.kind.name(),
            self.neq
        );
        if let Some(chol) = Cholesky::new(self.b.clone()) {
            return standard_from_factor(&chol, &self.a, num_modes, false);
        }
        let chol_a = Cholesky::new(self.a.clone()).ok_or(SolveStatus::SingularSystem)?;
        standard_from_factor(&chol_a, &self.b, num_modes, true)
    }
}

/// Solve `L^-1 C L^-T psi = mu psi` and map back `phi = L^-T psi`.
/// With `inverted` set, the caller factored the A side and the returned
/// eigenvalues are `1/mu` of the largest positive `mu`.
fn standard_from_factor(
    factor: &Cholesky<f64, nalgebra::Dyn>,
    c: &DMatrix<f64>,
    num_modes: usize,
    inverted: bool,
) -> std::result::Result<EigenPairs, SolveStatus> {
    let l = factor.l();
    let l_inv = l.clone().try_inverse().ok_or(SolveStatus::SingularSystem)?;

    let c_star = &l_inv * c * l_inv.transpose();
    let eigen = SymmetricEigen::new(c_star);
    let l_inv_t = l_inv.transpose();

    let n = c.nrows();
    let mut pairs: Vec<(f64, DVector<f64>)> = Vec::new();
    for i in 0..n {
        let mu = eigen.eigenvalues[i];
        if mu <= 1e-12 {
            continue;
        }
        let psi: DVector<f64> = eigen.eigenvectors.column(i).into_owned();
        let phi = &l_inv_t * psi;
        let lambda = if inverted { 1.0 / mu } else { mu };
        pairs.push((lambda, phi));
    }

    if pairs.is_empty() {
        return Err(SolveStatus::SingularSystem);
    }

    pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    pairs.truncate(num_modes);

    let mut eigenvectors = DMatrix::zeros(n, pairs.len());
    for (mode, (_, phi)) in pairs.iter().enumerate() {
        eigenvectors.set_column(mode, phi);
    }
    Ok(EigenPairs {
        eigenvalues: pairs.into_iter().map(|(l, _)| l).collect(),
        eigenvectors,
    })
}
