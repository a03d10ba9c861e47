//! Model wrapper: DOF numbering plus constraint handling.
//!
//! The wrapper is the frozen mapping between the model's global DOF space
//! and the equation space the system of equations is assembled in. It is
//! built once during `setup()` and is immutable afterwards; the linear
//! buckling composite shares a single wrapper between its two sub-graphs,
//! which is why the strategy graph stores it behind `Rc`.
//!
//! Handler semantics:
//! - `Plain` eliminates homogeneous single-point constraints; prescribed
//!   values and multi-point constraints are rejected at build time.
//! - `Transformation` eliminates constrained DOFs and folds multi-point
//!   slaves into their masters (`u = T q`), lifting prescribed values into
//!   the trial state at the start of each step.
//! - `Penalty` keeps all DOFs and adds `alpha` terms to the stiffness and
//!   residual.
//! - `Lagrange` appends one multiplier equation per constraint.

use nalgebra::{DMatrix, DVector};
use tangent_model::{Domain, ModelBackend, MpConstraint, SparseTriplets, SpConstraint};

use crate::config::{ConstraintHandlerKind, NumbererKind};
use crate::error::{Result, StrategyError};

#[derive(Debug)]
pub struct ModelWrapper {
    handler: ConstraintHandlerKind,
    num_dofs: usize,
    sp: Vec<SpConstraint>,
    mp: Vec<MpConstraint>,
    /// DOFs that carry an equation, in equation order (numberer applied).
    retained: Vec<usize>,
    /// Final equation index per DOF; `None` for eliminated DOFs.
    eq_of_dof: Vec<Option<usize>>,
    /// Total equation count including Lagrange multipliers.
    neq: usize,
    n_multipliers: usize,
}

impl ModelWrapper {
    pub fn new(
        numberer: NumbererKind,
        handler: ConstraintHandlerKind,
        domain: &Domain,
    ) -> Result<Self> {
        let backend = domain.backend();
        let num_dofs = backend.num_dofs();
        let sp = backend.single_point_constraints();
        let mp = backend.multi_point_constraints();

        for c in &sp {
            if c.dof >= num_dofs {
                return Err(StrategyError::setup(
                    "constraint handler",
                    format!("single-point constraint on DOF {} of {}", c.dof, num_dofs),
                ));
            }
        }

        if matches!(handler, ConstraintHandlerKind::Plain) {
            if let Some(c) = sp.iter().find(|c| c.value != 0.0) {
                return Err(StrategyError::configuration(
                    "constraint handler",
                    format!(
                        "plain handler cannot enforce prescribed value {} at DOF {}; use transformation",
                        c.value, c.dof
                    ),
                ));
            }
            if !mp.is_empty() {
                return Err(StrategyError::configuration(
                    "constraint handler",
                    "plain handler cannot enforce multi-point constraints",
                ));
            }
        }

        // DOFs that keep an equation under this handler.
        let eliminated: Vec<bool> = {
            let mut out = vec![false; num_dofs];
            if matches!(
                handler,
                ConstraintHandlerKind::Plain | ConstraintHandlerKind::Transformation
            ) {
                for c in &sp {
                    out[c.dof] = true;
                }
                for c in &mp {
                    out[c.slave] = true;
                }
            }
            out
        };
        let candidates: Vec<usize> = (0..num_dofs).filter(|d| !eliminated[*d]).collect();
        if candidates.is_empty() {
            return Err(StrategyError::setup(
                "model wrapper",
                "all DOFs are constrained; nothing to solve",
            ));
        }

        let retained = match numberer {
            NumbererKind::Plain => candidates,
            NumbererKind::ReverseCuthillMcKee => {
                rcm_order(&candidates, &backend.stiffness(&DVector::zeros(num_dofs)))
            }
        };

        let mut eq_of_dof = vec![None; num_dofs];
        for (eq, &dof) in retained.iter().enumerate() {
            eq_of_dof[dof] = Some(eq);
        }

        let n_multipliers = if matches!(handler, ConstraintHandlerKind::Lagrange) {
            sp.len() + mp.len()
        } else {
            0
        };
        let neq = retained.len() + n_multipliers;

        Ok(Self {
            handler,
            num_dofs,
            sp,
            mp,
            retained,
            eq_of_dof,
            neq,
            n_multipliers,
        })
    }

    pub fn neq(&self) -> usize {
        self.neq
    }

    pub fn num_dofs(&self) -> usize {
        self.num_dofs
    }

    pub fn handler(&self) -> ConstraintHandlerKind {
        self.handler
    }

    pub fn equation_of_dof(&self, dof: usize) -> Option<usize> {
        self.eq_of_dof.get(dof).copied().flatten()
    }

    /// The `u = T q` transform folding eliminated DOFs into retained ones.
    /// For `Penalty`/`Lagrange` this is a permutation of all DOFs.
    fn transform(&self) -> DMatrix<f64> {
        let n_ret = self.retained.len();
        let mut t = DMatrix::zeros(self.num_dofs, n_ret);
        for (eq, &dof) in self.retained.iter().enumerate() {
            t[(dof, eq)] = 1.0;
        }
        if matches!(self.handler, ConstraintHandlerKind::Transformation) {
            for c in &self.mp {
                for &(master, coef) in &c.masters {
                    if let Some(eq) = self.eq_of_dof[master] {
                        t[(c.slave, eq)] += coef;
                    }
                }
            }
        }
        t
    }

    /// Reduce the tangent stiffness into equation space, including the
    /// handler's constraint terms (penalty springs, multiplier rows).
    pub fn reduce_stiffness(&self, k: &SparseTriplets) -> DMatrix<f64> {
        let k_full = k.to_dense();
        match self.handler {
            ConstraintHandlerKind::Plain | ConstraintHandlerKind::Transformation => {
                let t = self.transform();
                t.transpose() * k_full * t
            }
            ConstraintHandlerKind::Penalty { alpha_sp, alpha_mp } => {
                let mut a = self.permute(&k_full);
                for c in &self.sp {
                    let eq = self.eq_of_dof[c.dof].expect("penalty retains all DOFs");
                    a[(eq, eq)] += alpha_sp;
                }
                for c in &self.mp {
                    let row = self.mp_row(c);
                    a += alpha_mp * &row * row.transpose();
                }
                a
            }
            ConstraintHandlerKind::Lagrange => {
                let mut a = DMatrix::zeros(self.neq, self.neq);
                a.view_mut((0, 0), (self.retained.len(), self.retained.len()))
                    .copy_from(&self.permute(&k_full));
                let base = self.retained.len();
                for (i, c) in self.sp.iter().enumerate() {
                    let eq = self.eq_of_dof[c.dof].expect("lagrange retains all DOFs");
                    a[(base + i, eq)] = 1.0;
                    a[(eq, base + i)] = 1.0;
                }
                for (i, c) in self.mp.iter().enumerate() {
                    let row = self.mp_row(c);
                    let m = base + self.sp.len() + i;
                    for eq in 0..self.retained.len() {
                        a[(m, eq)] = row[eq];
                        a[(eq, m)] = row[eq];
                    }
                }
                a
            }
        }
    }

    /// Reduce a mass/geometric/damping matrix: mapping only, no constraint
    /// terms, zero blocks on multiplier equations.
    pub fn reduce_plain(&self, m: &SparseTriplets) -> DMatrix<f64> {
        let m_full = m.to_dense();
        match self.handler {
            ConstraintHandlerKind::Plain | ConstraintHandlerKind::Transformation => {
                let t = self.transform();
                t.transpose() * m_full * t
            }
            ConstraintHandlerKind::Penalty { .. } => self.permute(&m_full),
            ConstraintHandlerKind::Lagrange => {
                let mut a = DMatrix::zeros(self.neq, self.neq);
                a.view_mut((0, 0), (self.retained.len(), self.retained.len()))
                    .copy_from(&self.permute(&m_full));
                a
            }
        }
    }

    /// Reduce an unbalanced-force vector into equation space.
    ///
    /// `u_trial` is needed by the penalty and Lagrange handlers, whose
    /// constraint equations are written against the current trial state.
    pub fn reduce_residual(&self, r: &DVector<f64>, u_trial: &DVector<f64>) -> DVector<f64> {
        match self.handler {
            ConstraintHandlerKind::Plain | ConstraintHandlerKind::Transformation => {
                self.transform().transpose() * r
            }
            ConstraintHandlerKind::Penalty { alpha_sp, alpha_mp } => {
                let mut b = DVector::zeros(self.neq);
                for (eq, &dof) in self.retained.iter().enumerate() {
                    b[eq] = r[dof];
                }
                for c in &self.sp {
                    let eq = self.eq_of_dof[c.dof].expect("penalty retains all DOFs");
                    b[eq] += alpha_sp * (c.value - u_trial[c.dof]);
                }
                for c in &self.mp {
                    let gap = self.mp_gap(c, u_trial);
                    let row = self.mp_row(c);
                    b -= alpha_mp * gap * row;
                }
                b
            }
            ConstraintHandlerKind::Lagrange => {
                let mut b = DVector::zeros(self.neq);
                for (eq, &dof) in self.retained.iter().enumerate() {
                    b[eq] = r[dof];
                }
                let base = self.retained.len();
                for (i, c) in self.sp.iter().enumerate() {
                    b[base + i] = c.value - u_trial[c.dof];
                }
                for (i, c) in self.mp.iter().enumerate() {
                    b[base + self.sp.len() + i] = -self.mp_gap(c, u_trial);
                }
                b
            }
        }
    }

    /// Reduce an applied-force vector: mapping only, no constraint-gap
    /// terms. Used for reference-load tangent solves.
    pub fn reduce_force(&self, f: &DVector<f64>) -> DVector<f64> {
        match self.handler {
            ConstraintHandlerKind::Plain | ConstraintHandlerKind::Transformation => {
                self.transform().transpose() * f
            }
            ConstraintHandlerKind::Penalty { .. } | ConstraintHandlerKind::Lagrange => {
                let mut b = DVector::zeros(self.neq);
                for (eq, &dof) in self.retained.iter().enumerate() {
                    b[eq] = f[dof];
                }
                b
            }
        }
    }

    /// Expand an equation-space increment back to global DOF space.
    /// Eliminated DOFs receive their constraint-implied increment (zero for
    /// prescribed supports); multiplier entries are dropped.
    pub fn expand_increment(&self, x: &DVector<f64>) -> DVector<f64> {
        match self.handler {
            ConstraintHandlerKind::Plain | ConstraintHandlerKind::Transformation => {
                self.transform() * x
            }
            ConstraintHandlerKind::Penalty { .. } | ConstraintHandlerKind::Lagrange => {
                let mut u = DVector::zeros(self.num_dofs);
                for (eq, &dof) in self.retained.iter().enumerate() {
                    u[dof] = x[eq];
                }
                u
            }
        }
    }

    /// Write prescribed support values (and the slave values they imply)
    /// into the domain's trial state. Called at the start of every step by
    /// handlers that eliminate constrained DOFs.
    pub fn apply_prescribed(&self, domain: &mut Domain) {
        if !matches!(self.handler, ConstraintHandlerKind::Transformation) {
            return;
        }
        let mut u = domain.trial_displacements().clone();
        for c in &self.sp {
            u[c.dof] = c.value;
        }
        for c in &self.mp {
            u[c.slave] = c.masters.iter().map(|&(m, coef)| coef * u[m]).sum();
        }
        domain.set_trial_displacements(u);
    }

    fn permute(&self, full: &DMatrix<f64>) -> DMatrix<f64> {
        let n = self.retained.len();
        let mut a = DMatrix::zeros(n, n);
        for (ei, &di) in self.retained.iter().enumerate() {
            for (ej, &dj) in self.retained.iter().enumerate() {
                a[(ei, ej)] = full[(di, dj)];
            }
        }
        a
    }

    /// Constraint row of a multi-point constraint in equation space:
    /// `u_slave - sum(coef * u_master) = 0`.
    fn mp_row(&self, c: &MpConstraint) -> DVector<f64> {
        let mut row = DVector::zeros(self.retained.len());
        if let Some(eq) = self.eq_of_dof[c.slave] {
            row[eq] = 1.0;
        }
        for &(master, coef) in &c.masters {
            if let Some(eq) = self.eq_of_dof[master] {
                row[eq] -= coef;
            }
        }
        row
    }

    fn mp_gap(&self, c: &MpConstraint, u: &DVector<f64>) -> f64 {
        u[c.slave]
            - c.masters
                .iter()
                .map(|&(m, coef)| coef * u[m])
                .sum::<f64>()
    }
}

/// Reverse Cuthill-McKee ordering of `candidates` over the sparsity pattern
/// of `k`, deduplicated through a CSR conversion. Breadth-first from the
/// lowest-degree unvisited vertex per component.
fn rcm_order(candidates: &[usize], k: &SparseTriplets) -> Vec<usize> {
    use nalgebra_sparse::{coo::CooMatrix, csr::CsrMatrix};
    use std::collections::BTreeSet;

    let index_of: std::collections::BTreeMap<usize, usize> = candidates
        .iter()
        .enumerate()
        .map(|(i, &d)| (d, i))
        .collect();

    let mut coo = CooMatrix::new(k.nrows, k.ncols);
    for i in 0..k.nnz() {
        if k.values[i] != 0.0 {
            coo.push(k.row_indices[i], k.col_indices[i], 1.0f64);
        }
    }
    let pattern = CsrMatrix::from(&coo);

    let mut adjacency: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); candidates.len()];
    for (r, c, _) in pattern.triplet_iter() {
        if r == c {
            continue;
        }
        if let (Some(&a), Some(&b)) = (index_of.get(&r), index_of.get(&c)) {
            adjacency[a].insert(b);
            adjacency[b].insert(a);
        }
    }

    let mut visited = vec![false; candidates.len()];
    let mut order = Vec::with_capacity(candidates.len());
    loop {
        let Some(start) = (0..candidates.len())
            .filter(|&i| !visited[i])
            .min_by_key(|&i| adjacency[i].len())
        else {
            break;
        };
        let mut queue = std::collections::VecDeque::from([start]);
        visited[start] = true;
        while let Some(v) = queue.pop_front() {
            order.push(v);
            let mut neighbors: Vec<usize> =
                adjacency[v].iter().copied().filter(|&n| !visited[n]).collect();
            neighbors.sort_by_key(|&n| adjacency[n].len());
            for n in neighbors {
                visited[n] = true;
                queue.push_back(n);
            }
        }
    }
    order.reverse();
    order.into_iter().map(|i| candidates[i]).collect()
}
