//! Mock model backends shared by the integration suites.
#![allow(dead_code)]

use nalgebra::DVector;
use tangent_model::{Domain, LoadPattern, ModelBackend, SparseTriplets, SpConstraint};

/// Chain of linear springs between consecutive nodes, first node fixed.
/// One DOF per node.
pub struct SpringChain {
    pub num_nodes: usize,
    pub k: f64,
}

impl ModelBackend for SpringChain {
    fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    fn dofs_per_node(&self) -> usize {
        1
    }

    fn stiffness(&self, _u: &DVector<f64>) -> SparseTriplets {
        let mut t = SparseTriplets::zeros(self.num_nodes);
        for i in 0..self.num_nodes - 1 {
            t.push(i, i, self.k);
            t.push(i + 1, i + 1, self.k);
            t.push(i, i + 1, -self.k);
            t.push(i + 1, i, -self.k);
        }
        t
    }

    fn internal_forces(&self, u: &DVector<f64>) -> DVector<f64> {
        self.stiffness(u).to_dense() * u
    }

    fn mass(&self) -> SparseTriplets {
        let mut t = SparseTriplets::zeros(self.num_nodes);
        for i in 0..self.num_nodes {
            t.push(i, i, 1.0);
        }
        t
    }

    fn single_point_constraints(&self) -> Vec<SpConstraint> {
        vec![SpConstraint::fixed(0)]
    }
}

/// Uncoupled cubic-stiffening springs: `f_i = k*u_i + k3*u_i^3` per free
/// DOF. Newton needs a handful of iterations, so the iterative algorithms
/// are actually exercised.
pub struct StiffeningSprings {
    pub num_nodes: usize,
    pub k: f64,
    pub k3: f64,
}

impl ModelBackend for StiffeningSprings {
    fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    fn dofs_per_node(&self) -> usize {
        1
    }

    fn stiffness(&self, u: &DVector<f64>) -> SparseTriplets {
        let mut t = SparseTriplets::zeros(self.num_nodes);
        for i in 0..self.num_nodes {
            t.push(i, i, self.k + 3.0 * self.k3 * u[i] * u[i]);
        }
        t
    }

    fn internal_forces(&self, u: &DVector<f64>) -> DVector<f64> {
        DVector::from_fn(self.num_nodes, |i, _| {
            self.k * u[i] + self.k3 * u[i].powi(3)
        })
    }

    fn single_point_constraints(&self) -> Vec<SpConstraint> {
        vec![SpConstraint::fixed(0)]
    }
}

/// Perfectly plastic springs: the resisting force plateaus at `k * cap`,
/// so any combination loading a DOF past capacity has no equilibrium and
/// the solve cannot converge.
pub struct CappedSprings {
    pub num_nodes: usize,
    pub k: f64,
    pub cap: f64,
}

impl ModelBackend for CappedSprings {
    fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    fn dofs_per_node(&self) -> usize {
        1
    }

    fn stiffness(&self, u: &DVector<f64>) -> SparseTriplets {
        let mut t = SparseTriplets::zeros(self.num_nodes);
        for i in 0..self.num_nodes {
            let kt = if u[i].abs() < self.cap {
                self.k
            } else {
                self.k * 1e-6
            };
            t.push(i, i, kt);
        }
        t
    }

    fn internal_forces(&self, u: &DVector<f64>) -> DVector<f64> {
        DVector::from_fn(self.num_nodes, |i, _| {
            (self.k * u[i]).clamp(-self.k * self.cap, self.k * self.cap)
        })
    }

    fn single_point_constraints(&self) -> Vec<SpConstraint> {
        vec![SpConstraint::fixed(0)]
    }
}

/// Compression column reduced to uncoupled modes: elastic stiffness
/// `k0 * (i+1)` and unit-load geometric stiffness `-g` per free DOF, so
/// the critical load factors are `k0*(i+1)/g`, distinct and ascending.
pub struct CompressionColumn {
    pub num_nodes: usize,
    pub k0: f64,
    pub g: f64,
}

impl ModelBackend for CompressionColumn {
    fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    fn dofs_per_node(&self) -> usize {
        1
    }

    fn stiffness(&self, _u: &DVector<f64>) -> SparseTriplets {
        let mut t = SparseTriplets::zeros(self.num_nodes);
        for i in 0..self.num_nodes {
            t.push(i, i, self.k0 * (i + 1) as f64);
        }
        t
    }

    fn internal_forces(&self, u: &DVector<f64>) -> DVector<f64> {
        self.stiffness(u).to_dense() * u
    }

    fn mass(&self) -> SparseTriplets {
        let mut t = SparseTriplets::zeros(self.num_nodes);
        for i in 0..self.num_nodes {
            t.push(i, i, 2.0);
        }
        t
    }

    fn geometric_stiffness(&self, _u: &DVector<f64>) -> SparseTriplets {
        let mut t = SparseTriplets::zeros(self.num_nodes);
        for i in 0..self.num_nodes {
            t.push(i, i, -self.g);
        }
        t
    }

    fn single_point_constraints(&self) -> Vec<SpConstraint> {
        vec![SpConstraint::fixed(0)]
    }
}

/// Domain over a spring chain with one gravity-style pattern "G1" and a
/// combination of the same name pre-defined.
pub fn spring_chain_domain(num_nodes: usize, load: f64) -> Domain {
    let mut domain = Domain::new(Box::new(SpringChain { num_nodes, k: 100.0 }));
    let mut pattern = LoadPattern::new("G1");
    pattern.add_nodal_load(num_nodes - 1, 0, load);
    domain.cases_mut().define_pattern(pattern);
    domain.cases_mut().define_combination("G1", "G1").unwrap();
    domain
}
