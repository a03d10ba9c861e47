//! The model context: mutable analysis state around a numeric backend.
//!
//! The domain owns the load-case container, the committed/trial solution
//! state and the single "currently attached combination" slot. The solution
//! engine mutates it strictly through this interface, so every test on
//! isolation between combinations can be phrased against [`Domain`] alone.
//!
//! State discipline: iterative solvers work on the *trial* state; a step is
//! made permanent with [`commit`](Domain::commit), abandoned with
//! [`revert_to_last_commit`](Domain::revert_to_last_commit), and the whole
//! model returns to its initial committed state with
//! [`revert_to_start`](Domain::revert_to_start).

use nalgebra::DVector;

use crate::backend::ModelBackend;
use crate::error::{ModelError, Result};
use crate::loads::LoadCaseRegistry;

pub struct Domain {
    backend: Box<dyn ModelBackend>,
    cases: LoadCaseRegistry,

    committed_u: DVector<f64>,
    committed_v: DVector<f64>,
    committed_a: DVector<f64>,
    committed_time: f64,

    trial_u: DVector<f64>,
    trial_v: DVector<f64>,
    trial_a: DVector<f64>,
    trial_time: f64,

    /// Load factor the current committed state was equilibrated at.
    applied_load_factor: f64,

    attached: Option<String>,
    reactions: Option<DVector<f64>>,
}

impl Domain {
    pub fn new(backend: Box<dyn ModelBackend>) -> Self {
        let n = backend.num_dofs();
        Self {
            backend,
            cases: LoadCaseRegistry::new(),
            committed_u: DVector::zeros(n),
            committed_v: DVector::zeros(n),
            committed_a: DVector::zeros(n),
            committed_time: 0.0,
            trial_u: DVector::zeros(n),
            trial_v: DVector::zeros(n),
            trial_a: DVector::zeros(n),
            trial_time: 0.0,
            applied_load_factor: 0.0,
            attached: None,
            reactions: None,
        }
    }

    pub fn backend(&self) -> &dyn ModelBackend {
        self.backend.as_ref()
    }

    pub fn num_dofs(&self) -> usize {
        self.backend.num_dofs()
    }

    /// Resolve (node, local dof) to a global DOF index, validating both.
    pub fn node_dof(&self, node: usize, dof: usize) -> Result<usize> {
        if node >= self.backend.num_nodes() {
            return Err(ModelError::InvalidNode { node });
        }
        let ndf = self.backend.dofs_per_node();
        if dof >= ndf {
            return Err(ModelError::InvalidDof {
                dof,
                dofs_per_node: ndf,
            });
        }
        Ok(node * ndf + dof)
    }

    pub fn cases(&self) -> &LoadCaseRegistry {
        &self.cases
    }

    pub fn cases_mut(&mut self) -> &mut LoadCaseRegistry {
        &mut self.cases
    }

    // --- combination slot -------------------------------------------------

    /// Attach a defined combination. At most one combination may be attached
    /// at a time; the engine's add-then-always-remove discipline relies on
    /// this being the only way loads enter the domain.
    pub fn attach_combination(&mut self, name: &str) -> Result<()> {
        if let Some(attached) = &self.attached {
            return Err(ModelError::CombinationAttached {
                attached: attached.clone(),
                requested: name.to_string(),
            });
        }
        let combo = self
            .cases
            .get_combination(name)
            .ok_or_else(|| ModelError::UnknownCombination(name.to_string()))?;
        // Validate every referenced nodal load up front so the reference
        // load vector is infallible afterwards.
        for term in combo.terms.clone() {
            let pattern = self
                .cases
                .get_pattern(&term.pattern)
                .ok_or_else(|| ModelError::UnknownPattern(term.pattern.clone()))?
                .clone();
            for load in &pattern.loads {
                self.node_dof(load.node, load.dof)?;
            }
        }
        self.attached = Some(name.to_string());
        Ok(())
    }

    /// Detach a combination. Detaching a name that is not attached is a
    /// no-op (logged), so release paths can run unconditionally.
    pub fn detach_combination(&mut self, name: &str) {
        if self.attached.as_deref() == Some(name) {
            self.attached = None;
        } else if let Some(attached) = self.attached.as_deref() {
            log::warn!("detach of '{name}' ignored; attached combination is '{attached}'");
        } else {
            log::debug!("detach of '{name}' ignored; no combination attached");
        }
    }

    pub fn attached_combination(&self) -> Option<&str> {
        self.attached.as_deref()
    }

    /// Reference load vector of the attached combination (zeros when no
    /// combination is attached). Node/DOF references were validated at
    /// attach time.
    pub fn reference_load_vector(&self) -> DVector<f64> {
        let mut f = DVector::zeros(self.num_dofs());
        let Some(name) = &self.attached else {
            return f;
        };
        let Some(combo) = self.cases.get_combination(name) else {
            return f;
        };
        let ndf = self.backend.dofs_per_node();
        for term in &combo.terms {
            if let Some(pattern) = self.cases.get_pattern(&term.pattern) {
                for load in &pattern.loads {
                    f[load.node * ndf + load.dof] += term.factor * load.value;
                }
            }
        }
        f
    }

    // --- solution state ---------------------------------------------------

    pub fn committed_displacements(&self) -> &DVector<f64> {
        &self.committed_u
    }

    pub fn trial_displacements(&self) -> &DVector<f64> {
        &self.trial_u
    }

    pub fn set_trial_displacements(&mut self, u: DVector<f64>) {
        self.trial_u = u;
    }

    pub fn incr_trial_displacements(&mut self, du: &DVector<f64>) {
        self.trial_u += du;
    }

    pub fn committed_velocities(&self) -> &DVector<f64> {
        &self.committed_v
    }

    pub fn committed_accelerations(&self) -> &DVector<f64> {
        &self.committed_a
    }

    pub fn trial_velocities(&self) -> &DVector<f64> {
        &self.trial_v
    }

    pub fn trial_accelerations(&self) -> &DVector<f64> {
        &self.trial_a
    }

    pub fn set_trial_velocities(&mut self, v: DVector<f64>) {
        self.trial_v = v;
    }

    pub fn set_trial_accelerations(&mut self, a: DVector<f64>) {
        self.trial_a = a;
    }

    pub fn current_time(&self) -> f64 {
        self.trial_time
    }

    pub fn set_current_time(&mut self, t: f64) {
        self.trial_time = t;
    }

    pub fn applied_load_factor(&self) -> f64 {
        self.applied_load_factor
    }

    pub fn set_applied_load_factor(&mut self, lambda: f64) {
        self.applied_load_factor = lambda;
    }

    /// Make the trial state permanent.
    pub fn commit(&mut self) {
        self.committed_u.copy_from(&self.trial_u);
        self.committed_v.copy_from(&self.trial_v);
        self.committed_a.copy_from(&self.trial_a);
        self.committed_time = self.trial_time;
    }

    /// Discard the trial state, returning to the last committed one.
    pub fn revert_to_last_commit(&mut self) {
        self.trial_u.copy_from(&self.committed_u);
        self.trial_v.copy_from(&self.committed_v);
        self.trial_a.copy_from(&self.committed_a);
        self.trial_time = self.committed_time;
    }

    /// Revert the model to its initial committed state: zero solution state,
    /// zero time, no attached combination, no reactions.
    pub fn revert_to_start(&mut self) {
        self.committed_u.fill(0.0);
        self.committed_v.fill(0.0);
        self.committed_a.fill(0.0);
        self.committed_time = 0.0;
        self.trial_u.fill(0.0);
        self.trial_v.fill(0.0);
        self.trial_a.fill(0.0);
        self.trial_time = 0.0;
        self.applied_load_factor = 0.0;
        self.attached = None;
        self.reactions = None;
    }

    // --- reactions --------------------------------------------------------

    /// Compute nodal reactions at the committed state.
    ///
    /// Reactions are the residual `f_int(u) - lambda * F_ref` (plus `M * a`
    /// when `include_inertia` is set) evaluated at constrained DOFs; free
    /// DOFs should carry residuals below `tol` if the solve equilibrated,
    /// and a violation is logged rather than treated as an error.
    pub fn compute_nodal_reactions(&mut self, include_inertia: bool, tol: f64) {
        let mut r = self.backend.internal_forces(&self.committed_u)
            - self.reference_load_vector() * self.applied_load_factor;
        if include_inertia {
            r += self.backend.mass().to_dense() * &self.committed_a;
        }

        let constrained: Vec<usize> = self
            .backend
            .single_point_constraints()
            .iter()
            .map(|c| c.dof)
            .collect();
        let mut reactions = DVector::zeros(self.num_dofs());
        for (i, value) in r.iter().enumerate() {
            if constrained.contains(&i) {
                reactions[i] = *value;
            } else if value.abs() > tol {
                log::warn!("residual {value:.3e} at free DOF {i} exceeds reaction tolerance {tol:.1e}");
            }
        }
        self.reactions = Some(reactions);
    }

    pub fn reactions(&self) -> Option<&DVector<f64>> {
        self.reactions.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{SparseTriplets, SpConstraint};
    use crate::loads::LoadPattern;

    /// Two uncoupled unit springs on a 2-node, 1-DOF-per-node model;
    /// node 0 is fixed.
    struct TwoSprings;

    impl ModelBackend for TwoSprings {
        fn num_nodes(&self) -> usize {
            2
        }

        fn dofs_per_node(&self) -> usize {
            1
        }

        fn stiffness(&self, _u: &DVector<f64>) -> SparseTriplets {
            let mut k = SparseTriplets::zeros(2);
            k.push(0, 0, 10.0);
            k.push(1, 1, 10.0);
            k
        }

        fn internal_forces(&self, u: &DVector<f64>) -> DVector<f64> {
            self.stiffness(u).to_dense() * u
        }

        fn single_point_constraints(&self) -> Vec<SpConstraint> {
            vec![SpConstraint::fixed(0)]
        }
    }

    fn domain_with_combo() -> Domain {
        let mut domain = Domain::new(Box::new(TwoSprings));
        domain
            .cases_mut()
            .define_pattern(LoadPattern::new("G1").with_load(1, 0, 5.0));
        domain.cases_mut().define_combination("C1", "2*G1").unwrap();
        domain
    }

    #[test]
    fn attach_detach_round_trip() {
        let mut domain = domain_with_combo();
        domain.attach_combination("C1").unwrap();
        assert_eq!(domain.attached_combination(), Some("C1"));
        domain.detach_combination("C1");
        assert_eq!(domain.attached_combination(), None);
    }

    #[test]
    fn second_attach_is_rejected() {
        let mut domain = domain_with_combo();
        domain.cases_mut().define_combination("C2", "G1").unwrap();
        domain.attach_combination("C1").unwrap();
        let err = domain.attach_combination("C2").unwrap_err();
        assert!(matches!(err, ModelError::CombinationAttached { .. }));
    }

    #[test]
    fn attach_validates_load_targets() {
        let mut domain = domain_with_combo();
        domain
            .cases_mut()
            .define_pattern(LoadPattern::new("BAD").with_load(7, 0, 1.0));
        domain.cases_mut().define_combination("CB", "BAD").unwrap();
        assert!(matches!(
            domain.attach_combination("CB"),
            Err(ModelError::InvalidNode { node: 7 })
        ));
        assert_eq!(domain.attached_combination(), None);
    }

    #[test]
    fn reference_load_applies_combination_factors() {
        let mut domain = domain_with_combo();
        domain.attach_combination("C1").unwrap();
        let f = domain.reference_load_vector();
        assert_eq!(f[1], 10.0);
        assert_eq!(f[0], 0.0);
    }

    #[test]
    fn revert_to_start_clears_everything() {
        let mut domain = domain_with_combo();
        domain.attach_combination("C1").unwrap();
        domain.set_trial_displacements(DVector::from_vec(vec![0.0, 1.0]));
        domain.set_current_time(3.0);
        domain.commit();
        domain.revert_to_start();
        assert_eq!(domain.attached_combination(), None);
        assert_eq!(domain.committed_displacements()[1], 0.0);
        assert_eq!(domain.current_time(), 0.0);
    }

    #[test]
    fn reactions_at_constrained_dofs() {
        let mut domain = domain_with_combo();
        domain.attach_combination("C1").unwrap();
        // Equilibrium under the full combination: u = K^-1 * F.
        domain.set_trial_displacements(DVector::from_vec(vec![0.0, 1.0]));
        domain.set_applied_load_factor(1.0);
        domain.commit();
        domain.compute_nodal_reactions(false, 1e-8);
        let r = domain.reactions().unwrap();
        assert_eq!(r[0], 0.0); // unloaded support
        assert_eq!(r[1], 0.0); // free DOF never reported
    }
}
