//! Integrator family: predictor/corrector stepping schemes.
//!
//! Integrators are built through [`IntegratorBuilder`], whose `finalize`
//! step returns the immutable, fully configured object; a half-finalized
//! integrator cannot be executed because it cannot exist. Displacement
//! control resolves its controlling (node, dof) against the live domain at
//! finalize time, and arc length accepts its radius either at construction
//! or through [`IntegratorBuilder::set_radius`] — both paths produce the
//! same object.
//!
//! The transient schemes share one implicit-stage formulation: within a
//! stage the velocity and acceleration are affine in the unknown
//! displacement, `v = cv*u + v_hat`, `a = ca*u + a_hat`, so the effective
//! stiffness is always `K + ca*M` and the corrector loop does not care
//! which scheme is running. Newmark has one stage, TRBDF2 a trapezoidal
//! stage then a BDF2 stage, TRBDF3 two trapezoidal stages then BDF3.

use nalgebra::{DMatrix, DVector};
use tangent_model::Domain;

use crate::config::IntegratorKind;
use crate::error::{Result, SolveStatus, StrategyError};

use super::soe::SystemOfEquations;
use super::wrapper::ModelWrapper;

/// TRBDF2 trapezoidal-stage fraction, `2 - sqrt(2)`.
const TRBDF2_GAMMA: f64 = 2.0 - std::f64::consts::SQRT_2;

pub struct IntegratorBuilder {
    kind: IntegratorKind,
    time_step: Option<f64>,
    radius_override: Option<f64>,
}

impl IntegratorBuilder {
    pub fn new(kind: IntegratorKind) -> Self {
        Self {
            kind,
            time_step: None,
            radius_override: None,
        }
    }

    /// Required for the transient kinds.
    pub fn with_time_step(mut self, dt: f64) -> Self {
        self.time_step = Some(dt);
        self
    }

    /// Alternative arc-length radius path; equivalent to passing the radius
    /// in the kind itself.
    pub fn set_radius(&mut self, radius: f64) {
        self.radius_override = Some(radius);
    }

    /// Validate parameters against the live domain and produce the
    /// integrator. This runs after the analysis exists, because
    /// displacement control must resolve its controlling DOF through the
    /// wrapper the analysis was bound to.
    pub fn finalize(self, domain: &Domain, wrapper: &ModelWrapper) -> Result<Integrator> {
        match self.kind {
            IntegratorKind::LoadControl {
                dlambda,
                min_dlambda,
                max_dlambda,
            } => {
                if min_dlambda > max_dlambda {
                    return Err(StrategyError::configuration(
                        "integrator",
                        format!("load control bounds inverted: [{min_dlambda}, {max_dlambda}]"),
                    ));
                }
                Ok(Integrator::LoadControl(LoadControl {
                    dlambda: dlambda.clamp(min_dlambda, max_dlambda),
                    lambda: 0.0,
                }))
            }
            IntegratorKind::DisplacementControl {
                node,
                dof,
                increment,
            } => {
                if increment == 0.0 {
                    return Err(StrategyError::configuration(
                        "integrator",
                        "displacement control with zero increment",
                    ));
                }
                let global = domain.node_dof(node, dof)?;
                let eq = wrapper.equation_of_dof(global).ok_or_else(|| {
                    StrategyError::configuration(
                        "integrator",
                        format!("controlling DOF {dof} of node {node} is constrained"),
                    )
                })?;
                Ok(Integrator::DisplacementControl(DisplacementControl {
                    eq,
                    increment,
                    lambda: 0.0,
                }))
            }
            IntegratorKind::ArcLength { radius, alpha } => {
                let radius = self.radius_override.unwrap_or(radius);
                if radius <= 0.0 {
                    return Err(StrategyError::configuration(
                        "integrator",
                        format!("arc length requires a positive radius, got {radius}"),
                    ));
                }
                Ok(Integrator::ArcLength(ArcLength {
                    radius,
                    alpha,
                    lambda: 0.0,
                    delta_u: DVector::zeros(wrapper.neq()),
                    delta_lambda: 0.0,
                    sign: 1.0,
                }))
            }
            IntegratorKind::Newmark { gamma, beta } => {
                if beta <= 0.0 {
                    return Err(StrategyError::configuration(
                        "integrator",
                        format!("Newmark requires beta > 0, got {beta}"),
                    ));
                }
                let dt = self.require_dt()?;
                Ok(Integrator::Transient(Transient::new(
                    TransientScheme::Newmark { gamma, beta },
                    dt,
                    domain.num_dofs(),
                )))
            }
            IntegratorKind::TRBDF2 => {
                let dt = self.require_dt()?;
                Ok(Integrator::Transient(Transient::new(
                    TransientScheme::TrBdf2,
                    dt,
                    domain.num_dofs(),
                )))
            }
            IntegratorKind::TRBDF3 => {
                let dt = self.require_dt()?;
                Ok(Integrator::Transient(Transient::new(
                    TransientScheme::TrBdf3,
                    dt,
                    domain.num_dofs(),
                )))
            }
            IntegratorKind::StandardEigen => Ok(Integrator::Eigen(EigenIntegrator {
                kind: EigenKind::Standard,
            })),
            IntegratorKind::LinearBuckling => Ok(Integrator::Eigen(EigenIntegrator {
                kind: EigenKind::Buckling,
            })),
            IntegratorKind::IllConditioning => Ok(Integrator::Eigen(EigenIntegrator {
                kind: EigenKind::IllConditioning,
            })),
        }
    }

    fn require_dt(&self) -> Result<f64> {
        match self.time_step {
            Some(dt) if dt > 0.0 => Ok(dt),
            Some(dt) => Err(StrategyError::configuration(
                "integrator",
                format!("non-positive time step {dt}"),
            )),
            None => Err(StrategyError::configuration(
                "integrator",
                format!("{} requires a time step", self.kind.name()),
            )),
        }
    }
}

#[derive(Debug)]
pub struct LoadControl {
    dlambda: f64,
    lambda: f64,
}

#[derive(Debug)]
pub struct DisplacementControl {
    eq: usize,
    increment: f64,
    lambda: f64,
}

#[derive(Debug)]
pub struct ArcLength {
    radius: f64,
    alpha: f64,
    lambda: f64,
    delta_u: DVector<f64>,
    delta_lambda: f64,
    sign: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransientScheme {
    Newmark { gamma: f64, beta: f64 },
    TrBdf2,
    TrBdf3,
}

#[derive(Debug)]
pub struct Transient {
    scheme: TransientScheme,
    dt: f64,
    stage: usize,
    u_n: DVector<f64>,
    v_n: DVector<f64>,
    a_n: DVector<f64>,
    /// Converged (u, v) at the ends of completed interior stages.
    stage_states: Vec<(DVector<f64>, DVector<f64>, DVector<f64>)>,
    cv: f64,
    ca: f64,
    v_hat: DVector<f64>,
    a_hat: DVector<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EigenKind {
    Standard,
    Buckling,
    IllConditioning,
}

#[derive(Debug)]
pub struct EigenIntegrator {
    kind: EigenKind,
}

#[derive(Debug)]
pub enum Integrator {
    LoadControl(LoadControl),
    DisplacementControl(DisplacementControl),
    ArcLength(ArcLength),
    Transient(Transient),
    Eigen(EigenIntegrator),
}

impl Integrator {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Integrator::LoadControl(_) => "load-control",
            Integrator::DisplacementControl(_) => "displacement-control",
            Integrator::ArcLength(_) => "arc-length",
            Integrator::Transient(t) => match t.scheme {
                TransientScheme::Newmark { .. } => "newmark",
                TransientScheme::TrBdf2 => "trbdf2",
                TransientScheme::TrBdf3 => "trbdf3",
            },
            Integrator::Eigen(e) => match e.kind {
                EigenKind::Standard => "standard-eigen",
                EigenKind::Buckling => "linear-buckling",
                EigenKind::IllConditioning => "ill-conditioning",
            },
        }
    }

    pub fn load_factor(&self) -> f64 {
        match self {
            Integrator::LoadControl(i) => i.lambda,
            Integrator::DisplacementControl(i) => i.lambda,
            Integrator::ArcLength(i) => i.lambda,
            Integrator::Transient(_) | Integrator::Eigen(_) => 1.0,
        }
    }

    /// Advance the predictor into a new step. The displacement-control and
    /// arc-length kinds solve a reference-load tangent system here.
    pub fn new_step(
        &mut self,
        domain: &mut Domain,
        wrapper: &ModelWrapper,
        soe: &mut SystemOfEquations,
    ) -> std::result::Result<(), SolveStatus> {
        wrapper.apply_prescribed(domain);
        match self {
            // The load factor is the domain's pseudo-time, so a model reset
            // between combinations re-bases the load path at zero.
            Integrator::LoadControl(i) => {
                i.lambda = domain.current_time() + i.dlambda;
                domain.set_current_time(i.lambda);
                Ok(())
            }
            Integrator::DisplacementControl(i) => {
                let du_t = tangent_displacements(domain, wrapper, soe)?;
                if du_t[i.eq].abs() < 1e-14 {
                    log::warn!("displacement control: controlling equation has no tangent response");
                    return Err(SolveStatus::SingularSystem);
                }
                let dlambda = i.increment / du_t[i.eq];
                i.lambda = domain.current_time() + dlambda;
                domain.set_current_time(i.lambda);
                domain.incr_trial_displacements(&wrapper.expand_increment(&(du_t * dlambda)));
                Ok(())
            }
            Integrator::ArcLength(i) => {
                let du_t = tangent_displacements(domain, wrapper, soe)?;
                let denom = (du_t.dot(&du_t) + i.alpha * i.alpha).sqrt();
                let dlambda = i.sign * i.radius / denom;
                i.lambda = domain.current_time() + dlambda;
                i.delta_lambda = dlambda;
                i.delta_u = &du_t * dlambda;
                domain.set_current_time(i.lambda);
                domain.incr_trial_displacements(&wrapper.expand_increment(&i.delta_u));
                Ok(())
            }
            Integrator::Transient(t) => {
                t.u_n = domain.committed_displacements().clone();
                t.v_n = domain.committed_velocities().clone();
                t.a_n = domain.committed_accelerations().clone();
                t.stage = 0;
                t.stage_states.clear();
                t.setup_stage();
                domain.set_current_time(domain.current_time() + t.stage_end_offset());
                t.write_trial_kinematics(domain);
                Ok(())
            }
            Integrator::Eigen(_) => Ok(()),
        }
    }

    /// Move a multi-stage transient scheme to its next stage. Returns
    /// `false` when the step has no further stages.
    pub fn advance_stage(&mut self, domain: &mut Domain) -> bool {
        let Integrator::Transient(t) = self else {
            return false;
        };
        if t.stage + 1 >= t.num_stages() {
            return false;
        }
        t.stage_states.push((
            domain.trial_displacements().clone(),
            domain.trial_velocities().clone(),
            domain.trial_accelerations().clone(),
        ));
        t.stage += 1;
        t.setup_stage();
        let time = domain.current_time() - t.previous_stage_end_offset() + t.stage_end_offset();
        domain.set_current_time(time);
        t.write_trial_kinematics(domain);
        true
    }

    /// Assemble the effective tangent into the system of equations.
    pub fn form_tangent(
        &self,
        domain: &Domain,
        wrapper: &ModelWrapper,
        soe: &mut SystemOfEquations,
    ) {
        let k = wrapper.reduce_stiffness(&domain.backend().stiffness(domain.trial_displacements()));
        match self {
            Integrator::Transient(t) => {
                let m = wrapper.reduce_plain(&domain.backend().mass());
                soe.set_matrix(k + m * t.ca);
            }
            _ => soe.set_matrix(k),
        }
    }

    /// Assemble the unbalanced-force vector into the system's RHS.
    pub fn form_unbalance(
        &self,
        domain: &Domain,
        wrapper: &ModelWrapper,
        soe: &mut SystemOfEquations,
    ) {
        let u = domain.trial_displacements();
        let f_int = domain.backend().internal_forces(u);
        let r_full = match self {
            Integrator::Transient(_) => {
                let inertia = domain.backend().mass().to_dense() * domain.trial_accelerations();
                domain.reference_load_vector() - f_int - inertia
            }
            _ => domain.reference_load_vector() * self.load_factor() - f_int,
        };
        soe.set_rhs(wrapper.reduce_residual(&r_full, u));
    }

    /// Solve the current unbalance for an equation-space correction. The
    /// load-path integrators fold their constraint on lambda into the
    /// correction; nothing is applied to the domain here.
    pub fn correct(
        &mut self,
        domain: &Domain,
        wrapper: &ModelWrapper,
        soe: &mut SystemOfEquations,
    ) -> std::result::Result<DVector<f64>, SolveStatus> {
        soe.solve()?;
        let du_r = soe.solution().clone();
        match self {
            Integrator::LoadControl(_) | Integrator::Transient(_) | Integrator::Eigen(_) => {
                Ok(du_r)
            }
            Integrator::DisplacementControl(i) => {
                soe.set_rhs(wrapper.reduce_force(&domain.reference_load_vector()));
                soe.solve()?;
                let du_t = soe.solution();
                if du_t[i.eq].abs() < 1e-14 {
                    return Err(SolveStatus::SingularSystem);
                }
                // Keep the controlled DOF stationary during iterations.
                let dlambda = -du_r[i.eq] / du_t[i.eq];
                i.lambda += dlambda;
                Ok(&du_r + du_t * dlambda)
            }
            Integrator::ArcLength(i) => {
                soe.set_rhs(wrapper.reduce_force(&domain.reference_load_vector()));
                soe.solve()?;
                let du_t = soe.solution();
                let denom = i.delta_u.dot(du_t) + i.alpha * i.alpha * i.delta_lambda;
                let dlambda = if denom.abs() < 1e-14 {
                    0.0
                } else {
                    -i.delta_u.dot(&du_r) / denom
                };
                i.lambda += dlambda;
                i.delta_lambda += dlambda;
                let du = &du_r + du_t * dlambda;
                i.delta_u += &du;
                Ok(du)
            }
        }
    }

    /// Apply a scaled correction to the domain's trial state.
    pub fn apply(
        &self,
        domain: &mut Domain,
        wrapper: &ModelWrapper,
        du: &DVector<f64>,
        scale: f64,
    ) {
        domain.incr_trial_displacements(&(wrapper.expand_increment(du) * scale));
        if let Integrator::Transient(t) = self {
            t.write_trial_kinematics(domain);
        }
    }

    /// Make the step permanent.
    pub fn commit_step(&mut self, domain: &mut Domain) {
        if let Integrator::ArcLength(i) = self {
            i.sign = if i.delta_lambda < 0.0 { -1.0 } else { 1.0 };
        }
        // Pseudo-time tracks the final load factor; displacement control
        // and arc length adjust lambda during iterations, after the
        // predictor already stamped the time.
        if matches!(
            self,
            Integrator::LoadControl(_) | Integrator::DisplacementControl(_) | Integrator::ArcLength(_)
        ) {
            domain.set_current_time(self.load_factor());
        }
        domain.set_applied_load_factor(self.load_factor());
        domain.commit();
    }

    /// Matrix pair for the eigen families. The step count of an eigen
    /// solve is the number of requested eigenpairs, so no stepping state
    /// exists here.
    pub fn form_eigen_pair(
        &self,
        domain: &Domain,
        wrapper: &ModelWrapper,
    ) -> Result<(DMatrix<f64>, DMatrix<f64>)> {
        let Integrator::Eigen(e) = self else {
            return Err(StrategyError::setup(
                "integrator",
                format!("{} cannot form an eigen pair", self.kind_name()),
            ));
        };
        let u = domain.committed_displacements();
        let a = wrapper.reduce_stiffness(&domain.backend().stiffness(u));
        let b = match e.kind {
            EigenKind::Standard => {
                let mass = domain.backend().mass();
                if mass.nnz() == 0 {
                    return Err(StrategyError::setup(
                        "integrator",
                        "modal extraction requires a mass matrix",
                    ));
                }
                wrapper.reduce_plain(&mass)
            }
            EigenKind::Buckling => {
                let mut kg = domain.backend().geometric_stiffness(u);
                if kg.nnz() == 0 {
                    return Err(StrategyError::setup(
                        "integrator",
                        "buckling extraction requires a geometric stiffness",
                    ));
                }
                for v in &mut kg.values {
                    *v = -*v;
                }
                wrapper.reduce_plain(&kg)
            }
            EigenKind::IllConditioning => DMatrix::identity(wrapper.neq(), wrapper.neq()),
        };
        Ok((a, b))
    }
}

/// Solve `K du_t = F_ref` at the current tangent.
fn tangent_displacements(
    domain: &Domain,
    wrapper: &ModelWrapper,
    soe: &mut SystemOfEquations,
) -> std::result::Result<DVector<f64>, SolveStatus> {
    let k = wrapper.reduce_stiffness(&domain.backend().stiffness(domain.trial_displacements()));
    soe.set_matrix(k);
    soe.set_rhs(wrapper.reduce_force(&domain.reference_load_vector()));
    soe.solve()?;
    Ok(soe.solution().clone())
}

impl Transient {
    fn new(scheme: TransientScheme, dt: f64, num_dofs: usize) -> Self {
        Self {
            scheme,
            dt,
            stage: 0,
            u_n: DVector::zeros(num_dofs),
            v_n: DVector::zeros(num_dofs),
            a_n: DVector::zeros(num_dofs),
            stage_states: Vec::new(),
            cv: 0.0,
            ca: 0.0,
            v_hat: DVector::zeros(num_dofs),
            a_hat: DVector::zeros(num_dofs),
        }
    }

    fn num_stages(&self) -> usize {
        match self.scheme {
            TransientScheme::Newmark { .. } => 1,
            TransientScheme::TrBdf2 => 2,
            TransientScheme::TrBdf3 => 3,
        }
    }

    /// Time offset of the current stage's end from the step start.
    fn stage_end_offset(&self) -> f64 {
        match self.scheme {
            TransientScheme::Newmark { .. } => self.dt,
            TransientScheme::TrBdf2 => {
                if self.stage == 0 {
                    TRBDF2_GAMMA * self.dt
                } else {
                    self.dt
                }
            }
            TransientScheme::TrBdf3 => (self.stage + 1) as f64 / 3.0 * self.dt,
        }
    }

    fn previous_stage_end_offset(&self) -> f64 {
        match self.scheme {
            TransientScheme::Newmark { .. } => 0.0,
            TransientScheme::TrBdf2 => {
                if self.stage == 1 {
                    TRBDF2_GAMMA * self.dt
                } else {
                    0.0
                }
            }
            TransientScheme::TrBdf3 => self.stage as f64 / 3.0 * self.dt,
        }
    }

    /// Compute the affine velocity/acceleration relations for the current
    /// stage from the step-start state and completed stage states.
    fn setup_stage(&mut self) {
        match self.scheme {
            TransientScheme::Newmark { gamma, beta } => {
                let h = self.dt;
                self.cv = gamma / (beta * h);
                self.v_hat = -self.cv * &self.u_n
                    + (1.0 - gamma / beta) * &self.v_n
                    + h * (1.0 - gamma / (2.0 * beta)) * &self.a_n;
                self.ca = 1.0 / (beta * h * h);
                self.a_hat = -self.ca * &self.u_n
                    - (1.0 / (beta * h)) * &self.v_n
                    - (1.0 / (2.0 * beta) - 1.0) * &self.a_n;
            }
            TransientScheme::TrBdf2 => {
                if self.stage == 0 {
                    self.trapezoid_from(self.dt * TRBDF2_GAMMA, None);
                } else {
                    // BDF2 over the non-uniform grid (t_n, t_n+gamma*h, t_n+h).
                    let gamma = TRBDF2_GAMMA;
                    let h1 = gamma * self.dt;
                    let h2 = (1.0 - gamma) * self.dt;
                    let rho = h2 / h1;
                    let (u_g, v_g, _) = self.stage_states[0].clone();
                    let c_new = (1.0 + 2.0 * rho) / ((1.0 + rho) * h2);
                    let c_mid = (1.0 + rho) / h2;
                    let c_old = rho * rho / ((1.0 + rho) * h2);
                    self.cv = c_new;
                    self.v_hat = -c_mid * &u_g + c_old * &self.u_n;
                    self.ca = c_new * c_new;
                    self.a_hat = c_new * &self.v_hat - c_mid * &v_g + c_old * &self.v_n;
                }
            }
            TransientScheme::TrBdf3 => {
                let hs = self.dt / 3.0;
                match self.stage {
                    0 => self.trapezoid_from(hs, None),
                    1 => self.trapezoid_from(hs, Some(0)),
                    _ => {
                        // Uniform-grid BDF3 over the four step points.
                        let (u_a, v_a, _) = self.stage_states[0].clone();
                        let (u_b, v_b, _) = self.stage_states[1].clone();
                        self.cv = 11.0 / (6.0 * hs);
                        self.v_hat =
                            (-3.0 * &u_b + 1.5 * &u_a - (1.0 / 3.0) * &self.u_n) / hs;
                        self.ca = self.cv * self.cv;
                        self.a_hat = self.cv * &self.v_hat
                            + (-3.0 * &v_b + 1.5 * &v_a - (1.0 / 3.0) * &self.v_n) / hs;
                    }
                }
            }
        }
    }

    /// Trapezoidal-rule relations over a sub-step `hs`, starting from the
    /// step-start state or a completed stage.
    fn trapezoid_from(&mut self, hs: f64, stage: Option<usize>) {
        let (u0, v0, a0) = match stage {
            None => (self.u_n.clone(), self.v_n.clone(), self.a_n.clone()),
            Some(s) => self.stage_states[s].clone(),
        };
        self.cv = 2.0 / hs;
        self.v_hat = -self.cv * &u0 - &v0;
        self.ca = 4.0 / (hs * hs);
        self.a_hat = (2.0 / hs) * &self.v_hat - (2.0 / hs) * &v0 - &a0;
    }

    /// Refresh trial velocity/acceleration from the stage relations and the
    /// current trial displacement.
    fn write_trial_kinematics(&self, domain: &mut Domain) {
        let u = domain.trial_displacements().clone();
        domain.set_trial_velocities(self.cv * &u + &self.v_hat);
        domain.set_trial_accelerations(self.ca * &u + &self.a_hat);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConstraintHandlerKind, NumbererKind};
    use tangent_model::{LoadPattern, ModelBackend, SparseTriplets, SpConstraint};

    struct Spring;

    impl ModelBackend for Spring {
        fn num_nodes(&self) -> usize {
            2
        }

        fn dofs_per_node(&self) -> usize {
            1
        }

        fn stiffness(&self, _u: &DVector<f64>) -> SparseTriplets {
            let mut k = SparseTriplets::zeros(2);
            k.push(0, 0, 100.0);
            k.push(1, 1, 100.0);
            k
        }

        fn internal_forces(&self, u: &DVector<f64>) -> DVector<f64> {
            self.stiffness(u).to_dense() * u
        }

        fn mass(&self) -> SparseTriplets {
            let mut m = SparseTriplets::zeros(2);
            m.push(0, 0, 1.0);
            m.push(1, 1, 1.0);
            m
        }

        fn single_point_constraints(&self) -> Vec<SpConstraint> {
            vec![SpConstraint::fixed(0)]
        }
    }

    fn spring_domain() -> Domain {
        let mut domain = Domain::new(Box::new(Spring));
        domain
            .cases_mut()
            .define_pattern(LoadPattern::new("P").with_load(1, 0, 50.0));
        domain.cases_mut().define_combination("C", "P").unwrap();
        domain.attach_combination("C").unwrap();
        domain
    }

    fn wrapper(domain: &Domain) -> ModelWrapper {
        ModelWrapper::new(NumbererKind::Plain, ConstraintHandlerKind::Plain, domain).unwrap()
    }

    #[test]
    fn load_control_advances_lambda_per_step() {
        let domain = &mut spring_domain();
        let w = wrapper(domain);
        let mut soe = SystemOfEquations::new(
            crate::config::SoeKind::FullGeneral,
            crate::config::SolverKind::DenseLu,
            w.neq(),
        );
        let mut integrator = IntegratorBuilder::new(IntegratorKind::LoadControl {
            dlambda: 0.5,
            min_dlambda: 0.5,
            max_dlambda: 0.5,
        })
        .finalize(domain, &w)
        .unwrap();
        integrator.new_step(domain, &w, &mut soe).unwrap();
        integrator.new_step(domain, &w, &mut soe).unwrap();
        assert!((integrator.load_factor() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn displacement_control_resolves_live_dof() {
        let domain = &mut spring_domain();
        let w = wrapper(domain);
        let err = IntegratorBuilder::new(IntegratorKind::DisplacementControl {
            node: 9,
            dof: 0,
            increment: 0.1,
        })
        .finalize(domain, &w)
        .unwrap_err();
        assert!(err.to_string().contains("node 9"));

        let err = IntegratorBuilder::new(IntegratorKind::DisplacementControl {
            node: 0,
            dof: 0,
            increment: 0.1,
        })
        .finalize(domain, &w)
        .unwrap_err();
        assert!(err.to_string().contains("constrained"));
    }

    #[test]
    fn arc_length_setter_and_constructor_paths_match() {
        let domain = &mut spring_domain();
        let w = wrapper(domain);
        let direct = IntegratorBuilder::new(IntegratorKind::ArcLength {
            radius: 0.25,
            alpha: 1.0,
        })
        .finalize(domain, &w)
        .unwrap();

        let mut builder = IntegratorBuilder::new(IntegratorKind::ArcLength {
            radius: 0.0,
            alpha: 1.0,
        });
        builder.set_radius(0.25);
        let via_setter = builder.finalize(domain, &w).unwrap();

        match (&direct, &via_setter) {
            (Integrator::ArcLength(a), Integrator::ArcLength(b)) => {
                assert_eq!(a.radius, b.radius);
                assert_eq!(a.alpha, b.alpha);
            }
            _ => panic!("expected arc-length integrators"),
        }
    }

    #[test]
    fn arc_length_without_radius_is_rejected() {
        let domain = &mut spring_domain();
        let w = wrapper(domain);
        let err = IntegratorBuilder::new(IntegratorKind::ArcLength {
            radius: 0.0,
            alpha: 1.0,
        })
        .finalize(domain, &w)
        .unwrap_err();
        assert!(err.to_string().contains("radius"));
    }

    #[test]
    fn transient_kinds_require_a_time_step() {
        let domain = &mut spring_domain();
        let w = wrapper(domain);
        let err = IntegratorBuilder::new(IntegratorKind::newmark_average_acceleration())
            .finalize(domain, &w)
            .unwrap_err();
        assert!(err.to_string().contains("time step"));
    }

    #[test]
    fn newmark_stage_relations_are_consistent() {
        // With the same-displacement predictor, u = u_n implies
        // a = -v_n/(beta*h) - (1/(2beta)-1)*a_n.
        let mut t = Transient::new(
            TransientScheme::Newmark {
                gamma: 0.5,
                beta: 0.25,
            },
            0.1,
            1,
        );
        t.u_n = DVector::from_vec(vec![1.0]);
        t.v_n = DVector::from_vec(vec![2.0]);
        t.a_n = DVector::from_vec(vec![3.0]);
        t.setup_stage();
        let a_pred = t.ca * 1.0 + t.a_hat[0];
        let expected = -2.0 / (0.25 * 0.1) - (1.0 / 0.5 - 1.0) * 3.0;
        assert!((a_pred - expected).abs() < 1e-9);
    }

    #[test]
    fn trbdf2_has_two_stages_and_trbdf3_three() {
        let t2 = Transient::new(TransientScheme::TrBdf2, 0.1, 1);
        let t3 = Transient::new(TransientScheme::TrBdf3, 0.1, 1);
        assert_eq!(t2.num_stages(), 2);
        assert_eq!(t3.num_stages(), 3);
    }
}
