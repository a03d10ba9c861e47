//! Solution algorithms and convergence tests.
//!
//! The algorithm drives the corrector loop of one step: form unbalance,
//! solve, update, test. `Linear` short-circuits the test entirely (no test
//! object exists and exactly one iteration runs). The Newton variants are
//! built through [`AlgorithmBuilder`], which refuses to produce a
//! line-search Newton without its method or a Krylov Newton without its
//! subspace bound, so a structurally-plain Newton cannot masquerade as
//! either.

use nalgebra::DVector;
use tangent_model::Domain;

use crate::config::{AlgorithmKind, ConvergenceTestKind, ConvergenceTestSpec, LineSearchMethod};
use crate::error::{Result, SolveStatus, StrategyError};

use super::integrator::Integrator;
use super::soe::SystemOfEquations;
use super::wrapper::ModelWrapper;

/// Norms gathered after one corrector update.
#[derive(Debug, Clone, Copy)]
pub struct IterationMetrics {
    pub unbalance_norm: f64,
    pub disp_incr_norm: f64,
    pub energy_incr: f64,
}

/// Tolerance-plus-budget criterion for iterative algorithms.
#[derive(Debug)]
pub struct ConvergenceTest {
    spec: ConvergenceTestSpec,
    first_energy: Option<f64>,
}

impl ConvergenceTest {
    pub fn new(spec: ConvergenceTestSpec) -> Self {
        Self {
            spec,
            first_energy: None,
        }
    }

    pub fn max_iter(&self) -> usize {
        self.spec.max_iter
    }

    /// Reset per-step state.
    pub fn start(&mut self) {
        self.first_energy = None;
    }

    pub fn check(&mut self, metrics: &IterationMetrics, iter: usize) -> bool {
        let converged = match self.spec.kind {
            ConvergenceTestKind::NormUnbalance => metrics.unbalance_norm < self.spec.tolerance,
            ConvergenceTestKind::NormDispIncr => metrics.disp_incr_norm < self.spec.tolerance,
            ConvergenceTestKind::RelativeEnergyIncr => {
                let reference = *self
                    .first_energy
                    .get_or_insert(metrics.energy_incr.max(1e-300));
                metrics.energy_incr / reference < self.spec.tolerance
            }
        };
        if self.spec.print_flag >= 2 {
            log::info!(
                "iter {iter}: |R| = {:.3e}, |du| = {:.3e}, energy = {:.3e}",
                metrics.unbalance_norm,
                metrics.disp_incr_norm,
                metrics.energy_incr
            );
        }
        converged
    }
}

pub struct AlgorithmBuilder {
    kind: AlgorithmKind,
    test: Option<ConvergenceTestSpec>,
}

impl AlgorithmBuilder {
    pub fn new(kind: AlgorithmKind) -> Self {
        Self { kind, test: None }
    }

    pub fn with_test(mut self, spec: ConvergenceTestSpec) -> Self {
        self.test = Some(spec);
        self
    }

    pub fn finalize(self) -> Result<SolutionAlgorithm> {
        match (self.kind, &self.test) {
            (AlgorithmKind::Linear, Some(_)) => Err(StrategyError::configuration(
                "solution algorithm",
                "linear algorithm takes no convergence test",
            )),
            (AlgorithmKind::Linear, None) => Ok(SolutionAlgorithm {
                kind: self.kind,
                test: None,
                krylov_history: Vec::new(),
            }),
            (kind, None) => Err(StrategyError::configuration(
                "solution algorithm",
                format!("{} requires a convergence test", kind.name()),
            )),
            (kind, Some(spec)) => {
                if spec.max_iter == 0 {
                    return Err(StrategyError::configuration(
                        "convergence test",
                        "max_iter must be at least 1",
                    ));
                }
                if spec.tolerance <= 0.0 {
                    return Err(StrategyError::configuration(
                        "convergence test",
                        format!("non-positive tolerance {}", spec.tolerance),
                    ));
                }
                if let AlgorithmKind::KrylovNewton { max_dim } = kind
                    && max_dim == 0
                {
                    return Err(StrategyError::configuration(
                        "solution algorithm",
                        "Krylov Newton requires a subspace dimension of at least 1",
                    ));
                }
                Ok(SolutionAlgorithm {
                    kind,
                    test: Some(ConvergenceTest::new(*spec)),
                    krylov_history: Vec::new(),
                })
            }
        }
    }
}

#[derive(Debug)]
pub struct SolutionAlgorithm {
    kind: AlgorithmKind,
    test: Option<ConvergenceTest>,
    /// (correction, residual-at-correction) pairs for Krylov acceleration.
    krylov_history: Vec<(DVector<f64>, DVector<f64>)>,
}

impl SolutionAlgorithm {
    pub fn kind(&self) -> AlgorithmKind {
        self.kind
    }

    pub fn has_test(&self) -> bool {
        self.test.is_some()
    }

    /// Run the corrector loop for the step the integrator has predicted.
    pub fn solve_current_step(
        &mut self,
        domain: &mut Domain,
        wrapper: &ModelWrapper,
        integrator: &mut Integrator,
        soe: &mut SystemOfEquations,
    ) -> Result<SolveStatus> {
        if matches!(self.kind, AlgorithmKind::Linear) {
            integrator.form_tangent(domain, wrapper, soe);
            integrator.form_unbalance(domain, wrapper, soe);
            let du = match integrator.correct(domain, wrapper, soe) {
                Ok(du) => du,
                Err(status) => return Ok(status),
            };
            integrator.apply(domain, wrapper, &du, 1.0);
            return Ok(SolveStatus::Success);
        }

        let max_iter = {
            let test = self.test.as_mut().ok_or_else(|| {
                StrategyError::setup(
                    "solution algorithm",
                    format!("{} built without its convergence test", self.kind.name()),
                )
            })?;
            test.start();
            test.max_iter()
        };
        self.krylov_history.clear();

        integrator.form_tangent(domain, wrapper, soe);
        for iter in 1..=max_iter {
            integrator.form_unbalance(domain, wrapper, soe);
            let residual = soe.rhs().clone();

            if matches!(self.kind, AlgorithmKind::NewtonRaphson) && iter > 1 {
                integrator.form_tangent(domain, wrapper, soe);
                soe.set_rhs(residual.clone());
            }

            let mut du = match integrator.correct(domain, wrapper, soe) {
                Ok(du) => du,
                Err(status) => {
                    log::warn!("corrector solve failed at iteration {iter}: {status}");
                    return Ok(status);
                }
            };

            let mut scale = 1.0;
            match self.kind {
                AlgorithmKind::NewtonLineSearch { method } => {
                    scale = line_search(method, domain, wrapper, integrator, soe, &du, &residual);
                }
                AlgorithmKind::KrylovNewton { max_dim } => {
                    du = self.accelerate(du, &residual, max_dim);
                }
                _ => {}
            }

            integrator.apply(domain, wrapper, &du, scale);
            integrator.form_unbalance(domain, wrapper, soe);

            let metrics = IterationMetrics {
                unbalance_norm: soe.rhs_norm(),
                disp_incr_norm: du.norm() * scale,
                energy_incr: (du.dot(&residual) * scale).abs(),
            };
            let test = self.test.as_mut().expect("checked above");
            if test.check(&metrics, iter) {
                return Ok(SolveStatus::Success);
            }
        }

        Ok(SolveStatus::ConvergenceFailure {
            iterations: max_iter,
        })
    }

    /// Krylov-subspace acceleration: combine the new correction with the
    /// stored ones so the accumulated residual change is best cancelled in
    /// the least-squares sense. History is bounded by `max_dim`.
    fn accelerate(
        &mut self,
        du: DVector<f64>,
        residual: &DVector<f64>,
        max_dim: usize,
    ) -> DVector<f64> {
        let accelerated = if self.krylov_history.len() >= 2 {
            let n = residual.len();
            let m = self.krylov_history.len() - 1;
            let mut w = nalgebra::DMatrix::zeros(n, m);
            for j in 0..m {
                let dr = &self.krylov_history[j + 1].1 - &self.krylov_history[j].1;
                w.set_column(j, &dr);
            }
            match w.svd(true, true).solve(residual, 1e-12) {
                Ok(gamma) => {
                    let mut out = du.clone();
                    for j in 0..m {
                        out += &self.krylov_history[j].0 * gamma[j];
                    }
                    out
                }
                Err(_) => du.clone(),
            }
        } else {
            du.clone()
        };

        self.krylov_history.push((du, residual.clone()));
        if self.krylov_history.len() > max_dim {
            self.krylov_history.remove(0);
        }
        accelerated
    }
}

/// Scalar line search on `s(eta) = du . R(u + eta*du)`.
///
/// Accepts `eta = 1` when the directional derivative already shrank below
/// the standard 0.8 acceptance ratio; otherwise iterates the chosen update
/// rule over a bracketed interval. The trial state is restored before
/// returning, so only the returned scale is ever applied.
fn line_search(
    method: LineSearchMethod,
    domain: &mut Domain,
    wrapper: &ModelWrapper,
    integrator: &Integrator,
    soe: &mut SystemOfEquations,
    du: &DVector<f64>,
    residual: &DVector<f64>,
) -> f64 {
    const MAX_TRIALS: usize = 10;
    const ACCEPT_RATIO: f64 = 0.8;

    let s0 = du.dot(residual);
    if s0 == 0.0 {
        return 1.0;
    }

    let s_at = |eta: f64, domain: &mut Domain, soe: &mut SystemOfEquations| -> f64 {
        integrator.apply(domain, wrapper, du, eta);
        integrator.form_unbalance(domain, wrapper, soe);
        let s = du.dot(soe.rhs());
        integrator.apply(domain, wrapper, du, -eta);
        s
    };

    let mut eta_lo = 0.0;
    let mut s_lo = s0;
    let mut eta = 1.0;
    let mut s_cur = s_at(eta, domain, soe);
    if s_cur.abs() <= ACCEPT_RATIO * s0.abs() {
        return eta;
    }

    let mut eta_prev = eta_lo;
    let mut s_prev = s_lo;
    for _ in 0..MAX_TRIALS {
        let next = match method {
            LineSearchMethod::Bisection => 0.5 * (eta_lo + eta),
            LineSearchMethod::InitialInterpolated => {
                let denom = s0 - s_cur;
                if denom.abs() < 1e-300 {
                    break;
                }
                (s0 / denom).clamp(0.05, 1.0)
            }
            LineSearchMethod::RegulaFalsi => {
                let denom = s_cur - s_lo;
                if denom.abs() < 1e-300 {
                    break;
                }
                eta_lo - s_lo * (eta - eta_lo) / denom
            }
            LineSearchMethod::Secant => {
                let denom = s_cur - s_prev;
                if denom.abs() < 1e-300 {
                    break;
                }
                eta - s_cur * (eta - eta_prev) / denom
            }
        };
        let next = next.clamp(0.05, 1.0);

        eta_prev = eta;
        s_prev = s_cur;
        eta = next;
        s_cur = s_at(eta, domain, soe);

        if s_cur.abs() <= ACCEPT_RATIO * s0.abs() {
            return eta;
        }
        if matches!(method, LineSearchMethod::InitialInterpolated) {
            break;
        }
        // Maintain the bracket when the sign flips.
        if (s_cur > 0.0) != (s_lo > 0.0) {
            // keep eta_lo
        } else {
            eta_lo = eta;
            s_lo = s_cur;
        }
    }
    log::debug!("line search settled at eta = {eta:.3} without acceptance");
    eta
}
