//! The component registry: a closed, typed catalog of buildable kinds.
//!
//! Where the configuration enums make unknown kinds unrepresentable, the
//! registry enforces the cross-field rules: which integrators belong to
//! which analysis family, which solver pairs with which system storage,
//! which algorithms take a convergence test. `validate` is exhaustive and
//! runs before any numeric object is built, so a bad configuration never
//! produces a partially built graph.

use std::rc::Rc;

use tangent_model::Domain;

use crate::components::algorithm::{AlgorithmBuilder, SolutionAlgorithm};
use crate::components::integrator::{Integrator, IntegratorBuilder};
use crate::components::soe::{EigenSystem, SystemOfEquations};
use crate::components::wrapper::ModelWrapper;
use crate::config::{
    AlgorithmKind, AnalysisFamily, ConstraintHandlerKind, IntegratorKind, SoeKind,
    SolutionStrategyConfig, SolverKind,
};
use crate::error::{Result, StrategyError};

pub struct ComponentRegistry;

impl ComponentRegistry {
    /// Reject every incompatible kind combination with an error naming the
    /// offending component and value.
    pub fn validate(cfg: &SolutionStrategyConfig) -> Result<()> {
        // Algorithm vs. convergence test.
        match (cfg.algorithm, &cfg.convergence_test) {
            (AlgorithmKind::Linear, Some(_)) => {
                return Err(StrategyError::configuration(
                    "solution algorithm",
                    "linear algorithm takes no convergence test",
                ));
            }
            (kind, None) if kind.is_iterative() => {
                return Err(StrategyError::configuration(
                    "solution algorithm",
                    format!("{} requires a convergence test", kind.name()),
                ));
            }
            _ => {}
        }
        if let AlgorithmKind::KrylovNewton { max_dim: 0 } = cfg.algorithm {
            return Err(StrategyError::configuration(
                "solution algorithm",
                "Krylov Newton requires a subspace dimension of at least 1",
            ));
        }
        if let AlgorithmKind::NewtonLineSearch { .. } = cfg.algorithm
            && !matches!(cfg.integrator, IntegratorKind::LoadControl { .. })
            && !cfg.integrator.is_transient()
        {
            return Err(StrategyError::configuration(
                "solution algorithm",
                format!(
                    "line-search Newton cannot rescale the {} integrator's constrained corrections",
                    cfg.integrator.name()
                ),
            ));
        }

        // Family vs. integrator.
        let family_ok = match cfg.analysis {
            AnalysisFamily::Static => cfg.integrator.is_static(),
            AnalysisFamily::DirectDynamic => cfg.integrator.is_transient(),
            AnalysisFamily::Modal => matches!(cfg.integrator, IntegratorKind::StandardEigen),
            AnalysisFamily::LinearBuckling => {
                matches!(cfg.integrator, IntegratorKind::LinearBuckling)
            }
            AnalysisFamily::IllConditioning => {
                matches!(cfg.integrator, IntegratorKind::IllConditioning)
            }
        };
        if !family_ok {
            return Err(StrategyError::configuration(
                "integrator",
                format!(
                    "{} integrator cannot drive a {} analysis",
                    cfg.integrator.name(),
                    cfg.analysis.name()
                ),
            ));
        }
        if cfg.analysis == AnalysisFamily::DirectDynamic && cfg.time_step.is_none() {
            return Err(StrategyError::configuration(
                "integrator",
                "direct-dynamic analysis requires a time step",
            ));
        }

        // Family vs. system of equations, and the SOE/solver pairing.
        if cfg.analysis.is_eigen() != cfg.soe.is_eigen() {
            return Err(StrategyError::configuration(
                "system of equations",
                format!(
                    "{} storage cannot serve a {} analysis",
                    cfg.soe.name(),
                    cfg.analysis.name()
                ),
            ));
        }
        let pairing_ok = matches!(
            (cfg.soe, cfg.solver),
            (SoeKind::FullGeneral, SolverKind::DenseLu)
                | (SoeKind::BandGeneral, SolverKind::BandLu)
                | (SoeKind::SparseGeneral, SolverKind::SparseLu)
                | (SoeKind::SymBandEigen, SolverKind::SymBandEigenSolver)
                | (SoeKind::FullGenEigen, SolverKind::FullGenEigenSolver)
        );
        if !pairing_ok {
            return Err(StrategyError::configuration(
                "solver",
                format!(
                    "{} solver does not pair with {} storage",
                    cfg.solver.name(),
                    cfg.soe.name()
                ),
            ));
        }

        // Eigen families run one linear extraction over a definite pair;
        // iterative algorithms and multiplier-augmented systems do not fit.
        if cfg.analysis.is_eigen() {
            if cfg.algorithm != AlgorithmKind::Linear {
                return Err(StrategyError::configuration(
                    "solution algorithm",
                    format!(
                        "{} analysis requires the linear algorithm",
                        cfg.analysis.name()
                    ),
                ));
            }
            if matches!(cfg.constraint_handler, ConstraintHandlerKind::Lagrange) {
                return Err(StrategyError::configuration(
                    "constraint handler",
                    "lagrange handler produces an indefinite pair; eigen analyses need plain, penalty or transformation",
                ));
            }
        }

        if let ConstraintHandlerKind::Penalty { alpha_sp, alpha_mp } = cfg.constraint_handler
            && (alpha_sp <= 0.0 || alpha_mp <= 0.0)
        {
            return Err(StrategyError::configuration(
                "constraint handler",
                format!("penalty factors must be positive, got {alpha_sp} / {alpha_mp}"),
            ));
        }

        if cfg.num_steps == 0 {
            return Err(StrategyError::configuration(
                "analysis",
                "step count (or requested eigenpair count) must be at least 1",
            ));
        }

        Ok(())
    }

    pub fn build_wrapper(cfg: &SolutionStrategyConfig, domain: &Domain) -> Result<Rc<ModelWrapper>> {
        Ok(Rc::new(ModelWrapper::new(
            cfg.numberer,
            cfg.constraint_handler,
            domain,
        )?))
    }

    pub fn build_algorithm(cfg: &SolutionStrategyConfig) -> Result<SolutionAlgorithm> {
        let mut builder = AlgorithmBuilder::new(cfg.algorithm);
        if let Some(spec) = cfg.convergence_test {
            builder = builder.with_test(spec);
        }
        builder.finalize()
    }

    pub fn build_linear_soe(cfg: &SolutionStrategyConfig, neq: usize) -> SystemOfEquations {
        SystemOfEquations::new(cfg.soe, cfg.solver, neq)
    }

    pub fn build_eigen_soe(cfg: &SolutionStrategyConfig, neq: usize) -> EigenSystem {
        EigenSystem::new(cfg.soe, neq)
    }

    pub fn build_integrator(
        cfg: &SolutionStrategyConfig,
        domain: &Domain,
        wrapper: &ModelWrapper,
    ) -> Result<Integrator> {
        let mut builder = IntegratorBuilder::new(cfg.integrator);
        if let Some(dt) = cfg.time_step {
            builder = builder.with_time_step(dt);
        }
        builder.finalize(domain, wrapper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presets;

    #[test]
    fn presets_all_validate() {
        for cfg in [
            presets::linear_static(),
            presets::penalty_linear_static(),
            presets::newton_raphson_static(1e-8, 10),
            presets::modified_newton_static(1e-8, 10),
            presets::newton_line_search_static(1e-8, 10),
            presets::krylov_newton_static(1e-8, 10, 6),
            presets::displacement_control_static(1, 0, 0.01),
            presets::arc_length_static(0.1),
            presets::newmark_transient(0.01),
            presets::trbdf2_transient(0.01),
            presets::trbdf3_transient(0.01),
            presets::frequency_analysis(5),
            presets::ill_conditioning(3),
        ] {
            ComponentRegistry::validate(&cfg)
                .unwrap_or_else(|e| panic!("preset failed validation: {e}"));
        }
    }

    #[test]
    fn rejects_iterative_algorithm_without_test() {
        let mut cfg = presets::newton_raphson_static(1e-8, 10);
        cfg.convergence_test = None;
        let err = ComponentRegistry::validate(&cfg).unwrap_err();
        assert!(err.to_string().contains("convergence test"));
    }

    #[test]
    fn rejects_linear_algorithm_with_test() {
        let mut cfg = presets::linear_static();
        cfg.convergence_test = Some(Default::default());
        assert!(ComponentRegistry::validate(&cfg).is_err());
    }

    #[test]
    fn rejects_family_integrator_mismatch() {
        let mut cfg = presets::linear_static();
        cfg.integrator = crate::config::IntegratorKind::StandardEigen;
        let err = ComponentRegistry::validate(&cfg).unwrap_err();
        assert!(err.to_string().contains("static"));
    }

    #[test]
    fn rejects_mismatched_soe_solver_pairing() {
        let mut cfg = presets::linear_static();
        cfg.soe = crate::config::SoeKind::BandGeneral;
        // solver stays DenseLu
        let err = ComponentRegistry::validate(&cfg).unwrap_err();
        assert!(err.to_string().contains("pair"));
    }

    #[test]
    fn rejects_eigen_with_lagrange_handler() {
        let mut cfg = presets::frequency_analysis(4);
        cfg.constraint_handler = crate::config::ConstraintHandlerKind::Lagrange;
        let err = ComponentRegistry::validate(&cfg).unwrap_err();
        assert!(err.to_string().contains("lagrange"));
    }

    #[test]
    fn rejects_dynamic_without_time_step() {
        let mut cfg = presets::newmark_transient(0.01);
        cfg.time_step = None;
        let err = ComponentRegistry::validate(&cfg).unwrap_err();
        assert!(err.to_string().contains("time step"));
    }
}
