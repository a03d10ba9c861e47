//! Named preset configurations.
//!
//! One parameterized builder plus these constructors replaces the catalog
//! of near-identical solution-procedure subclasses found in older codes:
//! each preset is a complete, validating [`SolutionStrategyConfig`] that a
//! caller can use as-is or tweak field by field.

use crate::config::{
    AlgorithmKind, AnalysisFamily, ConstraintHandlerKind, ConvergenceTestKind,
    ConvergenceTestSpec, IntegratorKind, LineSearchMethod, NumbererKind, SoeKind,
    SolutionStrategyConfig, SolverKind,
};

/// Default penalty weights for the penalty constraint handler.
const DEFAULT_ALPHA: f64 = 1e10;

fn static_base() -> SolutionStrategyConfig {
    SolutionStrategyConfig {
        constraint_handler: ConstraintHandlerKind::Plain,
        numberer: NumbererKind::ReverseCuthillMcKee,
        algorithm: AlgorithmKind::Linear,
        convergence_test: None,
        integrator: IntegratorKind::LoadControl {
            dlambda: 1.0,
            min_dlambda: 1.0,
            max_dlambda: 1.0,
        },
        soe: SoeKind::FullGeneral,
        solver: SolverKind::DenseLu,
        analysis: AnalysisFamily::Static,
        num_steps: 1,
        time_step: None,
    }
}

fn test(tol: f64, max_iter: usize) -> ConvergenceTestSpec {
    ConvergenceTestSpec {
        kind: ConvergenceTestKind::NormUnbalance,
        tolerance: tol,
        max_iter,
        print_flag: 0,
    }
}

/// Linear static solve in one load step.
pub fn linear_static() -> SolutionStrategyConfig {
    static_base()
}

/// Linear static with the penalty constraint handler.
pub fn penalty_linear_static() -> SolutionStrategyConfig {
    SolutionStrategyConfig {
        constraint_handler: ConstraintHandlerKind::Penalty {
            alpha_sp: DEFAULT_ALPHA,
            alpha_mp: DEFAULT_ALPHA,
        },
        ..static_base()
    }
}

/// Newton-Raphson static solve under load control.
pub fn newton_raphson_static(tol: f64, max_iter: usize) -> SolutionStrategyConfig {
    SolutionStrategyConfig {
        algorithm: AlgorithmKind::NewtonRaphson,
        convergence_test: Some(test(tol, max_iter)),
        ..static_base()
    }
}

/// Modified Newton static solve (tangent formed once per step).
pub fn modified_newton_static(tol: f64, max_iter: usize) -> SolutionStrategyConfig {
    SolutionStrategyConfig {
        algorithm: AlgorithmKind::ModifiedNewton,
        convergence_test: Some(test(tol, max_iter)),
        ..static_base()
    }
}

/// Newton with a regula-falsi line search.
pub fn newton_line_search_static(tol: f64, max_iter: usize) -> SolutionStrategyConfig {
    SolutionStrategyConfig {
        algorithm: AlgorithmKind::NewtonLineSearch {
            method: LineSearchMethod::RegulaFalsi,
        },
        convergence_test: Some(test(tol, max_iter)),
        ..static_base()
    }
}

/// Krylov-accelerated modified Newton.
pub fn krylov_newton_static(tol: f64, max_iter: usize, max_dim: usize) -> SolutionStrategyConfig {
    SolutionStrategyConfig {
        algorithm: AlgorithmKind::KrylovNewton { max_dim },
        convergence_test: Some(test(tol, max_iter)),
        ..static_base()
    }
}

/// Newton-Raphson under displacement control of one (node, dof).
pub fn displacement_control_static(
    node: usize,
    dof: usize,
    increment: f64,
) -> SolutionStrategyConfig {
    SolutionStrategyConfig {
        algorithm: AlgorithmKind::NewtonRaphson,
        convergence_test: Some(test(1e-8, 25)),
        integrator: IntegratorKind::DisplacementControl {
            node,
            dof,
            increment,
        },
        ..static_base()
    }
}

/// Newton-Raphson under arc-length continuation.
pub fn arc_length_static(radius: f64) -> SolutionStrategyConfig {
    SolutionStrategyConfig {
        algorithm: AlgorithmKind::NewtonRaphson,
        convergence_test: Some(test(1e-8, 25)),
        integrator: IntegratorKind::ArcLength { radius, alpha: 1.0 },
        ..static_base()
    }
}

/// Newmark average-acceleration direct time integration.
pub fn newmark_transient(dt: f64) -> SolutionStrategyConfig {
    SolutionStrategyConfig {
        constraint_handler: ConstraintHandlerKind::Transformation,
        algorithm: AlgorithmKind::NewtonRaphson,
        convergence_test: Some(test(1e-8, 25)),
        integrator: IntegratorKind::newmark_average_acceleration(),
        analysis: AnalysisFamily::DirectDynamic,
        num_steps: 10,
        time_step: Some(dt),
        ..static_base()
    }
}

/// TRBDF2 composite direct time integration.
pub fn trbdf2_transient(dt: f64) -> SolutionStrategyConfig {
    SolutionStrategyConfig {
        integrator: IntegratorKind::TRBDF2,
        ..newmark_transient(dt)
    }
}

/// TRBDF3 composite direct time integration.
pub fn trbdf3_transient(dt: f64) -> SolutionStrategyConfig {
    SolutionStrategyConfig {
        integrator: IntegratorKind::TRBDF3,
        ..newmark_transient(dt)
    }
}

/// Natural-frequency extraction of `num_modes` modes.
pub fn frequency_analysis(num_modes: usize) -> SolutionStrategyConfig {
    SolutionStrategyConfig {
        integrator: IntegratorKind::StandardEigen,
        soe: SoeKind::FullGenEigen,
        solver: SolverKind::FullGenEigenSolver,
        analysis: AnalysisFamily::Modal,
        num_steps: num_modes,
        ..static_base()
    }
}

/// Stiffness-spectrum extraction for ill-conditioning detection.
pub fn ill_conditioning(num_modes: usize) -> SolutionStrategyConfig {
    SolutionStrategyConfig {
        integrator: IntegratorKind::IllConditioning,
        soe: SoeKind::FullGenEigen,
        solver: SolverKind::FullGenEigenSolver,
        analysis: AnalysisFamily::IllConditioning,
        num_steps: num_modes,
        ..static_base()
    }
}

/// Configuration pair for [`LinearBucklingAnalysis`]: a one-step linear
/// static part and the coupled eigen part.
///
/// [`LinearBucklingAnalysis`]: crate::buckling::LinearBucklingAnalysis
pub fn linear_buckling_pair() -> (SolutionStrategyConfig, SolutionStrategyConfig) {
    let static_cfg = linear_static();
    let eigen_cfg = SolutionStrategyConfig {
        integrator: IntegratorKind::LinearBuckling,
        soe: SoeKind::FullGenEigen,
        solver: SolverKind::FullGenEigenSolver,
        analysis: AnalysisFamily::LinearBuckling,
        num_steps: 1,
        ..static_base()
    };
    (static_cfg, eigen_cfg)
}
