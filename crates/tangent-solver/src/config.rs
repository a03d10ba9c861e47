//! Strategy configuration: the closed catalog of component kinds.
//!
//! Every numerical component the engine can build is named by one of the
//! enums below; an unknown kind is unrepresentable and an incompatible
//! parameter set for a kind is a variant that does not exist. The residual
//! cross-field compatibility rules (algorithm vs. test, family vs.
//! integrator, SOE vs. solver pairing) live in [`crate::registry`].

use serde::{Deserialize, Serialize};

/// How boundary conditions and multi-point constraints enter the system.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ConstraintHandlerKind {
    /// Eliminate homogeneous single-point constraints from the equations.
    Plain,
    /// Penalty springs on constrained DOFs and constraint rows.
    Penalty { alpha_sp: f64, alpha_mp: f64 },
    /// Lagrange multipliers appended to the system.
    Lagrange,
    /// Static condensation with prescribed-value lifting.
    Transformation,
}

impl ConstraintHandlerKind {
    pub fn name(&self) -> &'static str {
        match self {
            ConstraintHandlerKind::Plain => "plain",
            ConstraintHandlerKind::Penalty { .. } => "penalty",
            ConstraintHandlerKind::Lagrange => "lagrange",
            ConstraintHandlerKind::Transformation => "transformation",
        }
    }
}

/// DOF-to-equation numbering method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NumbererKind {
    /// Natural ordering.
    Plain,
    /// Reverse Cuthill-McKee bandwidth reduction.
    ReverseCuthillMcKee,
}

/// Line-search method for [`AlgorithmKind::NewtonLineSearch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineSearchMethod {
    Bisection,
    InitialInterpolated,
    RegulaFalsi,
    Secant,
}

/// Iteration scheme driving each solution step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AlgorithmKind {
    /// One tangent solve, no convergence test.
    Linear,
    /// Tangent re-formed every iteration.
    NewtonRaphson,
    /// Tangent formed once per step.
    ModifiedNewton,
    /// Newton with a scalar line search on each correction.
    NewtonLineSearch { method: LineSearchMethod },
    /// Modified Newton accelerated over a bounded Krylov subspace.
    KrylovNewton { max_dim: usize },
}

impl AlgorithmKind {
    pub fn name(&self) -> &'static str {
        match self {
            AlgorithmKind::Linear => "linear",
            AlgorithmKind::NewtonRaphson => "newton-raphson",
            AlgorithmKind::ModifiedNewton => "modified-newton",
            AlgorithmKind::NewtonLineSearch { .. } => "newton-line-search",
            AlgorithmKind::KrylovNewton { .. } => "krylov-newton",
        }
    }

    /// Whether the algorithm iterates and therefore needs a convergence test.
    pub fn is_iterative(&self) -> bool {
        !matches!(self, AlgorithmKind::Linear)
    }
}

/// Convergence criterion for iterative algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvergenceTestKind {
    /// Norm of the unbalanced-force vector.
    NormUnbalance,
    /// Norm of the displacement increment.
    NormDispIncr,
    /// Energy increment relative to the first iteration.
    RelativeEnergyIncr,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceTestSpec {
    pub kind: ConvergenceTestKind,
    pub tolerance: f64,
    pub max_iter: usize,
    /// 0 silent, 1 per-step summary, 2 per-iteration detail.
    pub print_flag: u8,
}

impl Default for ConvergenceTestSpec {
    fn default() -> Self {
        Self {
            kind: ConvergenceTestKind::NormUnbalance,
            tolerance: 1e-8,
            max_iter: 10,
            print_flag: 0,
        }
    }
}

/// Predictor/corrector stepping scheme.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum IntegratorKind {
    /// Proportional load stepping; lambda advances by `dlambda` each step,
    /// clamped to `[min_dlambda, max_dlambda]`.
    LoadControl {
        dlambda: f64,
        min_dlambda: f64,
        max_dlambda: f64,
    },
    /// Drive a chosen (node, dof) by a fixed increment per step.
    DisplacementControl {
        node: usize,
        dof: usize,
        increment: f64,
    },
    /// Linearized arc-length continuation.
    ArcLength { radius: f64, alpha: f64 },
    /// Newmark direct time integration.
    Newmark { gamma: f64, beta: f64 },
    /// Trapezoidal + BDF2 composite single-step scheme.
    TRBDF2,
    /// Two trapezoidal stages + BDF3 composite scheme.
    TRBDF3,
    /// Generalized eigenproblem K phi = lambda M phi.
    StandardEigen,
    /// Buckling eigenproblem K phi = -lambda Kg phi.
    LinearBuckling,
    /// Spectrum of K itself, for ill-conditioning detection.
    IllConditioning,
}

impl IntegratorKind {
    pub fn name(&self) -> &'static str {
        match self {
            IntegratorKind::LoadControl { .. } => "load-control",
            IntegratorKind::DisplacementControl { .. } => "displacement-control",
            IntegratorKind::ArcLength { .. } => "arc-length",
            IntegratorKind::Newmark { .. } => "newmark",
            IntegratorKind::TRBDF2 => "trbdf2",
            IntegratorKind::TRBDF3 => "trbdf3",
            IntegratorKind::StandardEigen => "standard-eigen",
            IntegratorKind::LinearBuckling => "linear-buckling",
            IntegratorKind::IllConditioning => "ill-conditioning",
        }
    }

    /// Load-control style standard Newmark parameters (gamma 1/2, beta 1/4).
    pub fn newmark_average_acceleration() -> Self {
        IntegratorKind::Newmark {
            gamma: 0.5,
            beta: 0.25,
        }
    }

    pub fn is_static(&self) -> bool {
        matches!(
            self,
            IntegratorKind::LoadControl { .. }
                | IntegratorKind::DisplacementControl { .. }
                | IntegratorKind::ArcLength { .. }
        )
    }

    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            IntegratorKind::Newmark { .. } | IntegratorKind::TRBDF2 | IntegratorKind::TRBDF3
        )
    }

    pub fn is_eigen(&self) -> bool {
        matches!(
            self,
            IntegratorKind::StandardEigen
                | IntegratorKind::LinearBuckling
                | IntegratorKind::IllConditioning
        )
    }
}

/// System-of-equations storage scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SoeKind {
    FullGeneral,
    BandGeneral,
    SparseGeneral,
    /// Symmetric banded pair for eigen extraction.
    SymBandEigen,
    /// Full generalized eigen pair.
    FullGenEigen,
}

impl SoeKind {
    pub fn name(&self) -> &'static str {
        match self {
            SoeKind::FullGeneral => "full-general",
            SoeKind::BandGeneral => "band-general",
            SoeKind::SparseGeneral => "sparse-general",
            SoeKind::SymBandEigen => "sym-band-eigen",
            SoeKind::FullGenEigen => "full-gen-eigen",
        }
    }

    pub fn is_eigen(&self) -> bool {
        matches!(self, SoeKind::SymBandEigen | SoeKind::FullGenEigen)
    }
}

/// Numeric method paired with an [`SoeKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolverKind {
    DenseLu,
    BandLu,
    SparseLu,
    SymBandEigenSolver,
    FullGenEigenSolver,
}

impl SolverKind {
    pub fn name(&self) -> &'static str {
        match self {
            SolverKind::DenseLu => "dense-lu",
            SolverKind::BandLu => "band-lu",
            SolverKind::SparseLu => "sparse-lu",
            SolverKind::SymBandEigenSolver => "sym-band-eigen",
            SolverKind::FullGenEigenSolver => "full-gen-eigen",
        }
    }
}

/// Which analysis object drives the solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisFamily {
    Static,
    DirectDynamic,
    Modal,
    LinearBuckling,
    IllConditioning,
}

impl AnalysisFamily {
    pub fn name(&self) -> &'static str {
        match self {
            AnalysisFamily::Static => "static",
            AnalysisFamily::DirectDynamic => "direct-dynamic",
            AnalysisFamily::Modal => "modal",
            AnalysisFamily::LinearBuckling => "linear-buckling",
            AnalysisFamily::IllConditioning => "ill-conditioning",
        }
    }

    pub fn is_eigen(&self) -> bool {
        matches!(
            self,
            AnalysisFamily::Modal | AnalysisFamily::LinearBuckling | AnalysisFamily::IllConditioning
        )
    }
}

/// Complete description of one solution strategy.
///
/// Pure data: constructing a config touches no registry and builds no
/// numeric object. `registry::validate` must accept it before `setup()`
/// builds anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionStrategyConfig {
    pub constraint_handler: ConstraintHandlerKind,
    pub numberer: NumbererKind,
    pub algorithm: AlgorithmKind,
    pub convergence_test: Option<ConvergenceTestSpec>,
    pub integrator: IntegratorKind,
    pub soe: SoeKind,
    pub solver: SolverKind,
    pub analysis: AnalysisFamily,
    /// Steps per `solve_combination` call. For the eigen families this is
    /// the number of requested eigenpairs.
    pub num_steps: usize,
    /// Time step, required for `DirectDynamic`.
    pub time_step: Option<f64>,
}
