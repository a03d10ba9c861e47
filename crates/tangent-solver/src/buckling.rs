//! Linear buckling composite: a static strategy coupled to an eigen one.
//!
//! The two sub-strategies must number the same equations, so the eigen
//! sub-graph never builds its own model wrapper: it holds a shared handle
//! to the static part's. Setup is a fixed-order state machine
//! (`Uninitialized -> StaticPartBuilt -> EigenPartBuilt -> AnalysisBound ->
//! Solved`), with the eigen integrator built last of all.
//!
//! `solve` runs the static sub-problem, then extracts buckling eigenpairs
//! about the resulting tangent state WITHOUT gating on the static
//! outcome: the static status is surfaced in the results so the caller can
//! judge what state the modes were extracted about.

use std::rc::Rc;

use nalgebra::{DMatrix, DVector};
use tangent_model::Domain;

use crate::analysis::{Analysis, SoeHandle};
use crate::components::wrapper::ModelWrapper;
use crate::config::{AnalysisFamily, IntegratorKind, SolutionStrategyConfig};
use crate::error::{Result, SolveStatus, StrategyError};
use crate::registry::ComponentRegistry;
use crate::strategy::{SolutionGraph, SolutionStrategy, SolveOptions};

const STATIC_PART: &str = "static";
const EIGEN_PART: &str = "eigen";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BucklingState {
    Uninitialized,
    StaticPartBuilt,
    EigenPartBuilt,
    AnalysisBound,
    Solved,
}

/// The combined analysis binding, referencing both sub-strategies by name.
#[derive(Debug, Clone, Copy)]
struct CompositeBinding {
    static_part: &'static str,
    eigen_part: &'static str,
}

pub struct BucklingResults {
    /// Outcome of the static sub-problem the modes were extracted about.
    /// Not a gate: modes are present even when this is a failure.
    pub static_status: SolveStatus,
    /// Outcome of the eigen extraction itself.
    pub eigen_status: SolveStatus,
    /// Critical load factors, ascending.
    pub eigenvalues: Vec<f64>,
    /// Buckling mode shapes, one column per mode, full DOF space.
    pub mode_shapes: DMatrix<f64>,
}

impl BucklingResults {
    pub fn num_modes(&self) -> usize {
        self.eigenvalues.len()
    }

    pub fn mode_shape(&self, mode: usize) -> Option<DVector<f64>> {
        if mode >= self.num_modes() {
            return None;
        }
        Some(self.mode_shapes.column(mode).into())
    }
}

#[derive(Debug)]
pub struct LinearBucklingAnalysis {
    static_part: SolutionStrategy,
    eigen_part: SolutionStrategy,
    binding: Option<CompositeBinding>,
    state: BucklingState,
}

impl LinearBucklingAnalysis {
    pub fn new(
        static_cfg: SolutionStrategyConfig,
        eigen_cfg: SolutionStrategyConfig,
    ) -> Result<Self> {
        if static_cfg.analysis != AnalysisFamily::Static {
            return Err(StrategyError::configuration(
                "analysis",
                format!(
                    "buckling composite needs a static first part, got {}",
                    static_cfg.analysis.name()
                ),
            ));
        }
        if eigen_cfg.analysis != AnalysisFamily::LinearBuckling
            || !matches!(eigen_cfg.integrator, IntegratorKind::LinearBuckling)
        {
            return Err(StrategyError::configuration(
                "analysis",
                "buckling composite needs a linear-buckling eigen part",
            ));
        }
        Ok(Self {
            static_part: SolutionStrategy::new(static_cfg),
            eigen_part: SolutionStrategy::new(eigen_cfg),
            binding: None,
            state: BucklingState::Uninitialized,
        })
    }

    pub fn state(&self) -> BucklingState {
        self.state
    }

    pub fn static_wrapper(&self) -> Option<Rc<ModelWrapper>> {
        self.static_part.wrapper()
    }

    pub fn eigen_wrapper(&self) -> Option<Rc<ModelWrapper>> {
        self.eigen_part.wrapper()
    }

    /// Whether both parts hold the identical wrapper object.
    pub fn shares_model_wrapper(&self) -> bool {
        match (self.static_wrapper(), self.eigen_wrapper()) {
            (Some(a), Some(b)) => Rc::ptr_eq(&a, &b),
            _ => false,
        }
    }

    /// Build both sub-graphs in the fixed order. All-or-nothing: a failure
    /// anywhere rolls the composite back to `Uninitialized`.
    pub fn setup(&mut self, domain: &Domain) -> Result<()> {
        self.clear();
        match self.setup_inner(domain) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.clear();
                Err(err)
            }
        }
    }

    fn setup_inner(&mut self, domain: &Domain) -> Result<()> {
        self.static_part.setup(domain)?;
        self.state = BucklingState::StaticPartBuilt;

        ComponentRegistry::validate(self.eigen_part.config())?;
        let wrapper = self
            .static_part
            .wrapper()
            .expect("static part was just built");
        let algorithm = ComponentRegistry::build_algorithm(self.eigen_part.config())?;
        let soe = SoeHandle::Eigen(ComponentRegistry::build_eigen_soe(
            self.eigen_part.config(),
            wrapper.neq(),
        ));
        self.state = BucklingState::EigenPartBuilt;

        let analysis = Analysis::new(self.eigen_part.config().analysis, Rc::clone(&wrapper));
        self.binding = Some(CompositeBinding {
            static_part: STATIC_PART,
            eigen_part: EIGEN_PART,
        });
        self.state = BucklingState::AnalysisBound;

        // The eigen integrator is built last of everything.
        let integrator =
            ComponentRegistry::build_integrator(self.eigen_part.config(), domain, &wrapper)?;
        self.eigen_part.install_graph(SolutionGraph {
            wrapper,
            algorithm,
            soe,
            analysis,
            integrator,
        });
        Ok(())
    }

    pub fn clear(&mut self) {
        self.static_part.clear();
        self.eigen_part.clear();
        self.binding = None;
        self.state = BucklingState::Uninitialized;
    }

    /// Run the static sub-problem on the currently applied loads, then
    /// extract `num_modes` buckling eigenpairs about the resulting state.
    pub fn solve(&mut self, domain: &mut Domain, num_modes: usize) -> Result<BucklingResults> {
        if self.state < BucklingState::AnalysisBound {
            self.setup(domain)?;
        }
        let binding = self.binding.expect("bound after setup");

        let static_steps = self.static_part.config().num_steps;
        let static_status =
            self.static_part
                .solve(domain, static_steps, SolveOptions::default())?;
        if !static_status.is_success() {
            log::warn!(
                "buckling composite: {} part reported {static_status}; extracting about the reached state",
                binding.static_part
            );
        }

        let eigen_status = self.eigen_part.solve(domain, num_modes, SolveOptions::default())?;
        let (eigenvalues, mode_shapes) = match self.eigen_part.eigenpairs() {
            Some(pairs) => (pairs.eigenvalues.clone(), pairs.eigenvectors.clone()),
            None => {
                log::warn!(
                    "buckling composite: {} part produced no eigenpairs",
                    binding.eigen_part
                );
                (Vec::new(), DMatrix::zeros(domain.num_dofs(), 0))
            }
        };

        self.state = BucklingState::Solved;
        Ok(BucklingResults {
            static_status,
            eigen_status,
            eigenvalues,
            mode_shapes,
        })
    }

    /// Convenience wrapper applying the combination-isolation discipline of
    /// [`SolutionStrategy::solve_combination`] around a buckling solve.
    pub fn solve_combination(
        &mut self,
        domain: &mut Domain,
        name: &str,
        num_modes: usize,
    ) -> Result<BucklingResults> {
        domain.revert_to_start();
        let mut guard = crate::strategy::AttachedCombination::attach(domain, name)?;
        self.solve(guard.domain(), num_modes)
    }
}
