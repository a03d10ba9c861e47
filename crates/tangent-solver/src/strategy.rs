//! Solution strategy lifecycle: configure, setup, solve, solve-combination.
//!
//! `setup()` builds the object graph all-or-nothing in dependency order:
//! model wrapper (numberer + constraint handler), solution algorithm with
//! its convergence test, system of equations + solver, analysis, and the
//! integrator last — displacement control can only resolve its controlling
//! DOF once the wrapper and live domain exist. `clear()` drops the whole
//! graph; a strategy is never observable in a partially built state.
//!
//! `solve_combination` is the isolation contract of the engine: reset the
//! model, attach one combination, solve, and detach on every exit path —
//! numeric failure and panic unwinding included — via a drop guard over the
//! attachment.

use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tangent_model::Domain;

use crate::analysis::{Analysis, SoeHandle};
use crate::components::algorithm::SolutionAlgorithm;
use crate::components::integrator::Integrator;
use crate::components::soe::EigenPairs;
use crate::components::wrapper::ModelWrapper;
use crate::config::SolutionStrategyConfig;
use crate::error::{Result, SolveStatus};
use crate::registry::ComponentRegistry;

/// Per-solve options mirroring the reaction-recovery parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolveOptions {
    pub calc_reactions: bool,
    pub include_inertia: bool,
    pub reaction_tol: f64,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            calc_reactions: false,
            include_inertia: false,
            reaction_tol: 1e-6,
        }
    }
}

impl SolveOptions {
    pub fn with_reactions() -> Self {
        Self {
            calc_reactions: true,
            ..Default::default()
        }
    }
}

/// The built object graph. Exactly one of each component; the wrapper sits
/// behind `Rc` solely so the linear buckling composite can share it between
/// its two sub-graphs.
#[derive(Debug)]
pub struct SolutionGraph {
    pub(crate) wrapper: Rc<ModelWrapper>,
    pub(crate) algorithm: SolutionAlgorithm,
    pub(crate) soe: SoeHandle,
    pub(crate) analysis: Analysis,
    pub(crate) integrator: Integrator,
}

#[derive(Debug)]
pub struct SolutionStrategy {
    config: SolutionStrategyConfig,
    graph: Option<SolutionGraph>,
    last_eigenpairs: Option<EigenPairs>,
}

impl SolutionStrategy {
    pub fn new(config: SolutionStrategyConfig) -> Self {
        Self {
            config,
            graph: None,
            last_eigenpairs: None,
        }
    }

    /// Store a new configuration. Pure data assignment: nothing is built,
    /// and any previously built graph is dropped.
    pub fn configure(&mut self, config: SolutionStrategyConfig) {
        self.config = config;
        self.clear();
    }

    pub fn config(&self) -> &SolutionStrategyConfig {
        &self.config
    }

    pub fn is_set_up(&self) -> bool {
        self.graph.is_some()
    }

    /// Shared handle to the built model wrapper, if any.
    pub fn wrapper(&self) -> Option<Rc<ModelWrapper>> {
        self.graph.as_ref().map(|g| Rc::clone(&g.wrapper))
    }

    /// Eigenpairs from the most recent eigen solve.
    pub fn eigenpairs(&self) -> Option<&EigenPairs> {
        self.last_eigenpairs.as_ref()
    }

    /// Build the object graph in dependency order.
    pub fn setup(&mut self, domain: &Domain) -> Result<()> {
        self.setup_with_wrapper(domain, None)
    }

    /// Build the graph, optionally reusing an existing model wrapper
    /// instead of constructing one (the linear buckling composite passes
    /// its static part's wrapper here so both parts number the same
    /// equations).
    pub(crate) fn setup_with_wrapper(
        &mut self,
        domain: &Domain,
        shared: Option<Rc<ModelWrapper>>,
    ) -> Result<()> {
        self.clear();
        ComponentRegistry::validate(&self.config)?;

        let wrapper = match shared {
            Some(w) => w,
            None => ComponentRegistry::build_wrapper(&self.config, domain)?,
        };
        let algorithm = ComponentRegistry::build_algorithm(&self.config)?;
        let soe = if self.config.analysis.is_eigen() {
            SoeHandle::Eigen(ComponentRegistry::build_eigen_soe(&self.config, wrapper.neq()))
        } else {
            SoeHandle::Linear(ComponentRegistry::build_linear_soe(&self.config, wrapper.neq()))
        };
        let analysis = Analysis::new(self.config.analysis, Rc::clone(&wrapper));
        // Built last: some integrator kinds validate against the live
        // domain through the wrapper the analysis is bound to.
        let integrator = ComponentRegistry::build_integrator(&self.config, domain, &wrapper)?;

        self.graph = Some(SolutionGraph {
            wrapper,
            algorithm,
            soe,
            analysis,
            integrator,
        });
        Ok(())
    }

    /// Drop all built components. Idempotent; safe on a never-configured
    /// or never-built strategy.
    pub fn clear(&mut self) {
        self.graph = None;
        self.last_eigenpairs = None;
    }

    /// Install an externally assembled graph (the linear buckling composite
    /// builds its eigen sub-graph piecewise around a shared wrapper).
    pub(crate) fn install_graph(&mut self, graph: SolutionGraph) {
        self.graph = Some(graph);
        self.last_eigenpairs = None;
    }

    /// Remove any attached combination and revert the model to its initial
    /// committed state.
    pub fn reset_load_case(&self, domain: &mut Domain) {
        domain.revert_to_start();
    }

    /// Advance the model by `num_steps` steps (for the eigen families the
    /// count is the number of requested eigenpairs — see
    /// [`Analysis::analyze`](crate::analysis::Analysis::analyze)).
    ///
    /// Builds the graph first if `setup()` has not run. A numeric failure
    /// is logged and returned as a status, never raised.
    pub fn solve(
        &mut self,
        domain: &mut Domain,
        num_steps: usize,
        options: SolveOptions,
    ) -> Result<SolveStatus> {
        if self.graph.is_none() {
            self.setup(domain)?;
        }
        let graph = self.graph.as_mut().expect("graph built above");

        let outcome = graph.analysis.analyze(
            domain,
            &mut graph.algorithm,
            &mut graph.integrator,
            &mut graph.soe,
            num_steps,
        )?;
        self.last_eigenpairs = outcome.eigenpairs;

        if !outcome.status.is_success() {
            log::warn!(
                "{} analysis failed: {}",
                self.config.analysis.name(),
                outcome.status
            );
            return Ok(outcome.status);
        }
        if options.calc_reactions {
            domain.compute_nodal_reactions(options.include_inertia, options.reaction_tol);
        }
        Ok(SolveStatus::Success)
    }

    /// Solve one named combination in isolation.
    ///
    /// The combination's presence in the domain is a scoped resource: it is
    /// attached after a full reset and detached on every exit path, whether
    /// the solve succeeds, fails numerically, errors structurally, or
    /// panics.
    pub fn solve_combination(
        &mut self,
        domain: &mut Domain,
        name: &str,
        options: SolveOptions,
    ) -> Result<SolveStatus> {
        self.reset_load_case(domain);
        let num_steps = self.config.num_steps;

        let mut guard = AttachedCombination::attach(domain, name)?;
        let result = self.solve(guard.domain(), num_steps, options);
        drop(guard);

        let status = result?;
        if !status.is_success() {
            log::warn!("combination '{name}': {status}");
        }
        Ok(status)
    }
}

/// Drop guard tying a combination's attachment to a scope.
pub(crate) struct AttachedCombination<'a> {
    domain: &'a mut Domain,
    name: String,
}

impl<'a> AttachedCombination<'a> {
    pub(crate) fn attach(domain: &'a mut Domain, name: &str) -> Result<Self> {
        domain.attach_combination(name)?;
        Ok(Self {
            domain,
            name: name.to_string(),
        })
    }

    pub(crate) fn domain(&mut self) -> &mut Domain {
        self.domain
    }
}

impl Drop for AttachedCombination<'_> {
    fn drop(&mut self) {
        self.domain.detach_combination(&self.name);
    }
}
