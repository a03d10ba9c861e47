//! Analysis objects: the step/extract drivers bound to a built graph.
//!
//! An analysis is created during `setup()` and bound to the model wrapper
//! and solution algorithm; `analyze` advances the model by a number of
//! steps (static), steps of the configured size (transient), or extracts
//! eigenpairs (modal / buckling / ill-conditioning).

use std::rc::Rc;

use nalgebra::DMatrix;
use tangent_model::Domain;

use crate::components::algorithm::SolutionAlgorithm;
use crate::components::integrator::Integrator;
use crate::components::soe::{EigenPairs, EigenSystem, SystemOfEquations};
use crate::components::wrapper::ModelWrapper;
use crate::config::AnalysisFamily;
use crate::error::{Result, SolveStatus, StrategyError};

/// The one system-of-equations slot of a graph: linear for the stepping
/// families, a matrix pair for the eigen families.
#[derive(Debug)]
pub enum SoeHandle {
    Linear(SystemOfEquations),
    Eigen(EigenSystem),
}

pub struct AnalysisOutcome {
    pub status: SolveStatus,
    pub eigenpairs: Option<EigenPairs>,
}

#[derive(Debug)]
pub struct Analysis {
    family: AnalysisFamily,
    wrapper: Rc<ModelWrapper>,
}

impl Analysis {
    pub fn new(family: AnalysisFamily, wrapper: Rc<ModelWrapper>) -> Self {
        Self { family, wrapper }
    }

    pub fn family(&self) -> AnalysisFamily {
        self.family
    }

    /// Advance the model.
    ///
    /// `num_steps` is the number of load/time steps for the stepping
    /// families; for the eigen families the same count is the number of
    /// REQUESTED EIGENPAIRS, not steps — the dual meaning is part of the
    /// caller contract.
    pub fn analyze(
        &self,
        domain: &mut Domain,
        algorithm: &mut SolutionAlgorithm,
        integrator: &mut Integrator,
        soe: &mut SoeHandle,
        num_steps: usize,
    ) -> Result<AnalysisOutcome> {
        match self.family {
            AnalysisFamily::Static | AnalysisFamily::DirectDynamic => {
                let SoeHandle::Linear(system) = soe else {
                    return Err(StrategyError::setup(
                        "analysis",
                        "stepping analysis bound to an eigen system of equations",
                    ));
                };
                let status = self.run_steps(domain, algorithm, integrator, system, num_steps);
                Ok(AnalysisOutcome {
                    status,
                    eigenpairs: None,
                })
            }
            AnalysisFamily::Modal | AnalysisFamily::LinearBuckling | AnalysisFamily::IllConditioning => {
                let SoeHandle::Eigen(system) = soe else {
                    return Err(StrategyError::setup(
                        "analysis",
                        "eigen analysis bound to a linear system of equations",
                    ));
                };
                self.extract_modes(domain, integrator, system, num_steps)
            }
        }
    }

    fn run_steps(
        &self,
        domain: &mut Domain,
        algorithm: &mut SolutionAlgorithm,
        integrator: &mut Integrator,
        system: &mut SystemOfEquations,
        num_steps: usize,
    ) -> SolveStatus {
        for step in 1..=num_steps {
            if let Err(status) = integrator.new_step(domain, &self.wrapper, system) {
                log::warn!("{} step {step}: predictor failed: {status}", self.family.name());
                domain.revert_to_last_commit();
                return status;
            }
            loop {
                let status = match algorithm.solve_current_step(
                    domain,
                    &self.wrapper,
                    integrator,
                    system,
                ) {
                    Ok(status) => status,
                    Err(err) => {
                        // Structural failures at this depth indicate a bad
                        // graph; report as fatal rather than panicking.
                        log::error!("{} step {step}: {err}", self.family.name());
                        domain.revert_to_last_commit();
                        return SolveStatus::Fatal;
                    }
                };
                if !status.is_success() {
                    log::warn!("{} step {step}: {status}", self.family.name());
                    domain.revert_to_last_commit();
                    return status;
                }
                if !integrator.advance_stage(domain) {
                    break;
                }
            }
            integrator.commit_step(domain);
        }
        SolveStatus::Success
    }

    fn extract_modes(
        &self,
        domain: &mut Domain,
        integrator: &mut Integrator,
        system: &mut EigenSystem,
        num_modes: usize,
    ) -> Result<AnalysisOutcome> {
        let (a, b) = integrator.form_eigen_pair(domain, &self.wrapper)?;
        system.set_pair(a, b);
        let pairs = match system.solve(num_modes) {
            Ok(pairs) => pairs,
            Err(status) => {
                log::warn!("{} extraction failed: {status}", self.family.name());
                return Ok(AnalysisOutcome {
                    status,
                    eigenpairs: None,
                });
            }
        };

        // Expand mode shapes from equation space to full DOF space.
        let mut shapes = DMatrix::zeros(self.wrapper.num_dofs(), pairs.num_modes());
        for mode in 0..pairs.num_modes() {
            let phi_eq = pairs.eigenvectors.column(mode).into_owned();
            shapes.set_column(mode, &self.wrapper.expand_increment(&phi_eq));
        }
        Ok(AnalysisOutcome {
            status: SolveStatus::Success,
            eigenpairs: Some(EigenPairs {
                eigenvalues: pairs.eigenvalues,
                eigenvectors: shapes,
            }),
        })
    }
}
