//! Batch execution of named load combinations.
//!
//! The runner iterates combinations strictly in the caller-supplied order.
//! A combination whose numeric solve fails is logged and recorded, and the
//! batch continues — aborting on first failure is an explicit opt-in,
//! never the default. Structural (configuration/setup) failures are
//! different: they are surfaced before the first combination is attempted,
//! and if one appears mid-batch it is recorded with the fatal status code
//! and stops the run.

use serde::{Deserialize, Serialize};
use tangent_model::Domain;

use crate::error::{Result, SolveStatus};
use crate::strategy::{SolutionStrategy, SolveOptions};

/// Outcome of one combination. Created by the runner, never mutated after
/// creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinationResult {
    pub name: String,
    pub status: SolveStatus,
    /// Committed displacements on success.
    pub displacements: Option<Vec<f64>>,
    /// Nodal reactions on success, when requested.
    pub reactions: Option<Vec<f64>>,
}

impl CombinationResult {
    pub fn status_code(&self) -> i32 {
        self.status.code()
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Ordered results of a batch run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub results: Vec<CombinationResult>,
}

impl BatchReport {
    pub fn get(&self, name: &str) -> Option<&CombinationResult> {
        self.results.iter().find(|r| r.name == name)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(|r| r.is_success())
    }

    pub fn failed_names(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| !r.is_success())
            .map(|r| r.name.as_str())
            .collect()
    }
}

pub struct CombinationRunner {
    names: Vec<String>,
    abort_on_failure: bool,
    options: SolveOptions,
}

impl CombinationRunner {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            abort_on_failure: false,
            options: SolveOptions::default(),
        }
    }

    /// Stop after the first failed combination instead of continuing. Off
    /// by default.
    pub fn abort_on_failure(mut self, abort: bool) -> Self {
        self.abort_on_failure = abort;
        self
    }

    pub fn options(mut self, options: SolveOptions) -> Self {
        self.options = options;
        self
    }

    /// Run every combination through `solve_combination`, in order.
    pub fn run(&self, strategy: &mut SolutionStrategy, domain: &mut Domain) -> Result<BatchReport> {
        // Structural problems surface before any combination is attempted.
        if !strategy.is_set_up() {
            strategy.setup(domain)?;
        }

        let mut report = BatchReport::default();
        for name in &self.names {
            match strategy.solve_combination(domain, name, self.options) {
                Ok(status) if status.is_success() => {
                    report.results.push(CombinationResult {
                        name: name.clone(),
                        status,
                        displacements: Some(domain.committed_displacements().as_slice().to_vec()),
                        reactions: domain.reactions().map(|r| r.as_slice().to_vec()),
                    });
                }
                Ok(status) => {
                    log::warn!("combination '{name}' failed ({status}); continuing batch");
                    report.results.push(CombinationResult {
                        name: name.clone(),
                        status,
                        displacements: None,
                        reactions: None,
                    });
                    if self.abort_on_failure {
                        log::warn!("abort-on-failure set; stopping after '{name}'");
                        break;
                    }
                }
                Err(err) => {
                    log::error!("combination '{name}': {err}");
                    report.results.push(CombinationResult {
                        name: name.clone(),
                        status: SolveStatus::Fatal,
                        displacements: None,
                        reactions: None,
                    });
                    break;
                }
            }
        }
        Ok(report)
    }
}
