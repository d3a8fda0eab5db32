//! Orchestrator
//!
//! For every enumerated point, in order: reset the backend, execute the
//! scenario, record the classified result. Points never overlap. A reset
//! failure or a runner that cannot set itself up aborts the run; a failed
//! scenario step is only that point's BUG.

use crate::error::{HarnessError, Result};
use crate::executor::ScenarioExecutor;
use crate::lifecycle::BackendLifecycle;
use crate::matrix::MatrixSpec;
use crate::report::MatrixReport;
use tracing::{info, warn};
use txmatrix_core::{ScenarioResult, Verdict};

/// Drives a matrix through a lifecycle and an executor
pub struct Orchestrator<'a> {
    lifecycle: &'a dyn BackendLifecycle,
    executor: &'a dyn ScenarioExecutor,
}

impl<'a> Orchestrator<'a> {
    /// Orchestrator over the given collaborators
    pub fn new(lifecycle: &'a dyn BackendLifecycle, executor: &'a dyn ScenarioExecutor) -> Self {
        Self {
            lifecycle,
            executor,
        }
    }

    /// Run every point of `spec`
    pub fn run(&self, spec: &MatrixSpec) -> Result<MatrixReport> {
        let mut results: Vec<ScenarioResult> = Vec::new();
        let total = spec.len();
        info!(variant = %spec.variant(), points = total, "matrix run started");

        for (index, point) in spec.points().enumerate() {
            if let Err(source) = self.lifecycle.reset() {
                return Err(HarnessError::Setup {
                    point,
                    source,
                    completed: results,
                });
            }
            let result = match self.executor.execute(&point) {
                Ok(result) => result,
                Err(source) => {
                    return Err(HarnessError::Setup {
                        point,
                        source,
                        completed: results,
                    })
                }
            };
            match result.verdict {
                Verdict::Pass => info!(n = index + 1, total, %point, "PASS"),
                Verdict::Bug => {
                    warn!(n = index + 1, total, %point, label = %result.raw_label, "BUG")
                }
            }
            results.push(result);
        }

        let report = MatrixReport::new(spec.variant(), spec.axes(), results);
        info!(summary = %report.summary, "matrix run finished");
        Ok(report)
    }
}
