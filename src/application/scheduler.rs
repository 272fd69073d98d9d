use serde::Serialize;
use std::time::Instant;
use tracing::{info, warn};

use super::error::{Result, SchedulerError};
use super::extractor::{ResultExtractor, ScheduleStatistics, ScheduleValidator, ValidationReport};
use super::feasibility::{FeasibilityAnalyzer, FeasibilityReport};
use super::formulation::{Formulation, ModelSummary};
use crate::config::SchedulerConfig;
use crate::domain::{
    Instance, OptimizationProblem, Schedule, SolutionStatus, SolverError, SolverService,
};

/// A schedule read back from a solver, with its independent checks.
#[derive(Debug, Clone, Serialize)]
pub struct SolvedSchedule {
    pub status: SolutionStatus,
    pub objective_value: Option<f64>,
    pub schedule: Schedule,
    pub validation: ValidationReport,
    pub statistics: ScheduleStatistics,
    pub summary: ModelSummary,
}

/// Result of [`SurgeryScheduler::solve`].
#[derive(Debug, Clone)]
pub enum SolveOutcome {
    /// Every surgery scheduled. Whether optimality was proven is in the status.
    Complete(SolvedSchedule),
    /// Fewer surgeries scheduled than the instance holds.
    Partial(SolvedSchedule),
    /// No assignment. The assembled model is returned as the solver saw it.
    NoSolution {
        status: SolutionStatus,
        message: String,
        problem: Box<OptimizationProblem>,
    },
}

impl SolveOutcome {
    pub fn solved(&self) -> Option<&SolvedSchedule> {
        match self {
            SolveOutcome::Complete(s) | SolveOutcome::Partial(s) => Some(s),
            SolveOutcome::NoSolution { .. } => None,
        }
    }

    pub fn status(&self) -> SolutionStatus {
        match self {
            SolveOutcome::Complete(s) | SolveOutcome::Partial(s) => s.status,
            SolveOutcome::NoSolution { status, .. } => *status,
        }
    }

    /// True for a complete schedule that passed validation.
    pub fn is_accepted(&self) -> bool {
        matches!(self, SolveOutcome::Complete(s) if s.validation.is_valid())
    }
}

/// Runs feasibility analysis, formulation, solving and validation on one
/// instance.
pub struct SurgeryScheduler<'a> {
    instance: &'a Instance,
    config: &'a SchedulerConfig,
}

impl<'a> SurgeryScheduler<'a> {
    pub fn new(instance: &'a Instance, config: &'a SchedulerConfig) -> Self {
        Self { instance, config }
    }

    pub fn analyze_feasibility(&self) -> Result<FeasibilityReport> {
        FeasibilityAnalyzer::new(self.instance, self.config).analyze()
    }

    pub fn formulate(&self) -> Result<Formulation> {
        Formulation::build(self.instance, self.config)
    }

    pub fn solve(
        &self,
        solver: &dyn SolverService,
    ) -> std::result::Result<SolveOutcome, SchedulerError> {
        let formulation = self.formulate()?;
        self.solve_formulation(formulation, solver)
    }

    pub fn solve_formulation(
        &self,
        formulation: Formulation,
        solver: &dyn SolverService,
    ) -> std::result::Result<SolveOutcome, SchedulerError> {
        if formulation.problem.is_mixed_integer() && !solver.supports_mip() {
            return Err(SolverError::SolverNotAvailable(format!(
                "{} cannot solve mixed-integer models",
                solver.name()
            ))
            .into());
        }
        solver.validate(&formulation.problem)?;

        info!(solver = solver.name(), "solving");
        let started = Instant::now();
        let solution = match solver.solve(&formulation.problem) {
            Ok(solution) => solution,
            Err(e) => {
                warn!(error = %e, "solver failed");
                return Ok(SolveOutcome::NoSolution {
                    status: SolutionStatus::Error,
                    message: e.to_string(),
                    problem: Box::new(formulation.problem),
                });
            }
        };
        info!(
            status = %solution.status,
            objective = ?solution.objective_value,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "solver finished"
        );

        if !solution.has_values() {
            return Ok(SolveOutcome::NoSolution {
                status: solution.status,
                message: solution.message,
                problem: Box::new(formulation.problem),
            });
        }

        let schedule = ResultExtractor::new(self.instance, &formulation).extract(&solution);
        let validation =
            ScheduleValidator::new(self.instance, self.config, &formulation).validate(&schedule)?;
        let statistics = ScheduleStatistics::compute(&schedule, self.instance, self.config);

        let complete = schedule.is_complete();
        let solved = SolvedSchedule {
            status: solution.status,
            objective_value: solution.objective_value,
            schedule,
            validation,
            statistics,
            summary: formulation.summary,
        };
        Ok(if complete {
            SolveOutcome::Complete(solved)
        } else {
            SolveOutcome::Partial(solved)
        })
    }
}
