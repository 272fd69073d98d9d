// Domain service interface for solving the assembled scheduling model
// Any MILP backend plugs in here; the formulation engine never talks to a solver directly

use super::models::{OptimizationProblem, Solution};

/// Error types for the solver service
#[derive(Debug, thiserror::Error)]
pub enum SolverError {
    #[error("Invalid problem: {0}")]
    InvalidProblem(String),

    #[error("Solver not available: {0}")]
    SolverNotAvailable(String),

    #[error("Solver execution failed: {0}")]
    ExecutionFailed(String),
}

pub type Result<T> = std::result::Result<T, SolverError>;

/// Contract for MILP solver backends.
///
/// A call to [`solve`](SolverService::solve) is single-shot and atomic: the
/// adapter runs to termination (optimality, time limit, infeasibility or
/// error) and only then hands back a [`Solution`].
pub trait SolverService: Send + Sync {
    /// Solve an optimization problem
    fn solve(&self, problem: &OptimizationProblem) -> Result<Solution>;

    /// Validate a problem without solving it
    fn validate(&self, problem: &OptimizationProblem) -> Result<()> {
        let mut errors = Vec::new();
        let num_vars = problem.num_variables();

        if num_vars == 0 {
            errors.push("Problem must have at least one variable".to_string());
        }

        for (var, _) in &problem.objective.expr.terms {
            if var.index() >= num_vars {
                errors.push(format!(
                    "Objective references variable {} but problem has {} variables",
                    var.index(),
                    num_vars
                ));
            }
        }

        for (i, constraint) in problem.constraints.iter().enumerate() {
            if let Some((var, _)) = constraint
                .terms
                .iter()
                .find(|(var, _)| var.index() >= num_vars)
            {
                errors.push(format!(
                    "Constraint {} '{}' references variable {} but problem has {} variables",
                    i,
                    constraint.name,
                    var.index(),
                    num_vars
                ));
            }
            if !constraint.bound.is_finite() {
                errors.push(format!(
                    "Constraint {} '{}' has non-finite bound {}",
                    i, constraint.name, constraint.bound
                ));
            }
        }

        for (i, var) in problem.variables.iter().enumerate() {
            if let Some(upper) = var.upper_bound {
                if var.lower_bound > upper {
                    errors.push(format!(
                        "Variable {} '{}' has lower bound ({}) > upper bound ({})",
                        i, var.name, var.lower_bound, upper
                    ));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SolverError::InvalidProblem(errors.join("; ")))
        }
    }

    /// Get the name of this solver backend
    fn name(&self) -> &str;

    /// Check if this solver supports mixed-integer programming
    fn supports_mip(&self) -> bool;
}
