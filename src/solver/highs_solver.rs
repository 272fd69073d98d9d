// HiGHS adapter
// Translates the sparse scheduling model into a HiGHS row problem and back

use crate::domain::{
    models::{OptimizationProblem, Solution as DomainSolution, SolverStatistics},
    solver_service::{Result, SolverError, SolverService},
    value_objects::{
        ConstraintType, OptimizationType, SolutionStatus as DomainSolutionStatus, VariableType,
    },
};
use super::incumbent;
use highs::{HighsModelStatus, RowProblem, Sense};
use std::time::Instant;
use tracing::debug;

pub struct HighsSolver;

impl HighsSolver {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HighsSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl SolverService for HighsSolver {
    fn solve(&self, problem: &OptimizationProblem) -> Result<DomainSolution> {
        self.validate(problem)?;

        let start_time = Instant::now();
        let num_vars = problem.num_variables();

        let mut costs = vec![0.0; num_vars];
        for &(var, coeff) in &problem.objective.expr.terms {
            costs[var.index()] += coeff;
        }

        let mut pb = RowProblem::default();
        let cols: Vec<_> = problem
            .variables
            .iter()
            .zip(&costs)
            .map(|(var_def, &cost)| {
                let lower = var_def.lower_bound;
                match (var_def.variable_type, var_def.upper_bound) {
                    (VariableType::Binary, _) => pb.add_integer_column(cost, 0.0..=1.0),
                    (VariableType::Continuous, Some(upper)) => pb.add_column(cost, lower..=upper),
                    (VariableType::Continuous, None) => pb.add_column(cost, lower..),
                }
            })
            .collect();

        for constraint in &problem.constraints {
            let terms: Vec<_> = constraint
                .terms
                .iter()
                .map(|&(var, coeff)| (cols[var.index()], coeff))
                .collect();

            match constraint.constraint_type {
                ConstraintType::LessThanOrEqual => pb.add_row(..=constraint.bound, &terms),
                ConstraintType::Equal => pb.add_row(constraint.bound..=constraint.bound, &terms),
                ConstraintType::GreaterThanOrEqual => pb.add_row(constraint.bound.., &terms),
            };
        }

        let sense = if problem.objective.optimization_type == OptimizationType::Maximize {
            Sense::Maximise
        } else {
            Sense::Minimise
        };

        let mut model = pb.optimise(sense);
        let config = &problem.solver_config;
        model.set_option("output_flag", config.verbose);
        if let Some(seconds) = config.time_limit {
            model.set_option("time_limit", seconds);
        }
        if let Some(gap) = config.gap_tolerance {
            model.set_option("mip_rel_gap", gap);
        }

        let solved = model.solve();
        let statistics = SolverStatistics {
            solve_time_ms: start_time.elapsed().as_secs_f64() * 1000.0,
            num_variables: num_vars as u32,
            num_constraints: problem.constraints.len() as u32,
            num_binary_vars: problem.num_integer_variables() as u32,
        };

        let status = solved.status();
        debug!(?status, "HiGHS finished");

        match status {
            HighsModelStatus::Optimal => {
                let variable_values = solved.get_solution().columns().to_vec();
                let objective = problem.objective_value(&variable_values);
                Ok(DomainSolution::optimal(objective, variable_values)
                    .with_statistics(statistics)
                    .with_message(format!("Optimal solution found for '{}'", problem.name)))
            }
            HighsModelStatus::ReachedTimeLimit => {
                let variable_values = solved.get_solution().columns().to_vec();
                Ok(incumbent(
                    problem,
                    DomainSolutionStatus::TimeLimit,
                    variable_values,
                    statistics,
                ))
            }
            HighsModelStatus::Infeasible => Ok(DomainSolution::new(
                DomainSolutionStatus::Infeasible,
                "Problem is infeasible: no solution satisfies all constraints",
            )
            .with_statistics(statistics)),
            HighsModelStatus::Unbounded | HighsModelStatus::UnboundedOrInfeasible => {
                Ok(DomainSolution::new(
                    DomainSolutionStatus::Unbounded,
                    "Problem is unbounded: objective can be improved infinitely",
                )
                .with_statistics(statistics))
            }
            status => Err(SolverError::ExecutionFailed(format!(
                "HiGHS solver returned status: {:?}",
                status
            ))),
        }
    }

    fn name(&self) -> &str {
        "HiGHS"
    }

    fn supports_mip(&self) -> bool {
        true
    }
}
