// COIN-OR CBC adapter through good_lp
// Translates the sparse scheduling model into a good_lp problem and back

use crate::domain::{
    models::{OptimizationProblem, Solution as DomainSolution, SolverStatistics},
    solver_service::{Result, SolverError, SolverService},
    value_objects::{OptimizationType, SolutionStatus as DomainSolutionStatus, VariableType},
    ConstraintType,
};
use super::incumbent;
use good_lp::{
    solvers::coin_cbc, variable, variables, Expression, ResolutionError,
    Solution as GoodLpSolutionTrait, SolverModel, Variable as GoodLpVariable,
};
use std::time::Instant;
use tracing::debug;

pub struct CoinCbcSolver;

impl CoinCbcSolver {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CoinCbcSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl SolverService for CoinCbcSolver {
    fn solve(&self, problem: &OptimizationProblem) -> Result<DomainSolution> {
        self.validate(problem)?;

        let start_time = Instant::now();
        let num_vars = problem.num_variables();

        let mut vars = variables!();
        let lp_variables: Vec<GoodLpVariable> = problem
            .variables
            .iter()
            .map(|var_def| {
                let definition = match var_def.variable_type {
                    VariableType::Binary => variable().binary(),
                    VariableType::Continuous => {
                        let v = variable().min(var_def.lower_bound);
                        match var_def.upper_bound {
                            Some(upper) => v.max(upper),
                            None => v,
                        }
                    }
                };
                vars.add(definition.name(var_def.name.clone()))
            })
            .collect();

        // good_lp minimizes, so negate for maximization
        let is_maximize = problem.objective.optimization_type == OptimizationType::Maximize;
        let mut obj_expr: Expression = 0.into();
        for &(var, coeff) in &problem.objective.expr.terms {
            let c = if is_maximize { -coeff } else { coeff };
            obj_expr += c * lp_variables[var.index()];
        }

        let mut lp_model = vars.minimise(obj_expr).using(coin_cbc::coin_cbc);
        let config = &problem.solver_config;
        if let Some(seconds) = config.time_limit {
            lp_model.set_parameter("seconds", &seconds.to_string());
        }
        if let Some(gap) = config.gap_tolerance {
            lp_model.set_parameter("ratioGap", &gap.to_string());
        }
        lp_model.set_parameter("log", if config.verbose { "1" } else { "0" });

        for constraint in &problem.constraints {
            let mut lhs: Expression = 0.into();
            for &(var, coeff) in &constraint.terms {
                lhs += coeff * lp_variables[var.index()];
            }

            lp_model = match constraint.constraint_type {
                ConstraintType::LessThanOrEqual => lp_model.with(lhs.leq(constraint.bound)),
                ConstraintType::Equal => lp_model.with(lhs.eq(constraint.bound)),
                ConstraintType::GreaterThanOrEqual => lp_model.with(lhs.geq(constraint.bound)),
            };
        }

        let solution_result = lp_model.solve();
        let statistics = SolverStatistics {
            solve_time_ms: start_time.elapsed().as_secs_f64() * 1000.0,
            num_variables: num_vars as u32,
            num_constraints: problem.constraints.len() as u32,
            num_binary_vars: problem.num_integer_variables() as u32,
        };

        match solution_result {
            Ok(sol) => {
                let variable_values: Vec<f64> =
                    lp_variables.iter().map(|&var| sol.value(var)).collect();

                if sol.model().is_proven_optimal() {
                    let objective = problem.objective_value(&variable_values);
                    debug!(objective, "CBC finished with a proven optimum");
                    return Ok(DomainSolution::optimal(objective, variable_values)
                        .with_statistics(statistics)
                        .with_message(format!("Optimal solution found for '{}'", problem.name)));
                }

                let status = if sol.model().is_seconds_limit_reached() {
                    DomainSolutionStatus::TimeLimit
                } else {
                    DomainSolutionStatus::Feasible
                };
                debug!(%status, "CBC stopped before proving optimality");
                Ok(incumbent(problem, status, variable_values, statistics))
            }
            Err(ResolutionError::Infeasible) => Ok(DomainSolution::new(
                DomainSolutionStatus::Infeasible,
                "Problem is infeasible: no solution satisfies all constraints",
            )
            .with_statistics(statistics)),
            Err(ResolutionError::Unbounded) => Ok(DomainSolution::new(
                DomainSolutionStatus::Unbounded,
                "Problem is unbounded: objective can be improved infinitely",
            )
            .with_statistics(statistics)),
            Err(e) => Err(SolverError::ExecutionFailed(format!("{:?}", e))),
        }
    }

    fn name(&self) -> &str {
        "COIN-OR CBC"
    }

    fn supports_mip(&self) -> bool {
        true
    }
}
