// Solver adapters module

pub mod coin_cbc_solver;
pub mod factory;
pub mod highs_solver;

pub use coin_cbc_solver::CoinCbcSolver;
pub use factory::SolverFactory;
pub use highs_solver::HighsSolver;

use crate::domain::{OptimizationProblem, Solution, SolutionStatus, SolverStatistics};

/// Largest row or bound violation accepted for an incumbent returned without
/// a proof of optimality.
const INCUMBENT_TOLERANCE: f64 = 1e-3;

/// Wraps the values of a run that stopped early. Values that do not satisfy
/// the model are dropped, so the caller sees a solution without values.
fn incumbent(
    problem: &OptimizationProblem,
    status: SolutionStatus,
    values: Vec<f64>,
    statistics: SolverStatistics,
) -> Solution {
    if problem.accepts(&values, INCUMBENT_TOLERANCE) {
        let objective = problem.objective_value(&values);
        Solution::with_values(status, objective, values)
            .with_statistics(statistics)
            .with_message(format!(
                "{}: returning the best incumbent for '{}'",
                status, problem.name
            ))
    } else {
        Solution::new(
            status,
            format!("{}: no feasible incumbent was found", status),
        )
        .with_statistics(statistics)
    }
}
