use crate::domain::{solver_service::SolverService, value_objects::SolverBackend};
use crate::solver::{CoinCbcSolver, HighsSolver};
use std::sync::Arc;

/// Picks a solver adapter from the problem configuration
pub struct SolverFactory;

impl SolverFactory {
    /// Create a solver for a specific backend; `Auto` selects HiGHS
    pub fn create_from_backend(backend: SolverBackend) -> Arc<dyn SolverService> {
        match backend {
            SolverBackend::Auto | SolverBackend::Highs => Arc::new(HighsSolver::new()),
            SolverBackend::CoinCbc => Arc::new(CoinCbcSolver::new()),
        }
    }
}
