// Configuration: risk parameters, overtime policy and solver limits
pub mod config;

// Domain layer: instance entities, the solver-facing model and schedules
pub mod domain;

// Application layer: formulation engine, validation and orchestration
pub mod application;

// Solver adapters: concrete implementations of SolverService
#[cfg(feature = "solvers")]
pub mod solver;

// Re-export commonly used types
pub use config::{ConfigError, Epsilon, SchedulerConfig};

pub use domain::{
    Constraint, ConstraintType, Instance, ObjectiveFunction, OptimizationProblem,
    OptimizationType, Schedule, Solution, SolutionStatus, SolverError, SolverService, Variable,
    VariableType,
};

pub use application::{
    FeasibilityAnalyzer, FeasibilityReport, Formulation, FormulationError, SchedulerError,
    SolveOutcome, SurgeryScheduler,
};

#[cfg(feature = "solvers")]
pub use solver::{CoinCbcSolver, HighsSolver, SolverFactory};
