// Application layer: the formulation engine and its orchestration

pub mod admissible;
pub mod big_m;
pub mod constraints;
pub mod durations;
pub mod error;
pub mod extractor;
pub mod feasibility;
pub mod formulation;
pub mod objective;
pub mod scheduler;
pub mod variables;

pub use admissible::{AdmissibleDomain, PreprocessStats};
pub use big_m::BigM;
pub use constraints::{family, ConstraintGenerator};
pub use durations::{buffered_duration, DurationTable};
pub use error::{FormulationError, SchedulerError};
pub use extractor::{
    verify_reliability, DayReliability, DayUsage, ResultExtractor, ScheduleStatistics,
    ScheduleValidator, SpecialtyUsage, ValidationReport, Violation,
};
pub use feasibility::{FeasibilityAnalyzer, FeasibilityReport, InfeasibilityReason};
pub use formulation::{Formulation, ModelSummary};
pub use objective::ObjectiveBuilder;
pub use scheduler::{SolveOutcome, SolvedSchedule, SurgeryScheduler};
pub use variables::{ComboGroups, ModelVariables};
