// Input errors detected while formulating the model

/// Fatal problems with an instance or its risk parameters.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FormulationError {
    #[error("alpha_choices must contain at least one value")]
    EmptyAlphaChoices,

    #[error("alpha {alpha} is outside (0, 1); the buffered duration is undefined")]
    InvalidAlpha { alpha: f64 },

    #[error("day '{day}' has non-positive regular hours {hours}")]
    NonPositiveCapacity { day: String, hours: f64 },

    #[error("doctor '{doctor}' has negative capacity {minutes} on day '{day}'")]
    NegativeDoctorCapacity {
        doctor: String,
        day: String,
        minutes: f64,
    },

    #[error("surgery '{surgery}' has invalid duration (mu {mu}, sigma {sigma}) for room '{room}' and doctor '{doctor}'")]
    InvalidDuration {
        surgery: String,
        room: String,
        doctor: String,
        mu: f64,
        sigma: f64,
    },

    #[error("surgery '{surgery}' references unknown room '{room}'")]
    UnknownRoom { surgery: String, room: String },

    #[error("surgery '{surgery}' references unknown doctor '{doctor}'")]
    UnknownDoctor { surgery: String, doctor: String },

    #[error("surgery '{surgery}' has no admissible (room, doctor) combination")]
    NoAdmissibleCombination { surgery: String },

    #[error("no epsilon configured for day '{day}'")]
    MissingEpsilon { day: String },

    #[error("epsilon {epsilon} for day '{day}' is outside (0, 1)")]
    InvalidEpsilon { day: String, epsilon: f64 },

    #[error("duplicate {kind} id '{id}'")]
    DuplicateId { kind: &'static str, id: String },
}

pub type Result<T> = std::result::Result<T, FormulationError>;

/// Failures of a full analyze, formulate and solve run.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("formulation failed: {0}")]
    Formulation(#[from] FormulationError),

    #[error(transparent)]
    Solver(#[from] crate::domain::SolverError),
}
