// Scheduler configuration, built in code or loaded from TOML

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::domain::SolverConfig;

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Allowed probability of violating a day's reliability requirement.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Epsilon {
    /// Same value for every day
    Global(f64),
    /// Value per day id
    PerDay(BTreeMap<String, f64>),
}

impl Epsilon {
    pub fn for_day(&self, day_id: &str) -> Option<f64> {
        match self {
            Epsilon::Global(value) => Some(*value),
            Epsilon::PerDay(values) => values.get(day_id).copied(),
        }
    }
}

impl From<f64> for Epsilon {
    fn from(value: f64) -> Self {
        Epsilon::Global(value)
    }
}

fn default_start_time_weight() -> f64 {
    0.001
}

fn default_reliability_tolerance() -> f64 {
    1e-6
}

fn default_preprocess() -> bool {
    true
}

/// Parameters of one scheduling run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SchedulerConfig {
    /// Discretized risk levels, each in (0, 1)
    pub alpha_choices: Vec<f64>,
    pub epsilon: Epsilon,
    /// Cost per minute of room overtime
    pub ot_cost_room: f64,
    /// Cost per minute of doctor overtime
    pub ot_cost_doc: f64,
    /// Room overtime cap per day, minutes
    pub max_ot_room: f64,
    /// Doctor overtime cap per day, minutes
    pub max_ot_doc: f64,
    /// Weight of the total-start-time tie-break term
    #[serde(default = "default_start_time_weight")]
    pub start_time_weight: f64,
    /// Slack below zero still accepted when re-verifying a solution
    #[serde(default = "default_reliability_tolerance")]
    pub reliability_tolerance: f64,
    /// Fix capacity-infeasible combinations to zero before building the model
    #[serde(default = "default_preprocess")]
    pub preprocess: bool,
    #[serde(default)]
    pub solver: SolverConfig,
}

impl SchedulerConfig {
    /// Creates a configuration with zero overtime costs and caps.
    pub fn new(alpha_choices: Vec<f64>, epsilon: impl Into<Epsilon>) -> Self {
        Self {
            alpha_choices,
            epsilon: epsilon.into(),
            ot_cost_room: 0.0,
            ot_cost_doc: 0.0,
            max_ot_room: 0.0,
            max_ot_doc: 0.0,
            start_time_weight: default_start_time_weight(),
            reliability_tolerance: default_reliability_tolerance(),
            preprocess: default_preprocess(),
            solver: SolverConfig::default(),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_file(path)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parses and validates a TOML document.
    ///
    /// ```
    /// use surgopt::config::{Epsilon, SchedulerConfig};
    ///
    /// let config = SchedulerConfig::from_toml_str(r#"
    ///     alpha_choices = [0.01, 0.05, 0.10]
    ///     epsilon = 0.25
    ///     ot_cost_room = 3.0
    ///     ot_cost_doc = 1.5
    ///     max_ot_room = 120
    ///     max_ot_doc = 60
    ///
    ///     [solver]
    ///     backend = "highs"
    ///     time_limit = 900
    /// "#).unwrap();
    ///
    /// assert_eq!(config.epsilon, Epsilon::Global(0.25));
    /// assert_eq!(config.solver.time_limit, Some(900.0));
    /// ```
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_overtime_costs(mut self, room: f64, doctor: f64) -> Self {
        self.ot_cost_room = room;
        self.ot_cost_doc = doctor;
        self
    }

    pub fn with_overtime_caps(mut self, room: f64, doctor: f64) -> Self {
        self.max_ot_room = room;
        self.max_ot_doc = doctor;
        self
    }

    pub fn with_start_time_weight(mut self, weight: f64) -> Self {
        self.start_time_weight = weight;
        self
    }

    pub fn with_reliability_tolerance(mut self, tolerance: f64) -> Self {
        self.reliability_tolerance = tolerance;
        self
    }

    pub fn with_preprocessing(mut self, enabled: bool) -> Self {
        self.preprocess = enabled;
        self
    }

    pub fn with_solver(mut self, solver: SolverConfig) -> Self {
        self.solver = solver;
        self
    }

    /// Checks weights, caps and solver limits.
    ///
    /// Alpha and epsilon ranges are checked against the instance when the
    /// model is formulated, where the offending day or value can be named.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_negative = [
            ("ot_cost_room", self.ot_cost_room),
            ("ot_cost_doc", self.ot_cost_doc),
            ("max_ot_room", self.max_ot_room),
            ("max_ot_doc", self.max_ot_doc),
            ("start_time_weight", self.start_time_weight),
            ("reliability_tolerance", self.reliability_tolerance),
        ];
        for (field, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{} must be a finite non-negative number, got {}",
                    field, value
                )));
            }
        }

        if self.alpha_choices.is_empty() {
            return Err(ConfigError::Invalid(
                "alpha_choices must contain at least one value".to_string(),
            ));
        }

        if let Some(limit) = self.solver.time_limit {
            if limit <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "solver.time_limit must be positive, got {}",
                    limit
                )));
            }
        }
        if let Some(gap) = self.solver.gap_tolerance {
            if !(0.0..=1.0).contains(&gap) {
                return Err(ConfigError::Invalid(format!(
                    "solver.gap_tolerance must be in [0, 1], got {}",
                    gap
                )));
            }
        }

        Ok(())
    }
}
