use serde::Deserialize;
use std::collections::BTreeMap;
use std::ops::{Add, AddAssign, Mul, Neg, Sub};

use super::value_objects::{
    ConstraintType, OptimizationType, SolutionStatus, SolverBackend, VariableType,
};

/// Column index of a variable inside an [`OptimizationProblem`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub usize);

impl VarId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Sparse affine expression `Σ coeff·x + constant`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpr {
    pub terms: Vec<(VarId, f64)>,
    pub constant: f64,
}

impl LinearExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn constant(value: f64) -> Self {
        Self {
            terms: Vec::new(),
            constant: value,
        }
    }

    pub fn term(var: VarId, coeff: f64) -> Self {
        Self {
            terms: vec![(var, coeff)],
            constant: 0.0,
        }
    }

    /// Sum of the given variables with coefficient one.
    pub fn sum<I: IntoIterator<Item = VarId>>(vars: I) -> Self {
        Self {
            terms: vars.into_iter().map(|v| (v, 1.0)).collect(),
            constant: 0.0,
        }
    }

    pub fn add_term(&mut self, var: VarId, coeff: f64) {
        self.terms.push((var, coeff));
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Merges repeated variables and drops zero coefficients.
    pub fn compact(mut self) -> Self {
        let mut merged: BTreeMap<VarId, f64> = BTreeMap::new();
        for (var, coeff) in self.terms.drain(..) {
            *merged.entry(var).or_insert(0.0) += coeff;
        }
        self.terms = merged.into_iter().filter(|(_, c)| *c != 0.0).collect();
        self
    }

    /// Value of the expression under a full assignment of variable values.
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|(var, coeff)| coeff * values.get(var.index()).copied().unwrap_or(0.0))
            .sum::<f64>()
            + self.constant
    }
}

impl From<VarId> for LinearExpr {
    fn from(var: VarId) -> Self {
        LinearExpr::term(var, 1.0)
    }
}

impl From<f64> for LinearExpr {
    fn from(value: f64) -> Self {
        LinearExpr::constant(value)
    }
}

impl AddAssign for LinearExpr {
    fn add_assign(&mut self, rhs: LinearExpr) {
        self.terms.extend(rhs.terms);
        self.constant += rhs.constant;
    }
}

impl Add for LinearExpr {
    type Output = LinearExpr;

    fn add(mut self, rhs: LinearExpr) -> LinearExpr {
        self += rhs;
        self
    }
}

impl Add<VarId> for LinearExpr {
    type Output = LinearExpr;

    fn add(mut self, rhs: VarId) -> LinearExpr {
        self.add_term(rhs, 1.0);
        self
    }
}

impl Add<f64> for LinearExpr {
    type Output = LinearExpr;

    fn add(mut self, rhs: f64) -> LinearExpr {
        self.constant += rhs;
        self
    }
}

impl Neg for LinearExpr {
    type Output = LinearExpr;

    fn neg(self) -> LinearExpr {
        self * -1.0
    }
}

impl Sub for LinearExpr {
    type Output = LinearExpr;

    fn sub(self, rhs: LinearExpr) -> LinearExpr {
        self + (-rhs)
    }
}

impl Sub<VarId> for LinearExpr {
    type Output = LinearExpr;

    fn sub(mut self, rhs: VarId) -> LinearExpr {
        self.add_term(rhs, -1.0);
        self
    }
}

impl Sub<f64> for LinearExpr {
    type Output = LinearExpr;

    fn sub(mut self, rhs: f64) -> LinearExpr {
        self.constant -= rhs;
        self
    }
}

impl Mul<f64> for LinearExpr {
    type Output = LinearExpr;

    fn mul(mut self, rhs: f64) -> LinearExpr {
        for (_, coeff) in self.terms.iter_mut() {
            *coeff *= rhs;
        }
        self.constant *= rhs;
        self
    }
}

/// Decision variable in an optimization problem
#[derive(Debug, Clone)]
pub struct Variable {
    pub variable_type: VariableType,
    pub lower_bound: f64,
    pub upper_bound: Option<f64>,
    pub name: String,
}

impl Variable {
    pub fn continuous(name: impl Into<String>) -> Self {
        Self {
            variable_type: VariableType::Continuous,
            lower_bound: 0.0,
            upper_bound: None,
            name: name.into(),
        }
    }

    pub fn binary(name: impl Into<String>) -> Self {
        Self {
            variable_type: VariableType::Binary,
            lower_bound: 0.0,
            upper_bound: Some(1.0),
            name: name.into(),
        }
    }

    pub fn with_bounds(mut self, lower: f64, upper: Option<f64>) -> Self {
        self.lower_bound = lower;
        self.upper_bound = upper;
        self
    }

    pub fn is_integer(&self) -> bool {
        matches!(self.variable_type, VariableType::Binary)
    }
}

/// Objective function to minimize or maximize
#[derive(Debug, Clone, Default)]
pub struct ObjectiveFunction {
    pub optimization_type: OptimizationType,
    pub expr: LinearExpr,
}

impl ObjectiveFunction {
    pub fn minimize(expr: LinearExpr) -> Self {
        Self {
            optimization_type: OptimizationType::Minimize,
            expr: expr.compact(),
        }
    }
}

/// Linear constraint `Σ coeff·x (≤ | = | ≥) bound`
#[derive(Debug, Clone)]
pub struct Constraint {
    pub constraint_type: ConstraintType,
    pub terms: Vec<(VarId, f64)>,
    pub bound: f64,
    pub name: String,
    pub family: &'static str,
}

impl Constraint {
    /// Builds `lhs (sense) rhs`, moving all constants to the right-hand side.
    pub fn new(lhs: LinearExpr, constraint_type: ConstraintType, rhs: LinearExpr) -> Self {
        let diff = (lhs - rhs).compact();
        Self {
            constraint_type,
            terms: diff.terms,
            bound: -diff.constant,
            name: String::new(),
            family: "",
        }
    }

    pub fn leq(lhs: impl Into<LinearExpr>, rhs: impl Into<LinearExpr>) -> Self {
        Self::new(lhs.into(), ConstraintType::LessThanOrEqual, rhs.into())
    }

    pub fn geq(lhs: impl Into<LinearExpr>, rhs: impl Into<LinearExpr>) -> Self {
        Self::new(lhs.into(), ConstraintType::GreaterThanOrEqual, rhs.into())
    }

    pub fn eq(lhs: impl Into<LinearExpr>, rhs: impl Into<LinearExpr>) -> Self {
        Self::new(lhs.into(), ConstraintType::Equal, rhs.into())
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn in_family(mut self, family: &'static str) -> Self {
        self.family = family;
        self
    }

    /// Left-hand side value under the given variable values.
    pub fn activity(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|(var, coeff)| coeff * values.get(var.index()).copied().unwrap_or(0.0))
            .sum()
    }

    /// Amount by which the constraint is violated (zero when satisfied).
    pub fn violation(&self, values: &[f64]) -> f64 {
        let activity = self.activity(values);
        match self.constraint_type {
            ConstraintType::LessThanOrEqual => (activity - self.bound).max(0.0),
            ConstraintType::GreaterThanOrEqual => (self.bound - activity).max(0.0),
            ConstraintType::Equal => (activity - self.bound).abs(),
        }
    }
}

/// Configuration for the solver
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub backend: SolverBackend,
    /// Wall-clock limit in seconds
    pub time_limit: Option<f64>,
    /// Relative MIP gap at which the search stops
    pub gap_tolerance: Option<f64>,
    pub verbose: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            backend: SolverBackend::Auto,
            time_limit: None,
            gap_tolerance: None,
            verbose: false,
        }
    }
}

/// Complete optimization problem handed to a [`SolverService`](super::SolverService)
#[derive(Debug, Clone, Default)]
pub struct OptimizationProblem {
    pub name: String,
    pub description: String,
    pub objective: ObjectiveFunction,
    pub constraints: Vec<Constraint>,
    pub variables: Vec<Variable>,
    pub solver_config: SolverConfig,
}

impl OptimizationProblem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_config(mut self, config: SolverConfig) -> Self {
        self.solver_config = config;
        self
    }

    pub fn add_variable(&mut self, variable: Variable) -> VarId {
        self.variables.push(variable);
        VarId(self.variables.len() - 1)
    }

    pub fn add_constraint(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    pub fn set_objective(&mut self, objective: ObjectiveFunction) {
        self.objective = objective;
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_integer_variables(&self) -> usize {
        self.variables.iter().filter(|v| v.is_integer()).count()
    }

    pub fn is_mixed_integer(&self) -> bool {
        self.num_integer_variables() > 0
    }

    /// Objective value under the given variable values.
    pub fn objective_value(&self, values: &[f64]) -> f64 {
        self.objective.expr.evaluate(values)
    }

    /// Largest violation of any constraint or variable bound.
    pub fn max_violation(&self, values: &[f64]) -> f64 {
        let constraints = self
            .constraints
            .iter()
            .map(|c| c.violation(values))
            .fold(0.0, f64::max);
        let bounds = self
            .variables
            .iter()
            .zip(values)
            .map(|(var, &value)| {
                let below = (var.lower_bound - value).max(0.0);
                let above = var.upper_bound.map_or(0.0, |ub| (value - ub).max(0.0));
                below.max(above)
            })
            .fold(0.0, f64::max);
        constraints.max(bounds)
    }

    /// True when `values` assigns every variable and satisfies every row and
    /// bound within `tolerance`.
    pub fn accepts(&self, values: &[f64], tolerance: f64) -> bool {
        values.len() == self.num_variables() && self.max_violation(values) <= tolerance
    }
}

/// Statistics about the solve process
#[derive(Debug, Clone, Default)]
pub struct SolverStatistics {
    pub solve_time_ms: f64,
    pub num_variables: u32,
    pub num_constraints: u32,
    pub num_binary_vars: u32,
}

/// Solution returned by a solver adapter
#[derive(Debug, Clone)]
pub struct Solution {
    pub status: SolutionStatus,
    pub objective_value: Option<f64>,
    pub variable_values: Vec<f64>,
    pub message: String,
    pub statistics: SolverStatistics,
}

impl Solution {
    pub fn new(status: SolutionStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            objective_value: None,
            variable_values: Vec::new(),
            message: message.into(),
            statistics: SolverStatistics::default(),
        }
    }

    pub fn optimal(value: f64, variable_values: Vec<f64>) -> Self {
        Self::with_values(SolutionStatus::Optimal, value, variable_values)
    }

    pub fn with_values(status: SolutionStatus, value: f64, variable_values: Vec<f64>) -> Self {
        Self {
            status,
            objective_value: Some(value),
            variable_values,
            message: format!("{} solution", status),
            statistics: SolverStatistics::default(),
        }
    }

    pub fn with_statistics(mut self, statistics: SolverStatistics) -> Self {
        self.statistics = statistics;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn is_optimal(&self) -> bool {
        self.status == SolutionStatus::Optimal
    }

    /// True when the adapter returned a value for every variable.
    pub fn has_values(&self) -> bool {
        self.status.has_values() && !self.variable_values.is_empty()
    }

    pub fn value(&self, var: VarId) -> f64 {
        self.variable_values
            .get(var.index())
            .copied()
            .unwrap_or(0.0)
    }
}
