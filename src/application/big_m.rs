// Big-M relaxation shared by every disjunctive constraint family

use crate::domain::{Instance, LinearExpr};

/// Per-day big-M constants.
///
/// `M[d] = H[d] + max room overtime + largest buffered duration`. Every room
/// or doctor start is at most `H[d] + max room overtime`, so a term
/// `M[d] * (active - indicator)` with `indicator <= active - 1` always covers
/// the distance between two starts plus one duration.
#[derive(Debug, Clone, PartialEq)]
pub struct BigM {
    per_day: Vec<f64>,
}

impl BigM {
    pub fn new(instance: &Instance, max_ot_room: f64, max_buffered: f64) -> Self {
        Self {
            per_day: instance
                .days
                .iter()
                .map(|d| d.regular_hours + max_ot_room + max_buffered)
                .collect(),
        }
    }

    pub fn for_day(&self, day: usize) -> f64 {
        self.per_day[day]
    }

    /// `M[day] * (active - indicator)`.
    ///
    /// Zero when the indicator expression reaches its `active` level, at
    /// least `M[day]` otherwise. A single chosen flag uses `active = 1`; a
    /// conjunction of two flags uses their sum and `active = 2`.
    pub fn relaxed_if_not(&self, day: usize, indicator: LinearExpr, active: f64) -> LinearExpr {
        (LinearExpr::constant(active) - indicator) * self.per_day[day]
    }
}
