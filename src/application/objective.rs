// Minimization objective: idle time, overtime cost and a start-time tie-break

use super::constraints::family;
use super::durations::DurationTable;
use super::variables::{ComboGroups, ModelVariables};
use crate::config::SchedulerConfig;
use crate::domain::{Constraint, Instance, LinearExpr, ObjectiveFunction, OptimizationProblem};

pub struct ObjectiveBuilder<'a> {
    pub instance: &'a Instance,
    pub config: &'a SchedulerConfig,
    pub table: &'a DurationTable,
    pub groups: &'a ComboGroups,
    pub vars: &'a ModelVariables,
}

impl<'a> ObjectiveBuilder<'a> {
    /// Links the idle variables to room usage and installs the objective.
    pub fn build(&self, problem: &mut OptimizationProblem) {
        self.link_idle(problem);
        problem.set_objective(ObjectiveFunction::minimize(self.expression()));
    }

    /// `Idle[d][r] >= H[d] - Σ duration · w` over the room-day. The lower
    /// bound of zero on `Idle` gives `max(0, H - used)` at the optimum.
    fn link_idle(&self, problem: &mut OptimizationProblem) {
        for (d, day) in self.instance.days.iter().enumerate() {
            for (r, room) in self.instance.rooms.iter().enumerate() {
                let mut used = LinearExpr::new();
                for c in self.groups.room_day.get(&(d, r)).into_iter().flatten() {
                    if let (Some(var), Some(duration)) = (
                        self.vars.chosen(c),
                        self.table.get(c.surgery, c.room, c.doctor, c.risk),
                    ) {
                        used.add_term(var, duration);
                    }
                }
                let shortfall = LinearExpr::constant(day.regular_hours) - used;
                problem.add_constraint(
                    Constraint::geq(self.vars.idle[d][r], shortfall)
                        .with_name(format!("idle[{},{}]", day.id, room.id))
                        .in_family(family::IDLE),
                );
            }
        }
    }

    fn expression(&self) -> LinearExpr {
        let mut expr = LinearExpr::new();
        for row in &self.vars.idle {
            for &var in row {
                expr.add_term(var, 1.0);
            }
        }
        if self.config.ot_cost_room != 0.0 {
            for &var in self.vars.room_overtime.iter().flatten() {
                expr.add_term(var, self.config.ot_cost_room);
            }
        }
        if self.config.ot_cost_doc != 0.0 {
            for &var in self.vars.doctor_overtime.iter().flatten() {
                expr.add_term(var, self.config.ot_cost_doc);
            }
        }
        if self.config.start_time_weight != 0.0 {
            for &var in self.vars.room_start.values() {
                expr.add_term(var, self.config.start_time_weight);
            }
        }
        expr
    }
}
