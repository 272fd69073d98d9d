// Constraint families of the scheduling model
// Disjunctive families relax through BigM::relaxed_if_not

use tracing::debug;

use super::big_m::BigM;
use super::durations::DurationTable;
use super::error::Result;
use super::feasibility::day_epsilon;
use super::variables::{ComboGroups, ModelVariables};
use crate::config::SchedulerConfig;
use crate::domain::{Combo, Constraint, Instance, LinearExpr, OptimizationProblem, VarId};

/// Family names attached to every generated [`Constraint`].
pub mod family {
    pub const ASSIGN: &str = "assign";
    pub const ROOM_CAPACITY: &str = "room_capacity";
    pub const DOCTOR_CAPACITY: &str = "doctor_capacity";
    pub const SYNC_UPPER: &str = "sync_upper";
    pub const SYNC_LOWER: &str = "sync_lower";
    pub const DOCTOR_HORIZON: &str = "doctor_horizon";
    pub const ROOM_SEQUENCE: &str = "room_sequence";
    pub const DOCTOR_SEQUENCE: &str = "doctor_sequence";
    pub const RELIABILITY: &str = "reliability";
    pub const DAY_CUT: &str = "day_cut";
    pub const ROOM_DAY_CUT: &str = "room_day_cut";
    pub const DOCTOR_DAY_CUT: &str = "doctor_day_cut";
    pub const IDLE: &str = "idle";
}

/// Builds every constraint family over VALID.
pub struct ConstraintGenerator<'a> {
    pub instance: &'a Instance,
    pub config: &'a SchedulerConfig,
    pub table: &'a DurationTable,
    pub groups: &'a ComboGroups,
    pub vars: &'a ModelVariables,
    pub big_m: &'a BigM,
}

impl<'a> ConstraintGenerator<'a> {
    pub fn generate(&self, problem: &mut OptimizationProblem) -> Result<()> {
        let before = problem.constraints.len();
        self.assignment(problem);
        self.room_capacity(problem);
        self.doctor_capacity(problem);
        self.synchronization(problem);
        self.room_sequencing(problem);
        self.doctor_sequencing(problem);
        self.reliability(problem)?;
        self.aggregate_cuts(problem);
        debug!(
            constraints = problem.constraints.len() - before,
            "constraint families generated"
        );
        Ok(())
    }

    fn duration(&self, c: &Combo) -> f64 {
        self.table
            .get(c.surgery, c.room, c.doctor, c.risk)
            .unwrap_or(0.0)
    }

    /// `Σ w` over the given combinations.
    fn chosen(&self, combos: &[Combo]) -> LinearExpr {
        LinearExpr::sum(combos.iter().filter_map(|c| self.vars.chosen(c)))
    }

    /// `Σ duration · w` over the given combinations.
    fn busy(&self, combos: &[Combo]) -> LinearExpr {
        self.weighted(combos, |c| self.duration(c))
    }

    fn weighted(&self, combos: &[Combo], weight: impl Fn(&Combo) -> f64) -> LinearExpr {
        let mut expr = LinearExpr::new();
        for c in combos {
            if let Some(var) = self.vars.chosen(c) {
                expr.add_term(var, weight(c));
            }
        }
        expr
    }

    fn surgery_id(&self, j: usize) -> &str {
        &self.instance.surgeries[j].id
    }

    fn day_id(&self, d: usize) -> &str {
        &self.instance.days[d].id
    }

    fn hours(&self, d: usize) -> f64 {
        self.instance.days[d].regular_hours
    }

    /// Every surgery is chosen exactly once.
    fn assignment(&self, problem: &mut OptimizationProblem) {
        for j in 0..self.instance.surgeries.len() {
            let combos: Vec<Combo> = self
                .groups
                .room_slot
                .range((j, 0, 0)..(j + 1, 0, 0))
                .flat_map(|(_, cs)| cs.iter().copied())
                .collect();
            problem.add_constraint(
                Constraint::eq(self.chosen(&combos), 1.0)
                    .with_name(format!("assign[{}]", self.surgery_id(j)))
                    .in_family(family::ASSIGN),
            );
        }
    }

    /// `s + dur <= H + OT_room + M(1 - chosen)` for each (surgery, day, room).
    fn room_capacity(&self, problem: &mut OptimizationProblem) {
        for (&(j, d, r), combos) in &self.groups.room_slot {
            let start = self.vars.room_start[&(j, d, r)];
            let overtime = self.vars.room_overtime[d][r];
            let lhs = LinearExpr::from(start) + self.busy(combos);
            let rhs = LinearExpr::from(overtime)
                + self.hours(d)
                + self.big_m.relaxed_if_not(d, self.chosen(combos), 1.0);
            problem.add_constraint(
                Constraint::leq(lhs, rhs)
                    .with_name(format!(
                        "room_capacity[{},{},{}]",
                        self.surgery_id(j),
                        self.day_id(d),
                        self.instance.rooms[r].id
                    ))
                    .in_family(family::ROOM_CAPACITY),
            );
        }
    }

    /// Total doctor workload per day within capacity plus doctor overtime.
    /// Zero-capacity doctor-days have no combinations and no constraint.
    fn doctor_capacity(&self, problem: &mut OptimizationProblem) {
        for (&(d, k), combos) in &self.groups.doctor_day {
            let capacity = self.instance.doctor_capacity(k, d);
            if capacity <= 0.0 {
                continue;
            }
            let rhs = LinearExpr::from(self.vars.doctor_overtime[d][k]) + capacity;
            problem.add_constraint(
                Constraint::leq(self.busy(combos), rhs)
                    .with_name(format!(
                        "doctor_capacity[{},{}]",
                        self.instance.doctors[k].id,
                        self.day_id(d)
                    ))
                    .in_family(family::DOCTOR_CAPACITY),
            );
        }
    }

    /// Doctor start equals room start for the chosen (room, doctor) pair, and
    /// doctor starts stay within regular hours plus doctor overtime.
    fn synchronization(&self, problem: &mut OptimizationProblem) {
        for (&(j, d, r, k), combos) in &self.groups.pairing {
            let doctor_start = self.vars.doctor_start[&(j, d, k)];
            let room_start = self.vars.room_start[&(j, d, r)];
            let slack = self.big_m.relaxed_if_not(d, self.chosen(combos), 1.0);
            let tag = format!(
                "{},{},{},{}",
                self.surgery_id(j),
                self.day_id(d),
                self.instance.rooms[r].id,
                self.instance.doctors[k].id
            );

            problem.add_constraint(
                Constraint::leq(doctor_start, LinearExpr::from(room_start) + slack.clone())
                    .with_name(format!("sync_upper[{}]", tag))
                    .in_family(family::SYNC_UPPER),
            );
            problem.add_constraint(
                Constraint::geq(doctor_start, LinearExpr::from(room_start) - slack)
                    .with_name(format!("sync_lower[{}]", tag))
                    .in_family(family::SYNC_LOWER),
            );
        }

        for (&(j, d, k), combos) in &self.groups.doctor_slot {
            let doctor_start = self.vars.doctor_start[&(j, d, k)];
            let rhs = LinearExpr::from(self.vars.doctor_overtime[d][k])
                + self.hours(d)
                + self.big_m.relaxed_if_not(d, self.chosen(combos), 1.0);
            problem.add_constraint(
                Constraint::leq(doctor_start, rhs)
                    .with_name(format!(
                        "doctor_horizon[{},{},{}]",
                        self.surgery_id(j),
                        self.day_id(d),
                        self.instance.doctors[k].id
                    ))
                    .in_family(family::DOCTOR_HORIZON),
            );
        }
    }

    /// Disjunctive non-overlap of two surgeries sharing a room on a day.
    fn room_sequencing(&self, problem: &mut OptimizationProblem) {
        for (&(j, i, d, r), &order) in &self.vars.room_order {
            let slot_j = &self.groups.room_slot[&(j, d, r)];
            let slot_i = &self.groups.room_slot[&(i, d, r)];
            let start_j = self.vars.room_start[&(j, d, r)];
            let start_i = self.vars.room_start[&(i, d, r)];
            let tag = format!(
                "{},{},{},{}",
                self.surgery_id(j),
                self.surgery_id(i),
                self.day_id(d),
                self.instance.rooms[r].id
            );
            self.push_sequence_pair(
                problem,
                d,
                (start_j, self.busy(slot_j), self.chosen(slot_j)),
                (start_i, self.busy(slot_i), self.chosen(slot_i)),
                order,
                &tag,
                family::ROOM_SEQUENCE,
            );
        }
    }

    /// Disjunctive non-overlap of two surgeries sharing a doctor on a day.
    fn doctor_sequencing(&self, problem: &mut OptimizationProblem) {
        for (&(j, i, d, k), &order) in &self.vars.doctor_order {
            let slot_j = &self.groups.doctor_slot[&(j, d, k)];
            let slot_i = &self.groups.doctor_slot[&(i, d, k)];
            let start_j = self.vars.doctor_start[&(j, d, k)];
            let start_i = self.vars.doctor_start[&(i, d, k)];
            let tag = format!(
                "{},{},{},{}",
                self.surgery_id(j),
                self.surgery_id(i),
                self.day_id(d),
                self.instance.doctors[k].id
            );
            self.push_sequence_pair(
                problem,
                d,
                (start_j, self.busy(slot_j), self.chosen(slot_j)),
                (start_i, self.busy(slot_i), self.chosen(slot_i)),
                order,
                &tag,
                family::DOCTOR_SEQUENCE,
            );
        }
    }

    /// `start_i >= start_j + dur_j` when `order = 1`, the reverse when
    /// `order = 0`; both relaxed unless j and i are chosen on this resource.
    #[allow(clippy::too_many_arguments)]
    fn push_sequence_pair(
        &self,
        problem: &mut OptimizationProblem,
        d: usize,
        (start_j, dur_j, chosen_j): (VarId, LinearExpr, LinearExpr),
        (start_i, dur_i, chosen_i): (VarId, LinearExpr, LinearExpr),
        order: VarId,
        tag: &str,
        family: &'static str,
    ) {
        let both = self.big_m.relaxed_if_not(d, chosen_j + chosen_i, 2.0);
        let j_first = self.big_m.relaxed_if_not(d, order.into(), 1.0);
        let i_first = self
            .big_m
            .relaxed_if_not(d, LinearExpr::constant(1.0) - order, 1.0);

        problem.add_constraint(
            Constraint::geq(
                start_i,
                LinearExpr::from(start_j) + dur_j - both.clone() - j_first,
            )
            .with_name(format!("{}_fwd[{}]", family, tag))
            .in_family(family),
        );
        problem.add_constraint(
            Constraint::geq(start_j, LinearExpr::from(start_i) + dur_i - both - i_first)
                .with_name(format!("{}_bwd[{}]", family, tag))
                .in_family(family),
        );
    }

    /// `Σ ln(1 - alpha) · w >= ln(1 - epsilon_d)` for every day.
    fn reliability(&self, problem: &mut OptimizationProblem) -> Result<()> {
        let log_keep: Vec<f64> = self
            .table
            .alphas()
            .iter()
            .map(|a| (1.0 - a).ln())
            .collect();

        for (d, day) in self.instance.days.iter().enumerate() {
            let epsilon = day_epsilon(self.config, &day.id)?;
            let Some(combos) = self.groups.day.get(&d) else {
                continue;
            };
            let lhs = self.weighted(combos, |c| log_keep[c.risk]);
            problem.add_constraint(
                Constraint::geq(lhs, (1.0 - epsilon).ln())
                    .with_name(format!("reliability[{}]", day.id))
                    .in_family(family::RELIABILITY),
            );
        }
        Ok(())
    }

    /// Valid inequalities on best-case durations at day, room-day and
    /// doctor-day granularity.
    fn aggregate_cuts(&self, problem: &mut OptimizationProblem) {
        let min_duration: Vec<f64> = (0..self.instance.surgeries.len())
            .map(|j| {
                self.groups
                    .room_slot
                    .range((j, 0, 0)..(j + 1, 0, 0))
                    .flat_map(|(_, cs)| cs.iter())
                    .map(|c| self.duration(c))
                    .reduce(f64::min)
                    .unwrap_or(0.0)
            })
            .collect();
        let best_case = |combos: &[Combo]| self.weighted(combos, |c| min_duration[c.surgery]);
        let rooms = self.instance.rooms.len() as f64;

        for (&d, combos) in &self.groups.day {
            let rhs = rooms * (self.hours(d) + self.config.max_ot_room);
            problem.add_constraint(
                Constraint::leq(best_case(combos), rhs)
                    .with_name(format!("day_cut[{}]", self.day_id(d)))
                    .in_family(family::DAY_CUT),
            );
        }

        for (&(d, r), combos) in &self.groups.room_day {
            let rhs = LinearExpr::from(self.vars.room_overtime[d][r]) + self.hours(d);
            problem.add_constraint(
                Constraint::leq(best_case(combos), rhs)
                    .with_name(format!(
                        "room_day_cut[{},{}]",
                        self.day_id(d),
                        self.instance.rooms[r].id
                    ))
                    .in_family(family::ROOM_DAY_CUT),
            );
        }

        for (&(d, k), combos) in &self.groups.doctor_day {
            let capacity = self.instance.doctor_capacity(k, d);
            if capacity <= 0.0 {
                continue;
            }
            let rhs = LinearExpr::from(self.vars.doctor_overtime[d][k]) + capacity;
            problem.add_constraint(
                Constraint::leq(best_case(combos), rhs)
                    .with_name(format!(
                        "doctor_day_cut[{},{}]",
                        self.day_id(d),
                        self.instance.doctors[k].id
                    ))
                    .in_family(family::DOCTOR_DAY_CUT),
            );
        }
    }
}
