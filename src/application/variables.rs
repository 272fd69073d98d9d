// Decision variables and the combination groups they are indexed by

use std::collections::BTreeMap;

use super::admissible::AdmissibleDomain;
use crate::config::SchedulerConfig;
use crate::domain::{Combo, Instance, OptimizationProblem, VarId, Variable};

/// Combinations of VALID grouped by the keys the constraint families use.
#[derive(Debug, Clone, Default)]
pub struct ComboGroups {
    /// `(j, d, r)`: surgery j in room r on day d
    pub room_slot: BTreeMap<(usize, usize, usize), Vec<Combo>>,
    /// `(j, d, k)`: surgery j with doctor k on day d
    pub doctor_slot: BTreeMap<(usize, usize, usize), Vec<Combo>>,
    /// `(j, d, r, k)`
    pub pairing: BTreeMap<(usize, usize, usize, usize), Vec<Combo>>,
    /// `(d, r)`
    pub room_day: BTreeMap<(usize, usize), Vec<Combo>>,
    /// `(d, k)`
    pub doctor_day: BTreeMap<(usize, usize), Vec<Combo>>,
    /// `d`
    pub day: BTreeMap<usize, Vec<Combo>>,
}

impl ComboGroups {
    pub fn new(domain: &AdmissibleDomain) -> Self {
        let mut groups = Self::default();
        for &c in domain.combos() {
            groups
                .room_slot
                .entry((c.surgery, c.day, c.room))
                .or_default()
                .push(c);
            groups
                .doctor_slot
                .entry((c.surgery, c.day, c.doctor))
                .or_default()
                .push(c);
            groups
                .pairing
                .entry((c.surgery, c.day, c.room, c.doctor))
                .or_default()
                .push(c);
            groups.room_day.entry((c.day, c.room)).or_default().push(c);
            groups
                .doctor_day
                .entry((c.day, c.doctor))
                .or_default()
                .push(c);
            groups.day.entry(c.day).or_default().push(c);
        }
        groups
    }

    /// Surgeries that could be in room `r` on day `d`, ascending.
    pub fn surgeries_in_room(&self, d: usize, r: usize) -> Vec<usize> {
        distinct_surgeries(self.room_day.get(&(d, r)))
    }

    /// Surgeries that could be operated by doctor `k` on day `d`, ascending.
    pub fn surgeries_with_doctor(&self, d: usize, k: usize) -> Vec<usize> {
        distinct_surgeries(self.doctor_day.get(&(d, k)))
    }
}

fn distinct_surgeries(combos: Option<&Vec<Combo>>) -> Vec<usize> {
    let mut surgeries: Vec<usize> = combos
        .into_iter()
        .flatten()
        .map(|c| c.surgery)
        .collect();
    surgeries.sort_unstable();
    surgeries.dedup();
    surgeries
}

/// Column ids of every variable family.
#[derive(Debug, Clone, Default)]
pub struct ModelVariables {
    /// `w[j,d,r,k,t]`, binary
    pub chosen: BTreeMap<Combo, VarId>,
    /// `s[j,d,r]`, room-side start time
    pub room_start: BTreeMap<(usize, usize, usize), VarId>,
    /// `s_doc[j,d,k]`, doctor-side start time
    pub doctor_start: BTreeMap<(usize, usize, usize), VarId>,
    /// `OT_room[d][r]`
    pub room_overtime: Vec<Vec<VarId>>,
    /// `OT_doc[d][k]`
    pub doctor_overtime: Vec<Vec<VarId>>,
    /// `Idle[d][r]`
    pub idle: Vec<Vec<VarId>>,
    /// `u_room[j,i,d,r]` with `j < i`: 1 when j precedes i
    pub room_order: BTreeMap<(usize, usize, usize, usize), VarId>,
    /// `u_doc[j,i,d,k]` with `j < i`: 1 when j precedes i
    pub doctor_order: BTreeMap<(usize, usize, usize, usize), VarId>,
}

impl ModelVariables {
    /// Adds every variable to `problem` and records its column id.
    pub fn create(
        instance: &Instance,
        config: &SchedulerConfig,
        domain: &AdmissibleDomain,
        groups: &ComboGroups,
        alphas: &[f64],
        problem: &mut OptimizationProblem,
    ) -> Self {
        let mut vars = Self::default();
        let horizon = |d: usize| instance.days[d].regular_hours + config.max_ot_room;

        for &c in domain.combos() {
            let name = format!(
                "w[{},{},{},{},{}]",
                instance.surgeries[c.surgery].id,
                instance.days[c.day].id,
                instance.rooms[c.room].id,
                instance.doctors[c.doctor].id,
                alphas[c.risk]
            );
            vars.chosen.insert(c, problem.add_variable(Variable::binary(name)));
        }

        for &(j, d, r) in groups.room_slot.keys() {
            let name = format!(
                "s[{},{},{}]",
                instance.surgeries[j].id, instance.days[d].id, instance.rooms[r].id
            );
            let var = Variable::continuous(name).with_bounds(0.0, Some(horizon(d)));
            vars.room_start.insert((j, d, r), problem.add_variable(var));
        }

        for &(j, d, k) in groups.doctor_slot.keys() {
            let name = format!(
                "s_doc[{},{},{}]",
                instance.surgeries[j].id, instance.days[d].id, instance.doctors[k].id
            );
            let var = Variable::continuous(name).with_bounds(0.0, Some(horizon(d)));
            vars.doctor_start.insert((j, d, k), problem.add_variable(var));
        }

        for day in &instance.days {
            let rooms = instance.rooms.iter().map(|room| {
                let name = format!("OT_room[{},{}]", day.id, room.id);
                problem.add_variable(
                    Variable::continuous(name).with_bounds(0.0, Some(config.max_ot_room)),
                )
            });
            vars.room_overtime.push(rooms.collect());

            let doctors = instance.doctors.iter().map(|doctor| {
                let name = format!("OT_doc[{},{}]", day.id, doctor.id);
                problem.add_variable(
                    Variable::continuous(name).with_bounds(0.0, Some(config.max_ot_doc)),
                )
            });
            vars.doctor_overtime.push(doctors.collect());

            let idle = instance.rooms.iter().map(|room| {
                let name = format!("Idle[{},{}]", day.id, room.id);
                problem.add_variable(Variable::continuous(name))
            });
            vars.idle.push(idle.collect());
        }

        for &(d, r) in groups.room_day.keys() {
            let surgeries = groups.surgeries_in_room(d, r);
            for (a, &j) in surgeries.iter().enumerate() {
                for &i in &surgeries[a + 1..] {
                    let name = format!(
                        "u_room[{},{},{},{}]",
                        instance.surgeries[j].id,
                        instance.surgeries[i].id,
                        instance.days[d].id,
                        instance.rooms[r].id
                    );
                    vars.room_order
                        .insert((j, i, d, r), problem.add_variable(Variable::binary(name)));
                }
            }
        }

        for &(d, k) in groups.doctor_day.keys() {
            let surgeries = groups.surgeries_with_doctor(d, k);
            for (a, &j) in surgeries.iter().enumerate() {
                for &i in &surgeries[a + 1..] {
                    if !domain.share_doctor(j, i) {
                        continue;
                    }
                    let name = format!(
                        "u_doc[{},{},{},{}]",
                        instance.surgeries[j].id,
                        instance.surgeries[i].id,
                        instance.days[d].id,
                        instance.doctors[k].id
                    );
                    vars.doctor_order
                        .insert((j, i, d, k), problem.add_variable(Variable::binary(name)));
                }
            }
        }

        vars
    }

    pub fn chosen(&self, combo: &Combo) -> Option<VarId> {
        self.chosen.get(combo).copied()
    }
}
