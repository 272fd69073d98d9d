// Shared fixtures for the integration tests

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use surgopt::domain::{
    Combo, Day, Doctor, Instance, OptimizationProblem, Room, Solution, SolutionStatus, SolverError,
    SolverService, Surgery,
};
use surgopt::Formulation;

/// One surgery per `mu`, all with the same `sigma`, on `days` days of 480
/// minutes with the given rooms and doctors.
pub fn uniform_instance(mus: &[f64], sigma: f64, days: usize, rooms: usize, doctors: usize) -> Instance {
    Instance::new(
        mus.iter()
            .enumerate()
            .map(|(i, &mu)| Surgery::flat(format!("S{}", i + 1), mu, sigma))
            .collect(),
        (0..days).map(|d| Day::new(format!("D{}", d + 1), 480.0)).collect(),
        (0..rooms).map(|r| Room::new(format!("OR{}", r + 1))).collect(),
        (0..doctors).map(|k| Doctor::new(format!("Dr{}", k + 1))).collect(),
    )
}

/// Where and when a surgery is placed in a hand-built solution.
#[derive(Debug, Clone, Copy)]
pub struct Placement {
    pub combo: Combo,
    pub start: f64,
}

impl Placement {
    pub fn new(surgery: usize, day: usize, room: usize, doctor: usize, risk: usize, start: f64) -> Self {
        Self {
            combo: Combo::new(surgery, day, room, doctor, risk),
            start,
        }
    }
}

/// Column values realizing `placements`, with overtime, idle time and
/// ordering variables set to the smallest values the model accepts.
pub fn values_for(f: &Formulation, instance: &Instance, placements: &[Placement]) -> Vec<f64> {
    let mut values = vec![0.0; f.problem.num_variables()];
    let duration = |c: &Combo| {
        f.table
            .get(c.surgery, c.room, c.doctor, c.risk)
            .unwrap_or(0.0)
    };

    let mut room_end: BTreeMap<(usize, usize), f64> = BTreeMap::new();
    let mut room_used: BTreeMap<(usize, usize), f64> = BTreeMap::new();
    let mut doctor_load: BTreeMap<(usize, usize), f64> = BTreeMap::new();
    let mut doctor_latest: BTreeMap<(usize, usize), f64> = BTreeMap::new();

    for p in placements {
        let c = p.combo;
        if let Some(var) = f.vars.chosen(&c) {
            values[var.index()] = 1.0;
        }
        if let Some(var) = f.vars.room_start.get(&(c.surgery, c.day, c.room)) {
            values[var.index()] = p.start;
        }
        if let Some(var) = f.vars.doctor_start.get(&(c.surgery, c.day, c.doctor)) {
            values[var.index()] = p.start;
        }
        let end = p.start + duration(&c);
        let e = room_end.entry((c.day, c.room)).or_insert(0.0);
        *e = e.max(end);
        *room_used.entry((c.day, c.room)).or_insert(0.0) += duration(&c);
        *doctor_load.entry((c.day, c.doctor)).or_insert(0.0) += duration(&c);
        let l = doctor_latest.entry((c.day, c.doctor)).or_insert(0.0);
        *l = l.max(p.start);
    }

    for a in placements {
        for b in placements {
            let (x, y) = (a.combo, b.combo);
            if x.surgery >= y.surgery || x.day != y.day {
                continue;
            }
            let precedes = if a.start <= b.start { 1.0 } else { 0.0 };
            if x.room == y.room {
                if let Some(var) = f.vars.room_order.get(&(x.surgery, y.surgery, x.day, x.room)) {
                    values[var.index()] = precedes;
                }
            }
            if x.doctor == y.doctor {
                if let Some(var) = f.vars.doctor_order.get(&(x.surgery, y.surgery, x.day, x.doctor)) {
                    values[var.index()] = precedes;
                }
            }
        }
    }

    for (d, day) in instance.days.iter().enumerate() {
        for r in 0..instance.rooms.len() {
            let end = room_end.get(&(d, r)).copied().unwrap_or(0.0);
            values[f.vars.room_overtime[d][r].index()] = (end - day.regular_hours).max(0.0);
            let used = room_used.get(&(d, r)).copied().unwrap_or(0.0);
            values[f.vars.idle[d][r].index()] = (day.regular_hours - used).max(0.0);
        }
        for k in 0..instance.doctors.len() {
            let load = doctor_load.get(&(d, k)).copied().unwrap_or(0.0);
            let latest = doctor_latest.get(&(d, k)).copied().unwrap_or(0.0);
            let overtime = (load - instance.doctor_capacity(k, d))
                .max(latest - day.regular_hours)
                .max(0.0);
            values[f.vars.doctor_overtime[d][k].index()] = overtime;
        }
    }

    values
}

type Script = Box<dyn Fn(&OptimizationProblem) -> Result<Solution, SolverError> + Send + Sync>;

/// Solver double answering every call from a script.
pub struct ScriptedSolver {
    script: Script,
    calls: AtomicUsize,
}

impl ScriptedSolver {
    pub fn new(
        script: impl Fn(&OptimizationProblem) -> Result<Solution, SolverError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Box::new(script),
            calls: AtomicUsize::new(0),
        }
    }

    /// Always returns `values` with the given status.
    pub fn returning(status: SolutionStatus, values: Vec<f64>) -> Self {
        Self::new(move |problem| {
            let objective = problem.objective_value(&values);
            Ok(Solution::with_values(status, objective, values.clone()))
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SolverService for ScriptedSolver {
    fn solve(&self, problem: &OptimizationProblem) -> Result<Solution, SolverError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.script)(problem)
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn supports_mip(&self) -> bool {
        true
    }
}
