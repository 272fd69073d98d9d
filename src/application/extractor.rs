// Post-solve reconstruction and independent validation

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

use super::admissible::AdmissibleDomain;
use super::durations::DurationTable;
use super::error::Result;
use super::feasibility::day_epsilon;
use super::formulation::Formulation;
use crate::config::SchedulerConfig;
use crate::domain::{Assignment, Instance, OvertimeUsage, Schedule, Solution, VarId};

/// Absolute slack, in minutes, allowed on time and overtime checks.
pub const TIME_TOLERANCE: f64 = 1e-4;

/// Chosen indicators are rounded at this threshold.
const CHOSEN_THRESHOLD: f64 = 0.5;

pub struct ResultExtractor<'a> {
    instance: &'a Instance,
    formulation: &'a Formulation,
}

impl<'a> ResultExtractor<'a> {
    pub fn new(instance: &'a Instance, formulation: &'a Formulation) -> Self {
        Self {
            instance,
            formulation,
        }
    }

    pub fn extract(&self, solution: &Solution) -> Schedule {
        let f = self.formulation;
        let mut assignments = Vec::new();

        for (&c, &var) in &f.vars.chosen {
            if solution.value(var) <= CHOSEN_THRESHOLD {
                continue;
            }
            let Some(duration) = f.table.get(c.surgery, c.room, c.doctor, c.risk) else {
                continue;
            };
            let start = f
                .vars
                .room_start
                .get(&(c.surgery, c.day, c.room))
                .map_or(0.0, |&v| solution.value(v));
            let doctor_start = f
                .vars
                .doctor_start
                .get(&(c.surgery, c.day, c.doctor))
                .map_or(0.0, |&v| solution.value(v));

            assignments.push(Assignment {
                combo: c,
                surgery_id: self.instance.surgeries[c.surgery].id.clone(),
                day_id: self.instance.days[c.day].id.clone(),
                room_id: self.instance.rooms[c.room].id.clone(),
                doctor_id: self.instance.doctors[c.doctor].id.clone(),
                alpha: f.table.alpha(c.risk),
                buffered_duration: duration,
                start,
                doctor_start,
            });
        }
        assignments.sort_by(|a, b| {
            (a.combo.day, a.combo.room)
                .cmp(&(b.combo.day, b.combo.room))
                .then(a.start.total_cmp(&b.start))
        });

        let overtime = OvertimeUsage {
            room: values_of(&f.vars.room_overtime, solution),
            doctor: values_of(&f.vars.doctor_overtime, solution),
        };
        let idle_time = idle_time(self.instance, &assignments);

        debug!(
            assignments = assignments.len(),
            idle_time, "schedule extracted"
        );

        Schedule {
            assignments,
            overtime,
            idle_time,
            expected_surgeries: self.instance.surgeries.len(),
        }
    }
}

fn values_of(grid: &[Vec<VarId>], solution: &Solution) -> Vec<Vec<f64>> {
    grid.iter()
        .map(|row| row.iter().map(|&v| solution.value(v)).collect())
        .collect()
}

/// `Σ max(0, H[d] - used[d][r])` over every room-day.
pub fn idle_time(instance: &Instance, assignments: &[Assignment]) -> f64 {
    let mut used = vec![vec![0.0; instance.rooms.len()]; instance.days.len()];
    for a in assignments {
        if let Some(slot) = used
            .get_mut(a.combo.day)
            .and_then(|row| row.get_mut(a.combo.room))
        {
            *slot += a.buffered_duration;
        }
    }
    instance
        .days
        .iter()
        .zip(&used)
        .map(|(day, rooms)| {
            rooms
                .iter()
                .map(|u| (day.regular_hours - u).max(0.0))
                .sum::<f64>()
        })
        .sum()
}

fn at(grid: &[Vec<f64>], d: usize, i: usize) -> f64 {
    grid.get(d).and_then(|row| row.get(i)).copied().unwrap_or(0.0)
}

/// Reliability inequality of one day, recomputed from the chosen risk levels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayReliability {
    pub day: String,
    pub epsilon: f64,
    /// `Σ ln(1 - alpha)` over the day's assignments
    pub lhs: f64,
    /// `ln(1 - epsilon)`
    pub rhs: f64,
    pub slack: f64,
    pub satisfied: bool,
}

/// Recomputes the per-day reliability inequality of a schedule.
///
/// Alphas are read from the configured choices at each assignment's risk
/// index, never from the value stored on the assignment. Pure in its inputs:
/// calling it twice on the same schedule yields the same report.
pub fn verify_reliability(
    schedule: &Schedule,
    instance: &Instance,
    config: &SchedulerConfig,
) -> Result<Vec<DayReliability>> {
    instance
        .days
        .iter()
        .enumerate()
        .map(|(d, day)| {
            let epsilon = day_epsilon(config, &day.id)?;
            let lhs: f64 = schedule
                .on_day(d)
                .map(|a| (1.0 - chosen_alpha(config, a)).ln())
                .sum();
            let rhs = (1.0 - epsilon).ln();
            let slack = lhs - rhs;
            Ok(DayReliability {
                day: day.id.clone(),
                epsilon,
                lhs,
                rhs,
                slack,
                satisfied: slack >= -config.reliability_tolerance,
            })
        })
        .collect()
}

/// Alpha of the assignment's risk level. An unknown level counts as alpha 1,
/// which no reliability requirement admits.
fn chosen_alpha(config: &SchedulerConfig, a: &Assignment) -> f64 {
    config.alpha_choices.get(a.combo.risk).copied().unwrap_or(1.0)
}

/// A broken schedule property.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Violation {
    Unassigned {
        surgery: String,
    },
    MultipleAssignments {
        surgery: String,
        count: usize,
    },
    NotAdmissible {
        surgery: String,
        day: String,
        room: String,
        doctor: String,
        alpha: f64,
    },
    DurationMismatch {
        surgery: String,
        expected: f64,
        actual: f64,
    },
    AlphaMismatch {
        surgery: String,
        risk: usize,
        expected: f64,
        actual: f64,
    },
    NegativeStart {
        surgery: String,
        start: f64,
    },
    RoomOverrun {
        day: String,
        room: String,
        surgery: String,
        end: f64,
        limit: f64,
    },
    RoomOverlap {
        day: String,
        room: String,
        first: String,
        second: String,
        overlap: f64,
    },
    DoctorOverload {
        day: String,
        doctor: String,
        workload: f64,
        limit: f64,
    },
    DoctorLateStart {
        day: String,
        doctor: String,
        surgery: String,
        start: f64,
        limit: f64,
    },
    DoctorOverlap {
        day: String,
        doctor: String,
        first: String,
        second: String,
        overlap: f64,
    },
    StartMismatch {
        surgery: String,
        room_start: f64,
        doctor_start: f64,
    },
    Reliability {
        day: String,
        slack: f64,
    },
    OvertimeOutOfRange {
        resource: String,
        day: String,
        minutes: f64,
        cap: f64,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::Unassigned { surgery } => write!(f, "surgery {} is not scheduled", surgery),
            Violation::MultipleAssignments { surgery, count } => {
                write!(f, "surgery {} is scheduled {} times", surgery, count)
            }
            Violation::NotAdmissible {
                surgery,
                day,
                room,
                doctor,
                alpha,
            } => write!(
                f,
                "surgery {} on {} in {} with {} at alpha {} is not admissible",
                surgery, day, room, doctor, alpha
            ),
            Violation::DurationMismatch {
                surgery,
                expected,
                actual,
            } => write!(
                f,
                "surgery {} lasts {:.3} instead of {:.3}",
                surgery, actual, expected
            ),
            Violation::AlphaMismatch {
                surgery,
                risk,
                expected,
                actual,
            } => write!(
                f,
                "surgery {} reports alpha {} but risk level {} is alpha {}",
                surgery, actual, risk, expected
            ),
            Violation::NegativeStart { surgery, start } => {
                write!(f, "surgery {} starts at {:.3}", surgery, start)
            }
            Violation::RoomOverrun {
                day,
                room,
                surgery,
                end,
                limit,
            } => write!(
                f,
                "surgery {} ends at {:.3} in {} on {}, limit {:.3}",
                surgery, end, room, day, limit
            ),
            Violation::RoomOverlap {
                day,
                room,
                first,
                second,
                overlap,
            } => write!(
                f,
                "surgeries {} and {} overlap by {:.3} in {} on {}",
                first, second, overlap, room, day
            ),
            Violation::DoctorOverload {
                day,
                doctor,
                workload,
                limit,
            } => write!(
                f,
                "doctor {} works {:.3} on {}, limit {:.3}",
                doctor, workload, day, limit
            ),
            Violation::DoctorLateStart {
                day,
                doctor,
                surgery,
                start,
                limit,
            } => write!(
                f,
                "doctor {} starts surgery {} at {:.3} on {}, limit {:.3}",
                doctor, surgery, start, day, limit
            ),
            Violation::DoctorOverlap {
                day,
                doctor,
                first,
                second,
                overlap,
            } => write!(
                f,
                "doctor {} has surgeries {} and {} overlapping by {:.3} on {}",
                doctor, first, second, overlap, day
            ),
            Violation::StartMismatch {
                surgery,
                room_start,
                doctor_start,
            } => write!(
                f,
                "surgery {} starts at {:.3} in the room but {:.3} for the doctor",
                surgery, room_start, doctor_start
            ),
            Violation::Reliability { day, slack } => {
                write!(f, "reliability on {} misses by {:e}", day, -slack)
            }
            Violation::OvertimeOutOfRange {
                resource,
                day,
                minutes,
                cap,
            } => write!(
                f,
                "overtime of {} on {} is {:.3}, allowed [0, {:.3}]",
                resource, day, minutes, cap
            ),
        }
    }
}

/// Outcome of [`ScheduleValidator::validate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub violations: Vec<Violation>,
    pub reliability: Vec<DayReliability>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Independent checker for realized schedules.
pub struct ScheduleValidator<'a> {
    instance: &'a Instance,
    config: &'a SchedulerConfig,
    table: &'a DurationTable,
    domain: &'a AdmissibleDomain,
}

impl<'a> ScheduleValidator<'a> {
    pub fn new(
        instance: &'a Instance,
        config: &'a SchedulerConfig,
        formulation: &'a Formulation,
    ) -> Self {
        Self {
            instance,
            config,
            table: &formulation.table,
            domain: &formulation.domain,
        }
    }

    pub fn validate(&self, schedule: &Schedule) -> Result<ValidationReport> {
        let mut violations = Vec::new();

        self.check_assignment(schedule, &mut violations);
        let admissible: Vec<&Assignment> = schedule
            .assignments
            .iter()
            .filter(|a| self.check_membership(a, &mut violations))
            .collect();
        self.check_rooms(schedule, &admissible, &mut violations);
        self.check_doctors(schedule, &admissible, &mut violations);
        self.check_overtime(schedule, &mut violations);

        let reliability = verify_reliability(schedule, self.instance, self.config)?;
        violations.extend(
            reliability
                .iter()
                .filter(|r| !r.satisfied)
                .map(|r| Violation::Reliability {
                    day: r.day.clone(),
                    slack: r.slack,
                }),
        );

        for v in &violations {
            warn!(violation = %v, "schedule validation failed");
        }

        Ok(ValidationReport {
            violations,
            reliability,
        })
    }

    /// Every surgery exactly once.
    fn check_assignment(&self, schedule: &Schedule, out: &mut Vec<Violation>) {
        let mut counts = vec![0usize; self.instance.surgeries.len()];
        for a in &schedule.assignments {
            if let Some(count) = counts.get_mut(a.combo.surgery) {
                *count += 1;
            }
        }
        for (j, &count) in counts.iter().enumerate() {
            let surgery = self.instance.surgeries[j].id.clone();
            match count {
                1 => {}
                0 => out.push(Violation::Unassigned { surgery }),
                _ => out.push(Violation::MultipleAssignments { surgery, count }),
            }
        }
    }

    /// VALID membership and the duration and alpha it implies.
    fn check_membership(&self, a: &Assignment, out: &mut Vec<Violation>) -> bool {
        if !self.domain.contains(&a.combo) {
            out.push(Violation::NotAdmissible {
                surgery: a.surgery_id.clone(),
                day: a.day_id.clone(),
                room: a.room_id.clone(),
                doctor: a.doctor_id.clone(),
                alpha: a.alpha,
            });
            return false;
        }
        let c = a.combo;
        if let Some(expected) = self.table.get(c.surgery, c.room, c.doctor, c.risk) {
            if (expected - a.buffered_duration).abs() > TIME_TOLERANCE {
                out.push(Violation::DurationMismatch {
                    surgery: a.surgery_id.clone(),
                    expected,
                    actual: a.buffered_duration,
                });
            }
        }
        let alpha = self.table.alpha(c.risk);
        if alpha != a.alpha {
            out.push(Violation::AlphaMismatch {
                surgery: a.surgery_id.clone(),
                risk: c.risk,
                expected: alpha,
                actual: a.alpha,
            });
        }
        if a.start < -TIME_TOLERANCE {
            out.push(Violation::NegativeStart {
                surgery: a.surgery_id.clone(),
                start: a.start,
            });
        }
        true
    }

    /// Room capacity plus overtime and pairwise non-overlap per room-day.
    fn check_rooms(
        &self,
        schedule: &Schedule,
        admissible: &[&Assignment],
        out: &mut Vec<Violation>,
    ) {
        let mut by_room: BTreeMap<(usize, usize), Vec<&Assignment>> = BTreeMap::new();
        for &a in admissible {
            by_room.entry((a.combo.day, a.combo.room)).or_default().push(a);
        }

        for ((d, r), assigned) in by_room {
            let day = &self.instance.days[d];
            let room = &self.instance.rooms[r];
            let limit = day.regular_hours + at(&schedule.overtime.room, d, r);
            for a in &assigned {
                if a.end() > limit + TIME_TOLERANCE {
                    out.push(Violation::RoomOverrun {
                        day: day.id.clone(),
                        room: room.id.clone(),
                        surgery: a.surgery_id.clone(),
                        end: a.end(),
                        limit,
                    });
                }
            }
            for (x, y, overlap) in overlaps(&assigned, |a| (a.start, a.end())) {
                out.push(Violation::RoomOverlap {
                    day: day.id.clone(),
                    room: room.id.clone(),
                    first: x.surgery_id.clone(),
                    second: y.surgery_id.clone(),
                    overlap,
                });
            }
        }
    }

    /// Doctor capacity, latest start, non-overlap and start synchronization.
    fn check_doctors(
        &self,
        schedule: &Schedule,
        admissible: &[&Assignment],
        out: &mut Vec<Violation>,
    ) {
        let mut by_doctor: BTreeMap<(usize, usize), Vec<&Assignment>> = BTreeMap::new();
        for &a in admissible {
            by_doctor
                .entry((a.combo.day, a.combo.doctor))
                .or_default()
                .push(a);
            if (a.doctor_start - a.start).abs() > TIME_TOLERANCE {
                out.push(Violation::StartMismatch {
                    surgery: a.surgery_id.clone(),
                    room_start: a.start,
                    doctor_start: a.doctor_start,
                });
            }
        }

        for ((d, k), assigned) in by_doctor {
            let day = &self.instance.days[d];
            let doctor = &self.instance.doctors[k];
            let overtime = at(&schedule.overtime.doctor, d, k);

            let workload: f64 = assigned.iter().map(|a| a.buffered_duration).sum();
            let limit = self.instance.doctor_capacity(k, d) + overtime;
            if workload > limit + TIME_TOLERANCE {
                out.push(Violation::DoctorOverload {
                    day: day.id.clone(),
                    doctor: doctor.id.clone(),
                    workload,
                    limit,
                });
            }

            let latest = day.regular_hours + overtime;
            for a in &assigned {
                if a.doctor_start > latest + TIME_TOLERANCE {
                    out.push(Violation::DoctorLateStart {
                        day: day.id.clone(),
                        doctor: doctor.id.clone(),
                        surgery: a.surgery_id.clone(),
                        start: a.doctor_start,
                        limit: latest,
                    });
                }
            }

            for (x, y, overlap) in overlaps(&assigned, |a| (a.doctor_start, a.doctor_end())) {
                out.push(Violation::DoctorOverlap {
                    day: day.id.clone(),
                    doctor: doctor.id.clone(),
                    first: x.surgery_id.clone(),
                    second: y.surgery_id.clone(),
                    overlap,
                });
            }
        }
    }

    /// Every overtime value within `[0, cap]`.
    fn check_overtime(&self, schedule: &Schedule, out: &mut Vec<Violation>) {
        for (d, day) in self.instance.days.iter().enumerate() {
            let rooms = self.instance.rooms.iter().enumerate().map(|(r, room)| {
                let minutes = at(&schedule.overtime.room, d, r);
                (&room.id, minutes, self.config.max_ot_room)
            });
            let doctors = self.instance.doctors.iter().enumerate().map(|(k, doctor)| {
                let minutes = at(&schedule.overtime.doctor, d, k);
                (&doctor.id, minutes, self.config.max_ot_doc)
            });
            for (resource, minutes, cap) in rooms.chain(doctors) {
                if minutes < -TIME_TOLERANCE || minutes > cap + TIME_TOLERANCE {
                    out.push(Violation::OvertimeOutOfRange {
                        resource: resource.clone(),
                        day: day.id.clone(),
                        minutes,
                        cap,
                    });
                }
            }
        }
    }
}

/// Pairs of intervals overlapping by more than the tolerance.
fn overlaps<'a>(
    assigned: &[&'a Assignment],
    interval: impl Fn(&Assignment) -> (f64, f64),
) -> Vec<(&'a Assignment, &'a Assignment, f64)> {
    let mut found = Vec::new();
    for (n, &x) in assigned.iter().enumerate() {
        let (xs, xe) = interval(x);
        for &y in &assigned[n + 1..] {
            let (ys, ye) = interval(y);
            let overlap = xe.min(ye) - xs.max(ys);
            if overlap > TIME_TOLERANCE {
                found.push((x, y, overlap));
            }
        }
    }
    found
}

/// Usage of one day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayUsage {
    pub day: String,
    pub surgeries: usize,
    pub used_minutes: f64,
    pub regular_capacity: f64,
    pub room_overtime: f64,
    pub doctor_overtime: f64,
    /// Sum of the chosen alphas on this day
    pub alpha_sum: f64,
}

/// Scheduled surgeries of one specialty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpecialtyUsage {
    pub specialty: String,
    pub surgeries: usize,
    pub average_alpha: f64,
}

/// Specialty reported for surgeries that do not name one.
pub const DEFAULT_SPECIALTY: &str = "General";

/// Summary figures of a realized schedule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleStatistics {
    pub scheduled_surgeries: usize,
    pub expected_surgeries: usize,
    pub regular_capacity: f64,
    pub used_minutes: f64,
    pub utilization_pct: f64,
    pub idle_time: f64,
    pub room_overtime: f64,
    pub doctor_overtime: f64,
    pub overtime_cost: f64,
    pub per_day: Vec<DayUsage>,
    /// One entry per specialty, ordered by name
    pub by_specialty: Vec<SpecialtyUsage>,
    /// `(alpha, surgeries)` for every configured alpha
    pub alpha_distribution: Vec<(f64, usize)>,
}

impl ScheduleStatistics {
    pub fn compute(schedule: &Schedule, instance: &Instance, config: &SchedulerConfig) -> Self {
        let rooms = instance.rooms.len() as f64;
        let per_day: Vec<DayUsage> = instance
            .days
            .iter()
            .enumerate()
            .map(|(d, day)| DayUsage {
                day: day.id.clone(),
                surgeries: schedule.on_day(d).count(),
                used_minutes: schedule.on_day(d).map(|a| a.buffered_duration).sum(),
                regular_capacity: day.regular_hours * rooms,
                room_overtime: schedule.overtime.room.get(d).map_or(0.0, |r| r.iter().sum()),
                doctor_overtime: schedule
                    .overtime
                    .doctor
                    .get(d)
                    .map_or(0.0, |r| r.iter().sum()),
                alpha_sum: schedule.on_day(d).map(|a| chosen_alpha(config, a)).sum(),
            })
            .collect();

        let mut specialties: BTreeMap<&str, (usize, f64)> = BTreeMap::new();
        for a in &schedule.assignments {
            let specialty = instance
                .surgeries
                .get(a.combo.surgery)
                .and_then(|s| s.specialty.as_deref())
                .unwrap_or(DEFAULT_SPECIALTY);
            let entry = specialties.entry(specialty).or_default();
            entry.0 += 1;
            entry.1 += chosen_alpha(config, a);
        }
        let by_specialty = specialties
            .into_iter()
            .map(|(specialty, (surgeries, alpha_sum))| SpecialtyUsage {
                specialty: specialty.to_string(),
                surgeries,
                average_alpha: alpha_sum / surgeries as f64,
            })
            .collect();

        let regular_capacity: f64 = per_day.iter().map(|u| u.regular_capacity).sum();
        let used_minutes: f64 = per_day.iter().map(|u| u.used_minutes).sum();
        let room_overtime = schedule.overtime.total_room();
        let doctor_overtime = schedule.overtime.total_doctor();

        let mut counts = vec![0usize; config.alpha_choices.len()];
        for a in &schedule.assignments {
            if let Some(count) = counts.get_mut(a.combo.risk) {
                *count += 1;
            }
        }

        Self {
            scheduled_surgeries: schedule.assigned_surgeries(),
            expected_surgeries: schedule.expected_surgeries,
            regular_capacity,
            used_minutes,
            utilization_pct: if regular_capacity > 0.0 {
                100.0 * used_minutes / regular_capacity
            } else {
                0.0
            },
            idle_time: schedule.idle_time,
            room_overtime,
            doctor_overtime,
            overtime_cost: config.ot_cost_room * room_overtime
                + config.ot_cost_doc * doctor_overtime,
            per_day,
            by_specialty,
            alpha_distribution: config.alpha_choices.iter().copied().zip(counts).collect(),
        }
    }
}
