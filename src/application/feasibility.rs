// Solver-free necessary feasibility conditions
// An infeasible verdict is a proof; a feasible one says nothing about sequencing

use serde::Serialize;
use tracing::{info, warn};

use super::durations::DurationTable;
use super::error::{FormulationError, Result};
use crate::config::SchedulerConfig;
use crate::domain::Instance;

/// Best-case duration of one surgery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurgeryMinimum {
    pub id: String,
    pub min_buffered: f64,
}

/// A surgery that cannot fit into any single doctor-day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OversizedSurgery {
    pub id: String,
    pub duration: f64,
    pub max_capacity: f64,
    pub excess: f64,
}

/// Reliability achievability when `surgeries_per_day` surgeries share a day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReliabilityCheck {
    pub surgeries_per_day: usize,
    /// `ln(1 - epsilon)`
    pub required_ln: f64,
    /// `n * ln(1 - alpha_max)`
    pub achievable_ln: f64,
    /// Alpha solving `n * ln(1 - alpha) = ln(1 - epsilon)`
    pub max_alpha_needed: f64,
    pub max_alpha_available: f64,
    pub feasible: bool,
}

/// Why an instance was proven infeasible.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum InfeasibilityReason {
    RoomCapacity { deficit: f64 },
    DoctorCapacity { deficit: f64 },
    OversizedSurgery { surgery: String, excess: f64 },
    Reliability,
}

/// Outcome of [`FeasibilityAnalyzer::analyze`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeasibilityReport {
    pub overall_feasible: bool,
    pub capacity_feasible: bool,
    pub room_capacity_feasible: bool,
    pub doctor_capacity_feasible: bool,
    pub individual_surgery_feasible: bool,
    pub reliability_feasible: bool,

    pub total_min_buffered: f64,
    pub total_regular_room_capacity: f64,
    pub total_max_room_capacity: f64,
    pub total_regular_doctor_capacity: f64,
    pub total_max_doctor_capacity: f64,
    pub max_doctor_capacity_per_day: f64,
    pub room_capacity_deficit: f64,
    pub doctor_capacity_deficit: f64,
    pub room_utilization_pct: f64,
    pub doctor_utilization_pct: f64,

    pub min_buffered_durations: Vec<SurgeryMinimum>,
    pub oversized_surgeries: Vec<OversizedSurgery>,

    pub epsilon: f64,
    pub max_alpha: f64,
    pub reliability_checks: Vec<ReliabilityCheck>,
    /// Surgeries the reliability requirement admits per day, summed over days
    pub reliable_slots: usize,
}

impl FeasibilityReport {
    /// Surgeries-per-day counts whose reliability requirement is achievable.
    pub fn feasible_distributions(&self) -> Vec<usize> {
        self.reliability_checks
            .iter()
            .filter(|c| c.feasible)
            .map(|c| c.surgeries_per_day)
            .collect()
    }

    pub fn reasons(&self) -> Vec<InfeasibilityReason> {
        let mut reasons = Vec::new();
        if !self.room_capacity_feasible {
            reasons.push(InfeasibilityReason::RoomCapacity {
                deficit: self.room_capacity_deficit,
            });
        }
        if !self.doctor_capacity_feasible {
            reasons.push(InfeasibilityReason::DoctorCapacity {
                deficit: self.doctor_capacity_deficit,
            });
        }
        reasons.extend(self.oversized_surgeries.iter().map(|s| {
            InfeasibilityReason::OversizedSurgery {
                surgery: s.id.clone(),
                excess: s.excess,
            }
        }));
        if !self.reliability_feasible {
            reasons.push(InfeasibilityReason::Reliability);
        }
        reasons
    }
}

/// Closed-form pre-solve checks over an instance.
pub struct FeasibilityAnalyzer<'a> {
    instance: &'a Instance,
    config: &'a SchedulerConfig,
}

impl<'a> FeasibilityAnalyzer<'a> {
    pub fn new(instance: &'a Instance, config: &'a SchedulerConfig) -> Self {
        Self { instance, config }
    }

    pub fn analyze(&self) -> Result<FeasibilityReport> {
        let table = DurationTable::build(self.instance, &self.config.alpha_choices)?;
        self.analyze_with(&table)
    }

    /// Runs the checks against durations that were already computed.
    pub fn analyze_with(&self, table: &DurationTable) -> Result<FeasibilityReport> {
        let instance = self.instance;
        let max_ot_room = self.config.max_ot_room;
        let max_ot_doc = self.config.max_ot_doc;

        let min_buffered_durations: Vec<SurgeryMinimum> = instance
            .surgeries
            .iter()
            .enumerate()
            .map(|(j, surgery)| {
                table
                    .min_buffered(j)
                    .map(|min_buffered| SurgeryMinimum {
                        id: surgery.id.clone(),
                        min_buffered,
                    })
                    .ok_or_else(|| FormulationError::NoAdmissibleCombination {
                        surgery: surgery.id.clone(),
                    })
            })
            .collect::<Result<_>>()?;
        let total_min_buffered: f64 = min_buffered_durations.iter().map(|s| s.min_buffered).sum();

        // Rooms
        let rooms = instance.rooms.len() as f64;
        let total_regular_room_capacity: f64 =
            instance.days.iter().map(|d| d.regular_hours).sum::<f64>() * rooms;
        let total_max_room_capacity: f64 = instance
            .days
            .iter()
            .map(|d| d.regular_hours + max_ot_room)
            .sum::<f64>()
            * rooms;
        let room_capacity_feasible = total_min_buffered <= total_max_room_capacity;

        // Doctors
        let doctor_days: Vec<f64> = instance
            .doctors
            .iter()
            .flat_map(|k| instance.days.iter().map(move |d| k.capacity_on(d)))
            .collect();
        let total_regular_doctor_capacity: f64 = doctor_days.iter().sum();
        let total_max_doctor_capacity: f64 = doctor_days.iter().map(|c| c + max_ot_doc).sum();
        let doctor_capacity_feasible = total_min_buffered <= total_max_doctor_capacity;

        // Individual surgeries against the best single doctor-day
        let max_doctor_capacity_per_day = doctor_days
            .iter()
            .map(|c| c + max_ot_doc)
            .fold(0.0, f64::max);
        let oversized_surgeries: Vec<OversizedSurgery> = min_buffered_durations
            .iter()
            .filter(|s| s.min_buffered > max_doctor_capacity_per_day)
            .map(|s| OversizedSurgery {
                id: s.id.clone(),
                duration: s.min_buffered,
                max_capacity: max_doctor_capacity_per_day,
                excess: s.min_buffered - max_doctor_capacity_per_day,
            })
            .collect();
        let individual_surgery_feasible = oversized_surgeries.is_empty();

        let capacity_feasible =
            room_capacity_feasible && doctor_capacity_feasible && individual_surgery_feasible;

        // Reliability
        let max_alpha = table.alpha(table.most_aggressive());
        let epsilon = self.epsilon_bound()?;
        let (reliability_checks, reliability_feasible) = reliability_checks(
            instance.surgeries.len(),
            epsilon,
            max_alpha,
            self.config.reliability_tolerance,
        );
        let reliable_slots = self.reliable_slots(max_alpha)?;

        let report = FeasibilityReport {
            overall_feasible: capacity_feasible && reliability_feasible,
            capacity_feasible,
            room_capacity_feasible,
            doctor_capacity_feasible,
            individual_surgery_feasible,
            reliability_feasible,
            total_min_buffered,
            total_regular_room_capacity,
            total_max_room_capacity,
            total_regular_doctor_capacity,
            total_max_doctor_capacity,
            max_doctor_capacity_per_day,
            room_capacity_deficit: (total_min_buffered - total_max_room_capacity).max(0.0),
            doctor_capacity_deficit: (total_min_buffered - total_max_doctor_capacity).max(0.0),
            room_utilization_pct: percentage(total_min_buffered, total_regular_room_capacity),
            doctor_utilization_pct: percentage(total_min_buffered, total_regular_doctor_capacity),
            min_buffered_durations,
            oversized_surgeries,
            epsilon,
            max_alpha,
            reliability_checks,
            reliable_slots,
        };

        if report.overall_feasible {
            info!(
                total_min_buffered = report.total_min_buffered,
                room_utilization_pct = report.room_utilization_pct,
                "instance passes necessary feasibility checks"
            );
        } else {
            warn!(reasons = ?report.reasons(), "instance is provably infeasible");
        }

        Ok(report)
    }

    /// Most permissive epsilon over all days. A surgery can only be placed on
    /// a day whose epsilon admits it, so this value yields a necessary
    /// condition.
    fn epsilon_bound(&self) -> Result<f64> {
        let mut bound: Option<f64> = None;
        for day in &self.instance.days {
            let eps = day_epsilon(self.config, &day.id)?;
            bound = Some(bound.map_or(eps, |b| b.max(eps)));
        }
        // No days: nothing can be scheduled, the capacity checks already fail.
        Ok(bound.unwrap_or(0.0))
    }

    fn reliable_slots(&self, max_alpha: f64) -> Result<usize> {
        let per_surgery = (1.0 - max_alpha).ln();
        let tolerance = self.config.reliability_tolerance;
        let cap = self.instance.surgeries.len();
        let mut slots = 0;
        for day in &self.instance.days {
            let required_ln = (1.0 - day_epsilon(self.config, &day.id)?).ln();
            slots += (1..=cap)
                .take_while(|&n| admits(n, per_surgery, required_ln, tolerance))
                .count();
        }
        Ok(slots)
    }
}

/// Epsilon of a day, checked to lie in (0, 1).
pub fn day_epsilon(config: &SchedulerConfig, day_id: &str) -> Result<f64> {
    let eps = config
        .epsilon
        .for_day(day_id)
        .ok_or_else(|| FormulationError::MissingEpsilon {
            day: day_id.to_string(),
        })?;
    if !(eps > 0.0 && eps < 1.0) {
        return Err(FormulationError::InvalidEpsilon {
            day: day_id.to_string(),
            epsilon: eps,
        });
    }
    Ok(eps)
}

/// `n` surgeries at `per_surgery = ln(1 - alpha)` each meet `required_ln`.
fn admits(n: usize, per_surgery: f64, required_ln: f64, tolerance: f64) -> bool {
    n as f64 * per_surgery >= required_ln - tolerance
}

fn reliability_checks(
    surgeries: usize,
    epsilon: f64,
    max_alpha: f64,
    tolerance: f64,
) -> (Vec<ReliabilityCheck>, bool) {
    let required_ln = (1.0 - epsilon).ln();
    let per_surgery = (1.0 - max_alpha).ln();
    let checks: Vec<ReliabilityCheck> = (1..=surgeries)
        .map(|n| {
            let achievable_ln = n as f64 * per_surgery;
            ReliabilityCheck {
                surgeries_per_day: n,
                required_ln,
                achievable_ln,
                max_alpha_needed: 1.0 - (1.0 - epsilon).powf(1.0 / n as f64),
                max_alpha_available: max_alpha,
                feasible: admits(n, per_surgery, required_ln, tolerance),
            }
        })
        .collect();
    // Nothing to place means nothing to guarantee.
    let feasible = surgeries == 0 || checks.iter().any(|c| c.feasible);
    (checks, feasible)
}

fn percentage(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        100.0 * part / whole
    } else {
        0.0
    }
}
