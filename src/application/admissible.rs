// Admissible (surgery, day, room, doctor, risk) combinations and variable fixing

use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{info, warn};

use super::durations::DurationTable;
use crate::config::SchedulerConfig;
use crate::domain::{Combo, Instance};

/// Counts collected while enumerating combinations.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PreprocessStats {
    /// Combinations with a defined buffered duration
    pub enumerated: usize,
    /// Dropped because the doctor has no capacity that day
    pub fixed_zero_capacity: usize,
    /// Dropped because the buffer exceeds capacity plus doctor overtime
    pub fixed_oversized: usize,
    /// Surgeries left without any combination
    pub stranded_surgeries: Vec<String>,
}

impl PreprocessStats {
    pub fn fixed(&self) -> usize {
        self.fixed_zero_capacity + self.fixed_oversized
    }
}

/// The pruned set VALID plus the per-surgery doctor sets derived from it.
#[derive(Debug, Clone)]
pub struct AdmissibleDomain {
    combos: Vec<Combo>,
    doctors_by_surgery: Vec<BTreeSet<usize>>,
    stats: PreprocessStats,
}

impl AdmissibleDomain {
    pub fn build(instance: &Instance, table: &DurationTable, config: &SchedulerConfig) -> Self {
        let mut combos = Vec::new();
        let mut doctors_by_surgery = vec![BTreeSet::new(); instance.surgeries.len()];
        let mut stats = PreprocessStats::default();

        for j in 0..instance.surgeries.len() {
            for d in 0..instance.days.len() {
                for k in 0..instance.doctors.len() {
                    let capacity = instance.doctor_capacity(k, d);
                    let reachable = capacity + config.max_ot_doc;
                    for r in 0..instance.rooms.len() {
                        for t in 0..table.num_risks() {
                            let Some(duration) = table.get(j, r, k, t) else {
                                continue;
                            };
                            stats.enumerated += 1;
                            if capacity <= 0.0 {
                                stats.fixed_zero_capacity += 1;
                                continue;
                            }
                            if config.preprocess && duration > reachable {
                                stats.fixed_oversized += 1;
                                continue;
                            }
                            combos.push(Combo::new(j, d, r, k, t));
                            doctors_by_surgery[j].insert(k);
                        }
                    }
                }
            }
        }
        combos.sort_unstable();

        stats.stranded_surgeries = doctors_by_surgery
            .iter()
            .enumerate()
            .filter(|(_, doctors)| doctors.is_empty())
            .map(|(j, _)| instance.surgeries[j].id.clone())
            .collect();
        if !stats.stranded_surgeries.is_empty() {
            warn!(
                surgeries = ?stats.stranded_surgeries,
                "surgeries without any admissible combination; the model is infeasible"
            );
        }

        info!(
            valid = combos.len(),
            fixed = stats.fixed(),
            "admissible combinations enumerated"
        );

        Self {
            combos,
            doctors_by_surgery,
            stats,
        }
    }

    /// All combinations, sorted by (surgery, day, room, doctor, risk).
    pub fn combos(&self) -> &[Combo] {
        &self.combos
    }

    pub fn len(&self) -> usize {
        self.combos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combos.is_empty()
    }

    pub fn contains(&self, combo: &Combo) -> bool {
        self.combos.binary_search(combo).is_ok()
    }

    /// Combinations of surgery `j`, a contiguous slice thanks to the ordering.
    pub fn for_surgery(&self, j: usize) -> &[Combo] {
        let start = self.combos.partition_point(|c| c.surgery < j);
        let end = self.combos.partition_point(|c| c.surgery <= j);
        &self.combos[start..end]
    }

    /// Doctors surgery `j` could ever be assigned to.
    pub fn doctors_of(&self, j: usize) -> &BTreeSet<usize> {
        &self.doctors_by_surgery[j]
    }

    pub fn share_doctor(&self, j: usize, i: usize) -> bool {
        !self.doctors_by_surgery[j].is_disjoint(&self.doctors_by_surgery[i])
    }

    pub fn stats(&self) -> &PreprocessStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Day, Doctor, Room, Surgery};

    fn instance() -> Instance {
        Instance::new(
            vec![
                Surgery::flat("S1", 100.0, 30.0),
                Surgery::flat("S2", 400.0, 0.0),
            ],
            vec![Day::new("Mon", 480.0), Day::new("Tue", 480.0)],
            vec![Room::new("OR1")],
            vec![
                Doctor::new("Dr_A").with_capacity("Tue", 0.0),
                Doctor::new("Dr_B").with_capacity("Mon", 300.0),
            ],
        )
    }

    #[test]
    fn zero_capacity_and_oversized_are_fixed() {
        let inst = instance();
        // alpha 0.1 -> S1 = 190, alpha 0.5 -> S1 = 130; S2 = 400 at both
        let config = SchedulerConfig::new(vec![0.1, 0.5], 0.5).with_overtime_caps(60.0, 60.0);
        let table = DurationTable::build(&inst, &config.alpha_choices).unwrap();
        let domain = AdmissibleDomain::build(&inst, &table, &config);

        // Dr_A on Tue is unavailable for both surgeries and both risks
        assert!(!domain.contains(&Combo::new(0, 1, 0, 0, 0)));
        assert_eq!(domain.stats().fixed_zero_capacity, 4);

        // S2 does not fit Dr_B on Mon (300 + 60 < 400)
        assert!(!domain.contains(&Combo::new(1, 0, 0, 1, 0)));
        assert!(domain.contains(&Combo::new(1, 1, 0, 1, 0)));
        assert_eq!(domain.stats().fixed_oversized, 2);

        assert_eq!(domain.stats().enumerated, 16);
        assert_eq!(domain.len(), 10);
        assert!(domain.share_doctor(0, 1));
        assert!(domain.for_surgery(1).iter().all(|c| c.surgery == 1));
        assert_eq!(domain.for_surgery(0).len() + domain.for_surgery(1).len(), 10);
    }

    #[test]
    fn oversize_rule_can_be_disabled() {
        let inst = instance();
        let config = SchedulerConfig::new(vec![0.1, 0.5], 0.5)
            .with_overtime_caps(60.0, 60.0)
            .with_preprocessing(false);
        let table = DurationTable::build(&inst, &config.alpha_choices).unwrap();
        let domain = AdmissibleDomain::build(&inst, &table, &config);

        assert!(domain.contains(&Combo::new(1, 0, 0, 1, 0)));
        assert_eq!(domain.stats().fixed_oversized, 0);
        assert_eq!(domain.stats().fixed_zero_capacity, 4);
    }

    #[test]
    fn stranded_surgery_is_reported() {
        let mut inst = instance();
        inst.surgeries[1] = Surgery::flat("S2", 900.0, 0.0);
        let config = SchedulerConfig::new(vec![0.5], 0.5).with_overtime_caps(60.0, 60.0);
        let table = DurationTable::build(&inst, &config.alpha_choices).unwrap();
        let domain = AdmissibleDomain::build(&inst, &table, &config);
        assert_eq!(domain.stats().stranded_surgeries, vec!["S2".to_string()]);
        assert!(domain.doctors_of(1).is_empty());
    }
}
