// Buffered surgery durations: mu + sigma * sqrt((1 - alpha) / alpha)

use std::collections::HashSet;
use tracing::debug;

use super::error::{FormulationError, Result};
use crate::domain::{DurationSpec, Instance, MeanStd};

/// Cantelli buffered duration. Infinite when `alpha` is outside (0, 1).
pub fn buffered_duration(mu: f64, sigma: f64, alpha: f64) -> f64 {
    if !(alpha > 0.0 && alpha < 1.0) {
        return f64::INFINITY;
    }
    mu + sigma * ((1.0 - alpha) / alpha).sqrt()
}

/// Duration parameters of surgery `j` in room `r` with doctor `k`, if the
/// combination is admissible at all.
pub fn mean_std_for(instance: &Instance, j: usize, r: usize, k: usize) -> Option<MeanStd> {
    let surgery = &instance.surgeries[j];
    let room = &instance.rooms[r];
    let doctor = &instance.doctors[k];

    match &surgery.duration {
        DurationSpec::PerRoomDoctor(pairs) => pairs
            .get(&(room.id.clone(), doctor.id.clone()))
            .copied(),
        DurationSpec::Flat(stats) => match surgery.specialty.as_deref() {
            Some(specialty) if !(doctor.practices(specialty) && room.supports(specialty)) => None,
            _ => Some(*stats),
        },
    }
}

/// Memoized buffered durations, indexed `[surgery][room][doctor][risk]`.
#[derive(Debug, Clone)]
pub struct DurationTable {
    alphas: Vec<f64>,
    rooms: usize,
    doctors: usize,
    values: Vec<Option<f64>>,
    max_buffered: f64,
}

impl DurationTable {
    /// Validates the instance and the alpha choices, then computes every
    /// admissible buffered duration.
    pub fn build(instance: &Instance, alphas: &[f64]) -> Result<Self> {
        check_alphas(alphas)?;
        check_instance(instance)?;

        let rooms = instance.rooms.len();
        let doctors = instance.doctors.len();
        let risks = alphas.len();
        let mut values = vec![None; instance.surgeries.len() * rooms * doctors * risks];
        let mut max_buffered: f64 = 0.0;

        for (j, surgery) in instance.surgeries.iter().enumerate() {
            let mut admissible = false;
            for r in 0..rooms {
                for k in 0..doctors {
                    let Some(stats) = mean_std_for(instance, j, r, k) else {
                        continue;
                    };
                    if !(stats.mu.is_finite() && stats.sigma.is_finite())
                        || stats.mu < 0.0
                        || stats.sigma < 0.0
                    {
                        return Err(FormulationError::InvalidDuration {
                            surgery: surgery.id.clone(),
                            room: instance.rooms[r].id.clone(),
                            doctor: instance.doctors[k].id.clone(),
                            mu: stats.mu,
                            sigma: stats.sigma,
                        });
                    }
                    admissible = true;
                    for (t, &alpha) in alphas.iter().enumerate() {
                        let buffered = buffered_duration(stats.mu, stats.sigma, alpha);
                        max_buffered = max_buffered.max(buffered);
                        values[((j * rooms + r) * doctors + k) * risks + t] = Some(buffered);
                    }
                }
            }
            if !admissible {
                return Err(FormulationError::NoAdmissibleCombination {
                    surgery: surgery.id.clone(),
                });
            }
        }

        debug!(
            entries = values.iter().filter(|v| v.is_some()).count(),
            max_buffered, "buffered durations computed"
        );

        Ok(Self {
            alphas: alphas.to_vec(),
            rooms,
            doctors,
            values,
            max_buffered,
        })
    }

    pub fn get(&self, j: usize, r: usize, k: usize, t: usize) -> Option<f64> {
        let risks = self.alphas.len();
        self.values[((j * self.rooms + r) * self.doctors + k) * risks + t]
    }

    pub fn alphas(&self) -> &[f64] {
        &self.alphas
    }

    pub fn alpha(&self, t: usize) -> f64 {
        self.alphas[t]
    }

    pub fn num_risks(&self) -> usize {
        self.alphas.len()
    }

    /// Index of the largest alpha, the shortest buffer.
    pub fn most_aggressive(&self) -> usize {
        self.alphas
            .iter()
            .enumerate()
            .fold(0, |best, (t, &a)| if a > self.alphas[best] { t } else { best })
    }

    /// Largest buffered duration in the instance.
    pub fn max_buffered(&self) -> f64 {
        self.max_buffered
    }

    /// Smallest buffered duration of surgery `j` over every room, doctor and
    /// risk level.
    pub fn min_buffered(&self, j: usize) -> Option<f64> {
        let t = self.most_aggressive();
        (0..self.rooms)
            .flat_map(|r| (0..self.doctors).map(move |k| (r, k)))
            .filter_map(|(r, k)| self.get(j, r, k, t))
            .reduce(f64::min)
    }
}

fn check_alphas(alphas: &[f64]) -> Result<()> {
    if alphas.is_empty() {
        return Err(FormulationError::EmptyAlphaChoices);
    }
    match alphas.iter().find(|&&a| !(a > 0.0 && a < 1.0)) {
        Some(&alpha) => Err(FormulationError::InvalidAlpha { alpha }),
        None => Ok(()),
    }
}

fn check_unique<'a>(kind: &'static str, ids: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(FormulationError::DuplicateId {
                kind,
                id: id.to_string(),
            });
        }
    }
    Ok(())
}

fn check_instance(instance: &Instance) -> Result<()> {
    check_unique("surgery", instance.surgeries.iter().map(|s| s.id.as_str()))?;
    check_unique("day", instance.days.iter().map(|d| d.id.as_str()))?;
    check_unique("room", instance.rooms.iter().map(|r| r.id.as_str()))?;
    check_unique("doctor", instance.doctors.iter().map(|k| k.id.as_str()))?;

    for day in &instance.days {
        if !(day.regular_hours > 0.0) {
            return Err(FormulationError::NonPositiveCapacity {
                day: day.id.clone(),
                hours: day.regular_hours,
            });
        }
        for doctor in &instance.doctors {
            let minutes = doctor.capacity_on(day);
            if !(minutes >= 0.0) {
                return Err(FormulationError::NegativeDoctorCapacity {
                    doctor: doctor.id.clone(),
                    day: day.id.clone(),
                    minutes,
                });
            }
        }
    }

    for surgery in &instance.surgeries {
        if let DurationSpec::PerRoomDoctor(pairs) = &surgery.duration {
            for (room, doctor) in pairs.keys() {
                if instance.room_index(room).is_none() {
                    return Err(FormulationError::UnknownRoom {
                        surgery: surgery.id.clone(),
                        room: room.clone(),
                    });
                }
                if instance.doctor_index(doctor).is_none() {
                    return Err(FormulationError::UnknownDoctor {
                        surgery: surgery.id.clone(),
                        doctor: doctor.clone(),
                    });
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Day, Doctor, MeanStd, Room, Surgery};
    use proptest::prelude::*;

    fn two_room_instance() -> Instance {
        Instance::new(
            vec![
                Surgery::flat("S1", 100.0, 20.0).with_specialty("Cardio"),
                Surgery::per_room_doctor(
                    "S2",
                    [(("OR2".to_string(), "Dr_A".to_string()), MeanStd::new(50.0, 5.0))],
                ),
            ],
            vec![Day::new("Mon", 480.0)],
            vec![
                Room::new("OR1").with_specialties(["Cardio"]),
                Room::new("OR2"),
            ],
            vec![
                Doctor::new("Dr_A").with_specialties(["Cardio"]),
                Doctor::new("Dr_B"),
            ],
        )
    }

    #[test]
    fn cantelli_buffer() {
        // alpha = 0.2 -> sqrt(0.8 / 0.2) = 2
        assert!((buffered_duration(100.0, 10.0, 0.2) - 120.0).abs() < 1e-12);
        assert_eq!(buffered_duration(100.0, 10.0, 1.0), f64::INFINITY);
        assert_eq!(buffered_duration(100.0, 0.0, 0.5), 100.0);
    }

    #[test]
    fn specialty_gates_flat_durations() {
        let instance = two_room_instance();
        let table = DurationTable::build(&instance, &[0.2]).unwrap();

        // S1 needs a Cardio room and a Cardio doctor.
        assert!(table.get(0, 0, 0, 0).is_some());
        assert!(table.get(0, 0, 1, 0).is_none());
        assert!(table.get(0, 1, 0, 0).is_none());

        // S2 only lists (OR2, Dr_A).
        assert!(table.get(1, 1, 0, 0).is_some());
        assert!(table.get(1, 0, 0, 0).is_none());
        assert_eq!(table.min_buffered(1), Some(60.0));
        assert_eq!(table.max_buffered(), 140.0);
    }

    #[test]
    fn alpha_of_one_is_rejected() {
        let instance = two_room_instance();
        let err = DurationTable::build(&instance, &[0.1, 1.0]).unwrap_err();
        assert_eq!(err, FormulationError::InvalidAlpha { alpha: 1.0 });
    }

    #[test]
    fn unknown_table_reference_is_reported() {
        let mut instance = two_room_instance();
        instance.surgeries[1] = Surgery::per_room_doctor(
            "S2",
            [(("OR9".to_string(), "Dr_A".to_string()), MeanStd::new(50.0, 5.0))],
        );
        let err = DurationTable::build(&instance, &[0.1]).unwrap_err();
        assert_eq!(
            err,
            FormulationError::UnknownRoom {
                surgery: "S2".to_string(),
                room: "OR9".to_string()
            }
        );
    }

    #[test]
    fn surgery_without_compatible_pair_is_reported() {
        let mut instance = two_room_instance();
        instance.surgeries[0] = Surgery::flat("S1", 100.0, 20.0).with_specialty("Neuro");
        let err = DurationTable::build(&instance, &[0.1]).unwrap_err();
        assert_eq!(
            err,
            FormulationError::NoAdmissibleCombination {
                surgery: "S1".to_string()
            }
        );
    }

    #[test]
    fn zero_hour_day_is_rejected() {
        let mut instance = two_room_instance();
        instance.days[0].regular_hours = 0.0;
        assert!(matches!(
            DurationTable::build(&instance, &[0.1]),
            Err(FormulationError::NonPositiveCapacity { .. })
        ));
    }

    proptest! {
        #[test]
        fn buffer_is_monotone_and_above_mean(
            mu in 0.0f64..1000.0,
            sigma in 0.0f64..200.0,
            a in 0.001f64..0.999,
            b in 0.001f64..0.999,
        ) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let at_lo = buffered_duration(mu, sigma, lo);
            let at_hi = buffered_duration(mu, sigma, hi);
            prop_assert!(at_hi <= at_lo + 1e-9);
            prop_assert!(at_hi >= mu);
        }
    }
}
