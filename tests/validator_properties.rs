// An accepted schedule satisfies every scheduling invariant

mod common;

use common::{uniform_instance, values_for, Placement};
use proptest::prelude::*;
use proptest::sample::Index;
use surgopt::application::extractor::TIME_TOLERANCE;
use surgopt::application::{verify_reliability, ResultExtractor, ScheduleValidator, Violation};
use surgopt::domain::{Instance, Schedule, Solution, SolutionStatus};
use surgopt::{Formulation, SchedulerConfig};

fn fixture() -> (Instance, SchedulerConfig) {
    let instance = uniform_instance(&[100.0, 120.0, 90.0], 10.0, 1, 2, 2);
    let config = SchedulerConfig::new(vec![0.1, 0.3], 0.6).with_overtime_caps(30.0, 30.0);
    (instance, config)
}

/// S1 then S2 in OR1 with Dr1, S3 in OR2 with Dr2; buffers at alpha 0.1 are
/// 130, 150 and 120.
fn base_placements() -> Vec<Placement> {
    vec![
        Placement::new(0, 0, 0, 0, 0, 0.0),
        Placement::new(1, 0, 0, 0, 0, 130.0),
        Placement::new(2, 0, 1, 1, 0, 0.0),
    ]
}

fn validate(instance: &Instance, config: &SchedulerConfig, f: &Formulation, values: Vec<f64>) -> (Schedule, Vec<Violation>) {
    let solution = Solution::with_values(SolutionStatus::Feasible, 0.0, values);
    let schedule = ResultExtractor::new(instance, f).extract(&solution);
    let report = ScheduleValidator::new(instance, config, f)
        .validate(&schedule)
        .unwrap();
    (schedule, report.violations)
}

/// Direct restatement of the scheduling invariants over a realized schedule.
fn check_invariants(instance: &Instance, config: &SchedulerConfig, f: &Formulation, schedule: &Schedule) {
    let tol = TIME_TOLERANCE;

    // every surgery exactly once
    for j in 0..instance.surgeries.len() {
        let count = schedule
            .assignments
            .iter()
            .filter(|a| a.combo.surgery == j)
            .count();
        assert_eq!(count, 1, "surgery {} scheduled {} times", j, count);
    }

    for a in &schedule.assignments {
        assert!(f.domain.contains(&a.combo));
        let (d, r, k) = (a.combo.day, a.combo.room, a.combo.doctor);
        let day = &instance.days[d];

        // room capacity
        assert!(a.end() <= day.regular_hours + schedule.overtime.room[d][r] + tol);
        // start synchronization
        assert!((a.start - a.doctor_start).abs() <= tol);

        for b in &schedule.assignments {
            if a.combo.surgery >= b.combo.surgery || b.combo.day != d {
                continue;
            }
            let overlap = a.end().min(b.end()) - a.start.max(b.start);
            if b.combo.room == r {
                assert!(overlap <= tol, "room overlap {}", overlap);
            }
            if b.combo.doctor == k {
                let doctor_overlap =
                    a.doctor_end().min(b.doctor_end()) - a.doctor_start.max(b.doctor_start);
                assert!(doctor_overlap <= tol, "doctor overlap {}", doctor_overlap);
            }
        }
    }

    // doctor capacity
    for (d, _) in instance.days.iter().enumerate() {
        for k in 0..instance.doctors.len() {
            let load: f64 = schedule
                .on_day(d)
                .filter(|a| a.combo.doctor == k)
                .map(|a| a.buffered_duration)
                .sum();
            assert!(load <= instance.doctor_capacity(k, d) + schedule.overtime.doctor[d][k] + tol);
        }
    }

    // reliability
    for (d, day) in instance.days.iter().enumerate() {
        let lhs: f64 = schedule.on_day(d).map(|a| (1.0 - a.alpha).ln()).sum();
        let eps = config.epsilon.for_day(&day.id).unwrap();
        assert!(lhs - (1.0 - eps).ln() >= -config.reliability_tolerance);
    }

    // overtime bounds
    for &ot in schedule.overtime.room.iter().flatten() {
        assert!((-tol..=config.max_ot_room + tol).contains(&ot));
    }
    for &ot in schedule.overtime.doctor.iter().flatten() {
        assert!((-tol..=config.max_ot_doc + tol).contains(&ot));
    }
}

#[test]
fn base_schedule_is_feasible_and_accepted() {
    let (instance, config) = fixture();
    let f = Formulation::build(&instance, &config).unwrap();
    let values = values_for(&f, &instance, &base_placements());
    assert!(f.problem.max_violation(&values) < 1e-9);

    let (schedule, violations) = validate(&instance, &config, &f, values);
    assert!(violations.is_empty(), "{:?}", violations);
    check_invariants(&instance, &config, &f, &schedule);
}

#[test]
fn overlap_just_inside_tolerance_is_accepted() {
    let (instance, config) = fixture();
    let f = Formulation::build(&instance, &config).unwrap();

    let mut inside = base_placements();
    inside[1].start -= TIME_TOLERANCE / 10.0;
    let (_, violations) = validate(&instance, &config, &f, values_for(&f, &instance, &inside));
    assert!(violations.is_empty(), "{:?}", violations);

    let mut outside = base_placements();
    outside[1].start -= TIME_TOLERANCE * 10.0;
    let (_, violations) = validate(&instance, &config, &f, values_for(&f, &instance, &outside));
    assert!(violations
        .iter()
        .any(|v| matches!(v, Violation::RoomOverlap { .. })));
    assert!(violations
        .iter()
        .any(|v| matches!(v, Violation::DoctorOverlap { .. })));
}

#[test]
fn risky_choices_break_reliability() {
    let (instance, config) = fixture();
    let f = Formulation::build(&instance, &config).unwrap();
    // 3 * ln(0.7) < ln(0.4)
    let risky: Vec<Placement> = base_placements()
        .into_iter()
        .map(|mut p| {
            p.combo.risk = 1;
            p
        })
        .collect();
    let (schedule, violations) = validate(&instance, &config, &f, values_for(&f, &instance, &risky));
    assert!(matches!(violations.as_slice(), [Violation::Reliability { .. }]));

    let first = verify_reliability(&schedule, &instance, &config).unwrap();
    let second = verify_reliability(&schedule, &instance, &config).unwrap();
    assert_eq!(first, second);
    assert!(!first[0].satisfied);
}

#[test]
fn reported_alpha_must_match_the_risk_level() {
    let (instance, config) = fixture();
    let f = Formulation::build(&instance, &config).unwrap();
    let risky: Vec<Placement> = base_placements()
        .into_iter()
        .map(|mut p| {
            p.combo.risk = 1;
            p
        })
        .collect();
    let solution = Solution::with_values(
        SolutionStatus::Feasible,
        0.0,
        values_for(&f, &instance, &risky),
    );
    let mut schedule = ResultExtractor::new(&instance, &f).extract(&solution);
    for a in &mut schedule.assignments {
        a.alpha = 0.1;
    }

    let report = ScheduleValidator::new(&instance, &config, &f)
        .validate(&schedule)
        .unwrap();
    let mismatches = report
        .violations
        .iter()
        .filter(|v| matches!(v, Violation::AlphaMismatch { risk: 1, .. }))
        .count();
    assert_eq!(mismatches, 3);
    assert!(report
        .violations
        .iter()
        .any(|v| matches!(v, Violation::Reliability { .. })));
    assert!((report.reliability[0].lhs - 3.0 * 0.7f64.ln()).abs() < 1e-12);
}

#[derive(Debug, Clone)]
enum Perturbation {
    /// Toggle one chosen indicator.
    Flip(Index),
    /// Shift one start or overtime value.
    Shift(Index, f64),
}

fn delta() -> impl Strategy<Value = f64> {
    prop_oneof![
        Just(TIME_TOLERANCE / 10.0),
        Just(-TIME_TOLERANCE / 10.0),
        Just(TIME_TOLERANCE * 10.0),
        Just(-TIME_TOLERANCE * 10.0),
        -60.0..60.0f64,
    ]
}

fn perturbation() -> impl Strategy<Value = Perturbation> {
    prop_oneof![
        any::<Index>().prop_map(Perturbation::Flip),
        (any::<Index>(), delta()).prop_map(|(i, d)| Perturbation::Shift(i, d)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn accepted_schedules_satisfy_every_invariant(
        perturbations in prop::collection::vec(perturbation(), 1..4),
    ) {
        let (instance, config) = fixture();
        let f = Formulation::build(&instance, &config).unwrap();
        let mut values = values_for(&f, &instance, &base_placements());

        let chosen: Vec<usize> = f.vars.chosen.values().map(|v| v.index()).collect();
        let continuous: Vec<usize> = f
            .vars
            .room_start
            .values()
            .chain(f.vars.doctor_start.values())
            .chain(f.vars.room_overtime.iter().flatten())
            .chain(f.vars.doctor_overtime.iter().flatten())
            .map(|v| v.index())
            .collect();

        for p in &perturbations {
            match p {
                Perturbation::Flip(i) => {
                    let idx = *i.get(&chosen);
                    values[idx] = 1.0 - values[idx];
                }
                Perturbation::Shift(i, delta) => {
                    let idx = *i.get(&continuous);
                    values[idx] += delta;
                }
            }
        }

        let (schedule, violations) = validate(&instance, &config, &f, values);
        if violations.is_empty() {
            check_invariants(&instance, &config, &f, &schedule);
        }

        let first = verify_reliability(&schedule, &instance, &config).unwrap();
        let second = verify_reliability(&schedule, &instance, &config).unwrap();
        prop_assert_eq!(first, second);
    }
}
