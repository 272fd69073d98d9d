// End-to-end scenarios driven by a scripted solver

mod common;

use common::{uniform_instance, values_for, Placement, ScriptedSolver};
use surgopt::application::{InfeasibilityReason, Violation};
use surgopt::domain::{Day, Doctor, Instance, Room, Solution, SolutionStatus, SolverError, Surgery};
use surgopt::{SchedulerConfig, SchedulerError, SolveOutcome, SurgeryScheduler};

/// One day of 480 minutes, one room, one doctor, two 200-minute surgeries.
fn scenario_a_instance() -> Instance {
    uniform_instance(&[200.0, 200.0], 0.0, 1, 1, 1)
}

#[test]
fn scenario_a_is_feasible() {
    let instance = scenario_a_instance();
    let config = SchedulerConfig::new(vec![0.1], 0.5);
    let report = SurgeryScheduler::new(&instance, &config)
        .analyze_feasibility()
        .unwrap();

    assert!(report.overall_feasible);
    assert!(report.capacity_feasible);
    assert!(report.reliability_feasible);
    assert_eq!(report.total_min_buffered, 400.0);
    assert_eq!(report.feasible_distributions(), vec![1, 2]);
    assert!(report.reasons().is_empty());
}

#[test]
fn scenario_b_fails_only_on_reliability() {
    let instance = scenario_a_instance();
    let config = SchedulerConfig::new(vec![0.1], 0.01);
    let report = SurgeryScheduler::new(&instance, &config)
        .analyze_feasibility()
        .unwrap();

    assert!(report.capacity_feasible);
    assert!(!report.reliability_feasible);
    assert!(!report.overall_feasible);
    assert_eq!(report.reasons(), vec![InfeasibilityReason::Reliability]);
    assert!(report.feasible_distributions().is_empty());
    // a single surgery already needs alpha <= 0.01
    assert!((report.reliability_checks[0].max_alpha_needed - 0.01).abs() < 1e-12);
}

#[test]
fn scenario_c_flags_the_oversized_surgery() {
    let instance = Instance::new(
        vec![Surgery::flat("S1", 1000.0, 0.0)],
        vec![Day::new("Mon", 480.0)],
        vec![Room::new("OR1")],
        vec![Doctor::new("Dr_A").with_capacity("Mon", 440.0)],
    );
    let config = SchedulerConfig::new(vec![0.1], 0.5).with_overtime_caps(120.0, 60.0);
    let report = SurgeryScheduler::new(&instance, &config)
        .analyze_feasibility()
        .unwrap();

    assert!(!report.individual_surgery_feasible);
    assert!(!report.overall_feasible);
    assert_eq!(report.max_doctor_capacity_per_day, 500.0);
    assert_eq!(report.oversized_surgeries.len(), 1);
    assert_eq!(report.oversized_surgeries[0].id, "S1");
    assert_eq!(report.oversized_surgeries[0].excess, 500.0);
}

#[test]
fn optimal_scripted_solution_is_accepted() {
    let instance = scenario_a_instance();
    let config = SchedulerConfig::new(vec![0.1], 0.5);
    let scheduler = SurgeryScheduler::new(&instance, &config);
    let formulation = scheduler.formulate().unwrap();
    let values = values_for(
        &formulation,
        &instance,
        &[
            Placement::new(0, 0, 0, 0, 0, 0.0),
            Placement::new(1, 0, 0, 0, 0, 200.0),
        ],
    );
    assert!(formulation.problem.max_violation(&values) < 1e-9);

    let solver = ScriptedSolver::returning(SolutionStatus::Optimal, values);
    let outcome = scheduler.solve_formulation(formulation, &solver).unwrap();

    assert_eq!(solver.calls(), 1);
    assert!(outcome.is_accepted());
    let SolveOutcome::Complete(solved) = outcome else {
        panic!("expected a complete schedule");
    };
    assert_eq!(solved.schedule.assignments.len(), 2);
    assert_eq!(solved.schedule.idle_time, 80.0);
    assert_eq!(solved.statistics.used_minutes, 400.0);
    assert!(solved.validation.reliability[0].satisfied);
}

#[test]
fn time_limited_full_schedule_is_accepted() {
    let instance = scenario_a_instance();
    let config = SchedulerConfig::new(vec![0.1], 0.5);
    let scheduler = SurgeryScheduler::new(&instance, &config);
    let formulation = scheduler.formulate().unwrap();
    let values = values_for(
        &formulation,
        &instance,
        &[
            Placement::new(0, 0, 0, 0, 0, 200.0),
            Placement::new(1, 0, 0, 0, 0, 0.0),
        ],
    );

    let solver = ScriptedSolver::returning(SolutionStatus::TimeLimit, values);
    let outcome = scheduler.solve_formulation(formulation, &solver).unwrap();

    assert_eq!(outcome.status(), SolutionStatus::TimeLimit);
    assert!(outcome.is_accepted());
    let SolveOutcome::Complete(solved) = outcome else {
        panic!("expected a complete schedule");
    };
    assert!(solved.validation.is_valid());
    // display order follows the start time within the room
    assert_eq!(solved.schedule.assignments[0].surgery_id, "S2");
}

#[test]
fn missing_surgery_makes_the_schedule_partial() {
    let instance = scenario_a_instance();
    let config = SchedulerConfig::new(vec![0.1], 0.5);
    let scheduler = SurgeryScheduler::new(&instance, &config);
    let formulation = scheduler.formulate().unwrap();
    let values = values_for(
        &formulation,
        &instance,
        &[Placement::new(0, 0, 0, 0, 0, 0.0)],
    );

    let solver = ScriptedSolver::returning(SolutionStatus::Feasible, values);
    let outcome = scheduler.solve_formulation(formulation, &solver).unwrap();

    assert!(!outcome.is_accepted());
    let SolveOutcome::Partial(solved) = outcome else {
        panic!("expected a partial schedule");
    };
    assert_eq!(solved.statistics.scheduled_surgeries, 1);
    assert!(solved
        .validation
        .violations
        .iter()
        .any(|v| matches!(v, Violation::Unassigned { surgery } if surgery == "S2")));
}

#[test]
fn infeasible_and_failing_solvers_keep_the_model() {
    let instance = scenario_a_instance();
    let config = SchedulerConfig::new(vec![0.1], 0.01);
    let scheduler = SurgeryScheduler::new(&instance, &config);

    let infeasible = ScriptedSolver::new(|_| {
        Ok(Solution::new(SolutionStatus::Infeasible, "no integer solution"))
    });
    match scheduler.solve(&infeasible).unwrap() {
        SolveOutcome::NoSolution {
            status,
            message,
            problem,
        } => {
            assert_eq!(status, SolutionStatus::Infeasible);
            assert_eq!(message, "no integer solution");
            assert!(problem.num_variables() > 0);
        }
        other => panic!("unexpected outcome {:?}", other.status()),
    }

    let failing = ScriptedSolver::new(|_| Err(SolverError::ExecutionFailed("crashed".into())));
    let outcome = scheduler.solve(&failing).unwrap();
    assert_eq!(outcome.status(), SolutionStatus::Error);
    assert!(outcome.solved().is_none());
}

#[test]
fn input_errors_stop_before_the_solver() {
    let instance = scenario_a_instance();
    let config = SchedulerConfig::new(vec![1.0], 0.5);
    let solver = ScriptedSolver::returning(SolutionStatus::Optimal, vec![]);

    let err = SurgeryScheduler::new(&instance, &config)
        .solve(&solver)
        .unwrap_err();
    assert!(matches!(err, SchedulerError::Formulation(_)));
    assert_eq!(solver.calls(), 0);
}

#[test]
fn instance_document_round_trip_through_the_pipeline() {
    let instance = Instance::from_json_str(
        r#"{
            "surgeries": [
                {"id": "S1", "mu_sigma": {"OR1|Dr_A": {"mu": 120, "sigma": 20}}},
                {"id": "S2", "duration_mean": 90, "duration_std": 10}
            ],
            "days": [{"id": "Mon", "H": 480}],
            "rooms": [{"id": "OR1"}],
            "doctors": [{"id": "Dr_A", "daily_capacity": {"Mon": 480}}]
        }"#,
    )
    .unwrap();
    let config = SchedulerConfig::from_toml_str(
        r#"
        alpha_choices = [0.2, 0.5]
        epsilon = 0.6
        ot_cost_room = 2.0
        ot_cost_doc = 1.0
        max_ot_room = 60
        max_ot_doc = 60
        "#,
    )
    .unwrap();

    let f = SurgeryScheduler::new(&instance, &config).formulate().unwrap();
    // 2 surgeries x 1 day x 1 room x 1 doctor x 2 risks
    assert_eq!(f.summary.valid_combinations, 4);
    assert_eq!(f.domain.stats().fixed(), 0);
}
