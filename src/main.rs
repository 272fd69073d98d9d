use std::process::ExitCode;

use surgopt::application::ScheduleStatistics;
use surgopt::{Instance, SchedulerConfig, SolveOutcome, SolverFactory, SurgeryScheduler};
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

type BoxError = Box<dyn std::error::Error>;

fn init_logging() -> Result<(), BoxError> {
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::Level::WARN.into())
        .from_env_lossy()
        .add_directive("surgopt=info".parse()?);

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
    Ok(())
}

fn main() -> Result<ExitCode, BoxError> {
    init_logging()?;

    let mut args = std::env::args().skip(1);
    let (Some(instance_path), Some(config_path)) = (args.next(), args.next()) else {
        eprintln!("usage: surgopt <instance.json> <config.toml>");
        return Ok(ExitCode::from(2));
    };

    let instance = Instance::from_json_file(&instance_path)?;
    let config = SchedulerConfig::load(&config_path)?;
    let scheduler = SurgeryScheduler::new(&instance, &config);

    let report = scheduler.analyze_feasibility()?;
    if report.overall_feasible {
        info!(
            room_utilization_pct = report.room_utilization_pct,
            doctor_utilization_pct = report.doctor_utilization_pct,
            "necessary feasibility conditions hold"
        );
    } else {
        for reason in report.reasons() {
            warn!(?reason, "instance is provably infeasible");
        }
    }

    let solver = SolverFactory::create_from_backend(config.solver.backend);
    let outcome = scheduler.solve(solver.as_ref())?;

    match &outcome {
        SolveOutcome::Complete(solved) | SolveOutcome::Partial(solved) => {
            log_statistics(&solved.statistics);
            for a in &solved.schedule.assignments {
                info!(
                    surgery = %a.surgery_id,
                    day = %a.day_id,
                    room = %a.room_id,
                    doctor = %a.doctor_id,
                    alpha = a.alpha,
                    start = a.start,
                    end = a.end(),
                    "assignment"
                );
            }
            for day in &solved.validation.reliability {
                info!(
                    day = %day.day,
                    lhs = day.lhs,
                    rhs = day.rhs,
                    slack = day.slack,
                    satisfied = day.satisfied,
                    "reliability"
                );
            }
        }
        SolveOutcome::NoSolution {
            status, message, ..
        } => {
            error!(%status, %message, "no schedule");
        }
    }

    Ok(if outcome.is_accepted() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn log_statistics(stats: &ScheduleStatistics) {
    info!(
        scheduled = stats.scheduled_surgeries,
        expected = stats.expected_surgeries,
        utilization_pct = stats.utilization_pct,
        idle = stats.idle_time,
        room_overtime = stats.room_overtime,
        doctor_overtime = stats.doctor_overtime,
        overtime_cost = stats.overtime_cost,
        "schedule statistics"
    );
    for day in &stats.per_day {
        info!(
            day = %day.day,
            surgeries = day.surgeries,
            used = day.used_minutes,
            alpha_sum = day.alpha_sum,
            "day usage"
        );
    }
    for group in &stats.by_specialty {
        info!(
            specialty = %group.specialty,
            surgeries = group.surgeries,
            average_alpha = group.average_alpha,
            "specialty usage"
        );
    }
}
