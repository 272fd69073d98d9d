// End-to-end model construction

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

use super::admissible::{AdmissibleDomain, PreprocessStats};
use super::big_m::BigM;
use super::constraints::ConstraintGenerator;
use super::durations::DurationTable;
use super::error::Result;
use super::objective::ObjectiveBuilder;
use super::variables::{ComboGroups, ModelVariables};
use crate::config::SchedulerConfig;
use crate::domain::{Instance, OptimizationProblem};

/// Size of a built model.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModelSummary {
    pub variables: usize,
    pub binary_variables: usize,
    pub constraints: usize,
    /// Constraint count per family name
    pub families: BTreeMap<&'static str, usize>,
    pub valid_combinations: usize,
    pub preprocessing: PreprocessStats,
}

impl ModelSummary {
    fn of(problem: &OptimizationProblem, domain: &AdmissibleDomain) -> Self {
        let mut families = BTreeMap::new();
        for constraint in &problem.constraints {
            *families.entry(constraint.family).or_insert(0) += 1;
        }
        Self {
            variables: problem.num_variables(),
            binary_variables: problem.num_integer_variables(),
            constraints: problem.constraints.len(),
            families,
            valid_combinations: domain.len(),
            preprocessing: domain.stats().clone(),
        }
    }

    pub fn family(&self, name: &str) -> usize {
        self.families.get(name).copied().unwrap_or(0)
    }
}

/// A built scheduling model together with the index structures behind it.
#[derive(Debug, Clone)]
pub struct Formulation {
    pub table: DurationTable,
    pub domain: AdmissibleDomain,
    pub groups: ComboGroups,
    pub vars: ModelVariables,
    pub big_m: BigM,
    pub problem: OptimizationProblem,
    pub summary: ModelSummary,
}

impl Formulation {
    pub fn build(instance: &Instance, config: &SchedulerConfig) -> Result<Self> {
        let table = DurationTable::build(instance, &config.alpha_choices)?;
        let domain = AdmissibleDomain::build(instance, &table, config);
        let groups = ComboGroups::new(&domain);

        let mut problem = OptimizationProblem::new("surgery_scheduling")
            .with_description(format!(
                "{} surgeries, {} days, {} rooms, {} doctors",
                instance.surgeries.len(),
                instance.days.len(),
                instance.rooms.len(),
                instance.doctors.len()
            ))
            .with_config(config.solver.clone());

        let vars = ModelVariables::create(
            instance,
            config,
            &domain,
            &groups,
            table.alphas(),
            &mut problem,
        );
        let big_m = BigM::new(instance, config.max_ot_room, table.max_buffered());

        ConstraintGenerator {
            instance,
            config,
            table: &table,
            groups: &groups,
            vars: &vars,
            big_m: &big_m,
        }
        .generate(&mut problem)?;

        ObjectiveBuilder {
            instance,
            config,
            table: &table,
            groups: &groups,
            vars: &vars,
        }
        .build(&mut problem);

        let summary = ModelSummary::of(&problem, &domain);
        info!(
            variables = summary.variables,
            binaries = summary.binary_variables,
            constraints = summary.constraints,
            valid = summary.valid_combinations,
            fixed = summary.preprocessing.fixed(),
            "model formulated"
        );

        Ok(Self {
            table,
            domain,
            groups,
            vars,
            big_m,
            problem,
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::constraints::family;
    use crate::application::error::FormulationError;
    use crate::domain::{Day, Doctor, Room, SolverBackend, SolverConfig, Surgery};

    fn instance() -> Instance {
        Instance::new(
            vec![
                Surgery::flat("S1", 120.0, 20.0),
                Surgery::flat("S2", 90.0, 15.0),
                Surgery::flat("S3", 60.0, 10.0),
            ],
            vec![Day::new("Mon", 480.0), Day::new("Tue", 480.0)],
            vec![Room::new("OR1"), Room::new("OR2")],
            vec![Doctor::new("Dr_A"), Doctor::new("Dr_B")],
        )
    }

    #[test]
    fn summary_matches_problem() {
        let config = SchedulerConfig::new(vec![0.1, 0.3], 0.5)
            .with_overtime_caps(60.0, 60.0)
            .with_solver(SolverConfig {
                backend: SolverBackend::Highs,
                time_limit: Some(30.0),
                ..SolverConfig::default()
            });
        let f = Formulation::build(&instance(), &config).unwrap();

        // 3 surgeries x 2 days x 2 rooms x 2 doctors x 2 risks
        assert_eq!(f.summary.valid_combinations, 48);
        assert_eq!(f.summary.variables, f.problem.variables.len());
        assert_eq!(f.summary.constraints, f.problem.constraints.len());
        assert_eq!(
            f.summary.families.values().sum::<usize>(),
            f.summary.constraints
        );
        assert_eq!(f.summary.family(family::ASSIGN), 3);
        assert_eq!(f.summary.family(family::RELIABILITY), 2);
        assert_eq!(f.summary.family(family::IDLE), 4);
        assert_eq!(f.summary.family("unknown"), 0);
        assert_eq!(f.problem.solver_config.time_limit, Some(30.0));
        assert!(f.problem.is_mixed_integer());
    }

    #[test]
    fn every_constraint_references_known_columns() {
        let config = SchedulerConfig::new(vec![0.2], 0.3);
        let f = Formulation::build(&instance(), &config).unwrap();
        let n = f.problem.num_variables();
        for constraint in &f.problem.constraints {
            assert!(!constraint.family.is_empty(), "{}", constraint.name);
            assert!(constraint.terms.iter().all(|(v, _)| v.index() < n));
        }
    }

    #[test]
    fn invalid_alpha_is_rejected() {
        let config = SchedulerConfig::new(vec![0.2, 1.0], 0.3);
        let err = Formulation::build(&instance(), &config).unwrap_err();
        assert!(matches!(err, FormulationError::InvalidAlpha { .. }));
    }
}
