//! Plan-then-simulate runs.
//!
//! One call builds the graph and pool from a [`ProblemInput`], plans with
//! one oracle (skipped in dynamic-dispatch mode) and executes with another,
//! typically a noisier "ground truth" model.
//!
//! ```
//! use u_shopsim::config::{ProblemInput, RunConfig};
//! use u_shopsim::models::{MachineGroupSpec, OperationSpec};
//! use u_shopsim::oracle::{TemplateOracle, ToolChangeOracle};
//! use u_shopsim::pipeline;
//!
//! let problem = ProblemInput::new(
//!     vec![
//!         OperationSpec::new("p1", 1, "a1", 1, 30.0),
//!         OperationSpec::new("p2", 1, "a1", 2, 20.0),
//!     ],
//!     vec![MachineGroupSpec::new("a1", 1, vec![1, 2])],
//! );
//! let config = RunConfig::new().with_seed(7);
//! let report = pipeline::run(
//!     &problem,
//!     &config,
//!     &mut TemplateOracle,
//!     &mut ToolChangeOracle::from_config(&config).unwrap(),
//! )
//! .unwrap();
//! assert!(report.realized.is_complete());
//! assert_eq!(report.plan.unwrap().makespan(), 50.0);
//! ```

use tracing::info;

use crate::config::{DispatchMode, ProblemInput, RunConfig};
use crate::error::ShopResult;
use crate::models::{MachinePool, OperationGraph, Plan, RealizedSchedule};
use crate::oracle::{DurationOracle, FeedbackLog};
use crate::scheduler::{GifflerThompson, ScheduleKpi};
use crate::simulation::Simulator;

/// Everything one run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// The plan; `None` in dynamic-dispatch mode.
    pub plan: Option<Plan>,
    /// What happened in simulation.
    pub realized: RealizedSchedule,
    /// Oracle observations from both stages, in decision order.
    pub feedback: FeedbackLog,
    /// The graph with plan and execution fields filled in.
    pub graph: OperationGraph,
    /// Machines with their final tool state and history.
    pub pool: MachinePool,
}

impl RunReport {
    /// KPIs of the plan, if one was made.
    pub fn plan_kpi(&self) -> Option<ScheduleKpi> {
        self.plan.as_ref().map(ScheduleKpi::from_plan)
    }

    /// KPIs of the realized schedule.
    pub fn realized_kpi(&self) -> ScheduleKpi {
        ScheduleKpi::from_realized(&self.realized)
    }
}

/// Plans and simulates `problem`.
///
/// # Errors
/// Any construction, scheduling or simulation error. Use
/// [`run_with_feedback`] to keep the observations gathered before a
/// failure.
pub fn run<P, E>(
    problem: &ProblemInput,
    config: &RunConfig,
    planning_oracle: &mut P,
    execution_oracle: &mut E,
) -> ShopResult<RunReport>
where
    P: DurationOracle + ?Sized,
    E: DurationOracle + ?Sized,
{
    let mut feedback = FeedbackLog::new();
    let mut report = run_with_feedback(
        problem,
        config,
        planning_oracle,
        execution_oracle,
        &mut feedback,
    )?;
    report.feedback = feedback;
    Ok(report)
}

/// Plans and simulates `problem`, writing observations into `feedback`.
///
/// The returned report's own `feedback` is empty; the caller's log holds
/// every record, including those written before an error.
pub fn run_with_feedback<P, E>(
    problem: &ProblemInput,
    config: &RunConfig,
    planning_oracle: &mut P,
    execution_oracle: &mut E,
    feedback: &mut FeedbackLog,
) -> ShopResult<RunReport>
where
    P: DurationOracle + ?Sized,
    E: DurationOracle + ?Sized,
{
    let mut graph = OperationGraph::from_specs(&problem.operations)?;
    let mut pool = MachinePool::from_specs(&problem.machines)?;
    graph.validate_against(&pool)?;

    info!(
        jobs = graph.job_ids().len(),
        operations = graph.len(),
        mode = ?config.mode,
        "run started"
    );

    let plan = match config.mode {
        DispatchMode::Planned => Some(GifflerThompson::from_config(config).schedule(
            &mut graph,
            &pool,
            planning_oracle,
            feedback,
        )?),
        DispatchMode::Dynamic => None,
    };

    let realized =
        Simulator::from_config(config).run(&mut graph, &mut pool, execution_oracle, feedback)?;

    Ok(RunReport {
        plan,
        realized,
        feedback: FeedbackLog::new(),
        graph,
        pool,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatching::PriorityRuleKind;
    use crate::error::{ShopError, Stage};
    use crate::models::{MachineGroupSpec, OperationSpec};
    use crate::oracle::{FnOracle, Inference, ScaledOracle, TemplateOracle};
    use serde_json::json;

    fn problem() -> ProblemInput {
        ProblemInput::new(
            vec![
                OperationSpec::new("p1", 1, "a1", 1, 10.0).with_successor(2),
                OperationSpec::new("p1", 2, "a2", 2, 5.0),
                OperationSpec::new("p2", 1, "a1", 2, 8.0),
            ],
            vec![
                MachineGroupSpec::new("a1", 1, vec![1, 2]),
                MachineGroupSpec::new("a2", 1, vec![1, 2]),
            ],
        )
    }

    #[test]
    fn test_planned_run() {
        let report = run(
            &problem(),
            &RunConfig::new().with_priority_rule(PriorityRuleKind::Fcfs),
            &mut TemplateOracle,
            &mut ScaledOracle::new(2.0),
        )
        .unwrap();

        let plan = report.plan.as_ref().unwrap();
        assert_eq!(plan.len(), 3);
        assert!(report.realized.is_complete());
        assert_eq!(report.feedback.records_for(Stage::Scheduling).count(), 3);
        assert_eq!(report.feedback.records_for(Stage::Simulation).count(), 3);
        assert_eq!(report.realized.mean_deviation(), Some((10.0 + 5.0 + 8.0) / 3.0));
        assert!(report.realized_kpi().makespan > report.plan_kpi().unwrap().makespan);
    }

    #[test]
    fn test_dynamic_run_skips_planning() {
        let config = RunConfig::new().with_mode(DispatchMode::Dynamic);
        let report = run(&problem(), &config, &mut TemplateOracle, &mut TemplateOracle).unwrap();
        assert!(report.plan.is_none());
        assert!(report.plan_kpi().is_none());
        assert_eq!(report.feedback.records_for(Stage::Scheduling).count(), 0);
        assert!(report.realized.is_complete());
        assert!(report.graph.operations().iter().all(|op| op.plan_end.is_none()));
    }

    #[test]
    fn test_failure_keeps_feedback() {
        let mut broken = FnOracle::new("broken", |op: &crate::models::Operation, _| {
            if op.job_id() == "p2" {
                Inference::new(f64::NAN, json!({"job": "p2"}))
            } else {
                Inference::new(op.base_duration, json!({}))
            }
        });
        let mut feedback = FeedbackLog::new();
        let err = run_with_feedback(
            &problem(),
            &RunConfig::new().with_priority_rule(PriorityRuleKind::Fcfs),
            &mut TemplateOracle,
            &mut broken,
            &mut feedback,
        )
        .unwrap_err();

        assert!(matches!(err, ShopError::InvalidDuration { stage: Stage::Simulation, .. }));
        assert_eq!(feedback.records_for(Stage::Scheduling).count(), 3);
        assert!(feedback.records_for(Stage::Simulation).count() >= 1);
    }

    #[test]
    fn test_malformed_problem_rejected() {
        let problem = ProblemInput::new(
            vec![OperationSpec::new("p1", 1, "a1", 1, 10.0).with_successor(9)],
            vec![MachineGroupSpec::new("a1", 1, vec![1])],
        );
        let err = run(&problem, &RunConfig::new(), &mut TemplateOracle, &mut TemplateOracle)
            .unwrap_err();
        assert!(matches!(err, ShopError::MalformedGraph(_)));
    }
}
