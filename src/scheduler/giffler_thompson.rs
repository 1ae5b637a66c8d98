//! Giffler-Thompson list scheduler.
//!
//! # Algorithm
//!
//! 1. Seed the ready set with every operation that has no predecessors.
//! 2. Re-score every ready operation with the priority rule.
//! 3. Pop the lowest score; ties go to the smaller `(job_id, operation_id)`.
//! 4. Pick the group instance that frees up first (lowest index on ties)
//!    and ask the oracle for a duration given the tool it will hold. Tool
//!    state starts from each machine's configured initial tool.
//! 5. Commit at `max(instance available, earliest feasible start)`.
//! 6. Once all predecessors of the successor are committed, set its
//!    earliest start to their latest end and make it ready.
//!
//! # Complexity
//! O(n² log n) rule evaluations in the worst case: every iteration
//! re-scores the whole ready set.
//!
//! # Reference
//! Giffler & Thompson (1960), "Algorithms for Solving Production-Scheduling Problems"

use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};
use tracing::{debug, error, info};

use crate::config::RunConfig;
use crate::dispatching::{PriorityContext, PriorityRule, PriorityRuleKind, RuleScore};
use crate::error::{ShopError, ShopResult, Stage};
use crate::models::{
    MachinePool, OperationGraph, OperationKey, OperationRef, Plan, PlanEntry, ToolId,
};
use crate::oracle::{DurationOracle, FeedbackLog, FeedbackRecord};

/// Per-instance commitment state mirrored by the scheduler.
#[derive(Debug, Clone, Copy)]
struct Slot {
    available: f64,
    tool: Option<ToolId>,
}

/// Picks the instance that frees up first; lowest index on ties.
fn select_instance(slots: &[Slot]) -> usize {
    let mut best = 0;
    for (i, slot) in slots.iter().enumerate().skip(1) {
        if slot.available < slots[best].available {
            best = i;
        }
    }
    best
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct ReadyEntry {
    priority: OrderedFloat<RuleScore>,
    key: OperationKey,
    handle: OperationRef,
}

/// Min-priority queue of operations whose predecessors are all planned.
#[derive(Debug, Default)]
struct ReadySet {
    heap: BinaryHeap<Reverse<ReadyEntry>>,
}

impl ReadySet {
    fn push(&mut self, priority: RuleScore, key: OperationKey, handle: OperationRef) {
        self.heap.push(Reverse(ReadyEntry {
            priority: OrderedFloat(priority),
            key,
            handle,
        }));
    }

    fn pop(&mut self) -> Option<OperationRef> {
        self.heap.pop().map(|Reverse(entry)| entry.handle)
    }

    fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Recomputes every priority.
    fn reprioritize<F>(&mut self, mut score: F) -> ShopResult<()>
    where
        F: FnMut(OperationRef) -> ShopResult<RuleScore>,
    {
        let entries = std::mem::take(&mut self.heap).into_vec();
        for Reverse(entry) in entries {
            let priority = score(entry.handle)?;
            self.push(priority, entry.key, entry.handle);
        }
        Ok(())
    }
}

/// Greedy, priority-driven list scheduler.
///
/// Deterministic for a deterministic oracle: the same graph, pool, rule
/// and oracle always produce the same plan.
///
/// # Example
///
/// ```
/// use u_shopsim::models::{MachineGroupSpec, MachinePool, OperationGraph, OperationSpec};
/// use u_shopsim::oracle::{FeedbackLog, TemplateOracle};
/// use u_shopsim::scheduler::GifflerThompson;
/// use u_shopsim::dispatching::PriorityRuleKind;
///
/// let mut graph = OperationGraph::from_specs(&[
///     OperationSpec::new("p1", 1, "a1", 1, 30.0),
///     OperationSpec::new("p2", 1, "a1", 1, 20.0),
/// ]).unwrap();
/// let pool = MachinePool::from_specs(&[MachineGroupSpec::new("a1", 1, vec![1])]).unwrap();
///
/// let mut feedback = FeedbackLog::new();
/// let plan = GifflerThompson::new(PriorityRuleKind::Dynamic)
///     .schedule(&mut graph, &pool, &mut TemplateOracle, &mut feedback)
///     .unwrap();
/// assert_eq!(plan.makespan(), 50.0);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct GifflerThompson {
    rule: PriorityRuleKind,
}

impl GifflerThompson {
    /// Creates a scheduler using the given rule.
    pub fn new(rule: PriorityRuleKind) -> Self {
        Self { rule }
    }

    /// Creates a scheduler using the configured rule.
    pub fn from_config(config: &RunConfig) -> Self {
        Self::new(config.priority_rule)
    }

    /// The configured rule.
    pub fn rule(&self) -> PriorityRuleKind {
        self.rule
    }

    /// Plans every operation of `graph` on `pool`.
    ///
    /// Writes the plan fields of each operation and returns the entries in
    /// commit order. Observations of committed decisions go to `feedback`.
    ///
    /// # Errors
    /// - [`ShopError::UnknownMachineGroup`] if the pool lacks a required group.
    /// - [`ShopError::InvalidDuration`] if the oracle breaks its contract.
    /// - [`ShopError::UnscheduledOperations`] if some operation never became
    ///   ready.
    ///
    /// On error all plan fields are cleared; records already written to
    /// `feedback` are kept.
    pub fn schedule<O>(
        &self,
        graph: &mut OperationGraph,
        pool: &MachinePool,
        oracle: &mut O,
        feedback: &mut FeedbackLog,
    ) -> ShopResult<Plan>
    where
        O: DurationOracle + ?Sized,
    {
        graph.validate_against(pool)?;
        graph.reset_plan();

        info!(
            operations = graph.len(),
            machines = pool.len(),
            rule = %self.rule,
            oracle = oracle.name(),
            "building plan"
        );

        match self.build(graph, pool, oracle, feedback) {
            Ok(plan) => {
                info!(entries = plan.len(), makespan = plan.makespan(), "plan complete");
                Ok(plan)
            }
            Err(err) => {
                error!(%err, "scheduling aborted");
                graph.reset_plan();
                Err(err)
            }
        }
    }

    fn build<O>(
        &self,
        graph: &mut OperationGraph,
        pool: &MachinePool,
        oracle: &mut O,
        feedback: &mut FeedbackLog,
    ) -> ShopResult<Plan>
    where
        O: DurationOracle + ?Sized,
    {
        let rule = self.rule.rule();
        let mut slots: BTreeMap<String, Vec<Slot>> = pool
            .group_names()
            .map(|name| {
                let members = pool.group(name).unwrap_or_default();
                let group_slots = members
                    .iter()
                    .map(|&m| Slot {
                        available: 0.0,
                        tool: pool.machine(m).initial_tool(),
                    })
                    .collect();
                (name.to_string(), group_slots)
            })
            .collect();

        let mut ready = ReadySet::default();
        for handle in graph.handles() {
            let op = graph.operation(handle);
            if op.predecessors.is_empty() {
                ready.push(0.0, op.key.clone(), handle);
            }
        }

        let mut plan = Plan::new();
        while !ready.is_empty() {
            ready.reprioritize(|handle| {
                score(rule, graph, pool, &slots, &mut *oracle, &mut *feedback, handle)
            })?;
            let Some(current) = ready.pop() else {
                break;
            };

            let op = graph.operation(current);
            let group = op.machine_group.clone();
            let tool = op.tool;
            let earliest = op.plan_start.unwrap_or(0.0);

            let group_slots = slots
                .get_mut(&group)
                .ok_or_else(|| ShopError::UnknownMachineGroup {
                    operation: op.key.clone(),
                    group: group.clone(),
                })?;
            let instance = select_instance(group_slots);
            let machine_ref = pool.group(&group).unwrap_or_default()[instance];
            let machine_id = pool.machine(machine_ref).id.clone();
            let mounted = group_slots[instance].tool;
            let start = group_slots[instance].available.max(earliest);

            let inference = oracle.infer(op, mounted);
            feedback.record(FeedbackRecord {
                stage: Stage::Scheduling,
                job_id: op.key.job_id.clone(),
                operation_id: op.key.operation_id,
                machine: machine_id.clone(),
                current_tool: mounted,
                time: start,
                duration: inference.duration,
                observation: inference.observation.clone(),
            });
            let duration = inference.checked_duration(Stage::Scheduling, op)?;
            let end = start + duration;

            group_slots[instance] = Slot {
                available: end,
                tool: Some(tool),
            };

            let op = graph.operation_mut(current);
            op.plan_machine = Some(machine_ref);
            op.plan_start = Some(start);
            op.plan_duration = Some(duration);
            op.plan_end = Some(end);
            debug!(
                operation = %op.key,
                machine = %machine_id,
                start,
                duration,
                end,
                "committed"
            );
            plan.push(PlanEntry {
                job_id: op.key.job_id.clone(),
                operation_id: op.key.operation_id,
                machine: machine_id,
                start,
                duration,
                end,
            });

            if let Some(successor) = op.successor {
                if let Some(earliest_start) = graph.predecessors_plan_end(successor) {
                    let succ = graph.operation_mut(successor);
                    succ.plan_start = Some(earliest_start);
                    ready.push(0.0, succ.key.clone(), successor);
                }
            }
        }

        if plan.len() != graph.len() {
            let unscheduled = graph
                .operations()
                .iter()
                .filter(|op| !op.is_planned())
                .map(|op| op.key.clone())
                .collect();
            return Err(ShopError::UnscheduledOperations(unscheduled));
        }

        Ok(plan)
    }
}

/// Scores one ready operation, asking the oracle only when the rule needs
/// an estimate.
///
/// Valid estimates are not logged. An estimate that breaks the duration
/// contract is recorded before the error is returned.
fn score<O>(
    rule: &dyn PriorityRule,
    graph: &OperationGraph,
    pool: &MachinePool,
    slots: &BTreeMap<String, Vec<Slot>>,
    oracle: &mut O,
    feedback: &mut FeedbackLog,
    handle: OperationRef,
) -> ShopResult<RuleScore>
where
    O: DurationOracle + ?Sized,
{
    let op = graph.operation(handle);
    let mut context = PriorityContext::new();
    if let Some(end) = graph.predecessors_plan_end(handle) {
        context = context.with_predecessor_end(end);
    }
    if rule.needs_estimate() {
        let candidate = slots
            .get(&op.machine_group)
            .zip(pool.group(&op.machine_group))
            .map(|(group_slots, members)| {
                let instance = select_instance(group_slots);
                (members[instance], group_slots[instance])
            });
        let mounted = candidate.and_then(|(_, slot)| slot.tool);

        let inference = oracle.infer(op, mounted);
        match inference.checked_duration(Stage::Scheduling, op) {
            Ok(estimate) => context = context.with_estimate(estimate),
            Err(err) => {
                if let Some((machine, slot)) = candidate {
                    feedback.record(FeedbackRecord {
                        stage: Stage::Scheduling,
                        job_id: op.key.job_id.clone(),
                        operation_id: op.key.operation_id,
                        machine: pool.machine(machine).id.clone(),
                        current_tool: mounted,
                        time: slot.available.max(op.plan_start.unwrap_or(0.0)),
                        duration: inference.duration,
                        observation: inference.observation,
                    });
                }
                return Err(err);
            }
        }
    }
    Ok(rule.evaluate(op, &context))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MachineGroupSpec, MachineId, OperationSpec};
    use crate::oracle::{FnOracle, Inference, TemplateOracle};
    use serde_json::json;

    fn pool(groups: &[(&str, usize)]) -> MachinePool {
        let specs: Vec<MachineGroupSpec> = groups
            .iter()
            .map(|&(g, n)| MachineGroupSpec::new(g, n, vec![1, 2]))
            .collect();
        MachinePool::from_specs(&specs).unwrap()
    }

    fn run(
        specs: &[OperationSpec],
        pool: &MachinePool,
        rule: PriorityRuleKind,
    ) -> (OperationGraph, ShopResult<Plan>, FeedbackLog) {
        let mut graph = OperationGraph::from_specs(specs).unwrap();
        let mut feedback = FeedbackLog::new();
        let plan =
            GifflerThompson::new(rule).schedule(&mut graph, pool, &mut TemplateOracle, &mut feedback);
        (graph, plan, feedback)
    }

    #[test]
    fn test_single_operation_starts_at_zero() {
        let pool = pool(&[("a1", 2)]);
        let (graph, plan, feedback) = run(
            &[OperationSpec::new("p1", 1, "a1", 1, 12.0)],
            &pool,
            PriorityRuleKind::Dynamic,
        );
        let plan = plan.unwrap();
        assert_eq!(plan.len(), 1);
        let entry = &plan.entries[0];
        assert_eq!(entry.start, 0.0);
        assert_eq!(entry.end, 12.0);
        assert_eq!(entry.machine, MachineId::new("a1", 0));
        assert_eq!(feedback.len(), 1);

        let op = &graph.operations()[0];
        assert_eq!(op.plan_start, Some(0.0));
        assert_eq!(op.plan_duration, Some(12.0));
        assert_eq!(op.plan_end, Some(12.0));
    }

    #[test]
    fn test_sequential_on_single_machine() {
        let pool = pool(&[("a1", 1)]);
        for rule in [PriorityRuleKind::Dynamic, PriorityRuleKind::Fcfs] {
            let (_, plan, _) = run(
                &[
                    OperationSpec::new("p1", 1, "a1", 1, 30.0),
                    OperationSpec::new("p2", 1, "a1", 1, 20.0),
                ],
                &pool,
                rule,
            );
            let plan = plan.unwrap();
            assert_eq!(plan.makespan(), 50.0);
            let p1 = plan.entry("p1", 1).unwrap();
            let p2 = plan.entry("p2", 1).unwrap();
            assert!(p1.end <= p2.start || p2.end <= p1.start);
        }
    }

    #[test]
    fn test_and_join_waits_for_latest_predecessor() {
        let pool = pool(&[("a1", 1), ("a2", 1), ("a3", 1)]);
        let (_, plan, _) = run(
            &[
                OperationSpec::new("p", 1, "a1", 1, 10.0).with_successor(3),
                OperationSpec::new("p", 2, "a2", 1, 15.0).with_successor(3),
                OperationSpec::new("p", 3, "a3", 1, 5.0),
            ],
            &pool,
            PriorityRuleKind::Dynamic,
        );
        let plan = plan.unwrap();
        let p3 = plan.entry("p", 3).unwrap();
        assert_eq!(p3.start, 15.0);
        assert_eq!(p3.end, 20.0);
    }

    #[test]
    fn test_tie_break_assigns_smaller_key_to_first_instance() {
        let pool = pool(&[("a1", 2)]);
        let (_, plan, _) = run(
            &[
                OperationSpec::new("p2", 1, "a1", 1, 10.0),
                OperationSpec::new("p1", 1, "a1", 1, 10.0),
            ],
            &pool,
            PriorityRuleKind::Dynamic,
        );
        let plan = plan.unwrap();
        assert_eq!(plan.entries[0].job_id, "p1");
        assert_eq!(plan.entry("p1", 1).unwrap().machine, MachineId::new("a1", 0));
        assert_eq!(plan.entry("p2", 1).unwrap().machine, MachineId::new("a1", 1));
        assert_eq!(plan.entry("p2", 1).unwrap().start, 0.0);
    }

    #[test]
    fn test_fcfs_orders_by_encoded_ids() {
        let pool = pool(&[("a1", 1)]);
        let (_, plan, _) = run(
            &[
                OperationSpec::new("p3", 1, "a1", 1, 1.0),
                OperationSpec::new("p1", 1, "a1", 1, 1.0),
                OperationSpec::new("p2", 1, "a1", 1, 1.0),
            ],
            &pool,
            PriorityRuleKind::Fcfs,
        );
        let order: Vec<String> = plan
            .unwrap()
            .entries
            .iter()
            .map(|e| e.job_id.clone())
            .collect();
        assert_eq!(order, vec!["p1", "p2", "p3"]);
    }

    #[test]
    fn test_dynamic_prefers_earlier_predicted_completion() {
        // After p1_1 and p2_1 finish, p1_2 (pred end 10, 50 long) scores 60
        // and p2_2 (pred end 20, 5 long) scores 25: p2_2 goes first on a2.
        let pool = pool(&[("a1", 1), ("a2", 1)]);
        let (_, plan, _) = run(
            &[
                OperationSpec::new("p1", 1, "a1", 1, 10.0).with_successor(2),
                OperationSpec::new("p1", 2, "a2", 1, 50.0),
                OperationSpec::new("p2", 1, "a1", 1, 10.0).with_successor(2),
                OperationSpec::new("p2", 2, "a2", 1, 5.0),
            ],
            &pool,
            PriorityRuleKind::Dynamic,
        );
        let plan = plan.unwrap();
        let p1_2 = plan.entry("p1", 2).unwrap();
        let p2_2 = plan.entry("p2", 2).unwrap();
        assert!(p2_2.start < p1_2.start);
    }

    #[test]
    fn test_tool_state_passed_to_oracle() {
        let pool = pool(&[("a1", 1)]);
        let mut graph = OperationGraph::from_specs(&[
            OperationSpec::new("p1", 1, "a1", 7, 10.0).with_successor(2),
            OperationSpec::new("p1", 2, "a1", 8, 10.0),
        ])
        .unwrap();
        let mut feedback = FeedbackLog::new();
        GifflerThompson::new(PriorityRuleKind::Fcfs)
            .schedule(&mut graph, &pool, &mut TemplateOracle, &mut feedback)
            .unwrap();
        let tools: Vec<Option<ToolId>> = feedback.records().iter().map(|r| r.current_tool).collect();
        assert_eq!(tools, vec![None, Some(7)]);
    }

    #[test]
    fn test_invalid_duration_aborts_without_plan() {
        let pool = pool(&[("a1", 1), ("a2", 1)]);
        let mut graph = OperationGraph::from_specs(&[
            OperationSpec::new("p1", 1, "a1", 1, 10.0).with_successor(2),
            OperationSpec::new("p1", 2, "a2", 1, 10.0),
        ])
        .unwrap();
        let mut oracle = FnOracle::new("broken", |_: &crate::models::Operation, _| {
            Inference::new(-1.0, json!({"broken": true}))
        });
        let mut feedback = FeedbackLog::new();
        let err = GifflerThompson::new(PriorityRuleKind::Fcfs)
            .schedule(&mut graph, &pool, &mut oracle, &mut feedback)
            .unwrap_err();

        assert!(matches!(err, ShopError::InvalidDuration { stage: Stage::Scheduling, .. }));
        assert_eq!(err.operation(), Some(&OperationKey::new("p1", 1)));
        assert!(graph.operations().iter().all(|op| op.plan_end.is_none()));
        // The offending observation is still flushed.
        assert_eq!(feedback.len(), 1);
        assert_eq!(feedback.records()[0].observation, json!({"broken": true}));
    }

    #[test]
    fn test_unknown_group_rejected() {
        let pool = pool(&[("a1", 1)]);
        let (_, plan, _) = run(
            &[OperationSpec::new("p1", 1, "zz", 1, 10.0)],
            &pool,
            PriorityRuleKind::Dynamic,
        );
        assert!(matches!(plan, Err(ShopError::UnknownMachineGroup { .. })));
    }

    #[test]
    fn test_invalid_estimate_under_dynamic_rule_is_logged() {
        let pool = pool(&[("a1", 1)]);
        let mut graph = OperationGraph::from_specs(&[
            OperationSpec::new("p1", 1, "a1", 1, 10.0).with_successor(2),
            OperationSpec::new("p1", 2, "a1", 1, 10.0),
        ])
        .unwrap();
        let mut oracle = FnOracle::new("negative", |_: &crate::models::Operation, _| {
            Inference::new(-1.0, json!({"estimate": "negative"}))
        });
        let mut feedback = FeedbackLog::new();
        let err = GifflerThompson::new(PriorityRuleKind::Dynamic)
            .schedule(&mut graph, &pool, &mut oracle, &mut feedback)
            .unwrap_err();

        assert!(matches!(err, ShopError::InvalidDuration { stage: Stage::Scheduling, .. }));
        assert!(graph.operations().iter().all(|op| !op.is_planned()));
        assert_eq!(feedback.len(), 1);
        let record = &feedback.records()[0];
        assert_eq!(record.stage, Stage::Scheduling);
        assert_eq!(record.job_id, "p1");
        assert_eq!(record.operation_id, 1);
        assert_eq!(record.machine, MachineId::new("a1", 0));
        assert_eq!(record.duration, Some(-1.0));
        assert_eq!(record.observation, json!({"estimate": "negative"}));
    }

    #[test]
    fn test_valid_estimates_not_logged() {
        let pool = pool(&[("a1", 1)]);
        let mut graph = OperationGraph::from_specs(&[
            OperationSpec::new("p1", 1, "a1", 1, 10.0),
            OperationSpec::new("p2", 1, "a1", 1, 10.0),
        ])
        .unwrap();
        let mut feedback = FeedbackLog::new();
        GifflerThompson::new(PriorityRuleKind::Dynamic)
            .schedule(&mut graph, &pool, &mut TemplateOracle, &mut feedback)
            .unwrap();
        // One record per commit only.
        assert_eq!(feedback.len(), 2);
    }

    #[test]
    fn test_plan_ignores_tools_left_by_simulation() {
        use crate::config::DispatchMode;
        use crate::simulation::Simulator;

        let mut pool = pool(&[("a1", 1)]);
        let mut graph =
            OperationGraph::from_specs(&[OperationSpec::new("p1", 1, "a1", 2, 10.0)]).unwrap();
        let mut oracle = FnOracle::new("tool-sensitive", |op: &crate::models::Operation, tool| {
            let factor = if tool == Some(op.tool) { 1.0 } else { 2.0 };
            Inference::new(op.base_duration * factor, json!(null))
        });
        let scheduler = GifflerThompson::new(PriorityRuleKind::Dynamic);

        let first = scheduler
            .schedule(&mut graph, &pool, &mut oracle, &mut FeedbackLog::new())
            .unwrap();
        Simulator::new(DispatchMode::Planned)
            .run(&mut graph, &mut pool, &mut oracle, &mut FeedbackLog::new())
            .unwrap();
        assert_eq!(pool.machines()[0].current_tool, Some(2));

        let second = scheduler
            .schedule(&mut graph, &pool, &mut oracle, &mut FeedbackLog::new())
            .unwrap();
        assert!((first.makespan() - 20.0).abs() < 1e-9);
        assert_eq!(first, second);
    }

    #[test]
    fn test_plan_starts_from_configured_tool() {
        let pool = MachinePool::from_specs(&[
            MachineGroupSpec::new("a1", 1, vec![1, 2]).with_initial_tool(2)
        ])
        .unwrap();
        let mut graph =
            OperationGraph::from_specs(&[OperationSpec::new("p1", 1, "a1", 2, 10.0)]).unwrap();
        let mut feedback = FeedbackLog::new();
        GifflerThompson::new(PriorityRuleKind::Fcfs)
            .schedule(&mut graph, &pool, &mut TemplateOracle, &mut feedback)
            .unwrap();
        assert_eq!(feedback.records()[0].current_tool, Some(2));
    }

    #[test]
    fn test_repeatable() {
        let pool = pool(&[("a1", 2), ("a2", 1)]);
        let specs = vec![
            OperationSpec::new("p1", 1, "a1", 1, 10.0).with_successor(2),
            OperationSpec::new("p1", 2, "a2", 2, 7.0),
            OperationSpec::new("p2", 1, "a1", 2, 4.0).with_successor(2),
            OperationSpec::new("p2", 2, "a2", 1, 9.0),
            OperationSpec::new("p3", 1, "a1", 1, 6.0),
        ];
        let (_, first, _) = run(&specs, &pool, PriorityRuleKind::Dynamic);
        let (_, second, _) = run(&specs, &pool, PriorityRuleKind::Dynamic);
        assert_eq!(first.unwrap(), second.unwrap());
    }

    #[test]
    fn test_select_instance() {
        let slots = [
            Slot { available: 5.0, tool: None },
            Slot { available: 3.0, tool: None },
            Slot { available: 3.0, tool: None },
        ];
        assert_eq!(select_instance(&slots), 1);
        assert_eq!(select_instance(&slots[..1]), 0);
    }
}
