//! Plan execution in simulated time.
//!
//! Every operation runs as a small state machine driven by the event
//! calendar:
//!
//! ```text
//! WaitingPredecessors -> Delaying -> Queued -> Processing -> Done
//! ```
//!
//! `Delaying` is only entered in planned mode with a positive wait, and
//! `Queued` only when the machine is held by someone else. Virtual time
//! jumps to the next calendar entry once every runnable task has blocked.

use tracing::{debug, error, info, warn};

use super::engine::EventQueue;
use crate::config::{DispatchMode, RunConfig};
use crate::error::{ShopError, ShopResult, Stage};
use crate::models::{
    MachineId, MachinePool, MachineRef, OperationGraph, OperationRef, RealizedEntry,
    RealizedSchedule,
};
use crate::oracle::{DurationOracle, FeedbackLog, FeedbackRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskState {
    /// Not yet started by the engine.
    Created,
    WaitingPredecessors,
    Delaying,
    Queued(MachineRef),
    Processing(MachineRef),
    Done,
}

/// Discrete-event simulator for a job shop.
///
/// # Example
///
/// ```
/// use u_shopsim::config::DispatchMode;
/// use u_shopsim::models::{MachineGroupSpec, MachinePool, OperationGraph, OperationSpec};
/// use u_shopsim::oracle::{FeedbackLog, TemplateOracle};
/// use u_shopsim::simulation::Simulator;
///
/// let mut graph = OperationGraph::from_specs(&[
///     OperationSpec::new("p1", 1, "a1", 1, 30.0),
///     OperationSpec::new("p2", 1, "a1", 1, 20.0),
/// ]).unwrap();
/// let mut pool = MachinePool::from_specs(&[MachineGroupSpec::new("a1", 1, vec![1])]).unwrap();
///
/// let mut feedback = FeedbackLog::new();
/// let realized = Simulator::new(DispatchMode::Dynamic)
///     .run(&mut graph, &mut pool, &mut TemplateOracle, &mut feedback)
///     .unwrap();
/// assert!(realized.is_complete());
/// assert_eq!(realized.makespan(), 50.0);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Simulator {
    mode: DispatchMode,
    time_cap: Option<f64>,
}

impl Simulator {
    /// Creates an uncapped simulator.
    pub fn new(mode: DispatchMode) -> Self {
        Self {
            mode,
            time_cap: None,
        }
    }

    /// Creates a simulator with the configured mode and cap.
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            mode: config.mode,
            time_cap: config.time_cap,
        }
    }

    /// Stops the run once simulated time reaches `cap`.
    pub fn with_time_cap(mut self, cap: f64) -> Self {
        self.time_cap = Some(cap);
        self
    }

    /// Dispatch mode.
    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Simulated-time cap.
    pub fn time_cap(&self) -> Option<f64> {
        self.time_cap
    }

    /// Executes `graph` on `pool`.
    ///
    /// Execution fields of the graph and the pool's machine state are reset
    /// first. In planned mode the graph must carry a plan from the
    /// scheduler; in dynamic mode plan fields are ignored.
    ///
    /// # Errors
    /// - [`ShopError::UnknownMachineGroup`] if the pool lacks a required group.
    /// - [`ShopError::MissingPlan`] / [`ShopError::UnknownMachine`] in planned
    ///   mode when an operation has no usable plan.
    /// - [`ShopError::InvalidDuration`] if the oracle breaks its contract.
    ///
    /// Reaching the time cap is not an error: the partial schedule is
    /// returned with `capped` set.
    pub fn run<O>(
        &self,
        graph: &mut OperationGraph,
        pool: &mut MachinePool,
        oracle: &mut O,
        feedback: &mut FeedbackLog,
    ) -> ShopResult<RealizedSchedule>
    where
        O: DurationOracle + ?Sized,
    {
        graph.validate_against(pool)?;
        graph.reset_execution();
        pool.reset();

        info!(
            operations = graph.len(),
            machines = pool.len(),
            mode = ?self.mode,
            cap = ?self.time_cap,
            oracle = oracle.name(),
            "simulation started"
        );

        let mut run = Run::new(self.mode, graph, pool, oracle, feedback);
        match run.execute(self.time_cap) {
            Ok(()) => {
                let realized = run.realized();
                info!(
                    completed = realized.entries.len() - realized.incomplete.len(),
                    end_time = realized.end_time,
                    makespan = realized.makespan(),
                    "simulation finished"
                );
                Ok(realized)
            }
            Err(err) => {
                error!(%err, time = run.now, "simulation aborted");
                Err(err)
            }
        }
    }
}

/// State of one simulation run.
struct Run<'a, O: ?Sized> {
    mode: DispatchMode,
    graph: &'a mut OperationGraph,
    pool: &'a mut MachinePool,
    oracle: &'a mut O,
    feedback: &'a mut FeedbackLog,
    events: EventQueue,
    now: f64,
    states: Vec<TaskState>,
    /// Predecessors not yet finished.
    pending: Vec<usize>,
    completed: Vec<OperationRef>,
    capped: bool,
}

impl<'a, O> Run<'a, O>
where
    O: DurationOracle + ?Sized,
{
    fn new(
        mode: DispatchMode,
        graph: &'a mut OperationGraph,
        pool: &'a mut MachinePool,
        oracle: &'a mut O,
        feedback: &'a mut FeedbackLog,
    ) -> Self {
        let states = vec![TaskState::Created; graph.len()];
        let pending = graph
            .operations()
            .iter()
            .map(|op| op.predecessors.len())
            .collect();
        Self {
            mode,
            graph,
            pool,
            oracle,
            feedback,
            events: EventQueue::new(),
            now: 0.0,
            states,
            pending,
            completed: Vec::new(),
            capped: false,
        }
    }

    fn execute(&mut self, cap: Option<f64>) -> ShopResult<()> {
        // Tasks start in post-order from each terminal: predecessors first.
        let mut order = Vec::with_capacity(self.graph.len());
        for terminal in self.graph.terminals() {
            self.collect_post_order(terminal, &mut order);
        }
        for handle in order {
            self.events.schedule(0.0, handle);
        }

        while let Some(time) = self.events.peek_time() {
            if cap.is_some_and(|c| time >= c) {
                self.capped = true;
                self.now = cap.unwrap_or(time);
                warn!(
                    cap = self.now,
                    pending_events = self.events.len(),
                    "time cap reached with work outstanding"
                );
                break;
            }
            let Some(event) = self.events.pop() else {
                break;
            };
            self.now = event.time;
            self.step(event.operation)?;
        }
        Ok(())
    }

    fn collect_post_order(&self, handle: OperationRef, order: &mut Vec<OperationRef>) {
        for &pred in &self.graph.operation(handle).predecessors {
            self.collect_post_order(pred, order);
        }
        order.push(handle);
    }

    /// Advances one task as far as it can go without waiting.
    fn step(&mut self, handle: OperationRef) -> ShopResult<()> {
        match self.states[handle.index()] {
            TaskState::Created => {
                if self.pending[handle.index()] > 0 {
                    debug!(operation = %self.key(handle), time = self.now, "waiting for predecessors");
                    self.states[handle.index()] = TaskState::WaitingPredecessors;
                    Ok(())
                } else {
                    self.gate(handle)
                }
            }
            TaskState::WaitingPredecessors => self.gate(handle),
            TaskState::Delaying => self.request(handle),
            TaskState::Queued(machine) => self.acquire(handle, machine),
            TaskState::Processing(machine) => {
                self.finish(handle, machine);
                Ok(())
            }
            TaskState::Done => Ok(()),
        }
    }

    /// Planned-mode start gating.
    fn gate(&mut self, handle: OperationRef) -> ShopResult<()> {
        if self.mode == DispatchMode::Planned {
            let op = self.graph.operation(handle);
            let plan_start = op
                .plan_start
                .ok_or_else(|| ShopError::MissingPlan(op.key.clone()))?;
            let delay = plan_start - self.now;
            if delay > 0.0 {
                debug!(operation = %op.key, time = self.now, until = plan_start, "delaying to planned start");
                self.states[handle.index()] = TaskState::Delaying;
                self.events.schedule(plan_start, handle);
                return Ok(());
            }
        }
        self.request(handle)
    }

    fn request(&mut self, handle: OperationRef) -> ShopResult<()> {
        let machine = self.target_machine(handle)?;
        debug!(
            operation = %self.key(handle),
            machine = %self.pool.machine(machine).id,
            time = self.now,
            "requesting machine"
        );
        if self.pool.machine_mut(machine).resource.request(handle) {
            self.acquire(handle, machine)
        } else {
            self.states[handle.index()] = TaskState::Queued(machine);
            Ok(())
        }
    }

    fn target_machine(&self, handle: OperationRef) -> ShopResult<MachineRef> {
        let op = self.graph.operation(handle);
        match self.mode {
            DispatchMode::Planned => {
                let machine = op
                    .plan_machine
                    .ok_or_else(|| ShopError::MissingPlan(op.key.clone()))?;
                let in_group = machine.index() < self.pool.len()
                    && self.pool.machine(machine).id.group == op.machine_group;
                if in_group {
                    Ok(machine)
                } else {
                    Err(ShopError::UnknownMachine {
                        operation: op.key.clone(),
                        machine: MachineId::new(op.machine_group.clone(), machine.index()),
                    })
                }
            }
            DispatchMode::Dynamic => {
                let members = self.pool.group(&op.machine_group).unwrap_or_default();
                members
                    .iter()
                    .copied()
                    .min_by_key(|&m| self.pool.machine(m).load())
                    .ok_or_else(|| ShopError::UnknownMachineGroup {
                        operation: op.key.clone(),
                        group: op.machine_group.clone(),
                    })
            }
        }
    }

    fn acquire(&mut self, handle: OperationRef, machine_ref: MachineRef) -> ShopResult<()> {
        let now = self.now;
        let op = self.graph.operation(handle);
        let machine = self.pool.machine(machine_ref);
        let mounted = machine.current_tool;

        let inference = self.oracle.infer(op, mounted);
        self.feedback.record(FeedbackRecord {
            stage: Stage::Simulation,
            job_id: op.key.job_id.clone(),
            operation_id: op.key.operation_id,
            machine: machine.id.clone(),
            current_tool: mounted,
            time: now,
            duration: inference.duration,
            observation: inference.observation.clone(),
        });
        let duration = inference.checked_duration(Stage::Simulation, op)?;
        let tool = op.tool;
        debug!(
            operation = %op.key,
            machine = %machine.id,
            time = now,
            duration,
            tool_change = mounted != Some(tool),
            "starting"
        );

        let op = self.graph.operation_mut(handle);
        op.sim_start = Some(now);
        op.sim_duration = Some(duration);
        op.assigned_machine = Some(machine_ref);

        let machine = self.pool.machine_mut(machine_ref);
        machine.current_operation = Some(handle);
        machine.current_tool = Some(tool);

        self.states[handle.index()] = TaskState::Processing(machine_ref);
        self.events.schedule(now + duration, handle);
        Ok(())
    }

    fn finish(&mut self, handle: OperationRef, machine_ref: MachineRef) {
        let now = self.now;
        let op = self.graph.operation_mut(handle);
        op.sim_end = Some(now);
        let successor = op.successor;
        debug!(operation = %op.key, time = now, "finished");

        let machine = self.pool.machine_mut(machine_ref);
        machine.current_operation = None;
        machine.history.push(handle);
        if let Some(next) = machine.resource.release(handle) {
            self.events.schedule(now, next);
        }

        self.states[handle.index()] = TaskState::Done;
        self.completed.push(handle);

        if let Some(succ) = successor {
            let pending = &mut self.pending[succ.index()];
            *pending = pending.saturating_sub(1);
            if *pending == 0 && self.states[succ.index()] == TaskState::WaitingPredecessors {
                self.events.schedule(now, succ);
            }
        }
    }

    fn key(&self, handle: OperationRef) -> &crate::models::OperationKey {
        &self.graph.operation(handle).key
    }

    /// Completed operations in completion order, then the rest in graph order.
    ///
    /// Operations that did not finish lose their execution fields, so the
    /// graph agrees with the returned schedule.
    fn realized(&mut self) -> RealizedSchedule {
        for handle in self.graph.handles().collect::<Vec<_>>() {
            if self.states[handle.index()] != TaskState::Done {
                self.graph.operation_mut(handle).clear_execution();
            }
        }

        let entry = |handle: OperationRef| {
            let op = self.graph.operation(handle);
            RealizedEntry {
                job_id: op.key.job_id.clone(),
                operation_id: op.key.operation_id,
                machine: op.assigned_machine.map(|m| self.pool.machine(m).id.clone()),
                start: op.sim_start,
                end: op.sim_end,
                planned_duration: op.plan_duration,
                actual_duration: op.sim_duration,
            }
        };

        let mut entries: Vec<RealizedEntry> = self.completed.iter().map(|&h| entry(h)).collect();
        let mut incomplete = Vec::new();
        for handle in self.graph.handles() {
            if self.states[handle.index()] != TaskState::Done {
                incomplete.push(self.graph.operation(handle).key.clone());
                entries.push(entry(handle));
            }
        }

        RealizedSchedule {
            entries,
            capped: self.capped && !incomplete.is_empty(),
            incomplete,
            end_time: self.now,
        }
    }
}
