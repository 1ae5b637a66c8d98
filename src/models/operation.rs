//! Operation model.
//!
//! An operation is one processing step of a job. It needs one machine
//! from a named group, mounts a specific tool, and hands its output to at
//! most one successor. Several operations may feed the same successor
//! (AND-join), so the operations of a job form an in-tree rooted at the
//! job's terminal operation.
//!
//! # Lifecycle
//! Created from an [`OperationSpec`] during graph construction, its plan
//! fields are written by the scheduler and its execution fields by the
//! simulator. Downstream consumers only read it.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::MachineRef;

/// Tool identifier.
pub type ToolId = u32;

/// Successor sentinel used in input tuples: the operation is terminal.
pub const TERMINAL: i64 = -1;

/// Handle of an operation inside an [`OperationGraph`](super::OperationGraph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OperationRef(pub(crate) usize);

impl OperationRef {
    /// Position in the graph arena.
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Identity of an operation: `(job_id, operation_id)`.
///
/// Ordering is lexical on the job ID, then numeric on the operation ID:
/// `p1_2` sorts before `p1_10`, and `p10_1` before `p2_1`. The two parts
/// are compared separately, never as one joined string.
/// The scheduler uses this ordering to break priority ties.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OperationKey {
    /// Owning job.
    pub job_id: String,
    /// Operation number within the job.
    pub operation_id: u32,
}

impl OperationKey {
    /// Creates a key.
    pub fn new(job_id: impl Into<String>, operation_id: u32) -> Self {
        Self {
            job_id: job_id.into(),
            operation_id,
        }
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.job_id, self.operation_id)
    }
}

/// Input tuple describing one operation.
///
/// Deserializes from either a JSON object or the positional form
/// `[job_id, operation_id, machine_group, tool, base_duration, successor]`.
/// A `successor` of [`TERMINAL`] marks the job's last operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationSpec {
    /// Owning job.
    pub job_id: String,
    /// Operation number within the job.
    pub operation_id: u32,
    /// Machine group able to process the operation.
    pub machine_group: String,
    /// Tool the operation mounts.
    pub tool: ToolId,
    /// Template (planned) duration.
    pub base_duration: f64,
    /// Successor operation ID in the same job, or [`TERMINAL`].
    pub successor: i64,
}

impl OperationSpec {
    /// Creates a terminal operation spec.
    pub fn new(
        job_id: impl Into<String>,
        operation_id: u32,
        machine_group: impl Into<String>,
        tool: ToolId,
        base_duration: f64,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            operation_id,
            machine_group: machine_group.into(),
            tool,
            base_duration,
            successor: TERMINAL,
        }
    }

    /// Sets the successor operation ID.
    pub fn with_successor(mut self, successor: u32) -> Self {
        self.successor = i64::from(successor);
        self
    }

    /// Identity of the described operation.
    pub fn key(&self) -> OperationKey {
        OperationKey::new(self.job_id.clone(), self.operation_id)
    }

    /// Whether the operation ends its job.
    pub fn is_terminal(&self) -> bool {
        self.successor == TERMINAL
    }
}

/// An operation inside an operation graph.
#[derive(Debug, Clone, Serialize)]
pub struct Operation {
    /// Identity.
    pub key: OperationKey,
    /// Machine group able to process the operation.
    pub machine_group: String,
    /// Tool the operation mounts.
    pub tool: ToolId,
    /// Template duration.
    pub base_duration: f64,
    /// Successor operation ID (`None` = terminal).
    pub successor_id: Option<u32>,

    /// Resolved successor handle.
    pub successor: Option<OperationRef>,
    /// Resolved predecessor handles, in input order.
    pub predecessors: Vec<OperationRef>,

    /// Machine chosen by the scheduler.
    pub plan_machine: Option<MachineRef>,
    /// Planned start. Set early to the earliest feasible start once all
    /// predecessors are planned, then overwritten on commit.
    pub plan_start: Option<f64>,
    /// Planned end.
    pub plan_end: Option<f64>,
    /// Planned duration.
    pub plan_duration: Option<f64>,

    /// Machine that actually processed the operation (non-owning).
    ///
    /// Execution fields are only kept for operations that finished within
    /// the run; an operation still processing at the time cap has all of
    /// them unset.
    pub assigned_machine: Option<MachineRef>,
    /// Simulated start.
    pub sim_start: Option<f64>,
    /// Simulated processing duration.
    pub sim_duration: Option<f64>,
    /// Simulated end.
    pub sim_end: Option<f64>,
}

impl Operation {
    pub(crate) fn from_spec(spec: &OperationSpec) -> Self {
        Self {
            key: spec.key(),
            machine_group: spec.machine_group.clone(),
            tool: spec.tool,
            base_duration: spec.base_duration,
            successor_id: u32::try_from(spec.successor).ok(),
            successor: None,
            predecessors: Vec::new(),
            plan_machine: None,
            plan_start: None,
            plan_end: None,
            plan_duration: None,
            assigned_machine: None,
            sim_start: None,
            sim_duration: None,
            sim_end: None,
        }
    }

    /// Owning job.
    #[inline]
    pub fn job_id(&self) -> &str {
        &self.key.job_id
    }

    /// Operation number within the job.
    #[inline]
    pub fn operation_id(&self) -> u32 {
        self.key.operation_id
    }

    /// Whether the operation ends its job.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.successor_id.is_none()
    }

    /// Whether the scheduler has committed this operation.
    #[inline]
    pub fn is_planned(&self) -> bool {
        self.plan_end.is_some()
    }

    /// Whether the simulator has finished this operation.
    #[inline]
    pub fn is_completed(&self) -> bool {
        self.sim_end.is_some()
    }

    pub(crate) fn clear_plan(&mut self) {
        self.plan_machine = None;
        self.plan_start = None;
        self.plan_end = None;
        self.plan_duration = None;
    }

    pub(crate) fn clear_execution(&mut self) {
        self.assigned_machine = None;
        self.sim_start = None;
        self.sim_duration = None;
        self.sim_end = None;
    }
}
