//! Plan and realized schedule records.
//!
//! These are the read-only outputs handed to downstream consumers
//! (persistence, Gantt rendering, deviation metrics). A [`Plan`] lists the
//! scheduler's commitments in commit order; a [`RealizedSchedule`] lists the
//! simulator's outcome in completion order, followed by any operations the
//! run did not finish.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{MachineId, OperationKey};

/// One planned operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanEntry {
    /// Owning job.
    pub job_id: String,
    /// Operation number within the job.
    pub operation_id: u32,
    /// Assigned machine instance.
    pub machine: MachineId,
    /// Planned start.
    pub start: f64,
    /// Planned duration.
    pub duration: f64,
    /// Planned end.
    pub end: f64,
}

impl PlanEntry {
    /// Identity of the planned operation.
    pub fn key(&self) -> OperationKey {
        OperationKey::new(self.job_id.clone(), self.operation_id)
    }
}

/// The scheduler's output: one entry per operation, in commit order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Committed operations.
    pub entries: Vec<PlanEntry>,
}

impl Plan {
    /// Creates an empty plan.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, entry: PlanEntry) {
        self.entries.push(entry);
    }

    /// Finds the entry of an operation.
    pub fn entry(&self, job_id: &str, operation_id: u32) -> Option<&PlanEntry> {
        self.entries
            .iter()
            .find(|e| e.job_id == job_id && e.operation_id == operation_id)
    }

    /// Entries assigned to a machine, in commit order.
    pub fn entries_for_machine(&self, machine: &MachineId) -> Vec<&PlanEntry> {
        self.entries.iter().filter(|e| &e.machine == machine).collect()
    }

    /// Latest planned end (0 for an empty plan).
    pub fn makespan(&self) -> f64 {
        self.entries.iter().map(|e| e.end).fold(0.0, f64::max)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the plan is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One operation of a realized schedule.
///
/// `start`, `end` and `actual_duration` stay `None` for operations the run
/// did not complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealizedEntry {
    /// Owning job.
    pub job_id: String,
    /// Operation number within the job.
    pub operation_id: u32,
    /// Machine that processed the operation.
    pub machine: Option<MachineId>,
    /// Simulated start.
    pub start: Option<f64>,
    /// Simulated end.
    pub end: Option<f64>,
    /// Duration from the plan, if one was made.
    pub planned_duration: Option<f64>,
    /// Duration drawn at execution time.
    pub actual_duration: Option<f64>,
}

impl RealizedEntry {
    /// Identity of the operation.
    pub fn key(&self) -> OperationKey {
        OperationKey::new(self.job_id.clone(), self.operation_id)
    }

    /// Whether the operation finished within the run.
    pub fn is_complete(&self) -> bool {
        self.end.is_some()
    }

    /// `actual - planned` when both are known.
    pub fn deviation(&self) -> Option<f64> {
        Some(self.actual_duration? - self.planned_duration?)
    }
}

/// The simulator's output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RealizedSchedule {
    /// Completed operations in completion order, then incomplete ones.
    pub entries: Vec<RealizedEntry>,
    /// Operations left unfinished when the run stopped.
    pub incomplete: Vec<OperationKey>,
    /// Simulated time at which the run stopped.
    pub end_time: f64,
    /// Whether the run stopped at the time cap with work outstanding.
    pub capped: bool,
}

impl RealizedSchedule {
    /// Whether every operation completed.
    pub fn is_complete(&self) -> bool {
        self.incomplete.is_empty()
    }

    /// Finds the entry of an operation.
    pub fn entry(&self, job_id: &str, operation_id: u32) -> Option<&RealizedEntry> {
        self.entries
            .iter()
            .find(|e| e.job_id == job_id && e.operation_id == operation_id)
    }

    /// Completed entries of a machine, in completion order.
    pub fn entries_for_machine(&self, machine: &MachineId) -> Vec<&RealizedEntry> {
        self.entries
            .iter()
            .filter(|e| e.is_complete() && e.machine.as_ref() == Some(machine))
            .collect()
    }

    /// Latest simulated end among completed operations.
    pub fn makespan(&self) -> f64 {
        self.entries
            .iter()
            .filter_map(|e| e.end)
            .fold(0.0, f64::max)
    }

    /// Mean `actual - planned` across entries where both are known.
    pub fn mean_deviation(&self) -> Option<f64> {
        let deviations: Vec<f64> = self.entries.iter().filter_map(RealizedEntry::deviation).collect();
        if deviations.is_empty() {
            None
        } else {
            Some(deviations.iter().sum::<f64>() / deviations.len() as f64)
        }
    }

    /// Per-job `(first start, last end)` over completed entries.
    pub fn job_spans(&self) -> BTreeMap<String, (f64, f64)> {
        let mut spans: BTreeMap<String, (f64, f64)> = BTreeMap::new();
        for e in &self.entries {
            if let (Some(start), Some(end)) = (e.start, e.end) {
                let span = spans
                    .entry(e.job_id.clone())
                    .or_insert((f64::INFINITY, f64::NEG_INFINITY));
                span.0 = span.0.min(start);
                span.1 = span.1.max(end);
            }
        }
        spans
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan_entry(job: &str, op: u32, machine: &str, start: f64, duration: f64) -> PlanEntry {
        PlanEntry {
            job_id: job.into(),
            operation_id: op,
            machine: MachineId::new(machine, 0),
            start,
            duration,
            end: start + duration,
        }
    }

    fn realized_entry(job: &str, op: u32, span: Option<(f64, f64)>, planned: f64) -> RealizedEntry {
        RealizedEntry {
            job_id: job.into(),
            operation_id: op,
            machine: span.map(|_| MachineId::new("a1", 0)),
            start: span.map(|s| s.0),
            end: span.map(|s| s.1),
            planned_duration: Some(planned),
            actual_duration: span.map(|s| s.1 - s.0),
        }
    }

    #[test]
    fn test_plan_queries() {
        let mut plan = Plan::new();
        plan.push(plan_entry("p1", 1, "a1", 0.0, 30.0));
        plan.push(plan_entry("p2", 1, "a1", 30.0, 20.0));
        plan.push(plan_entry("p2", 2, "a2", 50.0, 5.0));

        assert_eq!(plan.len(), 3);
        assert!((plan.makespan() - 55.0).abs() < 1e-9);
        assert_eq!(plan.entries_for_machine(&MachineId::new("a1", 0)).len(), 2);
        assert_eq!(plan.entry("p2", 2).unwrap().key(), OperationKey::new("p2", 2));
        assert!(plan.entry("p9", 1).is_none());
    }

    #[test]
    fn test_empty_plan() {
        let plan = Plan::new();
        assert!(plan.is_empty());
        assert_eq!(plan.makespan(), 0.0);
    }

    #[test]
    fn test_realized_deviation_and_spans() {
        let realized = RealizedSchedule {
            entries: vec![
                realized_entry("p1", 1, Some((0.0, 33.0)), 30.0),
                realized_entry("p1", 2, Some((33.0, 40.0)), 10.0),
                realized_entry("p2", 1, None, 20.0),
            ],
            incomplete: vec![OperationKey::new("p2", 1)],
            end_time: 40.0,
            capped: true,
        };

        assert!(!realized.is_complete());
        assert!((realized.makespan() - 40.0).abs() < 1e-9);
        // (+3) and (-3)
        assert!(realized.mean_deviation().unwrap().abs() < 1e-9);
        assert_eq!(realized.entry("p2", 1).unwrap().deviation(), None);
        assert_eq!(realized.entries_for_machine(&MachineId::new("a1", 0)).len(), 2);

        let spans = realized.job_spans();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans["p1"], (0.0, 40.0));
    }
}
