//! Schedule quality metrics (KPIs).
//!
//! Computes the same indicators for a plan and for a realized schedule so
//! the two can be compared side by side.
//!
//! # Metrics
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Makespan (C_max) | Latest completion time |
//! | Avg Flow Time | Mean over jobs of (last end - first start) |
//! | Avg Utilization | Mean machine busyness over [0, makespan] |
//! | Completed | Operations with a known end |
//!
//! Machines that never appear in the schedule are not counted.
//!
//! # Reference
//! Pinedo (2016), "Scheduling", Ch. 1.2: Performance Measures

use std::collections::BTreeMap;

use crate::models::{Plan, RealizedSchedule};

/// Schedule performance indicators, in simulated time units.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScheduleKpi {
    /// Latest completion time.
    pub makespan: f64,
    /// Mean job flow time.
    pub avg_flow_time: f64,
    /// Average machine utilization (0.0..1.0).
    pub avg_utilization: f64,
    /// Per-machine utilization, keyed by machine ID (e.g. `a1_0`).
    pub utilization_by_machine: BTreeMap<String, f64>,
    /// Number of completed operations.
    pub completed: usize,
}

/// One busy interval: (job, machine, start, end).
type Interval<'a> = (&'a str, String, f64, f64);

impl ScheduleKpi {
    /// KPIs of a plan.
    pub fn from_plan(plan: &Plan) -> Self {
        Self::calculate(
            plan.entries
                .iter()
                .map(|e| (e.job_id.as_str(), e.machine.to_string(), e.start, e.end)),
        )
    }

    /// KPIs of a realized schedule; incomplete operations are ignored.
    pub fn from_realized(realized: &RealizedSchedule) -> Self {
        Self::calculate(realized.entries.iter().filter_map(|e| {
            Some((e.job_id.as_str(), e.machine.as_ref()?.to_string(), e.start?, e.end?))
        }))
    }

    fn calculate<'a>(intervals: impl Iterator<Item = Interval<'a>>) -> Self {
        let mut makespan: f64 = 0.0;
        let mut completed = 0;
        let mut busy: BTreeMap<String, f64> = BTreeMap::new();
        let mut spans: BTreeMap<&str, (f64, f64)> = BTreeMap::new();

        for (job, machine, start, end) in intervals {
            completed += 1;
            makespan = makespan.max(end);
            *busy.entry(machine).or_insert(0.0) += end - start;
            let span = spans.entry(job).or_insert((start, end));
            span.0 = span.0.min(start);
            span.1 = span.1.max(end);
        }

        let utilization_by_machine: BTreeMap<String, f64> = busy
            .into_iter()
            .map(|(machine, time)| {
                let util = if makespan > 0.0 { time / makespan } else { 0.0 };
                (machine, util)
            })
            .collect();

        let avg_utilization = if utilization_by_machine.is_empty() {
            0.0
        } else {
            let sum: f64 = utilization_by_machine.values().sum();
            sum / utilization_by_machine.len() as f64
        };

        let avg_flow_time = if spans.is_empty() {
            0.0
        } else {
            let total: f64 = spans.values().map(|(start, end)| end - start).sum();
            total / spans.len() as f64
        };

        Self {
            makespan,
            avg_flow_time,
            avg_utilization,
            utilization_by_machine,
            completed,
        }
    }

    /// Whether the schedule meets the given quality thresholds.
    pub fn meets_thresholds(&self, max_makespan: f64, min_utilization: f64) -> bool {
        self.makespan <= max_makespan && self.avg_utilization >= min_utilization
    }
}
