//! Planning and KPI evaluation.
//!
//! # Algorithm
//!
//! [`GifflerThompson`] is a greedy, priority-driven list scheduler. It
//! re-scores the ready set before every commitment and assigns each
//! operation to the group instance that frees up first. It is not optimal,
//! but it is fast and deterministic.
//!
//! # KPI
//!
//! [`ScheduleKpi`] computes makespan, flow time and utilization for both a
//! plan and a realized schedule.
//!
//! # References
//!
//! - Giffler & Thompson (1960), "Algorithms for Solving Production-Scheduling Problems"
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems", Ch. 3-4

mod giffler_thompson;
mod kpi;

pub use giffler_thompson::GifflerThompson;
pub use kpi::ScheduleKpi;
