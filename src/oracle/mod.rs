//! Duration oracles and the feedback log.
//!
//! The scheduler and the simulator never decide how long an operation
//! takes. They ask a [`DurationOracle`], handing it the operation and the
//! tool currently mounted on the candidate machine, and receive a duration
//! plus an opaque observation record. Observations of committed decisions
//! are forwarded verbatim to a [`FeedbackLog`] for external consumers.
//!
//! # Contract
//! A usable duration is finite and strictly positive. Anything else,
//! including a missing duration, aborts the current run with
//! [`ShopError::InvalidDuration`].

mod models;

pub use models::{FnOracle, NoisyOracle, ScaledOracle, TemplateOracle, ToolChangeOracle};

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::error::{ShopError, ShopResult, Stage};
use crate::models::{MachineId, Operation, ToolId};

/// Oracle answer for one decision point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inference {
    /// Predicted or actual duration. `None` = the oracle has no answer.
    pub duration: Option<f64>,
    /// Opaque record describing how the duration came about.
    pub observation: serde_json::Value,
}

impl Inference {
    /// An answer with a duration.
    pub fn new(duration: f64, observation: serde_json::Value) -> Self {
        Self {
            duration: Some(duration),
            observation,
        }
    }

    /// An answer without a duration.
    pub fn missing(observation: serde_json::Value) -> Self {
        Self {
            duration: None,
            observation,
        }
    }

    /// Checks the duration contract.
    pub(crate) fn checked_duration(&self, stage: Stage, operation: &Operation) -> ShopResult<f64> {
        match self.duration {
            Some(d) if d.is_finite() && d > 0.0 => Ok(d),
            duration => Err(ShopError::InvalidDuration {
                stage,
                operation: operation.key.clone(),
                duration,
            }),
        }
    }
}

/// Predicts operation durations.
///
/// Called synchronously at every decision point; must not block.
/// Implementations may keep state (random generators, learned statistics),
/// hence `&mut self`.
pub trait DurationOracle: Debug {
    /// Oracle name, used in logs.
    fn name(&self) -> &'static str;

    /// Duration of `operation` on a machine that currently holds `current_tool`.
    fn infer(&mut self, operation: &Operation, current_tool: Option<ToolId>) -> Inference;
}

impl<O: DurationOracle + ?Sized> DurationOracle for &mut O {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn infer(&mut self, operation: &Operation, current_tool: Option<ToolId>) -> Inference {
        (**self).infer(operation, current_tool)
    }
}

impl<O: DurationOracle + ?Sized> DurationOracle for Box<O> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn infer(&mut self, operation: &Operation, current_tool: Option<ToolId>) -> Inference {
        (**self).infer(operation, current_tool)
    }
}

/// One oracle observation with its decision context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    /// Where the decision was made.
    pub stage: Stage,
    /// Owning job.
    pub job_id: String,
    /// Operation number within the job.
    pub operation_id: u32,
    /// Machine the decision concerned.
    pub machine: MachineId,
    /// Tool mounted on the machine when the oracle was asked.
    pub current_tool: Option<ToolId>,
    /// Planned or simulated start time of the decision.
    pub time: f64,
    /// Duration as returned by the oracle.
    pub duration: Option<f64>,
    /// The oracle's observation, untouched.
    pub observation: serde_json::Value,
}

/// Explicit output channel for oracle observations.
///
/// Passed by `&mut` into each run, so records gathered before a fatal
/// error stay with the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackLog {
    records: Vec<FeedbackRecord>,
}

impl FeedbackLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record.
    pub fn record(&mut self, record: FeedbackRecord) {
        self.records.push(record);
    }

    /// All records, in decision order.
    pub fn records(&self) -> &[FeedbackRecord] {
        &self.records
    }

    /// Records of one stage.
    pub fn records_for(&self, stage: Stage) -> impl Iterator<Item = &FeedbackRecord> {
        self.records.iter().filter(move |r| r.stage == stage)
    }

    /// Takes all records, leaving the log empty.
    pub fn drain(&mut self) -> Vec<FeedbackRecord> {
        std::mem::take(&mut self.records)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
