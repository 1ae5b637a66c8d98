//! Error types.
//!
//! Every failure here is fatal for the current run: nothing is retried.
//! Errors raised while a run is under way carry the [`Stage`] and the
//! offending operation.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::models::{MachineId, OperationKey};
use crate::validation::ValidationError;

/// Phase of a run in which an error or observation arose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Plan construction.
    Scheduling,
    /// Discrete-event execution.
    Simulation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Scheduling => f.write_str("scheduling"),
            Stage::Simulation => f.write_str("simulation"),
        }
    }
}

/// Errors raised while building, scheduling or simulating a job shop.
#[derive(Debug, Error)]
pub enum ShopError {
    #[error("malformed operation graph: {}", summarize(.0))]
    MalformedGraph(Vec<ValidationError>),

    #[error("machine group '{0}' has no instances")]
    EmptyMachineGroup(String),

    #[error("machine group '{0}' is configured twice")]
    DuplicateMachineGroup(String),

    #[error("operation {operation} requires unknown machine group '{group}'")]
    UnknownMachineGroup {
        operation: OperationKey,
        group: String,
    },

    #[error("{stage}: oracle returned invalid duration {duration:?} for operation {operation}")]
    InvalidDuration {
        stage: Stage,
        operation: OperationKey,
        duration: Option<f64>,
    },

    #[error("scheduling: {} operation(s) never became ready, first {}", .0.len(), first(.0))]
    UnscheduledOperations(Vec<OperationKey>),

    #[error("simulation: operation {0} has no planned machine")]
    MissingPlan(OperationKey),

    #[error("simulation: operation {operation} planned on unknown machine {machine}")]
    UnknownMachine {
        operation: OperationKey,
        machine: MachineId,
    },

    #[error("invalid oracle distribution: {0}")]
    InvalidDistribution(String),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

pub type ShopResult<T> = Result<T, ShopError>;

impl ShopError {
    /// Stage in which the error arose, when it arose during a run.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            ShopError::InvalidDuration { stage, .. } => Some(*stage),
            ShopError::UnscheduledOperations(_) => Some(Stage::Scheduling),
            ShopError::MissingPlan(_) | ShopError::UnknownMachine { .. } => Some(Stage::Simulation),
            _ => None,
        }
    }

    /// Operation the error is about, if any.
    pub fn operation(&self) -> Option<&OperationKey> {
        match self {
            ShopError::UnknownMachineGroup { operation, .. }
            | ShopError::InvalidDuration { operation, .. }
            | ShopError::UnknownMachine { operation, .. } => Some(operation),
            ShopError::MissingPlan(operation) => Some(operation),
            ShopError::UnscheduledOperations(ops) => ops.first(),
            _ => None,
        }
    }
}

fn summarize(errors: &[ValidationError]) -> String {
    match errors {
        [] => "no details".to_string(),
        [only] => only.to_string(),
        [head, rest @ ..] => format!("{head} (and {} more)", rest.len()),
    }
}

fn first(ops: &[OperationKey]) -> String {
    ops.first().map(ToString::to_string).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_duration_context() {
        let err = ShopError::InvalidDuration {
            stage: Stage::Simulation,
            operation: OperationKey::new("p1", 2),
            duration: Some(-1.0),
        };
        assert_eq!(err.stage(), Some(Stage::Simulation));
        assert_eq!(err.operation(), Some(&OperationKey::new("p1", 2)));
        assert_eq!(
            err.to_string(),
            "simulation: oracle returned invalid duration Some(-1.0) for operation p1_2"
        );
    }

    #[test]
    fn test_configuration_errors_have_no_stage() {
        let err = ShopError::EmptyMachineGroup("a1".into());
        assert_eq!(err.stage(), None);
        assert_eq!(err.operation(), None);
        assert_eq!(err.to_string(), "machine group 'a1' has no instances");
    }

    #[test]
    fn test_unscheduled_message() {
        let err = ShopError::UnscheduledOperations(vec![
            OperationKey::new("p1", 1),
            OperationKey::new("p1", 2),
        ]);
        assert_eq!(
            err.to_string(),
            "scheduling: 2 operation(s) never became ready, first p1_1"
        );
        assert_eq!(err.stage(), Some(Stage::Scheduling));
    }
}
