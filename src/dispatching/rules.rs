//! Built-in priority rules.
//!
//! # Score Convention
//! All rules return lower scores for operations that should be planned
//! first. Equal scores fall back to `(job_id, operation_id)` order in the
//! scheduler's ready set.

use super::{PriorityContext, PriorityRule, RuleScore};
use crate::models::Operation;

/// Earliest predicted completion.
///
/// - No predecessors: the operation's current planned start, or 0.
/// - Otherwise: latest predecessor end + estimated duration.
#[derive(Debug, Clone, Copy)]
pub struct Dynamic;

impl PriorityRule for Dynamic {
    fn name(&self) -> &'static str {
        "dynamic"
    }

    fn needs_estimate(&self) -> bool {
        true
    }

    fn evaluate(&self, operation: &Operation, context: &PriorityContext) -> RuleScore {
        match context.predecessor_end {
            None => operation.plan_start.unwrap_or(0.0),
            Some(end) => end + context.estimated_duration.unwrap_or(operation.base_duration),
        }
    }

    fn description(&self) -> &'static str {
        "Earliest predicted completion"
    }
}

/// First come, first served.
///
/// Concatenates the digits of the job ID with the operation ID and reads
/// the result as a number: job `p12`, operation 3 scores 123. Timing is
/// ignored.
#[derive(Debug, Clone, Copy)]
pub struct Fcfs;

impl Fcfs {
    fn encode(job_id: &str, operation_id: u32) -> f64 {
        let digits: String = job_id
            .chars()
            .filter(char::is_ascii_digit)
            .chain(operation_id.to_string().chars())
            .collect();
        // Only digits, never empty: the operation ID contributes at least one.
        digits.parse().unwrap_or(f64::MAX)
    }
}

impl PriorityRule for Fcfs {
    fn name(&self) -> &'static str {
        "fcfs"
    }

    fn evaluate(&self, operation: &Operation, _context: &PriorityContext) -> RuleScore {
        Self::encode(operation.job_id(), operation.operation_id())
    }

    fn description(&self) -> &'static str {
        "First come, first served"
    }
}
