//! Priority rules for the scheduler's ready set.
//!
//! Before every selection the scheduler re-scores each ready operation
//! with the configured rule. Rules form a closed set, [`PriorityRuleKind`];
//! each variant maps to a [`PriorityRule`] strategy object, so adding a rule
//! means adding a variant and a struct.
//!
//! # Usage
//!
//! ```
//! use u_shopsim::dispatching::{PriorityContext, PriorityRuleKind};
//!
//! let rule = PriorityRuleKind::Dynamic.rule();
//! assert_eq!(rule.name(), "dynamic");
//! assert!(rule.needs_estimate());
//! let _ctx = PriorityContext::new().with_predecessor_end(15.0).with_estimate(5.0);
//! ```
//!
//! # References
//!
//! - Giffler & Thompson (1960), "Algorithms for Solving Production-Scheduling Problems"
//! - Haupt (1989), "A Survey of Priority Rule-Based Scheduling"

mod context;
pub mod rules;

pub use context::PriorityContext;

use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};

use crate::models::Operation;

/// Score returned by a priority rule.
///
/// Lower scores = higher priority (popped first).
pub type RuleScore = f64;

/// A priority rule that scores ready operations.
///
/// # Score Convention
/// **Lower score = higher priority.**
pub trait PriorityRule: Send + Sync + Debug {
    /// Rule name (e.g., "dynamic", "fcfs").
    fn name(&self) -> &'static str;

    /// Whether [`PriorityContext::estimated_duration`] must be filled in.
    ///
    /// The scheduler only asks the oracle for an estimate when this is true.
    fn needs_estimate(&self) -> bool {
        false
    }

    /// Scores an operation given its planning context.
    fn evaluate(&self, operation: &Operation, context: &PriorityContext) -> RuleScore;

    /// Rule description.
    fn description(&self) -> &'static str {
        self.name()
    }
}

/// The closed set of supported priority rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityRuleKind {
    /// Earliest predicted completion.
    #[default]
    Dynamic,
    /// Arrival order encoded from job and operation IDs.
    Fcfs,
}

impl PriorityRuleKind {
    /// Strategy object for this rule.
    pub fn rule(self) -> &'static dyn PriorityRule {
        match self {
            PriorityRuleKind::Dynamic => &rules::Dynamic,
            PriorityRuleKind::Fcfs => &rules::Fcfs,
        }
    }
}

impl fmt::Display for PriorityRuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.rule().name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_maps_to_rule() {
        assert_eq!(PriorityRuleKind::Dynamic.rule().name(), "dynamic");
        assert_eq!(PriorityRuleKind::Fcfs.rule().name(), "fcfs");
        assert!(PriorityRuleKind::Dynamic.rule().needs_estimate());
        assert!(!PriorityRuleKind::Fcfs.rule().needs_estimate());
        assert_eq!(PriorityRuleKind::Fcfs.to_string(), "fcfs");
    }

    #[test]
    fn test_kind_serde() {
        let kind: PriorityRuleKind = serde_json::from_str("\"fcfs\"").unwrap();
        assert_eq!(kind, PriorityRuleKind::Fcfs);
        assert_eq!(serde_json::to_string(&PriorityRuleKind::Dynamic).unwrap(), "\"dynamic\"");
    }
}
