//! Run configuration and problem input.
//!
//! Both load from JSON. The core consumes the configuration but performs
//! no randomness itself: `seed` is only forwarded to oracles that ask for
//! it.
//!
//! ```
//! use u_shopsim::config::{DispatchMode, RunConfig};
//! use u_shopsim::dispatching::PriorityRuleKind;
//!
//! let config = RunConfig::from_json(r#"{"priority_rule": "fcfs", "time_cap": 12000}"#).unwrap();
//! assert_eq!(config.priority_rule, PriorityRuleKind::Fcfs);
//! assert_eq!(config.mode, DispatchMode::Planned);
//! assert_eq!(config.time_cap, Some(12000.0));
//! ```

use serde::{Deserialize, Serialize};

use crate::dispatching::PriorityRuleKind;
use crate::error::ShopResult;
use crate::models::{MachineGroupSpec, OperationSpec};

/// How the simulator picks machines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Wait for the planned start, then take the planned machine.
    #[default]
    Planned,
    /// Take the least-loaded machine of the group as soon as predecessors
    /// finish; no plan is consulted.
    Dynamic,
}

/// Settings of one plan-and-simulate run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Ready-set priority rule for the scheduler.
    pub priority_rule: PriorityRuleKind,
    /// Simulator dispatch mode.
    pub mode: DispatchMode,
    /// Simulated-time cap. Events at or after it are not processed.
    pub time_cap: Option<f64>,
    /// Seed forwarded to stochastic oracles.
    pub seed: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            priority_rule: PriorityRuleKind::Dynamic,
            mode: DispatchMode::Planned,
            time_cap: None,
            seed: 0,
        }
    }
}

impl RunConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration; missing fields take their defaults.
    pub fn from_json(json: &str) -> ShopResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Sets the priority rule.
    pub fn with_priority_rule(mut self, rule: PriorityRuleKind) -> Self {
        self.priority_rule = rule;
        self
    }

    /// Sets the dispatch mode.
    pub fn with_mode(mut self, mode: DispatchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the simulated-time cap.
    pub fn with_time_cap(mut self, cap: f64) -> Self {
        self.time_cap = Some(cap);
        self
    }

    /// Sets the oracle seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// A complete problem: operation tuples and machine groups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProblemInput {
    /// Operation tuples.
    pub operations: Vec<OperationSpec>,
    /// Machine group configuration.
    pub machines: Vec<MachineGroupSpec>,
}

impl ProblemInput {
    /// Creates a problem.
    pub fn new(operations: Vec<OperationSpec>, machines: Vec<MachineGroupSpec>) -> Self {
        Self {
            operations,
            machines,
        }
    }

    /// Parses a problem from JSON.
    pub fn from_json(json: &str) -> ShopResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
