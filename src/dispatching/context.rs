//! Planning context for priority rule evaluation.

/// Planning state passed to priority rules.
///
/// Filled in by the scheduler for one ready operation at one iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PriorityContext {
    /// Latest planned end among the operation's predecessors
    /// (`None` = no predecessors).
    pub predecessor_end: Option<f64>,
    /// Oracle duration estimate, present when the rule asked for one.
    pub estimated_duration: Option<f64>,
}

impl PriorityContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the latest predecessor end.
    pub fn with_predecessor_end(mut self, end: f64) -> Self {
        self.predecessor_end = Some(end);
        self
    }

    /// Sets the duration estimate.
    pub fn with_estimate(mut self, duration: f64) -> Self {
        self.estimated_duration = Some(duration);
        self
    }
}
