//! Operation graph.
//!
//! Arena of all operations of a problem. Each operation points to at most
//! one successor and to any number of predecessors, all through
//! [`OperationRef`] handles resolved against this arena. The graph owns the
//! operations; machines and the simulator only hold handles.

use std::collections::HashMap;

use super::{MachinePool, Operation, OperationKey, OperationRef, OperationSpec};
use crate::error::{ShopError, ShopResult};
use crate::validation::{validate_machine_groups, validate_operations};

/// Validated, linked operations of all jobs.
#[derive(Debug, Clone, Default)]
pub struct OperationGraph {
    operations: Vec<Operation>,
    index: HashMap<OperationKey, OperationRef>,
}

impl OperationGraph {
    /// Validates operation tuples and links successors and predecessors.
    ///
    /// Operations keep their input order; predecessor lists follow it too.
    ///
    /// # Errors
    /// [`ShopError::MalformedGraph`] with every detected problem.
    pub fn from_specs(specs: &[OperationSpec]) -> ShopResult<Self> {
        validate_operations(specs).map_err(ShopError::MalformedGraph)?;

        let operations: Vec<Operation> = specs.iter().map(Operation::from_spec).collect();
        let index: HashMap<OperationKey, OperationRef> = operations
            .iter()
            .enumerate()
            .map(|(i, op)| (op.key.clone(), OperationRef(i)))
            .collect();

        let mut graph = Self { operations, index };
        for i in 0..graph.operations.len() {
            let Some(succ_id) = graph.operations[i].successor_id else {
                continue;
            };
            let succ_key = OperationKey::new(graph.operations[i].key.job_id.clone(), succ_id);
            // Validation guarantees the successor exists.
            if let Some(&succ) = graph.index.get(&succ_key) {
                graph.operations[i].successor = Some(succ);
                graph.operations[succ.0].predecessors.push(OperationRef(i));
            }
        }

        Ok(graph)
    }

    /// Checks that every required machine group exists in the pool.
    pub fn validate_against(&self, pool: &MachinePool) -> ShopResult<()> {
        match self
            .operations
            .iter()
            .find(|op| !pool.has_group(&op.machine_group))
        {
            Some(op) => Err(ShopError::UnknownMachineGroup {
                operation: op.key.clone(),
                group: op.machine_group.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Validates specs against a pool, reporting every unknown group.
    pub fn validate_specs_against(specs: &[OperationSpec], pool: &MachinePool) -> ShopResult<()> {
        validate_machine_groups(specs, pool).map_err(ShopError::MalformedGraph)
    }

    /// Resolves a handle.
    ///
    /// Handles are only produced by this graph, so indexing cannot fail for
    /// handles obtained from it.
    #[inline]
    pub fn operation(&self, handle: OperationRef) -> &Operation {
        &self.operations[handle.0]
    }

    #[inline]
    pub(crate) fn operation_mut(&mut self, handle: OperationRef) -> &mut Operation {
        &mut self.operations[handle.0]
    }

    /// Finds an operation by identity.
    pub fn find(&self, job_id: &str, operation_id: u32) -> Option<OperationRef> {
        self.index
            .get(&OperationKey::new(job_id, operation_id))
            .copied()
    }

    /// All operations, in input order.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// All handles, in input order.
    pub fn handles(&self) -> impl Iterator<Item = OperationRef> {
        (0..self.operations.len()).map(OperationRef)
    }

    /// Terminal operations (one per job), in input order.
    pub fn terminals(&self) -> Vec<OperationRef> {
        self.handles()
            .filter(|&h| self.operation(h).is_terminal())
            .collect()
    }

    /// Job IDs in order of first appearance.
    pub fn job_ids(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for op in &self.operations {
            if !seen.contains(&op.job_id()) {
                seen.push(op.job_id());
            }
        }
        seen
    }

    /// Latest planned end among an operation's predecessors.
    ///
    /// `None` if there are no predecessors or any of them is unplanned.
    pub fn predecessors_plan_end(&self, handle: OperationRef) -> Option<f64> {
        let preds = &self.operation(handle).predecessors;
        if preds.is_empty() {
            return None;
        }
        preds.iter().try_fold(f64::NEG_INFINITY, |acc, &p| {
            self.operation(p).plan_end.map(|end| acc.max(end))
        })
    }

    /// Clears every plan field.
    pub fn reset_plan(&mut self) {
        self.operations.iter_mut().for_each(Operation::clear_plan);
    }

    /// Clears every execution field.
    pub fn reset_execution(&mut self) {
        self.operations
            .iter_mut()
            .for_each(Operation::clear_execution);
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether the graph has no operations.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
