//! Machine and machine pool model.
//!
//! A machine is a unit-capacity resource instance belonging to a group of
//! interchangeable instances. Besides occupancy it carries the tool mounted
//! by its last operation, which duration oracles may take into account.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::{OperationRef, ToolId};
use crate::error::{ShopError, ShopResult};
use crate::simulation::UnitResource;

/// Handle of a machine inside a [`MachinePool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MachineRef(pub(crate) usize);

impl MachineRef {
    /// Position in the pool arena.
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Identity of a machine: `(group, instance index)`.
///
/// Displays as `<group>_<index>`, e.g. `a1_0`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MachineId {
    /// Machine group name.
    pub group: String,
    /// Instance index within the group (0-based).
    pub index: usize,
}

impl MachineId {
    /// Creates a machine ID.
    pub fn new(group: impl Into<String>, index: usize) -> Self {
        Self {
            group: group.into(),
            index,
        }
    }
}

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.group, self.index)
    }
}

/// Configuration of one machine group.
///
/// Deserializes from an object or the positional form
/// `[group, instances, [tools...]]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineGroupSpec {
    /// Group name.
    pub group: String,
    /// Number of interchangeable instances.
    pub instances: usize,
    /// Tools the instances can hold.
    pub tools: Vec<ToolId>,
    /// Tool mounted before the first operation (`None` = nothing mounted).
    #[serde(default)]
    pub initial_tool: Option<ToolId>,
}

impl MachineGroupSpec {
    /// Creates a group spec.
    pub fn new(group: impl Into<String>, instances: usize, tools: Vec<ToolId>) -> Self {
        Self {
            group: group.into(),
            instances,
            tools,
            initial_tool: None,
        }
    }

    /// Pre-mounts a tool on every instance.
    pub fn with_initial_tool(mut self, tool: ToolId) -> Self {
        self.initial_tool = Some(tool);
        self
    }
}

/// A physical machine instance.
#[derive(Debug, Clone)]
pub struct Machine {
    /// Identity.
    pub id: MachineId,
    /// Tools this machine can hold.
    pub tools_available: Vec<ToolId>,
    /// Tool left mounted by the last operation.
    pub current_tool: Option<ToolId>,
    /// Operation presently occupying the machine (non-owning).
    pub current_operation: Option<OperationRef>,
    /// Completed operations, in completion order.
    pub history: Vec<OperationRef>,
    initial_tool: Option<ToolId>,
    pub(crate) resource: UnitResource,
}

impl Machine {
    fn new(id: MachineId, tools_available: Vec<ToolId>, initial_tool: Option<ToolId>) -> Self {
        Self {
            id,
            tools_available,
            current_tool: initial_tool,
            current_operation: None,
            history: Vec::new(),
            initial_tool,
            resource: UnitResource::new(),
        }
    }

    /// Whether the machine can hold a tool.
    pub fn supports_tool(&self, tool: ToolId) -> bool {
        self.tools_available.contains(&tool)
    }

    /// Tool mounted when the pool was configured (and after [`MachinePool::reset`]).
    pub fn initial_tool(&self) -> Option<ToolId> {
        self.initial_tool
    }

    /// Whether an operation currently holds the machine.
    pub fn is_busy(&self) -> bool {
        self.resource.is_held()
    }

    /// Requests waiting for the machine.
    pub fn queue_len(&self) -> usize {
        self.resource.queue_len()
    }

    /// Outstanding requests: waiting plus holding.
    pub fn load(&self) -> usize {
        self.resource.load()
    }

    fn reset(&mut self) {
        self.current_tool = self.initial_tool;
        self.current_operation = None;
        self.history.clear();
        self.resource = UnitResource::new();
    }
}

/// Named groups of machine instances.
///
/// Groups keep their instances in index order; group iteration is sorted
/// by name so every traversal is deterministic.
#[derive(Debug, Clone, Default)]
pub struct MachinePool {
    machines: Vec<Machine>,
    groups: BTreeMap<String, Vec<MachineRef>>,
}

impl MachinePool {
    /// Builds a pool from group specs.
    ///
    /// # Errors
    /// - [`ShopError::EmptyMachineGroup`] if a group has zero instances.
    /// - [`ShopError::DuplicateMachineGroup`] if a group name repeats.
    pub fn from_specs(specs: &[MachineGroupSpec]) -> ShopResult<Self> {
        let mut pool = Self::default();
        for spec in specs {
            if spec.instances == 0 {
                return Err(ShopError::EmptyMachineGroup(spec.group.clone()));
            }
            if pool.groups.contains_key(&spec.group) {
                return Err(ShopError::DuplicateMachineGroup(spec.group.clone()));
            }
            let mut members = Vec::with_capacity(spec.instances);
            for index in 0..spec.instances {
                let handle = MachineRef(pool.machines.len());
                pool.machines.push(Machine::new(
                    MachineId::new(spec.group.clone(), index),
                    spec.tools.clone(),
                    spec.initial_tool,
                ));
                members.push(handle);
            }
            pool.groups.insert(spec.group.clone(), members);
        }
        Ok(pool)
    }

    /// Instances of a group, in index order.
    pub fn group(&self, name: &str) -> Option<&[MachineRef]> {
        self.groups.get(name).map(Vec::as_slice)
    }

    /// Whether the pool has a group.
    pub fn has_group(&self, name: &str) -> bool {
        self.groups.contains_key(name)
    }

    /// Group names, sorted.
    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    /// Resolves a handle.
    ///
    /// Handles are only produced by this pool, so indexing cannot fail for
    /// handles obtained from it.
    pub fn machine(&self, handle: MachineRef) -> &Machine {
        &self.machines[handle.0]
    }

    pub(crate) fn machine_mut(&mut self, handle: MachineRef) -> &mut Machine {
        &mut self.machines[handle.0]
    }

    /// Finds a machine by identity.
    pub fn find(&self, id: &MachineId) -> Option<MachineRef> {
        self.groups
            .get(&id.group)
            .and_then(|members| members.get(id.index))
            .copied()
    }

    /// All machines, in creation order.
    pub fn machines(&self) -> &[Machine] {
        &self.machines
    }

    /// Number of machine instances.
    pub fn len(&self) -> usize {
        self.machines.len()
    }

    /// Whether the pool has no machines.
    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }

    /// Restores every machine to its configured initial state.
    pub fn reset(&mut self) {
        for machine in &mut self.machines {
            machine.reset();
        }
    }
}
