//! Job-shop domain models.
//!
//! Operations and machines are stored in arenas and addressed by handles
//! ([`OperationRef`], [`MachineRef`]), so an operation's assigned machine and
//! a machine's current operation are plain indices rather than shared
//! references.
//!
//! # Domain Mappings
//!
//! | u-shopsim | Manufacturing | Meaning |
//! |-----------|--------------|---------|
//! | Operation | Process step | One unit of work on one machine |
//! | Job | Order | In-tree of operations ending in one terminal |
//! | Machine group | Work center | Interchangeable instances |
//! | Tool | Fixture/Die | State left on a machine after processing |
//! | Plan | Production plan | Scheduler output |
//! | RealizedSchedule | Shop-floor record | Simulator output |

mod graph;
mod machine;
mod operation;
mod schedule;

pub use graph::OperationGraph;
pub use machine::{Machine, MachineGroupSpec, MachineId, MachinePool, MachineRef};
pub use operation::{Operation, OperationKey, OperationRef, OperationSpec, ToolId, TERMINAL};
pub use schedule::{Plan, PlanEntry, RealizedEntry, RealizedSchedule};
