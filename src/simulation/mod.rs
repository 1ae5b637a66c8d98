//! Discrete-event execution of plans.
//!
//! A single-threaded event loop multiplexes one logical task per
//! operation. Tasks block in three places only: waiting for predecessors
//! (AND-join), waiting for their planned start, and waiting for a machine.
//!
//! # Modes
//!
//! | Mode | Start | Machine |
//! |------|-------|---------|
//! | Planned | not before `plan_start` | the planned instance |
//! | Dynamic | as soon as predecessors finish | least-loaded instance of the group |
//!
//! Machines are [`UnitResource`]s: requests made at the same instant are
//! granted in the order they were made.
//!
//! # Reference
//! Law (2015), "Simulation Modeling and Analysis", Ch. 1.3: Discrete-Event Simulation

mod engine;
mod resource;
mod simulator;

pub use resource::UnitResource;
pub use simulator::Simulator;
