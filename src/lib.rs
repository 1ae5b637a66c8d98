//! Job-shop planning and discrete-event execution.
//!
//! Plans multi-operation jobs on pooled, tool-stateful machines with a
//! Giffler-Thompson list scheduler, then executes the plan in simulated time
//! against durations that may diverge from the planned ones.
//!
//! # Modules
//!
//! - **`models`**: Domain types: `Operation`, `OperationGraph`, `Machine`,
//!   `MachinePool`, `Plan`, `RealizedSchedule`
//! - **`validation`**: Input integrity checks (duplicate IDs, successor cycles,
//!   terminal operations, machine group refs)
//! - **`oracle`**: The `DurationOracle` contract, bundled oracles and the
//!   feedback log
//! - **`dispatching`**: Ready-set priority rules (`dynamic`, `fcfs`)
//! - **`scheduler`**: `GifflerThompson` and schedule KPIs
//! - **`simulation`**: Event-driven `Simulator` with FIFO machine queues
//! - **`config`** / **`pipeline`**: JSON-loadable inputs and one-call runs
//! - **`error`**: `ShopError` and `ShopResult`
//!
//! # Architecture
//!
//! Operations and machines live in arenas ([`models::OperationGraph`],
//! [`models::MachinePool`]) and refer to each other through copyable
//! handles. Duration prediction is delegated to a
//! [`oracle::DurationOracle`]; the crate itself performs no randomness.
//!
//! # References
//!
//! - Giffler & Thompson (1960), "Algorithms for Solving Production-Scheduling Problems"
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems"
//! - Law (2015), "Simulation Modeling and Analysis"

pub mod config;
pub mod dispatching;
pub mod error;
pub mod models;
pub mod oracle;
pub mod pipeline;
pub mod scheduler;
pub mod simulation;
pub mod validation;

pub use error::{ShopError, ShopResult, Stage};
