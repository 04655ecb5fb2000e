//! Run orchestration.
//!
//! Ties together:
//! - The explicit run context (communicator, process mesh, output root)
//! - Problem and solver construction from a [`RunConfig`](crate::io::RunConfig)
//! - The driver loop with diagnostics, snapshots and checkpoints
//!
//! # Example
//! ```ignore
//! use shellconv::io::RunConfig;
//! use shellconv::simulation::{Simulation, SimulationContext};
//!
//! let run = RunConfig::read(Path::new("shell.cfg"))?;
//! let ctx = SimulationContext::single(".");
//! let summary = Simulation::from_run_config(&run, ctx)?.run()?;
//! println!("{} steps to t = {}", summary.iterations, summary.final_time);
//! ```

mod context;
mod runner;

pub use context::SimulationContext;
pub use runner::{
    Phase, RunError, RunSummary, Simulation, SimulationConfig, build_solver, cfl_config,
    hermitian_due, initial_temperature, parameter_fields, set_initial_conditions, snapshot_due,
};
