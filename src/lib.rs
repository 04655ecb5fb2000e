//! # shellconv
//!
//! Rotating thermal convection in a spherical shell, discretised with a
//! spin-weighted spherical harmonic by Chebyshev spectral basis and a
//! tau method for the boundary conditions.
//!
//! This crate provides:
//! - Polynomial families and quadrature (Chebyshev, Jacobi, Legendre)
//! - Shell bases with forward and backward transforms
//! - A symbolic problem description (variables, equations, boundary conditions)
//! - Per-degree sparse subproblems with tau correction
//! - SBDF time stepping with adaptive CFL timestep control
//! - A simulation driver with energy diagnostics, snapshots and checkpoints
//! - Blocking collectives over a process mesh of thread ranks
//!
//! # Example
//!
//! ```no_run
//! use shellconv::io::RunConfig;
//! use shellconv::simulation::{Simulation, SimulationContext};
//!
//! let run = RunConfig::read("run.cfg".as_ref()).unwrap();
//! let ctx = SimulationContext::single(".");
//! let summary = Simulation::from_run_config(&run, ctx).unwrap().run().unwrap();
//! println!("{} iterations", summary.iterations);
//! ```

pub mod basis;
pub mod comm;
pub mod field;
pub mod io;
pub mod operators;
pub mod polynomial;
pub mod problem;
pub mod simulation;
pub mod solver;
pub mod time;
pub mod types;

// Re-export main types for convenience
pub use basis::{RadialBasis, ShellBasis, SphereBasis};
pub use comm::{CommError, Communicator, ProcessMesh, SingleProcess, ThreadMesh};
pub use field::Field;
pub use io::{ConfigError, RunConfig};
pub use problem::{ConvectionParameters, Problem, shell_convection_problem};
pub use simulation::{RunError, RunSummary, Simulation, SimulationConfig, SimulationContext};
pub use solver::{InitialValueSolver, SolverConfig, SolverError, StateVector};
pub use time::{AdaptiveTimestep, CflConfig, TimestepError, Timestepper};
pub use types::{Boundary, Degree, Mode, Order, ShellGeometry, Truncation};
