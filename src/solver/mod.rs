//! Solver components for the tau-corrected spectral shell problem.
//!
//! # Submodules
//!
//! - [`layout`]: ordering of the per-degree unknowns and tau variables
//! - [`subproblem`]: sparse per-degree operators and their factorisations
//! - [`tau`]: tau correction of the boundary rows
//! - [`state`]: the coefficient-space state of every problem variable
//! - [`rhs`]: grid-space evaluation of the explicit terms
//! - [`ivp`]: the initial value solver and its SBDF step
//! - [`diagnostics`]: energy integrals, series and progress tracking

pub mod diagnostics;
pub mod ivp;
pub mod layout;
pub mod rhs;
pub mod state;
pub mod subproblem;
pub mod tau;

pub use diagnostics::{
    DiagnosticSeries, DiagnosticsTracker, EnergyIntegrator, ProgressReporter, ShellDiagnostics,
    format_duration,
};
pub use ivp::{InitialValueSolver, SolverConfig, SolverError};
pub use layout::{Block, BlockLayout, Part, Representation, TauVariable};
pub use rhs::RhsEvaluator;
pub use state::FieldSet;
pub use subproblem::{ModeOperators, SparseOperator, Subproblem, compress, sparse_entry};
pub use tau::{TauError, apply_tau_correction};

/// The full set of problem variables advanced by the solver.
pub type StateVector = FieldSet;
