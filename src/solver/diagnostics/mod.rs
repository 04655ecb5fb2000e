//! Runtime diagnostics and progress tracking.
//!
//! - [`EnergyIntegrator`]: Volume averages with the quadrature volume correction
//! - [`ShellDiagnostics`]: Kinetic and thermal energy at one iteration
//! - [`DiagnosticSeries`]: (time, energy) samples written at run end
//! - [`ProgressReporter`]: Progress output through `tracing`

mod diagnostics;

pub use diagnostics::{
    DiagnosticSeries, DiagnosticsTracker, EnergyIntegrator, ProgressReporter, ShellDiagnostics,
    format_duration,
};
