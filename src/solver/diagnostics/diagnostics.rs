//! Runtime diagnostics for shell convection runs.
//!
//! Provides:
//! - Volume-averaged kinetic and thermal energies
//! - An append-only (time, energy) series
//! - Progress reporting through `tracing`
//!
//! # Example
//!
//! ```ignore
//! use shellconv::solver::{EnergyIntegrator, ShellDiagnostics};
//!
//! let integrator = EnergyIntegrator::new(&basis)?;
//! let diag = ShellDiagnostics::compute(&integrator, &basis, solver.state_mut(), dt)?;
//! reporter.report(solver.iteration(), solver.sim_time(), &diag);
//! ```

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;
use std::time::Instant;

use crate::basis::ShellBasis;
use crate::comm::CommError;
use crate::problem::names;
use crate::solver::{FieldSet, SolverError};
use crate::types::Domain;

/// Quadrature for volume averages of grid data.
///
/// The quadrature volume is compared once with the exact shell volume and
/// every integral is scaled by the ratio.
#[derive(Clone, Debug)]
pub struct EnergyIntegrator {
    weights: Vec<f64>,
    correction: f64,
    volume: f64,
}

impl EnergyIntegrator {
    /// Build the local weights and the global volume correction. Collective.
    pub fn new(basis: &ShellBasis) -> Result<Self, CommError> {
        let weights = basis.volume_weights();
        let volume = basis.geometry().volume();
        let quadrature_volume = basis.comm().global_sum(weights.iter().sum())?;
        Ok(Self {
            weights,
            correction: volume / quadrature_volume,
            volume,
        })
    }

    /// Exact volume over quadrature volume.
    pub fn volume_correction(&self) -> f64 {
        self.correction
    }

    /// Local share of `0.5 ∫|v|² dV / V` for a scalar or vector grid.
    pub fn local_half_mean_square(&self, grid: &[f64]) -> f64 {
        let n = self.weights.len();
        let sum: f64 = grid
            .iter()
            .enumerate()
            .map(|(idx, v)| self.weights[idx % n] * v * v)
            .sum();
        0.5 * self.correction * sum / self.volume
    }

    /// Global `0.5 ∫|v|² dV / V`. Collective.
    pub fn half_mean_square(&self, basis: &ShellBasis, grid: &[f64]) -> Result<f64, CommError> {
        basis.comm().global_sum(self.local_half_mean_square(grid))
    }
}

/// Diagnostic quantities at one iteration.
#[derive(Clone, Debug, PartialEq)]
pub struct ShellDiagnostics {
    pub iteration: usize,
    pub time: f64,
    pub dt: f64,
    /// `E0 = 0.5 ∫|u|² dV / V`
    pub kinetic_energy: f64,
    /// `T0 = 0.5 ∫T² dV / V`
    pub thermal_energy: f64,
}

impl ShellDiagnostics {
    /// Compute energies from the velocity and temperature of `state`.
    /// Collective.
    pub fn compute(
        integrator: &EnergyIntegrator,
        basis: &ShellBasis,
        state: &mut FieldSet,
        iteration: usize,
        time: f64,
        dt: f64,
    ) -> Result<Self, SolverError> {
        let kinetic_energy = energy_of(integrator, basis, state, names::VELOCITY)?;
        let thermal_energy = energy_of(integrator, basis, state, names::TEMPERATURE)?;
        Ok(Self {
            iteration,
            time,
            dt,
            kinetic_energy,
            thermal_energy,
        })
    }

    pub fn is_finite(&self) -> bool {
        self.kinetic_energy.is_finite() && self.thermal_energy.is_finite()
    }

    /// Format as the progress line body.
    pub fn summary_line(&self) -> String {
        format!(
            "iter: {}, dt={:e}, t={:e}, E0={:e}, T0={:e}",
            self.iteration, self.dt, self.time, self.kinetic_energy, self.thermal_energy
        )
    }
}

fn energy_of(
    integrator: &EnergyIntegrator,
    basis: &ShellBasis,
    state: &mut FieldSet,
    name: &str,
) -> Result<f64, SolverError> {
    let field = state
        .get_mut(name)
        .ok_or_else(|| SolverError::MissingField(name.to_string()))?;
    debug_assert_eq!(field.domain(), Domain::Volume);
    field.require_grid(basis);
    Ok(integrator.half_mean_square(basis, field.grid())?)
}

/// Append-only (time, kinetic energy) samples.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DiagnosticSeries {
    times: Vec<f64>,
    energies: Vec<f64>,
}

impl DiagnosticSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, time: f64, energy: f64) {
        self.times.push(time);
        self.energies.push(energy);
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn energies(&self) -> &[f64] {
        &self.energies
    }

    /// Whether sample times never decrease.
    pub fn is_time_ordered(&self) -> bool {
        self.times.windows(2).all(|w| w[0] <= w[1])
    }

    /// Two space-delimited rows: times, then energies.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for row in [&self.times, &self.energies] {
            let line: Vec<String> = row.iter().map(|v| format!("{:.18e}", v)).collect();
            let _ = writeln!(out, "{}", line.join(" "));
        }
        out
    }

    /// Write [`Self::to_text`] to `path`.
    pub fn write(&self, path: &Path) -> io::Result<()> {
        fs::write(path, self.to_text())
    }
}

/// Track diagnostics over a run.
#[derive(Clone, Debug)]
pub struct DiagnosticsTracker {
    initial: Option<ShellDiagnostics>,
    current: Option<ShellDiagnostics>,
    n_updates: usize,
    max_kinetic_seen: f64,
    n_non_finite: usize,
}

impl Default for DiagnosticsTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticsTracker {
    pub fn new() -> Self {
        Self {
            initial: None,
            current: None,
            n_updates: 0,
            max_kinetic_seen: 0.0,
            n_non_finite: 0,
        }
    }

    pub fn update(&mut self, diag: ShellDiagnostics) {
        self.n_updates += 1;
        if diag.is_finite() {
            self.max_kinetic_seen = self.max_kinetic_seen.max(diag.kinetic_energy);
        } else {
            self.n_non_finite += 1;
        }
        if self.initial.is_none() {
            self.initial = Some(diag.clone());
        }
        self.current = Some(diag);
    }

    pub fn initial(&self) -> Option<&ShellDiagnostics> {
        self.initial.as_ref()
    }

    pub fn current(&self) -> Option<&ShellDiagnostics> {
        self.current.as_ref()
    }

    pub fn n_updates(&self) -> usize {
        self.n_updates
    }

    /// Largest finite kinetic energy seen.
    pub fn max_kinetic_seen(&self) -> f64 {
        self.max_kinetic_seen
    }

    /// Whether every update so far had finite energies.
    pub fn is_stable(&self) -> bool {
        self.n_non_finite == 0
    }

    /// Log a summary of the run's diagnostics.
    pub fn log_summary(&self) {
        let Some(current) = &self.current else {
            return;
        };
        tracing::info!(
            updates = self.n_updates,
            max_e0 = self.max_kinetic_seen,
            final_e0 = current.kinetic_energy,
            final_t0 = current.thermal_energy,
            non_finite = self.n_non_finite,
            "diagnostics summary"
        );
    }
}

/// Progress reporter for long-running simulations.
#[derive(Clone, Debug)]
pub struct ProgressReporter {
    /// Start time of simulation (wall clock)
    start_instant: Instant,
    /// Simulation time to reach
    total_sim_time: f64,
    /// Number of timesteps taken
    n_steps: usize,
}

impl ProgressReporter {
    pub fn new(total_sim_time: f64) -> Self {
        Self {
            start_instant: Instant::now(),
            total_sim_time,
            n_steps: 0,
        }
    }

    /// Record a timestep.
    pub fn step(&mut self) {
        self.n_steps += 1;
    }

    /// Timesteps recorded so far.
    pub fn steps(&self) -> usize {
        self.n_steps
    }

    /// Log a progress line. Non-finite energies are logged as warnings.
    pub fn report(&self, diag: &ShellDiagnostics) {
        if diag.is_finite() {
            tracing::info!(
                eta = %self.eta(diag.time),
                "{}",
                diag.summary_line()
            );
        } else {
            tracing::warn!("non-finite energy: {}", diag.summary_line());
        }
    }

    /// Estimated remaining wall time.
    fn eta(&self, current_time: f64) -> String {
        let elapsed = self.start_instant.elapsed().as_secs_f64();
        let fraction = current_time / self.total_sim_time;
        if fraction > 1e-3 && fraction.is_finite() {
            format_duration((elapsed / fraction - elapsed).max(0.0))
        } else {
            "calculating...".to_string()
        }
    }

    /// Wall-clock seconds since creation.
    pub fn elapsed(&self) -> f64 {
        self.start_instant.elapsed().as_secs_f64()
    }

    /// Log the final summary.
    pub fn finish(&self, final_time: f64) {
        let elapsed = self.elapsed();
        let steps_per_sec = if elapsed > 0.0 {
            self.n_steps as f64 / elapsed
        } else {
            0.0
        };
        tracing::info!(
            final_time,
            steps = self.n_steps,
            wall = %format_duration(elapsed),
            "simulation complete ({:.1} steps/s)",
            steps_per_sec
        );
    }
}

/// Format a duration in seconds as human-readable string.
pub fn format_duration(secs: f64) -> String {
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else if secs < 3600.0 {
        let mins = (secs / 60.0).floor();
        let s = secs - mins * 60.0;
        format!("{:.0}m{:.0}s", mins, s)
    } else {
        let hours = (secs / 3600.0).floor();
        let mins = ((secs - hours * 3600.0) / 60.0).floor();
        format!("{:.0}h{:.0}m", hours, mins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::{ProcessMesh, SingleProcess};
    use crate::field::Field;
    use crate::types::{ShellGeometry, TensorKind, Truncation};
    use approx::assert_relative_eq;
    use std::sync::Arc;

    fn basis() -> ShellBasis {
        ShellBasis::new(
            Truncation::new(7, 7),
            ShellGeometry::default(),
            ProcessMesh::single(),
            Arc::new(SingleProcess),
        )
        .unwrap()
    }

    #[test]
    fn test_volume_correction_near_one() {
        let basis = basis();
        let integrator = EnergyIntegrator::new(&basis).unwrap();
        assert_relative_eq!(integrator.volume_correction(), 1.0, epsilon = 0.05);
    }

    #[test]
    fn test_constant_field_energy() {
        let basis = basis();
        let integrator = EnergyIntegrator::new(&basis).unwrap();
        let field = Field::from_fn("T", TensorKind::Scalar, Domain::Volume, &basis, |_, _, _| {
            [2.0, 0.0, 0.0]
        });
        let e = integrator.half_mean_square(&basis, field.grid()).unwrap();
        assert_relative_eq!(e, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_vector_energy_sums_components() {
        let basis = basis();
        let integrator = EnergyIntegrator::new(&basis).unwrap();
        let field = Field::from_fn("u", TensorKind::Vector, Domain::Volume, &basis, |_, _, _| {
            [1.0, 1.0, 1.0]
        });
        let e = integrator.half_mean_square(&basis, field.grid()).unwrap();
        assert_relative_eq!(e, 1.5, epsilon = 1e-12);
    }

    #[test]
    fn test_series_text_and_ordering() {
        let mut series = DiagnosticSeries::new();
        assert!(series.is_empty());
        series.push(0.0, 1.0);
        series.push(0.5, 2.0);
        assert!(series.is_time_ordered());
        let text = series.to_text();
        let rows: Vec<&str> = text.lines().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].split(' ').count(), 2);
        assert_eq!(rows[1].split(' ').next().unwrap().parse::<f64>().unwrap(), 1.0);
        series.push(0.1, 0.0);
        assert!(!series.is_time_ordered());
    }

    #[test]
    fn test_tracker_counts_non_finite() {
        let mut tracker = DiagnosticsTracker::new();
        let diag = |e: f64| ShellDiagnostics {
            iteration: 0,
            time: 0.0,
            dt: 1e-3,
            kinetic_energy: e,
            thermal_energy: 0.1,
        };
        tracker.update(diag(1.0));
        tracker.update(diag(3.0));
        assert!(tracker.is_stable());
        tracker.update(diag(f64::NAN));
        assert!(!tracker.is_stable());
        assert_eq!(tracker.n_updates(), 3);
        assert_eq!(tracker.max_kinetic_seen(), 3.0);
        assert_eq!(tracker.initial().unwrap().kinetic_energy, 1.0);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(5.0), "5.0s");
        assert_eq!(format_duration(125.0), "2m5s");
        assert_eq!(format_duration(7260.0), "2h1m");
    }
}
