//! Simulation driver.
//!
//! Alternates the CFL controller and the solver until the stop time,
//! interleaving diagnostics, snapshots, checkpoints and symmetry
//! enforcement on their cadences. Every rank runs the same loop; the
//! decisions depend only on the shared iteration count and simulation clock.

use std::f64::consts::PI;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use super::SimulationContext;
use crate::basis::ShellBasis;
use crate::comm::CommError;
use crate::field::Field;
use crate::io::{
    CheckpointError, CheckpointWriter, ConfigError, EquatorialSlice, FieldRecord, PngSnapshotWriter,
    RunConfig, SnapshotError, SnapshotSink,
};
use crate::problem::{ConvectionParameters, ProblemError, names, shell_convection_problem};
use crate::solver::{
    DiagnosticSeries, DiagnosticsTracker, EnergyIntegrator, InitialValueSolver, ProgressReporter,
    ShellDiagnostics, SolverConfig, SolverError,
};
use crate::time::{AdaptiveTimestep, CflConfig, TimestepError};
use crate::types::{Boundary, Domain, ShellGeometry, TensorKind, Truncation};

/// Errors that end a run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Problem(#[from] ProblemError),
    #[error(transparent)]
    Solver(#[from] SolverError),
    #[error(transparent)]
    Comm(#[from] CommError),
    #[error(transparent)]
    Timestep(#[from] TimestepError),
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// What the driver is doing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Stepping,
    Diagnosing,
    Snapshotting,
    SymmetryCorrecting,
    Terminated,
}

// =============================================================================
// Configuration
// =============================================================================

/// Cadences and limits of a run.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationConfig {
    /// Stop time
    pub t_end: f64,
    /// First step
    pub init_dt: f64,
    /// Diagnostics every this many iterations
    pub report_cadence: usize,
    /// Symmetry enforcement period in iterations
    pub hermitian_cadence: usize,
    /// Simulation time between snapshots
    pub plot_cadence: f64,
    /// Checkpoint every this many iterations
    pub checkpoint_iter: usize,
    /// Records per checkpoint set
    pub checkpoint_max_writes: usize,
    /// Subtract the zonal mean from snapshots
    pub remove_m0: bool,
    /// Snapshot image edge in pixels
    pub snapshot_size: usize,
    /// Stop early after this many steps
    pub max_steps: Option<usize>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            t_end: 1.0,
            init_dt: 1e-4,
            report_cadence: 10,
            hermitian_cadence: 100,
            plot_cadence: 2.5,
            checkpoint_iter: 500,
            checkpoint_max_writes: 10,
            remove_m0: false,
            snapshot_size: 512,
            max_steps: None,
        }
    }
}

impl SimulationConfig {
    pub fn with_t_end(mut self, t_end: f64) -> Self {
        self.t_end = t_end;
        self
    }

    pub fn with_init_dt(mut self, init_dt: f64) -> Self {
        self.init_dt = init_dt;
        self
    }

    pub fn with_report_cadence(mut self, cadence: usize) -> Self {
        self.report_cadence = cadence;
        self
    }

    pub fn with_hermitian_cadence(mut self, cadence: usize) -> Self {
        self.hermitian_cadence = cadence;
        self
    }

    pub fn with_plot_cadence(mut self, cadence: f64) -> Self {
        self.plot_cadence = cadence;
        self
    }

    pub fn with_checkpoints(mut self, iter: usize, max_writes: usize) -> Self {
        self.checkpoint_iter = iter;
        self.checkpoint_max_writes = max_writes;
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = Some(max_steps);
        self
    }
}

impl From<&RunConfig> for SimulationConfig {
    fn from(run: &RunConfig) -> Self {
        Self {
            t_end: run.t_end,
            init_dt: run.step_control.init_dt(),
            report_cadence: run.report_cadence,
            hermitian_cadence: run.hermitian_cadence,
            plot_cadence: run.plot_cadence,
            checkpoint_iter: run.checkpoint_iter,
            checkpoint_max_writes: run.checkpoint_max_writes,
            remove_m0: run.remove_m0,
            ..Self::default()
        }
    }
}

/// Whether symmetry is enforced before stepping from `iteration`: the first
/// `history_len` iterations of every period, so the whole multistep history
/// is refreshed.
pub fn hermitian_due(iteration: usize, cadence: usize, history_len: usize) -> bool {
    iteration % cadence < history_len
}

/// Index of the snapshot due at `sim_time`, if it is past `plot_index`.
pub fn snapshot_due(sim_time: f64, cadence: f64, plot_index: usize) -> Option<usize> {
    let index = (sim_time / cadence).floor();
    (index > plot_index as f64).then(|| plot_index + 1)
}

// =============================================================================
// Result
// =============================================================================

/// Outcome of a run.
#[derive(Clone, Debug)]
pub struct RunSummary {
    pub iterations: usize,
    pub final_time: f64,
    /// Smallest step taken
    pub dt_min: f64,
    /// Largest step taken
    pub dt_max: f64,
    pub series: DiagnosticSeries,
    /// Snapshots handed to the sink, including the initial one
    pub snapshots: usize,
    /// Checkpoint records written by this rank
    pub checkpoints: usize,
    /// Wall-clock seconds
    pub wall_time: f64,
    /// False if the run stopped at `max_steps` before `t_end`
    pub completed: bool,
}

// =============================================================================
// Problem setup
// =============================================================================

/// Grid-locked parameter fields: `r_vec = (0, 0, r/ro)`,
/// `ez = (0, −sin θ, cos θ)` and `T_inner = 1`.
pub fn parameter_fields(basis: &ShellBasis) -> Vec<Field> {
    let r_outer = basis.geometry().r_outer();
    vec![
        Field::from_fn(
            names::RADIAL_VECTOR,
            TensorKind::Vector,
            Domain::Volume,
            basis,
            |_, _, r| [0.0, 0.0, r / r_outer],
        ),
        Field::from_fn(
            names::ROTATION_AXIS,
            TensorKind::Vector,
            Domain::Volume,
            basis,
            |_, theta, _| [0.0, -theta.sin(), theta.cos()],
        ),
        Field::from_fn(
            names::T_INNER,
            TensorKind::Scalar,
            Domain::Surface(Boundary::Inner),
            basis,
            |_, _, _| [1.0, 0.0, 0.0],
        ),
    ]
}

/// Conductive profile plus an m = 4 perturbation of amplitude `amplitude`.
///
/// `T = ri·ro/r − ri + 210A/√(17920π) (1 − 3x² + 3x⁴ − x⁶) sin⁴θ cos 4φ`
/// with `x = 2r − ri − ro`.
pub fn initial_temperature(geometry: &ShellGeometry, amplitude: f64, phi: f64, theta: f64, r: f64) -> f64 {
    let (ri, ro) = (geometry.r_inner(), geometry.r_outer());
    let x = 2.0 * r - ri - ro;
    let x2 = x * x;
    let radial = 1.0 - 3.0 * x2 + 3.0 * x2 * x2 - x2 * x2 * x2;
    let norm = 210.0 * amplitude / (17920.0 * PI).sqrt();
    ri * ro / r - ri + norm * radial * theta.sin().powi(4) * (4.0 * phi).cos()
}

/// Set T to [`initial_temperature`] and every other state field to zero.
/// Collective.
pub fn set_initial_conditions(solver: &mut InitialValueSolver, amplitude: f64) -> Result<(), SolverError> {
    let basis = Arc::clone(solver.basis_handle());
    let geometry = *basis.geometry();
    let state = solver.state_mut();
    for field in state.fields_mut() {
        field.coeffs_mut().iter_mut().for_each(|c| *c = Default::default());
    }
    let temperature = state
        .get_mut(names::TEMPERATURE)
        .ok_or_else(|| SolverError::MissingField(names::TEMPERATURE.into()))?;
    let grid = temperature.grid_mut();
    basis.for_each_point(Domain::Volume, |idx, phi, theta, r| {
        grid[idx] = initial_temperature(&geometry, amplitude, phi, theta, r);
    });
    temperature.require_coeff(&basis)?;
    Ok(())
}

/// Build the basis, problem and solver described by `run`. Collective.
pub fn build_solver(run: &RunConfig, ctx: &SimulationContext) -> Result<InitialValueSolver, RunError> {
    let basis = Arc::new(ShellBasis::new(
        Truncation::new(run.lmax, run.nmax),
        run.geometry,
        ctx.mesh(),
        ctx.comm_handle(),
    )?);
    let params = ConvectionParameters::new(run.ekman, run.rayleigh)
        .with_prandtl(run.prandtl)
        .with_geometry(run.geometry)
        .with_scaling(run.scaling);
    let problem = shell_convection_problem(&params)?;
    let parameters = parameter_fields(&basis);
    let config = SolverConfig {
        timestepper: run.timestepper,
        representation: run.representation,
        ..SolverConfig::default()
    };
    let mut solver = InitialValueSolver::new(problem, basis, parameters, config)?;
    solver.set_stop_sim_time(run.t_end);
    set_initial_conditions(&mut solver, run.amplitude)?;
    Ok(solver)
}

/// CFL settings of `run`.
pub fn cfl_config(run: &RunConfig) -> CflConfig {
    let config = CflConfig::new(
        run.safety,
        run.step_control.max_dt(),
        run.step_control.init_dt(),
    );
    if run.step_control.has_startup_cap() {
        config
    } else {
        config.with_startup_window(0.0)
    }
}

// =============================================================================
// Simulation Runner
// =============================================================================

/// Drives one run on one rank.
pub struct Simulation {
    ctx: SimulationContext,
    config: SimulationConfig,
    solver: InitialValueSolver,
    controller: AdaptiveTimestep,
    integrator: EnergyIntegrator,
    phase: Phase,
    sink: Option<Box<dyn SnapshotSink>>,
    checkpoint: Option<CheckpointWriter>,
    series_path: Option<PathBuf>,
}

impl Simulation {
    /// Wrap a solver with initial conditions already set. No outputs are
    /// attached. Collective.
    pub fn new(
        ctx: SimulationContext,
        solver: InitialValueSolver,
        cfl: CflConfig,
        config: SimulationConfig,
    ) -> Result<Self, RunError> {
        let basis = solver.basis();
        let controller = AdaptiveTimestep::new(
            cfl,
            basis.radial().grid_spacing(),
            basis.truncation().lmax(),
        );
        let integrator = EnergyIntegrator::new(basis)?;
        Ok(Self {
            ctx,
            config,
            solver,
            controller,
            integrator,
            phase: Phase::Stepping,
            sink: None,
            checkpoint: None,
            series_path: None,
        })
    }

    /// Full run from a configuration, with every output attached under the
    /// context root. Collective.
    pub fn from_run_config(run: &RunConfig, ctx: SimulationContext) -> Result<Self, RunError> {
        let solver = build_solver(run, &ctx)?;
        let root = ctx.root().to_path_buf();
        let is_root = ctx.is_root();
        let checkpoint = CheckpointWriter::new(&root, &run.name, ctx.rank(), run.checkpoint_max_writes)?;
        let mut sim = Self::new(ctx, solver, cfl_config(run), SimulationConfig::from(run))?
            .with_checkpoints(checkpoint);
        if is_root {
            let sink = PngSnapshotWriter::new(&run.frames_dir(&root), sim.config.snapshot_size)?;
            sim = sim
                .with_snapshot_sink(Box::new(sink))
                .with_series_path(run.series_path(&root));
        }
        Ok(sim)
    }

    /// Hand snapshots to `sink`. Only the root rank uses it.
    pub fn with_snapshot_sink(mut self, sink: Box<dyn SnapshotSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_checkpoints(mut self, writer: CheckpointWriter) -> Self {
        self.checkpoint = Some(writer);
        self
    }

    /// Write the energy series here at the end (root rank only).
    pub fn with_series_path(mut self, path: PathBuf) -> Self {
        self.series_path = Some(path);
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn solver(&self) -> &InitialValueSolver {
        &self.solver
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Run until the stop time. Collective.
    pub fn run(&mut self) -> Result<RunSummary, RunError> {
        self.solver.set_stop_sim_time(self.config.t_end);
        let mut reporter = ProgressReporter::new(self.config.t_end);
        let mut tracker = DiagnosticsTracker::new();
        let mut series = DiagnosticSeries::new();
        let history_len = self.solver.history_len();

        tracing::info!(
            timestepper = %self.solver.timestepper(),
            t_end = self.config.t_end,
            ranks = self.ctx.comm().size(),
            "starting main loop"
        );

        let mut plot_index = 0;
        let mut snapshots = 0;
        let mut checkpoints = 0;
        self.snapshot(0)?;
        snapshots += 1;

        let mut dt = self.config.init_dt;
        let mut dt_min = f64::INFINITY;
        let mut dt_max: f64 = 0.0;
        let mut completed = true;

        while self.solver.proceed() {
            if let Some(max_steps) = self.config.max_steps
                && reporter.steps() >= max_steps
            {
                completed = false;
                break;
            }

            self.phase = Phase::Stepping;
            dt = self.next_dt(dt)?;
            let iteration = self.solver.iteration();
            let mut reported = false;

            if iteration % self.config.report_cadence == 0 {
                self.phase = Phase::Diagnosing;
                let diag = self.diagnose(dt)?;
                series.push(diag.time, diag.kinetic_energy);
                if self.ctx.is_root() {
                    reporter.report(&diag);
                }
                tracker.update(diag);
                reported = true;
            }

            if let Some(index) =
                snapshot_due(self.solver.sim_time(), self.config.plot_cadence, plot_index)
            {
                plot_index = index;
                if !reported {
                    self.phase = Phase::Diagnosing;
                    let diag = self.diagnose(dt)?;
                    series.push(diag.time, diag.kinetic_energy);
                    if self.ctx.is_root() {
                        reporter.report(&diag);
                    }
                    tracker.update(diag);
                }
                self.snapshot(plot_index)?;
                snapshots += 1;
            }

            if iteration % self.config.checkpoint_iter == 0 && self.write_checkpoint()? {
                checkpoints += 1;
            }

            if hermitian_due(iteration, self.config.hermitian_cadence, history_len) {
                self.phase = Phase::SymmetryCorrecting;
                self.solver.enforce_hermitian()?;
            }

            self.phase = Phase::Stepping;
            self.solver.step(dt)?;
            reporter.step();
            dt_min = dt_min.min(dt);
            dt_max = dt_max.max(dt);
        }

        self.phase = Phase::Terminated;
        reporter.finish(self.solver.sim_time());
        if self.ctx.is_root() {
            tracker.log_summary();
            if let Some(path) = &self.series_path {
                series.write(path)?;
                tracing::info!(path = %path.display(), samples = series.len(), "wrote energy series");
            }
        }

        Ok(RunSummary {
            iterations: self.solver.iteration(),
            final_time: self.solver.sim_time(),
            dt_min,
            dt_max,
            series,
            snapshots,
            checkpoints,
            wall_time: reporter.elapsed(),
            completed,
        })
    }

    fn next_dt(&mut self, previous: f64) -> Result<f64, RunError> {
        let basis = Arc::clone(self.solver.basis_handle());
        let velocity = self
            .solver
            .state_mut()
            .get_mut(names::VELOCITY)
            .ok_or_else(|| SolverError::MissingField(names::VELOCITY.into()))?;
        velocity.require_grid(&basis);
        let sim_time = self.solver.sim_time();
        let velocity = self
            .solver
            .state()
            .get(names::VELOCITY)
            .ok_or_else(|| SolverError::MissingField(names::VELOCITY.into()))?;
        Ok(self
            .controller
            .next(self.ctx.comm(), velocity.grid(), sim_time, previous)?)
    }

    fn diagnose(&mut self, dt: f64) -> Result<ShellDiagnostics, RunError> {
        let basis = Arc::clone(self.solver.basis_handle());
        let iteration = self.solver.iteration();
        let time = self.solver.sim_time();
        Ok(ShellDiagnostics::compute(
            &self.integrator,
            &basis,
            self.solver.state_mut(),
            iteration,
            time,
            dt,
        )?)
    }

    /// Gather the equatorial temperature on rank 0 and hand it to the sink.
    /// Collective.
    fn snapshot(&mut self, index: usize) -> Result<(), RunError> {
        self.phase = Phase::Snapshotting;
        let basis = Arc::clone(self.solver.basis_handle());
        let truncation = basis.truncation();
        let nr = basis.radial().size();
        let target = truncation.n_theta() / 2;
        let tile = basis.tile().clone();

        let temperature = self
            .solver
            .state_mut()
            .get_mut(names::TEMPERATURE)
            .ok_or_else(|| SolverError::MissingField(names::TEMPERATURE.into()))?;
        temperature.require_grid(&basis);

        let mut local = Vec::new();
        if tile.theta.contains(&target) {
            let n_theta = tile.theta.len();
            let j = target - tile.theta.start;
            let grid = temperature.grid();
            local.push(tile.phi.start as f64);
            for i in 0..tile.phi.len() {
                let start = (i * n_theta + j) * nr;
                local.extend_from_slice(&grid[start..start + nr]);
            }
        }

        let Some(parts) = self.ctx.comm().gather(0, local)? else {
            return Ok(());
        };
        let Some(sink) = self.sink.as_mut() else {
            return Ok(());
        };

        let n_phi = truncation.n_phi();
        let mut values = vec![0.0; n_phi * nr];
        for part in parts.iter().filter(|p| !p.is_empty()) {
            let start = part[0] as usize * nr;
            let data = &part[1..];
            values[start..start + data.len()].copy_from_slice(data);
        }
        let phi = (0..n_phi)
            .map(|i| 2.0 * PI * i as f64 / n_phi as f64)
            .collect();
        let mut slice = EquatorialSlice::new(
            self.solver.sim_time(),
            phi,
            basis.radial().radii().to_vec(),
            values,
        )?;
        if self.config.remove_m0 {
            slice.remove_zonal_mean();
        }
        sink.write(index, &slice)?;
        Ok(())
    }

    /// Write T and u through the checkpoint writer, if one is attached.
    fn write_checkpoint(&mut self) -> Result<bool, RunError> {
        let Some(writer) = self.checkpoint.as_mut() else {
            return Ok(false);
        };
        let basis = Arc::clone(self.solver.basis_handle());
        let iteration = self.solver.iteration();
        let sim_time = self.solver.sim_time();
        let state = self.solver.state_mut();
        let mut records = Vec::with_capacity(2);
        for name in [names::TEMPERATURE, names::VELOCITY] {
            let field = state
                .get_mut(name)
                .ok_or_else(|| SolverError::MissingField(name.into()))?;
            field.require_grid(&basis);
            records.push(FieldRecord::from_field(field, basis.tile()));
        }
        writer.write(iteration, sim_time, records)?;
        Ok(true)
    }
}
