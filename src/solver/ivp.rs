//! Initial value solver: SBDF time stepping of the tau-corrected system.
//!
//! Every rank holds the full coefficient set and performs identical
//! per-mode solves; only the grid-space right-hand side is distributed.

use std::collections::VecDeque;
use std::sync::Arc;

use faer::Mat;
use num_complex::Complex64;
use thiserror::Error;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::{
    BlockLayout, FieldSet, Representation, RhsEvaluator, Subproblem, TauError,
    apply_tau_correction,
};
use crate::basis::ShellBasis;
use crate::comm::CommError;
use crate::field::Field;
use crate::operators::{RadialOperators, assemble_subproblem};
use crate::polynomial::JacobiParams;
use crate::problem::Problem;
use crate::time::{IntegratorInfo, Timestepper, sbdf_weights};
use crate::types::{Degree, Mode, Shape, TensorKind};

/// Errors raised while building or stepping the solver.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error(transparent)]
    Tau(#[from] TauError),
    #[error(transparent)]
    Comm(#[from] CommError),
    #[error("no field named '{0}'")]
    MissingField(String),
    #[error("parameter '{name}' has shape {found}, expected {expected}")]
    ParameterShape {
        name: String,
        expected: Shape,
        found: Shape,
    },
    #[error("equation '{equation}': right-hand side evaluates to a {found}, expected a {expected}")]
    RhsShape {
        equation: String,
        expected: TensorKind,
        found: TensorKind,
    },
    #[error("equation '{equation}': cannot evaluate '{node}' on the grid")]
    UnsupportedRhs { equation: String, node: &'static str },
    #[error("subproblem ℓ={ell} is singular")]
    SingularSubproblem { ell: usize },
    #[error("invalid timestep {0}")]
    InvalidTimestep(f64),
}

/// Solver settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolverConfig {
    pub timestepper: Timestepper,
    pub representation: Representation,
    /// Jacobi parameters of the tau polynomials
    pub tau_params: JacobiParams,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            timestepper: Timestepper::Sbdf2,
            representation: Representation::Real,
            tau_params: JacobiParams::new(1.5, 1.5),
        }
    }
}

/// Per-mode vectors of one history level, indexed by mode index.
type ModeVectors = Vec<Vec<Complex64>>;

/// SBDF time stepper for a validated problem.
pub struct InitialValueSolver {
    problem: Problem,
    basis: Arc<ShellBasis>,
    layout: Arc<BlockLayout>,
    subproblems: Vec<Subproblem>,
    state: FieldSet,
    parameters: FieldSet,
    timestepper: Timestepper,
    mx_history: VecDeque<ModeVectors>,
    f_history: VecDeque<ModeVectors>,
    dt_history: VecDeque<f64>,
    sim_time: f64,
    iteration: usize,
    stop_sim_time: f64,
}

impl InitialValueSolver {
    /// Assemble and tau-correct every subproblem.
    ///
    /// `parameters` must provide a field for every declared parameter.
    pub fn new(
        problem: Problem,
        basis: Arc<ShellBasis>,
        parameters: Vec<Field>,
        config: SolverConfig,
    ) -> Result<Self, SolverError> {
        let parameters = FieldSet::from_fields(parameters);
        for decl in problem.parameters() {
            let field = parameters
                .get(&decl.name)
                .ok_or_else(|| SolverError::MissingField(decl.name.clone()))?;
            if field.shape() != decl.shape {
                return Err(SolverError::ParameterShape {
                    name: decl.name.clone(),
                    expected: decl.shape,
                    found: field.shape(),
                });
            }
        }

        let truncation = basis.truncation();
        let layout = Arc::new(BlockLayout::new(
            &problem,
            truncation.nmax(),
            config.representation,
        )?);
        let ops = RadialOperators::new(basis.radial());
        let connection = Arc::new(basis.radial().tau_connection(config.tau_params));

        let mut subproblems = Vec::with_capacity(truncation.lmax() + 1);
        for ell in Degree::iter(truncation.lmax()) {
            let (mass, stiffness) = assemble_subproblem(&problem, &layout, ell, &ops);
            let mut sp = Subproblem::new(
                ell,
                Arc::clone(&layout),
                Arc::clone(&connection),
                mass,
                stiffness,
            );
            apply_tau_correction(&mut sp)?;
            subproblems.push(sp);
        }
        tracing::info!(
            subproblems = subproblems.len(),
            size = layout.size(),
            timestepper = %config.timestepper,
            "built solver"
        );

        let state = FieldSet::zeros(problem.variables(), &basis);
        Ok(Self {
            problem,
            basis,
            layout,
            subproblems,
            state,
            parameters,
            timestepper: config.timestepper,
            mx_history: VecDeque::new(),
            f_history: VecDeque::new(),
            dt_history: VecDeque::new(),
            sim_time: 0.0,
            iteration: 0,
            stop_sim_time: f64::INFINITY,
        })
    }

    pub fn problem(&self) -> &Problem {
        &self.problem
    }

    pub fn basis(&self) -> &ShellBasis {
        &self.basis
    }

    /// Shared handle to the basis.
    pub fn basis_handle(&self) -> &Arc<ShellBasis> {
        &self.basis
    }

    pub fn layout(&self) -> &BlockLayout {
        &self.layout
    }

    /// Subproblem of degree ℓ.
    pub fn subproblem(&self, ell: Degree) -> &Subproblem {
        &self.subproblems[ell.get()]
    }

    pub fn state(&self) -> &FieldSet {
        &self.state
    }

    /// Mutable state; grid or coefficient edits are picked up by the next
    /// step.
    pub fn state_mut(&mut self) -> &mut FieldSet {
        &mut self.state
    }

    pub fn parameters(&self) -> &FieldSet {
        &self.parameters
    }

    pub fn timestepper(&self) -> Timestepper {
        self.timestepper
    }

    /// Number of past levels the scheme keeps.
    pub fn history_len(&self) -> usize {
        self.timestepper.history_len()
    }

    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn stop_sim_time(&self) -> f64 {
        self.stop_sim_time
    }

    pub fn set_stop_sim_time(&mut self, t_end: f64) {
        self.stop_sim_time = t_end;
    }

    /// Whether the simulation time is still short of the stop time.
    pub fn proceed(&self) -> bool {
        self.sim_time < self.stop_sim_time
    }

    /// Round-trip every state field through grid space. Collective.
    pub fn enforce_hermitian(&mut self) -> Result<(), SolverError> {
        Ok(self.state.enforce_hermitian(&self.basis)?)
    }

    /// Right-hand sides of all equations, in coefficient space. Collective.
    pub fn evaluate_rhs(&mut self) -> Result<Vec<Vec<Complex64>>, SolverError> {
        self.state.require_coeff(&self.basis)?;
        self.state.require_grid(&self.basis);
        let evaluator = RhsEvaluator {
            basis: &self.basis,
            state: &self.state,
            parameters: &self.parameters,
        };
        self.problem
            .equations()
            .iter()
            .map(|eq| evaluator.coefficients(eq))
            .collect()
    }

    /// Advance by `dt`. Collective.
    pub fn step(&mut self, dt: f64) -> Result<(), SolverError> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(SolverError::InvalidTimestep(dt));
        }

        let rhs = self.evaluate_rhs()?;
        let truncation = self.basis.truncation();
        let modes: Vec<Mode> = truncation.modes().collect();

        let mut mx = Vec::with_capacity(modes.len());
        let mut f = Vec::with_capacity(modes.len());
        for &mode in &modes {
            let x = self.state.gather_mode(&self.layout, mode);
            mx.push(self.subproblems[mode.ell.get()].apply_mass_complex(&x));
            f.push(self.gather_rhs(&rhs, mode));
        }

        let keep = self.history_len();
        self.mx_history.push_front(mx);
        self.f_history.push_front(f);
        self.dt_history.push_front(dt);
        self.mx_history.truncate(keep);
        self.f_history.truncate(keep);
        self.dt_history.truncate(keep);

        let dts: Vec<f64> = self.dt_history.iter().copied().collect();
        let weights = sbdf_weights(&dts);
        let a0 = weights.a[0];

        // right-hand side per mode, grouped by degree
        let layout = Arc::clone(&self.layout);
        let mut columns: Vec<Vec<(usize, Mat<f64>)>> = vec![Vec::new(); self.subproblems.len()];
        for (index, &mode) in modes.iter().enumerate() {
            let mut b = vec![Complex64::new(0.0, 0.0); layout.complex_size()];
            for (j, c) in weights.c.iter().enumerate() {
                for (acc, v) in b.iter_mut().zip(&self.f_history[j][index]) {
                    *acc += *v * *c;
                }
            }
            for (j, a) in weights.a.iter().enumerate().skip(1) {
                for (acc, v) in b.iter_mut().zip(&self.mx_history[j - 1][index]) {
                    *acc -= *v * *a;
                }
            }
            columns[mode.ell.get()].push((index, layout.pack(&b)));
        }

        let solve = |sp: &mut Subproblem,
                     cols: &Vec<(usize, Mat<f64>)>|
         -> Result<Vec<(usize, Vec<Complex64>)>, SolverError> {
            if cols.is_empty() {
                return Ok(Vec::new());
            }
            let width = layout.rhs_columns();
            let mut stacked = Mat::zeros(layout.size(), width * cols.len());
            for (k, (_, b)) in cols.iter().enumerate() {
                for c in 0..width {
                    for i in 0..layout.size() {
                        stacked[(i, k * width + c)] = b[(i, c)];
                    }
                }
            }
            let x = sp.solve(a0, &stacked)?;
            Ok(cols
                .iter()
                .enumerate()
                .map(|(k, (index, _))| {
                    let block = Mat::from_fn(layout.size(), width, |i, c| x[(i, k * width + c)]);
                    (*index, layout.unpack(&block))
                })
                .collect())
        };

        #[cfg(feature = "parallel")]
        let solutions: Vec<_> = self
            .subproblems
            .par_iter_mut()
            .zip(columns.par_iter())
            .map(|(sp, cols)| solve(sp, cols))
            .collect::<Result<Vec<_>, _>>()?;
        #[cfg(not(feature = "parallel"))]
        let solutions: Vec<_> = self
            .subproblems
            .iter_mut()
            .zip(columns.iter())
            .map(|(sp, cols)| solve(sp, cols))
            .collect::<Result<Vec<_>, _>>()?;

        for (index, x) in solutions.into_iter().flatten() {
            self.state.scatter_mode(&layout, modes[index], &x);
        }

        self.sim_time += dt;
        self.iteration += 1;
        Ok(())
    }

    /// Right-hand side of one mode in subproblem order.
    fn gather_rhs(&self, rhs: &[Vec<Complex64>], mode: Mode) -> Vec<Complex64> {
        let mut b = vec![Complex64::new(0.0, 0.0); self.layout.complex_size()];
        let equations = self.problem.equations();
        let active = equations
            .iter()
            .enumerate()
            .filter(|(_, eq)| eq.condition.applies(mode.ell));
        for (row, (eq_index, eq)) in active.enumerate() {
            let ncomp = eq.shape.kind.ncomp();
            let nr = self.layout.radial_size(row);
            let offset = crate::basis::mode_offset(mode.m.get(), mode.ell.get());
            for comp in 0..ncomp {
                let src = (offset * ncomp + comp) * nr;
                let dst = self.layout.complex_offset(row, comp);
                b[dst..dst + nr].copy_from_slice(&rhs[eq_index][src..src + nr]);
            }
        }
        b
    }
}
