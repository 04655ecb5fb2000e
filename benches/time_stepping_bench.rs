//! Benchmarks for time stepping and diagnostics.
//!
//! Run with: `cargo bench --bench time_stepping_bench`
//!
//! Benchmarks SBDF steps of the shell convection solver, the RHS evaluation
//! and the energy diagnostics.

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use shellconv::basis::ShellBasis;
use shellconv::comm::{ProcessMesh, SingleProcess};
use shellconv::problem::{ConvectionParameters, shell_convection_problem};
use shellconv::simulation::{parameter_fields, set_initial_conditions};
use shellconv::solver::{EnergyIntegrator, InitialValueSolver, ShellDiagnostics, SolverConfig};
use shellconv::types::{ShellGeometry, Truncation};

/// Setup a solver with the perturbed conductive state.
fn setup_solver(lmax: usize, nmax: usize) -> InitialValueSolver {
    let basis = Arc::new(
        ShellBasis::new(
            Truncation::new(lmax, nmax),
            ShellGeometry::default(),
            ProcessMesh::single(),
            Arc::new(SingleProcess),
        )
        .unwrap(),
    );
    let problem = shell_convection_problem(&ConvectionParameters::new(1e-3, 1e5)).unwrap();
    let parameters = parameter_fields(&basis);
    let mut solver =
        InitialValueSolver::new(problem, basis, parameters, SolverConfig::default()).unwrap();
    set_initial_conditions(&mut solver, 0.1).unwrap();
    solver
}

/// Benchmark single SBDF2 steps at a fixed dt (factorisations cached).
fn bench_sbdf_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("sbdf_step");
    group.sample_size(20);

    for resolution in [7, 15] {
        let mut solver = setup_solver(resolution, resolution);
        // warm the history and the factorisation cache
        solver.step(1e-5).unwrap();
        solver.step(1e-5).unwrap();

        group.bench_with_input(
            BenchmarkId::new("step", format!("L{}_N{}", resolution, resolution)),
            &resolution,
            |b, _| {
                b.iter(|| solver.step(black_box(1e-5)).unwrap());
            },
        );
    }

    group.finish();
}

/// Benchmark the grid-space evaluation of the explicit terms.
fn bench_rhs(c: &mut Criterion) {
    let mut group = c.benchmark_group("rhs");

    for resolution in [7, 15] {
        let mut solver = setup_solver(resolution, resolution);
        group.bench_with_input(
            BenchmarkId::new("evaluate", format!("L{}_N{}", resolution, resolution)),
            &resolution,
            |b, _| {
                b.iter(|| black_box(solver.evaluate_rhs().unwrap()));
            },
        );
    }

    group.finish();
}

/// Benchmark kinetic and thermal energy integrals.
fn bench_diagnostics(c: &mut Criterion) {
    let mut group = c.benchmark_group("diagnostics");

    let mut solver = setup_solver(15, 15);
    let basis = Arc::clone(solver.basis_handle());
    let integrator = EnergyIntegrator::new(&basis).unwrap();

    group.bench_function("energies", |b| {
        b.iter(|| {
            ShellDiagnostics::compute(
                black_box(&integrator),
                black_box(&basis),
                solver.state_mut(),
                0,
                0.0,
                1e-4,
            )
            .unwrap()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_sbdf_step, bench_rhs, bench_diagnostics);
criterion_main!(benches);
