//! Tau correction of the convection subproblems over a full truncation.

use std::sync::Arc;

use faer::Mat;
use shellconv::basis::RadialBasis;
use shellconv::operators::{RadialOperators, assemble_subproblem};
use shellconv::polynomial::JacobiParams;
use shellconv::problem::{ConvectionParameters, shell_convection_problem};
use shellconv::solver::{
    BlockLayout, ModeOperators, Representation, Subproblem, TauError, apply_tau_correction,
    sparse_entry,
};
use shellconv::types::{Degree, ShellGeometry};

const LMAX: usize = 7;
const NMAX: usize = 7;

fn uncorrected_subproblems(repr: Representation) -> Vec<Subproblem> {
    let problem = shell_convection_problem(&ConvectionParameters::new(1e-3, 1e5)).unwrap();
    let basis = RadialBasis::new(NMAX, ShellGeometry::default());
    let ops = RadialOperators::new(&basis);
    let layout = Arc::new(BlockLayout::new(&problem, NMAX, repr).unwrap());
    let connection = Arc::new(basis.tau_connection(JacobiParams::new(1.5, 1.5)));
    (0..=LMAX)
        .map(|ell| {
            let ell = Degree::new(ell);
            let (m, l) = assemble_subproblem(&problem, &layout, ell, &ops);
            Subproblem::new(ell, Arc::clone(&layout), Arc::clone(&connection), m, l)
        })
        .collect()
}

fn corrected_subproblems(repr: Representation) -> Vec<Subproblem> {
    let mut subproblems = uncorrected_subproblems(repr);
    for sp in &mut subproblems {
        apply_tau_correction(sp).unwrap();
    }
    subproblems
}

#[test]
fn test_every_degree_is_corrected_once() {
    for mut sp in corrected_subproblems(Representation::Real) {
        assert!(sp.is_tau_corrected());
        let ell = sp.ell().get();
        assert_eq!(
            apply_tau_correction(&mut sp),
            Err(TauError::AlreadyCorrected { ell })
        );
    }
}

#[test]
fn test_tau_columns_leave_the_mass_matrix() {
    for sp in corrected_subproblems(Representation::Complex) {
        let (m, l) = sp.compressed().unwrap();
        let taus = sp.layout().tau_columns();
        for j in taus.clone() {
            for i in 0..m.nrows() {
                assert_eq!(sparse_entry(m, i, j), 0.0);
            }
        }
        // every tau column couples to at least one equation row
        for j in taus {
            assert!((0..l.nrows()).any(|i| sparse_entry(l, i, j) != 0.0), "ℓ={} col {}", sp.ell().get(), j);
        }
    }
}

#[test]
fn test_all_degrees_solvable_in_both_representations() {
    for repr in [Representation::Real, Representation::Complex] {
        for mut sp in corrected_subproblems(repr) {
            let n = sp.layout().size();
            let rhs = Mat::from_fn(n, 3, |i, j| (((i * 7 + j * 3) % 11) as f64 - 5.0) * 0.1);
            let a0 = 1.5 / 1e-3;
            let x = sp.solve(a0, &rhs).unwrap();
            assert!(sp.has_factorization(a0));

            let (m, l) = sp.compressed().unwrap();
            let mx = m.as_ref() * x.as_ref();
            let lx = l.as_ref() * x.as_ref();
            let mut worst: f64 = 0.0;
            for c in 0..3 {
                for i in 0..n {
                    worst = worst.max((a0 * mx[(i, c)] + lx[(i, c)] - rhs[(i, c)]).abs());
                }
            }
            assert!(worst < 1e-6, "{:?} ℓ={}: residual {}", repr, sp.ell().get(), worst);
        }
    }
}

#[test]
fn test_correction_only_writes_tau_columns() {
    for repr in [Representation::Real, Representation::Complex] {
        for mut sp in uncorrected_subproblems(repr).into_iter().skip(1) {
            let mass = sp.mass().clone();
            let stiffness = sp.stiffness().clone();
            apply_tau_correction(&mut sp).unwrap();

            let ell = sp.ell().get();
            let taus = sp.layout().tau_columns();
            let (m, l) = sp.compressed().unwrap();
            let n = sp.layout().size();
            for j in (0..n).filter(|j| !taus.contains(j)) {
                for i in 0..n {
                    assert_eq!(sp.mass()[(i, j)], mass[(i, j)], "{:?} ℓ={} M({}, {})", repr, ell, i, j);
                    assert_eq!(sp.stiffness()[(i, j)], stiffness[(i, j)], "{:?} ℓ={} L({}, {})", repr, ell, i, j);
                    assert_eq!(sparse_entry(m, i, j), mass[(i, j)]);
                    assert_eq!(sparse_entry(l, i, j), stiffness[(i, j)]);
                }
            }
        }
    }
}
