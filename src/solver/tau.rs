//! Tau correction of the per-degree subproblems.
//!
//! The boundary conditions are imposed by adding tau polynomials to the
//! highest modes of the evolved equations. The inner tau unknown multiplies
//! the degree-N polynomial and the outer one the degree-(N−1) polynomial,
//! each expanded in the Chebyshev basis through the connection matrix.
//!
//! At ℓ = 0 velocity is pinned by identity equations, so only the
//! temperature equation receives tau terms.

use std::ops::Range;

use faer::Mat;
use thiserror::Error;

use super::{Block, ModeOperators, Part, TauVariable};
use crate::basis::Spin;
use crate::types::Boundary;

/// Errors raised while building or correcting subproblems.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TauError {
    #[error("subproblem ℓ={ell} is already tau-corrected")]
    AlreadyCorrected { ell: usize },
    #[error("tau variables must be the trailing unknowns, found '{name}' among them")]
    TauNotTrailing { name: String },
    #[error("connection matrix has {found} rows, the radial basis has {expected} coefficients")]
    ConnectionSize { expected: usize, found: usize },
    #[error("subproblem ℓ={ell} could not be compressed: {message}")]
    Compression { ell: usize, message: String },
}

/// Apply the tau correction to one subproblem.
///
/// Zeroes the tau columns of M, writes the connection columns into the tau
/// columns of L, then compresses the matrices and drops any cached
/// factorisation.
pub fn apply_tau_correction<O: ModeOperators + ?Sized>(op: &mut O) -> Result<(), TauError> {
    let ell = op.ell();
    if op.is_tau_corrected() {
        return Err(TauError::AlreadyCorrected { ell: ell.get() });
    }

    let layout = op.layout().clone();
    let connection = op.connection().clone();
    let n = layout.rows(Block::Temperature, Part::Re).len();
    if connection.nrows() != n || connection.ncols() != n {
        return Err(TauError::ConnectionSize {
            expected: n,
            found: connection.nrows(),
        });
    }
    let tau_polynomial = |boundary: Boundary| match boundary {
        Boundary::Inner => n - 1,
        Boundary::Outer => n - 2,
    };

    let tau_columns = layout.tau_columns();
    zero_columns(op.mass_mut(), tau_columns.clone());

    let stiffness = op.stiffness_mut();
    if !ell.is_zero() {
        zero_columns(stiffness, tau_columns);
    }
    let mut write = |rows: Range<usize>, col: usize, source: usize| {
        for (k, i) in rows.enumerate() {
            stiffness[(i, col)] = connection[(k, source)];
        }
    };

    for &part in layout.parts() {
        for boundary in Boundary::ALL {
            let source = tau_polynomial(boundary);
            if !ell.is_zero() {
                for spin in Spin::ALL {
                    let col = layout.tau_column(TauVariable::Velocity, boundary, spin.index(), part);
                    write(layout.rows(Block::Velocity(spin), part), col, source);
                }
            }
            let col = layout.tau_column(TauVariable::Temperature, boundary, 0, part);
            write(layout.rows(Block::Temperature, part), col, source);
        }
    }

    op.finish_tau_correction()
        .map_err(|e| TauError::Compression {
            ell: ell.get(),
            message: format!("{:?}", e),
        })
}

fn zero_columns(m: &mut Mat<f64>, columns: Range<usize>) {
    for j in columns {
        for i in 0..m.nrows() {
            m[(i, j)] = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::basis::RadialBasis;
    use crate::operators::{RadialOperators, assemble_subproblem};
    use crate::polynomial::JacobiParams;
    use crate::problem::{ConvectionParameters, Problem, shell_convection_problem};
    use crate::solver::{BlockLayout, Representation, Subproblem, sparse_entry};
    use crate::types::{Degree, ShellGeometry};

    const NMAX: usize = 6;

    fn problem() -> Problem {
        shell_convection_problem(&ConvectionParameters::new(1e-3, 1e5)).unwrap()
    }

    fn subproblem(problem: &Problem, ell: usize, repr: Representation) -> Subproblem {
        let basis = RadialBasis::new(NMAX, ShellGeometry::default());
        let ops = RadialOperators::new(&basis);
        let layout = BlockLayout::new(problem, NMAX, repr).unwrap();
        let (m, l) = assemble_subproblem(problem, &layout, Degree::new(ell), &ops);
        let c = basis.tau_connection(JacobiParams::new(1.5, 1.5));
        Subproblem::new(Degree::new(ell), Arc::new(layout), Arc::new(c), m, l)
    }

    #[test]
    fn test_nonzero_degree_columns() {
        let problem = problem();
        let mut sp = subproblem(&problem, 3, Representation::Complex);
        apply_tau_correction(&mut sp).unwrap();
        let layout = sp.layout().clone();
        let c = sp.connection().clone();
        let (_, l) = sp.compressed().unwrap();

        for spin in Spin::ALL {
            let rows = layout.rows(Block::Velocity(spin), Part::Re);
            let inner = layout.tau_column(TauVariable::Velocity, Boundary::Inner, spin.index(), Part::Re);
            let outer = layout.tau_column(TauVariable::Velocity, Boundary::Outer, spin.index(), Part::Re);
            for (k, i) in rows.enumerate() {
                assert_eq!(sparse_entry(l, i, inner), c[(k, NMAX)]);
                assert_eq!(sparse_entry(l, i, outer), c[(k, NMAX - 1)]);
            }
        }
        let rows = layout.rows(Block::Temperature, Part::Re);
        let inner = layout.tau_column(TauVariable::Temperature, Boundary::Inner, 0, Part::Re);
        for (k, i) in rows.enumerate() {
            assert_eq!(sparse_entry(l, i, inner), c[(k, NMAX)]);
        }
        // pressure rows carry no tau terms
        for i in layout.rows(Block::Pressure, Part::Re) {
            for j in layout.tau_columns() {
                assert_eq!(sparse_entry(l, i, j), 0.0);
            }
        }
        // velocity taus do not leak into the temperature equation
        let cross = layout.tau_column(TauVariable::Velocity, Boundary::Inner, 0, Part::Re);
        for i in layout.rows(Block::Temperature, Part::Re) {
            assert_eq!(sparse_entry(l, i, cross), 0.0);
        }
    }

    #[test]
    fn test_zero_degree_touches_only_temperature() {
        let problem = problem();
        let mut sp = subproblem(&problem, 0, Representation::Real);
        let before = sp.stiffness().clone();
        apply_tau_correction(&mut sp).unwrap();
        let layout = sp.layout().clone();
        let c = sp.connection().clone();
        let after = sp.stiffness();

        let mut changed = Vec::new();
        for j in 0..layout.size() {
            for i in 0..layout.size() {
                if before[(i, j)] != after[(i, j)] {
                    changed.push((i, j));
                }
            }
        }
        for &(i, j) in &changed {
            let in_temperature = [Part::Re, Part::Im]
                .iter()
                .any(|&p| layout.rows(Block::Temperature, p).contains(&i));
            let temperature_tau = [Part::Re, Part::Im].iter().any(|&p| {
                Boundary::ALL
                    .iter()
                    .any(|&b| layout.tau_column(TauVariable::Temperature, b, 0, p) == j)
            });
            assert!(in_temperature && temperature_tau, "unexpected change at ({}, {})", i, j);
        }
        for part in [Part::Re, Part::Im] {
            let rows = layout.rows(Block::Temperature, part);
            let outer = layout.tau_column(TauVariable::Temperature, Boundary::Outer, 0, part);
            for (k, i) in rows.enumerate() {
                assert_eq!(after[(i, outer)], c[(k, NMAX - 1)]);
            }
        }
        // the tau_u = 0 identity rows survive
        let col = layout.tau_column(TauVariable::Velocity, Boundary::Inner, 0, Part::Re);
        assert_eq!(after[(col, col)], 1.0);
    }

    #[test]
    fn test_mass_tau_columns_are_zero() {
        let problem = problem();
        let mut sp = subproblem(&problem, 2, Representation::Real);
        apply_tau_correction(&mut sp).unwrap();
        let (m, _) = sp.compressed().unwrap();
        for i in 0..m.nrows() {
            for j in sp.layout().tau_columns() {
                assert_eq!(sparse_entry(m, i, j), 0.0);
            }
        }
    }

    #[test]
    fn test_second_correction_is_rejected() {
        let problem = problem();
        let mut sp = subproblem(&problem, 1, Representation::Complex);
        apply_tau_correction(&mut sp).unwrap();
        assert_eq!(
            apply_tau_correction(&mut sp),
            Err(TauError::AlreadyCorrected { ell: 1 })
        );
    }

    #[test]
    fn test_connection_size_checked() {
        let problem = problem();
        let basis = RadialBasis::new(NMAX, ShellGeometry::default());
        let ops = RadialOperators::new(&basis);
        let layout = BlockLayout::new(&problem, NMAX, Representation::Complex).unwrap();
        let (m, l) = assemble_subproblem(&problem, &layout, Degree::new(1), &ops);
        let small = RadialBasis::new(NMAX - 1, ShellGeometry::default())
            .tau_connection(JacobiParams::new(1.5, 1.5));
        let mut sp = Subproblem::new(Degree::new(1), Arc::new(layout), Arc::new(small), m, l);
        assert_eq!(
            apply_tau_correction(&mut sp),
            Err(TauError::ConnectionSize {
                expected: NMAX + 1,
                found: NMAX
            })
        );
    }

    #[test]
    fn test_corrected_system_is_solvable() {
        let problem = problem();
        for ell in [0, 1, 4] {
            let mut sp = subproblem(&problem, ell, Representation::Complex);
            apply_tau_correction(&mut sp).unwrap();
            let n = sp.layout().size();
            let rhs = Mat::from_fn(n, 2, |i, j| ((i + 3 * j) % 7) as f64 - 3.0);
            let x = sp.solve(100.0, &rhs).unwrap();
            let (m, l) = sp.compressed().unwrap();
            let mut residual = m.as_ref() * x.as_ref();
            let lx = l.as_ref() * x.as_ref();
            let mut worst: f64 = 0.0;
            for c in 0..2 {
                for i in 0..n {
                    residual[(i, c)] = 100.0 * residual[(i, c)] + lx[(i, c)] - rhs[(i, c)];
                    worst = worst.max(residual[(i, c)].abs());
                }
            }
            assert!(worst < 1e-6, "ℓ={}: residual {}", ell, worst);
        }
    }
}
