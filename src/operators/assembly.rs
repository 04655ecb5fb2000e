//! Assembly of the per-degree mass and stiffness matrices.

use faer::Mat;

use super::{RadialOperators, operator_blocks};
use crate::problem::Problem;
use crate::solver::BlockLayout;
use crate::types::Degree;

/// Assemble `(M, L)` for degree `ell`.
///
/// Equation k of the degree class fills the rows of variable k. Time
/// derivative terms go to M, everything else to L. Both matrices are real:
/// the operators do not depend on the azimuthal order m.
pub fn assemble_subproblem(
    problem: &Problem,
    layout: &BlockLayout,
    ell: Degree,
    ops: &RadialOperators,
) -> (Mat<f64>, Mat<f64>) {
    let n = layout.size();
    let mut mass = Mat::zeros(n, n);
    let mut stiffness = Mat::zeros(n, n);

    for (row_var, eq) in problem.equations_for(ell).enumerate() {
        for term in &eq.lhs {
            let operand = problem.variables()[term.variable].shape;
            let target = if term.operator.is_time_derivative() {
                &mut mass
            } else {
                &mut stiffness
            };
            for block in operator_blocks(term.operator, operand, ell, eq.radial_power, ops) {
                for &part in layout.parts() {
                    let rows = layout.component_range(row_var, block.row, part);
                    let cols = layout.component_range(term.variable, block.col, part);
                    debug_assert_eq!(rows.len(), block.matrix.nrows());
                    debug_assert_eq!(cols.len(), block.matrix.ncols());
                    for (bj, j) in cols.enumerate() {
                        for (bi, i) in rows.clone().enumerate() {
                            target[(i, j)] += term.coefficient * block.matrix[(bi, bj)];
                        }
                    }
                }
            }
        }
    }

    (mass, stiffness)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basis::{RadialBasis, Spin};
    use crate::problem::{ConvectionParameters, shell_convection_problem};
    use crate::solver::{Block, Part, Representation};
    use crate::types::ShellGeometry;

    fn setup(repr: Representation) -> (Problem, BlockLayout, RadialOperators) {
        let problem = shell_convection_problem(&ConvectionParameters::new(1e-3, 1e5)).unwrap();
        let layout = BlockLayout::new(&problem, 6, repr).unwrap();
        let ops = RadialOperators::new(&RadialBasis::new(6, ShellGeometry::default()));
        (problem, layout, ops)
    }

    #[test]
    fn test_mass_only_on_evolved_fields() {
        let (problem, layout, ops) = setup(Representation::Complex);
        let (mass, _) = assemble_subproblem(&problem, &layout, Degree::new(2), &ops);
        let pressure = layout.rows(Block::Pressure, Part::Re);
        let temperature = layout.rows(Block::Temperature, Part::Re);
        let velocity = layout.rows(Block::Velocity(Spin::Zero), Part::Re);
        let row_norm = |rows: std::ops::Range<usize>| -> f64 {
            rows.flat_map(|i| (0..layout.size()).map(move |j| (i, j)))
                .map(|(i, j)| mass[(i, j)].abs())
                .sum()
        };
        assert_eq!(row_norm(pressure), 0.0);
        assert!(row_norm(temperature) > 0.0);
        assert!(row_norm(velocity) > 0.0);
        assert_eq!(row_norm(layout.tau_columns()), 0.0);
    }

    #[test]
    fn test_zero_degree_pins_velocity() {
        let (problem, layout, ops) = setup(Representation::Complex);
        let (mass, stiffness) = assemble_subproblem(&problem, &layout, Degree::new(0), &ops);
        let rows = layout.rows(Block::Velocity(Spin::Minus), Part::Re);
        for i in rows {
            for j in 0..layout.size() {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((stiffness[(i, j)] - expected).abs() < 1e-12, "({}, {})", i, j);
                assert_eq!(mass[(i, j)], 0.0);
            }
        }
    }

    #[test]
    fn test_real_representation_duplicates_blocks() {
        let (problem, complex_layout, ops) = setup(Representation::Complex);
        let real_layout = BlockLayout::new(&problem, 6, Representation::Real).unwrap();
        let ell = Degree::new(3);
        let (_, lc) = assemble_subproblem(&problem, &complex_layout, ell, &ops);
        let (_, lr) = assemble_subproblem(&problem, &real_layout, ell, &ops);
        let vc = complex_layout.rows(Block::Velocity(Spin::Plus), Part::Re);
        let rc = complex_layout.rows(Block::Velocity(Spin::Zero), Part::Re);
        assert!(vc.clone().any(|i| rc.clone().any(|j| lc[(i, j)] != 0.0)));
        for part in [Part::Re, Part::Im] {
            let vr = real_layout.rows(Block::Velocity(Spin::Plus), part);
            let rr = real_layout.rows(Block::Velocity(Spin::Zero), part);
            let other = match part {
                Part::Re => Part::Im,
                Part::Im => Part::Re,
            };
            let rr_other = real_layout.rows(Block::Velocity(Spin::Zero), other);
            for (ic, ir) in vc.clone().zip(vr) {
                for (jc, jr) in rc.clone().zip(rr.clone()) {
                    assert_eq!(lc[(ic, jc)], lr[(ir, jr)]);
                }
                for j in rr_other.clone() {
                    assert_eq!(lr[(ir, j)], 0.0);
                }
            }
        }
    }
}
