//! Per-degree coefficient-space blocks of the linear operators.
//!
//! Vectors are stored in spin components (−, +, 0) with
//! u± = (u_θ ± i u_φ)/√2 and u0 = u_r. With κ = √(ℓ(ℓ+1)/2) the
//! operators decouple by degree:
//!
//! - grad f: (−, +, 0) = (κ f/r, −κ f/r, f')
//! - div a = a0' + 2 a0/r + κ (a₊ − a₋)/r
//! - lap f = f'' + 2 f'/r − ℓ(ℓ+1) f/r²
//! - vector lap adds the coupling ∓2κ a0/r² to the ± components and
//!   −2a0/r² − 2κ (a₊ − a₋)/r² to the radial one.
//!
//! Each equation is multiplied by r^p, p being the highest radial order on
//! its left-hand side, so that every block is polynomial in r.

use faer::Mat;

use super::RadialOperators;
use crate::basis::Spin;
use crate::problem::LinearOperator;
use crate::types::{Degree, Domain, Shape, TensorKind};

/// One component-to-component block of an operator.
#[derive(Clone, Debug)]
pub struct ComponentBlock {
    /// Component of the result
    pub row: usize,
    /// Component of the operand
    pub col: usize,
    pub matrix: Mat<f64>,
}

/// Blocks of `operator` acting on a field of shape `operand` at degree
/// `ell`, for an equation multiplied by r^`radial_power`.
pub fn operator_blocks(
    operator: LinearOperator,
    operand: Shape,
    ell: Degree,
    radial_power: i32,
    ops: &RadialOperators,
) -> Vec<ComponentBlock> {
    let p = radial_power;
    let kappa = ell.kappa();
    let eigen = ell.eigenvalue();
    let ncomp = operand.kind.ncomp();
    let term = |c: f64, a: i32, b: usize| ops.term(c, p + a, b);
    let block = |row: usize, col: usize, matrix: Mat<f64>| ComponentBlock { row, col, matrix };

    let (minus, plus, zero) = (Spin::Minus.index(), Spin::Plus.index(), Spin::Zero.index());

    match operator {
        LinearOperator::Identity | LinearOperator::TimeDerivative => (0..ncomp)
            .map(|c| match operand.domain {
                Domain::Volume => block(c, c, term(1.0, 0, 0)),
                Domain::Surface(_) => block(c, c, Mat::identity(1, 1)),
            })
            .collect(),
        LinearOperator::Interpolate(b) => (0..ncomp).map(|c| block(c, c, ops.boundary(b))).collect(),
        LinearOperator::Gradient => {
            let mut blocks = vec![block(zero, 0, term(1.0, 0, 1))];
            if kappa != 0.0 {
                blocks.push(block(minus, 0, term(kappa, -1, 0)));
                blocks.push(block(plus, 0, term(-kappa, -1, 0)));
            }
            blocks
        }
        LinearOperator::Divergence => {
            let mut blocks = vec![block(0, zero, sum(term(1.0, 0, 1), term(2.0, -1, 0)))];
            if kappa != 0.0 {
                blocks.push(block(0, plus, term(kappa, -1, 0)));
                blocks.push(block(0, minus, term(-kappa, -1, 0)));
            }
            blocks
        }
        LinearOperator::Laplacian => {
            let radial_part = |eigen: f64| {
                sum(
                    sum(term(1.0, 0, 2), term(2.0, -1, 1)),
                    term(-eigen, -2, 0),
                )
            };
            match operand.kind {
                TensorKind::Scalar => vec![block(0, 0, radial_part(eigen))],
                TensorKind::Vector => {
                    let mut blocks = vec![
                        block(minus, minus, radial_part(eigen)),
                        block(plus, plus, radial_part(eigen)),
                        block(zero, zero, radial_part(eigen + 2.0)),
                    ];
                    if kappa != 0.0 {
                        blocks.push(block(minus, zero, term(2.0 * kappa, -2, 0)));
                        blocks.push(block(plus, zero, term(-2.0 * kappa, -2, 0)));
                        blocks.push(block(zero, plus, term(-2.0 * kappa, -2, 0)));
                        blocks.push(block(zero, minus, term(2.0 * kappa, -2, 0)));
                    }
                    blocks
                }
            }
        }
    }
}

fn sum(mut a: Mat<f64>, b: Mat<f64>) -> Mat<f64> {
    for j in 0..a.ncols() {
        for i in 0..a.nrows() {
            a[(i, j)] += b[(i, j)];
        }
    }
    a
}
