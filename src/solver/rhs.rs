//! Grid-space evaluation of right-hand sides.
//!
//! Expressions are evaluated pointwise on the local grid of the equation's
//! domain. Gradients and curls are computed spectrally from the current
//! coefficients of the operand. Vector components are (φ, θ, r).

use num_complex::Complex64;

use super::{FieldSet, SolverError};
use crate::basis::{ShellBasis, grid_component};
use crate::problem::{CompiledEquation, Expr};
use crate::types::{Domain, TensorKind};

/// Grid values of a sub-expression.
#[derive(Clone, Debug, PartialEq)]
enum GridValue {
    /// Identically zero, of any rank
    Zero,
    Scalar(Vec<f64>),
    /// Components stacked as (φ, θ, r)
    Vector(Vec<f64>),
}

impl GridValue {
    fn kind(&self) -> Option<TensorKind> {
        match self {
            GridValue::Zero => None,
            GridValue::Scalar(_) => Some(TensorKind::Scalar),
            GridValue::Vector(_) => Some(TensorKind::Vector),
        }
    }

    fn map(self, f: impl Fn(f64) -> f64) -> Self {
        match self {
            GridValue::Zero => GridValue::Zero,
            GridValue::Scalar(mut v) => {
                v.iter_mut().for_each(|x| *x = f(*x));
                GridValue::Scalar(v)
            }
            GridValue::Vector(mut v) => {
                v.iter_mut().for_each(|x| *x = f(*x));
                GridValue::Vector(v)
            }
        }
    }
}

/// Evaluates right-hand sides against a state and parameter set.
pub struct RhsEvaluator<'a> {
    pub basis: &'a ShellBasis,
    pub state: &'a FieldSet,
    pub parameters: &'a FieldSet,
}

impl RhsEvaluator<'_> {
    /// Coefficients of `r^p · rhs` for one equation. State grids and
    /// coefficients must both be current. Collective.
    pub fn coefficients(&self, eq: &CompiledEquation) -> Result<Vec<Complex64>, SolverError> {
        let kind = eq.shape.kind;
        let domain = eq.shape.domain;
        if eq.rhs_is_zero() {
            return Ok(vec![Complex64::new(0.0, 0.0); self.basis.coeff_len(kind, domain)]);
        }
        let mut grid = self.grid(eq, kind, domain)?;
        if eq.radial_power != 0 {
            let radii = self.basis.local_radii(domain);
            let nr = radii.len();
            for (i, v) in grid.iter_mut().enumerate() {
                *v *= radii[i % nr].powi(eq.radial_power);
            }
        }
        Ok(self.basis.forward(kind, domain, &grid)?)
    }

    /// Grid values of the right-hand side, broadcast to the equation rank.
    pub fn grid(
        &self,
        eq: &CompiledEquation,
        kind: TensorKind,
        domain: Domain,
    ) -> Result<Vec<f64>, SolverError> {
        let n = self.basis.local_points(domain);
        let value = self.eval(&eq.rhs, domain, &eq.label)?;
        Ok(match (value, kind) {
            (GridValue::Zero, _) => vec![0.0; kind.ncomp() * n],
            (GridValue::Scalar(v), TensorKind::Scalar) | (GridValue::Vector(v), TensorKind::Vector) => v,
            (other, _) => {
                return Err(SolverError::RhsShape {
                    equation: eq.label.clone(),
                    expected: kind,
                    found: other.kind().unwrap_or(kind),
                });
            }
        })
    }

    fn eval(&self, e: &Expr, domain: Domain, label: &str) -> Result<GridValue, SolverError> {
        let n = self.basis.local_points(domain);
        let wrap = |kind: TensorKind, v: Vec<f64>| match kind {
            TensorKind::Scalar => GridValue::Scalar(v),
            TensorKind::Vector => GridValue::Vector(v),
        };
        let unsupported = || SolverError::UnsupportedRhs {
            equation: label.to_string(),
            node: e.node_name(),
        };
        Ok(match e {
            Expr::Zero => GridValue::Zero,
            Expr::Const(c) => GridValue::Scalar(vec![*c; n]),
            Expr::Var(name) => {
                let field = self
                    .state
                    .get(name)
                    .ok_or_else(|| SolverError::MissingField(name.clone()))?;
                wrap(field.kind(), field.grid().to_vec())
            }
            Expr::Param(name) => {
                let field = self
                    .parameters
                    .get(name)
                    .ok_or_else(|| SolverError::MissingField(name.clone()))?;
                wrap(field.kind(), field.grid().to_vec())
            }
            Expr::Neg(a) => self.eval(a, domain, label)?.map(|x| -x),
            Expr::Scale(c, a) => {
                let c = *c;
                self.eval(a, domain, label)?.map(|x| c * x)
            }
            Expr::Add(a, b) => add(self.eval(a, domain, label)?, self.eval(b, domain, label)?),
            Expr::Mul(a, b) => multiply(self.eval(a, domain, label)?, self.eval(b, domain, label)?, n),
            Expr::Dot(a, b) => match (self.eval(a, domain, label)?, self.eval(b, domain, label)?) {
                (GridValue::Vector(u), GridValue::Vector(v)) => GridValue::Scalar(
                    (0..n)
                        .map(|i| (0..3).map(|c| u[c * n + i] * v[c * n + i]).sum())
                        .collect(),
                ),
                _ => GridValue::Zero,
            },
            Expr::Cross(a, b) => match (self.eval(a, domain, label)?, self.eval(b, domain, label)?) {
                (GridValue::Vector(u), GridValue::Vector(v)) => GridValue::Vector(cross(&u, &v, n)),
                _ => GridValue::Zero,
            },
            Expr::Gradient(a) | Expr::Curl(a) => {
                let Expr::Var(name) = a.as_ref() else {
                    return Err(unsupported());
                };
                let field = self
                    .state
                    .get(name)
                    .ok_or_else(|| SolverError::MissingField(name.clone()))?;
                match e {
                    Expr::Gradient(_) => GridValue::Vector(self.basis.gradient_grid(field.coeffs())),
                    _ => GridValue::Vector(self.basis.curl_grid(field.coeffs())),
                }
            }
            Expr::TimeDerivative(_)
            | Expr::Divergence(_)
            | Expr::Laplacian(_)
            | Expr::Interpolate(..) => return Err(unsupported()),
        })
    }
}

fn add(a: GridValue, b: GridValue) -> GridValue {
    match (a, b) {
        (GridValue::Zero, x) | (x, GridValue::Zero) => x,
        (GridValue::Scalar(mut u), GridValue::Scalar(v)) => {
            u.iter_mut().zip(&v).for_each(|(x, y)| *x += y);
            GridValue::Scalar(u)
        }
        (GridValue::Vector(mut u), GridValue::Vector(v)) => {
            u.iter_mut().zip(&v).for_each(|(x, y)| *x += y);
            GridValue::Vector(u)
        }
        // ranks were checked when the problem was built
        (x, _) => x,
    }
}

fn multiply(a: GridValue, b: GridValue, n: usize) -> GridValue {
    match (a, b) {
        (GridValue::Zero, _) | (_, GridValue::Zero) => GridValue::Zero,
        (GridValue::Scalar(mut s), GridValue::Scalar(t)) => {
            s.iter_mut().zip(&t).for_each(|(x, y)| *x *= y);
            GridValue::Scalar(s)
        }
        (GridValue::Scalar(s), GridValue::Vector(mut v)) | (GridValue::Vector(mut v), GridValue::Scalar(s)) => {
            for (i, x) in v.iter_mut().enumerate() {
                *x *= s[i % n];
            }
            GridValue::Vector(v)
        }
        (GridValue::Vector(_), GridValue::Vector(_)) => GridValue::Zero,
    }
}

/// Pointwise cross product of (φ, θ, r) component grids.
pub fn cross(u: &[f64], v: &[f64], n: usize) -> Vec<f64> {
    use grid_component::{PHI, R, THETA};
    let mut out = vec![0.0; 3 * n];
    for i in 0..n {
        let (up, ut, ur) = (u[PHI * n + i], u[THETA * n + i], u[R * n + i]);
        let (vp, vt, vr) = (v[PHI * n + i], v[THETA * n + i], v[R * n + i]);
        out[R * n + i] = ut * vp - up * vt;
        out[THETA * n + i] = up * vr - ur * vp;
        out[PHI * n + i] = ur * vt - ut * vr;
    }
    out
}
