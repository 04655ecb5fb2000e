//! Typed expression trees for equations.
//!
//! Equations are built from [`Expr`] nodes with small builder functions and
//! the arithmetic operators:
//!
//! ```
//! use shellconv::problem::{cross, curl, dt, grad, lap, var};
//!
//! let ekman = 1e-3;
//! let lhs = dt(var("u")) - lap(var("u")) + grad(var("p"));
//! let rhs = cross(curl(var("u")), var("u")) - (2.0 / ekman) * var("u");
//! assert!(lhs.mentions("p"));
//! assert!(!rhs.contains_time_derivative());
//! ```

use std::ops::{Add, Div, Mul, Neg, Sub};

use crate::types::Boundary;

/// Expression node.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    /// State variable by name
    Var(String),
    /// Named non-state field (fixed in time)
    Param(String),
    /// Scalar constant
    Const(f64),
    /// Zero of whatever shape the context requires
    Zero,
    /// Sum
    Add(Box<Expr>, Box<Expr>),
    /// Negation
    Neg(Box<Expr>),
    /// Multiplication by a constant
    Scale(f64, Box<Expr>),
    /// Pointwise product (at least one factor scalar)
    Mul(Box<Expr>, Box<Expr>),
    /// ∂/∂t
    TimeDerivative(Box<Expr>),
    /// ∇·
    Divergence(Box<Expr>),
    /// ∇ of a scalar
    Gradient(Box<Expr>),
    /// ∇²
    Laplacian(Box<Expr>),
    /// ∇×
    Curl(Box<Expr>),
    /// Dot product of vectors
    Dot(Box<Expr>, Box<Expr>),
    /// Cross product of vectors
    Cross(Box<Expr>, Box<Expr>),
    /// Evaluation on a bounding sphere
    Interpolate(Box<Expr>, Boundary),
}

/// State variable.
pub fn var(name: &str) -> Expr {
    Expr::Var(name.to_string())
}

/// Named parameter field.
pub fn param(name: &str) -> Expr {
    Expr::Param(name.to_string())
}

/// Scalar constant.
pub fn constant(value: f64) -> Expr {
    Expr::Const(value)
}

/// Zero.
pub fn zero() -> Expr {
    Expr::Zero
}

/// Time derivative.
pub fn dt(e: Expr) -> Expr {
    Expr::TimeDerivative(Box::new(e))
}

/// Divergence.
pub fn div(e: Expr) -> Expr {
    Expr::Divergence(Box::new(e))
}

/// Gradient.
pub fn grad(e: Expr) -> Expr {
    Expr::Gradient(Box::new(e))
}

/// Laplacian.
pub fn lap(e: Expr) -> Expr {
    Expr::Laplacian(Box::new(e))
}

/// Curl.
pub fn curl(e: Expr) -> Expr {
    Expr::Curl(Box::new(e))
}

/// Dot product.
pub fn dot(a: Expr, b: Expr) -> Expr {
    Expr::Dot(Box::new(a), Box::new(b))
}

/// Cross product.
pub fn cross(a: Expr, b: Expr) -> Expr {
    Expr::Cross(Box::new(a), Box::new(b))
}

/// Value on a bounding sphere.
pub fn interp(e: Expr, boundary: Boundary) -> Expr {
    Expr::Interpolate(Box::new(e), boundary)
}

impl Expr {
    /// Whether the expression references a variable or parameter by name.
    pub fn mentions(&self, name: &str) -> bool {
        let mut found = false;
        self.visit(&mut |e| {
            if let Expr::Var(n) | Expr::Param(n) = e
                && n == name
            {
                found = true;
            }
        });
        found
    }

    /// Whether any node is a time derivative.
    pub fn contains_time_derivative(&self) -> bool {
        let mut found = false;
        self.visit(&mut |e| {
            if matches!(e, Expr::TimeDerivative(_)) {
                found = true;
            }
        });
        found
    }

    /// Visit every node, parents before children.
    pub fn visit(&self, f: &mut impl FnMut(&Expr)) {
        f(self);
        match self {
            Expr::Var(_) | Expr::Param(_) | Expr::Const(_) | Expr::Zero => {}
            Expr::Neg(a)
            | Expr::Scale(_, a)
            | Expr::TimeDerivative(a)
            | Expr::Divergence(a)
            | Expr::Gradient(a)
            | Expr::Laplacian(a)
            | Expr::Curl(a)
            | Expr::Interpolate(a, _) => a.visit(f),
            Expr::Add(a, b) | Expr::Mul(a, b) | Expr::Dot(a, b) | Expr::Cross(a, b) => {
                a.visit(f);
                b.visit(f);
            }
        }
    }

    /// Operator name for error messages.
    pub fn node_name(&self) -> &'static str {
        match self {
            Expr::Var(_) => "variable",
            Expr::Param(_) => "parameter",
            Expr::Const(_) => "constant",
            Expr::Zero => "zero",
            Expr::Add(..) => "sum",
            Expr::Neg(_) => "negation",
            Expr::Scale(..) => "scaling",
            Expr::Mul(..) => "product",
            Expr::TimeDerivative(_) => "dt",
            Expr::Divergence(_) => "div",
            Expr::Gradient(_) => "grad",
            Expr::Laplacian(_) => "lap",
            Expr::Curl(_) => "curl",
            Expr::Dot(..) => "dot",
            Expr::Cross(..) => "cross",
            Expr::Interpolate(..) => "interp",
        }
    }
}

impl Add for Expr {
    type Output = Expr;

    fn add(self, rhs: Expr) -> Expr {
        Expr::Add(Box::new(self), Box::new(rhs))
    }
}

impl Sub for Expr {
    type Output = Expr;

    fn sub(self, rhs: Expr) -> Expr {
        Expr::Add(Box::new(self), Box::new(-rhs))
    }
}

impl Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::Neg(Box::new(self))
    }
}

impl Mul for Expr {
    type Output = Expr;

    fn mul(self, rhs: Expr) -> Expr {
        Expr::Mul(Box::new(self), Box::new(rhs))
    }
}

impl Mul<Expr> for f64 {
    type Output = Expr;

    fn mul(self, rhs: Expr) -> Expr {
        Expr::Scale(self, Box::new(rhs))
    }
}

impl Mul<f64> for Expr {
    type Output = Expr;

    fn mul(self, rhs: f64) -> Expr {
        Expr::Scale(rhs, Box::new(self))
    }
}

impl Div<f64> for Expr {
    type Output = Expr;

    fn div(self, rhs: f64) -> Expr {
        Expr::Scale(1.0 / rhs, Box::new(self))
    }
}
