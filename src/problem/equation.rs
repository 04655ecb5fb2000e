//! Equations and the degree classes they apply to.

use std::fmt;

use super::Expr;
use crate::types::Degree;

/// Which spherical-harmonic degrees an equation is enforced on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Condition {
    /// Every degree
    Always,
    /// ℓ ≠ 0
    NonzeroDegree,
    /// ℓ = 0
    ZeroDegree,
}

impl Condition {
    /// Whether the equation is active at degree `ell`.
    pub fn applies(self, ell: Degree) -> bool {
        match self {
            Condition::Always => true,
            Condition::NonzeroDegree => !ell.is_zero(),
            Condition::ZeroDegree => ell.is_zero(),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Always => f.write_str("all ℓ"),
            Condition::NonzeroDegree => f.write_str("ℓ≠0"),
            Condition::ZeroDegree => f.write_str("ℓ=0"),
        }
    }
}

/// `lhs = rhs`, enforced for the degrees selected by `condition`.
///
/// The left-hand side is linear in the unknowns and solved implicitly.
/// The right-hand side is evaluated on the grid from the current state.
#[derive(Clone, Debug, PartialEq)]
pub struct Equation {
    /// Implicit part
    pub lhs: Expr,
    /// Explicit part
    pub rhs: Expr,
    /// Degree class
    pub condition: Condition,
    /// Name used in error messages and logs
    pub label: String,
}

impl Equation {
    /// Create an equation active for every degree.
    pub fn new(label: &str, lhs: Expr, rhs: Expr) -> Self {
        Self {
            lhs,
            rhs,
            condition: Condition::Always,
            label: label.to_string(),
        }
    }

    /// Restrict to a degree class.
    pub fn when(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::{var, zero};

    #[test]
    fn test_condition_classes() {
        let zero_deg = Degree::new(0);
        let two = Degree::new(2);
        assert!(Condition::Always.applies(zero_deg));
        assert!(Condition::Always.applies(two));
        assert!(Condition::ZeroDegree.applies(zero_deg));
        assert!(!Condition::ZeroDegree.applies(two));
        assert!(!Condition::NonzeroDegree.applies(zero_deg));
        assert!(Condition::NonzeroDegree.applies(two));
    }

    #[test]
    fn test_when_sets_condition() {
        let eq = Equation::new("pin", var("p"), zero()).when(Condition::ZeroDegree);
        assert_eq!(eq.condition, Condition::ZeroDegree);
        assert_eq!(eq.label, "pin");
    }
}
