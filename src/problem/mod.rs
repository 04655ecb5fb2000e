//! Equation system definition.
//!
//! - [`expr`]: expression tree and builders
//! - [`equation`]: equations with degree conditions
//! - [`problem`]: validation into a [`Problem`]
//! - [`convection`]: the rotating shell convection system

pub mod convection;
pub mod equation;
pub mod expr;
pub mod problem;

pub use convection::{ConvectionParameters, TimeScaling, names, shell_convection_problem};
pub use equation::{Condition, Equation};
pub use expr::{Expr, constant, cross, curl, div, dot, dt, grad, interp, lap, param, var, zero};
pub use problem::{
    CompiledEquation, FieldDecl, LinearOperator, LinearTerm, Problem, ProblemBuilder, ProblemError,
    TauRoleNames, TauRoles,
};
