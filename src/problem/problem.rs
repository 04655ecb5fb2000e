//! Problem definition: declared fields, equations, and their validation.
//!
//! [`ProblemBuilder::build`] checks every equation once, up front. The
//! left-hand side is compiled into a flat list of [`LinearTerm`]s that the
//! operator assembly consumes; the right-hand side stays an [`Expr`] and is
//! evaluated on the grid each step.

use thiserror::Error;

use super::{Condition, Equation, Expr};
use crate::types::{Boundary, BoundaryPair, Degree, Domain, Shape, TensorKind};

/// Errors detected while building a problem.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProblemError {
    #[error("name '{0}' is declared twice")]
    DuplicateName(String),
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),
    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),
    #[error("equation '{equation}': tensor rank mismatch, {detail}")]
    RankMismatch { equation: String, detail: String },
    #[error("equation '{equation}': right-hand side contains a time derivative")]
    TimeDerivativeOnRhs { equation: String },
    #[error("equation '{equation}': left-hand side is not linear in the unknowns, {detail}")]
    NonlinearLhs { equation: String, detail: String },
    #[error("equation '{equation}': nested operator {outer}({inner}) on the left-hand side")]
    NestedOperator {
        equation: String,
        outer: &'static str,
        inner: &'static str,
    },
    #[error("equation '{equation}': {detail}")]
    UnsupportedLhs { equation: String, detail: String },
    #[error("equation '{equation}': {detail}")]
    UnsupportedRhs { equation: String, detail: String },
    #[error("equation '{equation}': gradient of a vector field")]
    TensorGradient { equation: String },
    #[error("equation '{equation}': expected a field on {expected}, found one on {found}")]
    DomainMismatch {
        equation: String,
        expected: Domain,
        found: Domain,
    },
    #[error("equation '{equation}': empty left-hand side")]
    EmptyLhs { equation: String },
    #[error("{class}: {equations} equations for {variables} unknowns")]
    EquationCount {
        class: &'static str,
        equations: usize,
        variables: usize,
    },
    #[error("{class}: equation '{equation}' ({found}) does not match unknown '{variable}' ({expected})")]
    ShapeMismatch {
        class: &'static str,
        equation: String,
        variable: String,
        expected: Shape,
        found: Shape,
    },
    #[error("no tau roles were assigned")]
    MissingTauRoles,
    #[error("tau role '{role}' needs a {expected}, but '{name}' is a {found}")]
    InvalidTauRole {
        role: &'static str,
        name: String,
        expected: Shape,
        found: Shape,
    },
}

/// A declared variable or parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldDecl {
    /// Name referenced by expressions
    pub name: String,
    /// Rank and support
    pub shape: Shape,
}

/// Linear operator acting on one unknown in a compiled left-hand side.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinearOperator {
    Identity,
    TimeDerivative,
    Laplacian,
    Gradient,
    Divergence,
    Interpolate(Boundary),
}

impl LinearOperator {
    /// Highest radial derivative order of the operator.
    pub fn radial_order(self) -> i32 {
        match self {
            LinearOperator::Identity
            | LinearOperator::TimeDerivative
            | LinearOperator::Interpolate(_) => 0,
            LinearOperator::Gradient | LinearOperator::Divergence => 1,
            LinearOperator::Laplacian => 2,
        }
    }

    /// Whether the term contributes to the mass matrix.
    pub fn is_time_derivative(self) -> bool {
        matches!(self, LinearOperator::TimeDerivative)
    }
}

/// `coefficient · operator(variable)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinearTerm {
    pub coefficient: f64,
    pub operator: LinearOperator,
    /// Index into [`Problem::variables`]
    pub variable: usize,
}

/// A validated equation.
#[derive(Clone, Debug, PartialEq)]
pub struct CompiledEquation {
    pub label: String,
    pub condition: Condition,
    /// Shape of both sides
    pub shape: Shape,
    /// Implicit terms
    pub lhs: Vec<LinearTerm>,
    /// Explicit part, evaluated on the grid
    pub rhs: Expr,
    /// Power of r both sides are multiplied by before projection
    pub radial_power: i32,
}

impl CompiledEquation {
    /// Whether the right-hand side is identically zero.
    pub fn rhs_is_zero(&self) -> bool {
        matches!(self.rhs, Expr::Zero) || self.rhs == Expr::Const(0.0)
    }
}

/// Names of the fields the tau correction operates on.
#[derive(Clone, Debug, PartialEq)]
pub struct TauRoleNames {
    pub velocity: String,
    pub pressure: String,
    pub temperature: String,
    pub velocity_tau: BoundaryPair<String>,
    pub temperature_tau: BoundaryPair<String>,
}

/// Variable indices of the tau roles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TauRoles {
    pub velocity: usize,
    pub pressure: usize,
    pub temperature: usize,
    pub velocity_tau: BoundaryPair<usize>,
    pub temperature_tau: BoundaryPair<usize>,
}

/// Degree classes a problem must close for, with a representative degree.
const DEGREE_CLASSES: [(&str, usize); 2] = [("ℓ=0", 0), ("ℓ≠0", 1)];

/// Builder for [`Problem`].
///
/// # Example
///
/// ```
/// use shellconv::problem::{Condition, Equation, ProblemBuilder, TauRoleNames, interp, lap, dt, var, zero, grad, div};
/// use shellconv::types::{Boundary, BoundaryPair, Domain, TensorKind};
///
/// let surf = |b| Domain::Surface(b);
/// let problem = ProblemBuilder::new()
///     .variable("u", TensorKind::Vector, Domain::Volume)
///     .variable("p", TensorKind::Scalar, Domain::Volume)
///     .variable("T", TensorKind::Scalar, Domain::Volume)
///     .variable("tu_i", TensorKind::Vector, surf(Boundary::Inner))
///     .variable("tT_i", TensorKind::Scalar, surf(Boundary::Inner))
///     .variable("tu_o", TensorKind::Vector, surf(Boundary::Outer))
///     .variable("tT_o", TensorKind::Scalar, surf(Boundary::Outer))
///     .equation(Equation::new("mom", dt(var("u")) - lap(var("u")) + grad(var("p")), zero()).when(Condition::NonzeroDegree))
///     .equation(Equation::new("u0", var("u"), zero()).when(Condition::ZeroDegree))
///     .equation(Equation::new("cont", div(var("u")), zero()).when(Condition::NonzeroDegree))
///     .equation(Equation::new("p0", var("p"), zero()).when(Condition::ZeroDegree))
///     .equation(Equation::new("heat", dt(var("T")) - lap(var("T")), zero()))
///     .equation(Equation::new("u_ri", interp(var("u"), Boundary::Inner), zero()).when(Condition::NonzeroDegree))
///     .equation(Equation::new("tu_i0", var("tu_i"), zero()).when(Condition::ZeroDegree))
///     .equation(Equation::new("T_ri", interp(var("T"), Boundary::Inner), zero()))
///     .equation(Equation::new("u_ro", interp(var("u"), Boundary::Outer), zero()).when(Condition::NonzeroDegree))
///     .equation(Equation::new("tu_o0", var("tu_o"), zero()).when(Condition::ZeroDegree))
///     .equation(Equation::new("T_ro", interp(var("T"), Boundary::Outer), zero()))
///     .tau_roles(TauRoleNames {
///         velocity: "u".into(),
///         pressure: "p".into(),
///         temperature: "T".into(),
///         velocity_tau: BoundaryPair::new("tu_i".into(), "tu_o".into()),
///         temperature_tau: BoundaryPair::new("tT_i".into(), "tT_o".into()),
///     })
///     .build()
///     .unwrap();
/// assert_eq!(problem.variables().len(), 7);
/// ```
#[derive(Clone, Debug, Default)]
pub struct ProblemBuilder {
    variables: Vec<FieldDecl>,
    parameters: Vec<FieldDecl>,
    equations: Vec<Equation>,
    roles: Option<TauRoleNames>,
}

impl ProblemBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an unknown. Declaration order fixes the block order.
    pub fn variable(mut self, name: &str, kind: TensorKind, domain: Domain) -> Self {
        self.variables.push(FieldDecl {
            name: name.to_string(),
            shape: Shape::new(kind, domain),
        });
        self
    }

    /// Declare a parameter field.
    pub fn parameter(mut self, name: &str, kind: TensorKind, domain: Domain) -> Self {
        self.parameters.push(FieldDecl {
            name: name.to_string(),
            shape: Shape::new(kind, domain),
        });
        self
    }

    /// Add an equation.
    pub fn equation(mut self, equation: Equation) -> Self {
        self.equations.push(equation);
        self
    }

    /// Assign the tau roles.
    pub fn tau_roles(mut self, roles: TauRoleNames) -> Self {
        self.roles = Some(roles);
        self
    }

    /// Validate and compile.
    pub fn build(self) -> Result<Problem, ProblemError> {
        let mut seen = std::collections::HashSet::new();
        for decl in self.variables.iter().chain(self.parameters.iter()) {
            if !seen.insert(decl.name.as_str()) {
                return Err(ProblemError::DuplicateName(decl.name.clone()));
            }
        }

        let equations = self
            .equations
            .iter()
            .map(|eq| {
                Checker {
                    variables: &self.variables,
                    parameters: &self.parameters,
                    label: &eq.label,
                }
                .compile(eq)
            })
            .collect::<Result<Vec<_>, _>>()?;

        for (class, ell) in DEGREE_CLASSES {
            let ell = Degree::new(ell);
            let active: Vec<&CompiledEquation> = equations
                .iter()
                .filter(|eq| eq.condition.applies(ell))
                .collect();
            if active.len() != self.variables.len() {
                return Err(ProblemError::EquationCount {
                    class,
                    equations: active.len(),
                    variables: self.variables.len(),
                });
            }
            for (eq, var) in active.iter().zip(&self.variables) {
                if eq.shape != var.shape {
                    return Err(ProblemError::ShapeMismatch {
                        class,
                        equation: eq.label.clone(),
                        variable: var.name.clone(),
                        expected: var.shape,
                        found: eq.shape,
                    });
                }
            }
        }

        let names = self.roles.as_ref().ok_or(ProblemError::MissingTauRoles)?;
        let resolve = |role: &'static str, name: &str, kind, domain| {
            let expected = Shape::new(kind, domain);
            let index = self
                .variables
                .iter()
                .position(|v| v.name == name)
                .ok_or_else(|| ProblemError::UnknownVariable(name.to_string()))?;
            let found = self.variables[index].shape;
            if found != expected {
                return Err(ProblemError::InvalidTauRole {
                    role,
                    name: name.to_string(),
                    expected,
                    found,
                });
            }
            Ok(index)
        };
        use TensorKind::{Scalar, Vector};
        let surf = Domain::Surface;
        let roles = TauRoles {
            velocity: resolve("velocity", &names.velocity, Vector, Domain::Volume)?,
            pressure: resolve("pressure", &names.pressure, Scalar, Domain::Volume)?,
            temperature: resolve("temperature", &names.temperature, Scalar, Domain::Volume)?,
            velocity_tau: BoundaryPair::new(
                resolve("velocity_tau_inner", &names.velocity_tau.inner, Vector, surf(Boundary::Inner))?,
                resolve("velocity_tau_outer", &names.velocity_tau.outer, Vector, surf(Boundary::Outer))?,
            ),
            temperature_tau: BoundaryPair::new(
                resolve("temperature_tau_inner", &names.temperature_tau.inner, Scalar, surf(Boundary::Inner))?,
                resolve("temperature_tau_outer", &names.temperature_tau.outer, Scalar, surf(Boundary::Outer))?,
            ),
        };

        Ok(Problem {
            variables: self.variables,
            parameters: self.parameters,
            equations,
            roles,
        })
    }
}

/// Validation context for one equation.
struct Checker<'a> {
    variables: &'a [FieldDecl],
    parameters: &'a [FieldDecl],
    label: &'a str,
}

impl Checker<'_> {
    fn compile(&self, eq: &Equation) -> Result<CompiledEquation, ProblemError> {
        let mut terms = Vec::new();
        self.collect(&eq.lhs, 1.0, &mut terms)?;
        let Some(&(_, shape)) = terms.first() else {
            return Err(ProblemError::EmptyLhs {
                equation: self.label.to_string(),
            });
        };
        for &(_, other) in &terms {
            if other != shape {
                return Err(self.rank_mismatch(format!("left-hand side mixes {} and {}", shape, other)));
            }
        }

        if eq.rhs.contains_time_derivative() {
            return Err(ProblemError::TimeDerivativeOnRhs {
                equation: self.label.to_string(),
            });
        }
        if let Some(kind) = self.infer(&eq.rhs, shape.domain)?
            && kind != shape.kind
        {
            return Err(self.rank_mismatch(format!(
                "left-hand side is a {} but right-hand side is a {}",
                shape.kind, kind
            )));
        }

        let radial_power = match shape.domain {
            Domain::Volume => terms
                .iter()
                .map(|(t, _)| t.operator.radial_order())
                .max()
                .unwrap_or(0),
            Domain::Surface(_) => 0,
        };

        Ok(CompiledEquation {
            label: eq.label.clone(),
            condition: eq.condition,
            shape,
            lhs: terms.into_iter().map(|(t, _)| t).collect(),
            rhs: eq.rhs.clone(),
            radial_power,
        })
    }

    fn rank_mismatch(&self, detail: String) -> ProblemError {
        ProblemError::RankMismatch {
            equation: self.label.to_string(),
            detail,
        }
    }

    fn variable(&self, name: &str) -> Result<(usize, Shape), ProblemError> {
        self.variables
            .iter()
            .position(|v| v.name == name)
            .map(|i| (i, self.variables[i].shape))
            .ok_or_else(|| ProblemError::UnknownVariable(name.to_string()))
    }

    fn parameter(&self, name: &str) -> Result<Shape, ProblemError> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.shape)
            .ok_or_else(|| ProblemError::UnknownParameter(name.to_string()))
    }

    /// Flatten a linear expression into terms with their result shapes.
    fn collect(
        &self,
        e: &Expr,
        scale: f64,
        out: &mut Vec<(LinearTerm, Shape)>,
    ) -> Result<(), ProblemError> {
        let unsupported = |detail: &str| ProblemError::UnsupportedLhs {
            equation: self.label.to_string(),
            detail: detail.to_string(),
        };
        match e {
            Expr::Zero => Ok(()),
            Expr::Const(_) => Err(unsupported("constants belong on the right-hand side")),
            Expr::Param(name) => {
                self.parameter(name)?;
                Err(unsupported("parameters belong on the right-hand side"))
            }
            Expr::Var(name) => {
                let (variable, shape) = self.variable(name)?;
                out.push((
                    LinearTerm {
                        coefficient: scale,
                        operator: LinearOperator::Identity,
                        variable,
                    },
                    shape,
                ));
                Ok(())
            }
            Expr::Add(a, b) => {
                self.collect(a, scale, out)?;
                self.collect(b, scale, out)
            }
            Expr::Neg(a) => self.collect(a, -scale, out),
            Expr::Scale(c, a) => self.collect(a, scale * c, out),
            Expr::Mul(a, b) => match (constant_value(a), constant_value(b)) {
                (Some(c), _) => self.collect(b, scale * c, out),
                (_, Some(c)) => self.collect(a, scale * c, out),
                _ => Err(ProblemError::NonlinearLhs {
                    equation: self.label.to_string(),
                    detail: "product of two non-constant factors".to_string(),
                }),
            },
            Expr::Dot(..) | Expr::Cross(..) => Err(ProblemError::NonlinearLhs {
                equation: self.label.to_string(),
                detail: format!("{} of two fields", e.node_name()),
            }),
            Expr::Curl(_) => Err(unsupported("curl is not available on the left-hand side")),
            Expr::TimeDerivative(a)
            | Expr::Laplacian(a)
            | Expr::Gradient(a)
            | Expr::Divergence(a)
            | Expr::Interpolate(a, _) => {
                let Expr::Var(name) = a.as_ref() else {
                    return Err(ProblemError::NestedOperator {
                        equation: self.label.to_string(),
                        outer: e.node_name(),
                        inner: a.node_name(),
                    });
                };
                let (variable, var_shape) = self.variable(name)?;
                if var_shape.domain != Domain::Volume {
                    return Err(ProblemError::DomainMismatch {
                        equation: self.label.to_string(),
                        expected: Domain::Volume,
                        found: var_shape.domain,
                    });
                }
                let (operator, shape) = match e {
                    Expr::TimeDerivative(_) => (LinearOperator::TimeDerivative, var_shape),
                    Expr::Laplacian(_) => (LinearOperator::Laplacian, var_shape),
                    Expr::Gradient(_) => {
                        if var_shape.kind != TensorKind::Scalar {
                            return Err(ProblemError::TensorGradient {
                                equation: self.label.to_string(),
                            });
                        }
                        (
                            LinearOperator::Gradient,
                            Shape::new(TensorKind::Vector, Domain::Volume),
                        )
                    }
                    Expr::Divergence(_) => {
                        if var_shape.kind != TensorKind::Vector {
                            return Err(self.rank_mismatch("div of a scalar".to_string()));
                        }
                        (
                            LinearOperator::Divergence,
                            Shape::new(TensorKind::Scalar, Domain::Volume),
                        )
                    }
                    Expr::Interpolate(_, b) => (
                        LinearOperator::Interpolate(*b),
                        Shape::new(var_shape.kind, Domain::Surface(*b)),
                    ),
                    _ => unreachable!("outer match restricts the operator"),
                };
                out.push((
                    LinearTerm {
                        coefficient: scale,
                        operator,
                        variable,
                    },
                    shape,
                ));
                Ok(())
            }
        }
    }

    /// Tensor rank of a right-hand side; `None` for zero, which matches
    /// any rank.
    fn infer(&self, e: &Expr, domain: Domain) -> Result<Option<TensorKind>, ProblemError> {
        use TensorKind::{Scalar, Vector};
        let on_domain = |found: Domain| {
            if found == domain {
                Ok(())
            } else {
                Err(ProblemError::DomainMismatch {
                    equation: self.label.to_string(),
                    expected: domain,
                    found,
                })
            }
        };
        let unsupported = |detail: String| ProblemError::UnsupportedRhs {
            equation: self.label.to_string(),
            detail,
        };
        match e {
            Expr::Zero => Ok(None),
            Expr::Const(_) => Ok(Some(Scalar)),
            Expr::Var(name) => {
                let (_, shape) = self.variable(name)?;
                on_domain(shape.domain)?;
                Ok(Some(shape.kind))
            }
            Expr::Param(name) => {
                let shape = self.parameter(name)?;
                on_domain(shape.domain)?;
                Ok(Some(shape.kind))
            }
            Expr::Neg(a) | Expr::Scale(_, a) => self.infer(a, domain),
            Expr::Add(a, b) => match (self.infer(a, domain)?, self.infer(b, domain)?) {
                (None, k) | (k, None) => Ok(k),
                (Some(x), Some(y)) if x == y => Ok(Some(x)),
                (Some(x), Some(y)) => Err(self.rank_mismatch(format!("sum of a {} and a {}", x, y))),
            },
            Expr::Mul(a, b) => match (self.infer(a, domain)?, self.infer(b, domain)?) {
                (None, _) | (_, None) => Ok(None),
                (Some(Scalar), k) | (k, Some(Scalar)) => Ok(k),
                (Some(_), Some(_)) => Err(self.rank_mismatch(
                    "product of two vectors, use dot or cross".to_string(),
                )),
            },
            Expr::Dot(a, b) | Expr::Cross(a, b) => {
                let ka = self.infer(a, domain)?;
                let kb = self.infer(b, domain)?;
                for k in [ka, kb].into_iter().flatten() {
                    if k != Vector {
                        return Err(self.rank_mismatch(format!("{} of a {}", e.node_name(), k)));
                    }
                }
                match (e, ka, kb) {
                    (_, None, _) | (_, _, None) => Ok(None),
                    (Expr::Dot(..), ..) => Ok(Some(Scalar)),
                    _ => Ok(Some(Vector)),
                }
            }
            Expr::TimeDerivative(_) => Err(ProblemError::TimeDerivativeOnRhs {
                equation: self.label.to_string(),
            }),
            Expr::Gradient(a) | Expr::Curl(a) => {
                let Expr::Var(name) = a.as_ref() else {
                    return Err(unsupported(format!(
                        "{} on the right-hand side must act on a variable",
                        e.node_name()
                    )));
                };
                let (_, shape) = self.variable(name)?;
                on_domain(Domain::Volume)?;
                on_domain(shape.domain)?;
                match (e, shape.kind) {
                    (Expr::Gradient(_), Scalar) => Ok(Some(Vector)),
                    (Expr::Gradient(_), Vector) => Err(ProblemError::TensorGradient {
                        equation: self.label.to_string(),
                    }),
                    (_, Vector) => Ok(Some(Vector)),
                    (_, Scalar) => Err(self.rank_mismatch("curl of a scalar".to_string())),
                }
            }
            Expr::Divergence(_) | Expr::Laplacian(_) | Expr::Interpolate(..) => Err(unsupported(
                format!("{} is not available on the right-hand side", e.node_name()),
            )),
        }
    }
}

/// Value of a constant-valued expression.
fn constant_value(e: &Expr) -> Option<f64> {
    match e {
        Expr::Const(c) => Some(*c),
        Expr::Neg(a) => constant_value(a).map(|c| -c),
        Expr::Scale(s, a) => constant_value(a).map(|c| s * c),
        _ => None,
    }
}

/// A validated problem.
#[derive(Clone, Debug)]
pub struct Problem {
    variables: Vec<FieldDecl>,
    parameters: Vec<FieldDecl>,
    equations: Vec<CompiledEquation>,
    roles: TauRoles,
}

impl Problem {
    /// Unknowns in block order.
    pub fn variables(&self) -> &[FieldDecl] {
        &self.variables
    }

    pub fn parameters(&self) -> &[FieldDecl] {
        &self.parameters
    }

    /// All equations, in declaration order.
    pub fn equations(&self) -> &[CompiledEquation] {
        &self.equations
    }

    pub fn roles(&self) -> &TauRoles {
        &self.roles
    }

    /// Index of a variable by name.
    pub fn variable_index(&self, name: &str) -> Option<usize> {
        self.variables.iter().position(|v| v.name == name)
    }

    /// Index of a parameter by name.
    pub fn parameter_index(&self, name: &str) -> Option<usize> {
        self.parameters.iter().position(|p| p.name == name)
    }

    /// Equations active at degree `ell`; the k-th pairs with variable k.
    pub fn equations_for(&self, ell: Degree) -> impl Iterator<Item = &CompiledEquation> {
        self.equations
            .iter()
            .filter(move |eq| eq.condition.applies(ell))
    }
}
