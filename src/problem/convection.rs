//! Rotating Boussinesq convection in a spherical shell.

use std::fmt;
use std::str::FromStr;

use super::{
    Condition, Equation, Problem, ProblemBuilder, ProblemError, TauRoleNames, cross, curl, div,
    dot, dt, grad, interp, lap, param, var, zero,
};
use crate::types::{Boundary, BoundaryPair, Domain, ShellGeometry, TensorKind};

/// Variable names, in block order.
pub mod names {
    pub const VELOCITY: &str = "u";
    pub const PRESSURE: &str = "p";
    pub const TEMPERATURE: &str = "T";
    pub const TAU_U_INNER: &str = "tau_u_inner";
    pub const TAU_T_INNER: &str = "tau_T_inner";
    pub const TAU_U_OUTER: &str = "tau_u_outer";
    pub const TAU_T_OUTER: &str = "tau_T_outer";
    /// `(0, 0, r/ro)`
    pub const RADIAL_VECTOR: &str = "r_vec";
    /// Rotation axis `(0, −sin θ, cos θ)` in (φ, θ, r) order
    pub const ROTATION_AXIS: &str = "ez";
    /// Inner-sphere temperature
    pub const T_INNER: &str = "T_inner";
}

/// Nondimensionalisation of the momentum equation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TimeScaling {
    /// Viscous time: `ddt(u) − lap(u) + grad(p) = …/Ek`
    #[default]
    Viscous,
    /// Benchmark form with Ek multiplying inertia and viscosity
    Marti,
}

impl FromStr for TimeScaling {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "viscous" => Ok(TimeScaling::Viscous),
            "marti" => Ok(TimeScaling::Marti),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for TimeScaling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeScaling::Viscous => f.write_str("viscous"),
            TimeScaling::Marti => f.write_str("marti"),
        }
    }
}

/// Physical parameters of the convection problem.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConvectionParameters {
    pub ekman: f64,
    pub rayleigh: f64,
    pub prandtl: f64,
    pub geometry: ShellGeometry,
    pub scaling: TimeScaling,
}

impl ConvectionParameters {
    /// Viscous scaling, Pr = 1, default radii.
    pub fn new(ekman: f64, rayleigh: f64) -> Self {
        Self {
            ekman,
            rayleigh,
            prandtl: 1.0,
            geometry: ShellGeometry::default(),
            scaling: TimeScaling::Viscous,
        }
    }

    pub fn with_prandtl(mut self, prandtl: f64) -> Self {
        self.prandtl = prandtl;
        self
    }

    pub fn with_geometry(mut self, geometry: ShellGeometry) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn with_scaling(mut self, scaling: TimeScaling) -> Self {
        self.scaling = scaling;
        self
    }
}

/// Build the shell convection problem.
///
/// ℓ = 0 pins velocity, pressure and the velocity taus to zero; every other
/// degree carries momentum, continuity and no-slip walls. Temperature is
/// fixed to `T_inner` on the inner sphere and 0 on the outer one.
///
/// # Example
///
/// ```
/// use shellconv::problem::{ConvectionParameters, shell_convection_problem};
///
/// let problem = shell_convection_problem(&ConvectionParameters::new(1e-3, 1e5)).unwrap();
/// assert_eq!(problem.variables().len(), 7);
/// assert_eq!(problem.equations().len(), 11);
/// ```
pub fn shell_convection_problem(params: &ConvectionParameters) -> Result<Problem, ProblemError> {
    use Condition::{NonzeroDegree, ZeroDegree};
    use TensorKind::{Scalar, Vector};
    use names::*;

    let ek = params.ekman;
    let ra = params.rayleigh;
    let u = || var(VELOCITY);
    let t = || var(TEMPERATURE);
    let advection = || cross(curl(u()), u());
    let buoyancy = || t() * param(RADIAL_VECTOR);
    let coriolis = || cross(param(ROTATION_AXIS), u());

    let momentum = match params.scaling {
        TimeScaling::Viscous => Equation::new(
            "momentum",
            dt(u()) - lap(u()) + grad(var(PRESSURE)),
            advection() + (ra / ek) * buoyancy() - (2.0 / ek) * coriolis(),
        ),
        TimeScaling::Marti => Equation::new(
            "momentum",
            ek * dt(u()) - ek * lap(u()) + grad(var(PRESSURE)),
            ek * advection() + ra * buoyancy() - 2.0 * coriolis(),
        ),
    };

    let inner = Domain::Surface(Boundary::Inner);
    let outer = Domain::Surface(Boundary::Outer);

    ProblemBuilder::new()
        .variable(VELOCITY, Vector, Domain::Volume)
        .variable(PRESSURE, Scalar, Domain::Volume)
        .variable(TEMPERATURE, Scalar, Domain::Volume)
        .variable(TAU_U_INNER, Vector, inner)
        .variable(TAU_T_INNER, Scalar, inner)
        .variable(TAU_U_OUTER, Vector, outer)
        .variable(TAU_T_OUTER, Scalar, outer)
        .parameter(RADIAL_VECTOR, Vector, Domain::Volume)
        .parameter(ROTATION_AXIS, Vector, Domain::Volume)
        .parameter(T_INNER, Scalar, inner)
        .equation(momentum.when(NonzeroDegree))
        .equation(Equation::new("velocity_l0", u(), zero()).when(ZeroDegree))
        .equation(Equation::new("continuity", div(u()), zero()).when(NonzeroDegree))
        .equation(Equation::new("pressure_l0", var(PRESSURE), zero()).when(ZeroDegree))
        .equation(Equation::new(
            "heat",
            dt(t()) - lap(t()) / params.prandtl,
            -dot(u(), grad(t())),
        ))
        .equation(
            Equation::new("no_slip_inner", interp(u(), Boundary::Inner), zero())
                .when(NonzeroDegree),
        )
        .equation(Equation::new("tau_u_inner_l0", var(TAU_U_INNER), zero()).when(ZeroDegree))
        .equation(Equation::new(
            "temperature_inner",
            interp(t(), Boundary::Inner),
            param(T_INNER),
        ))
        .equation(
            Equation::new("no_slip_outer", interp(u(), Boundary::Outer), zero())
                .when(NonzeroDegree),
        )
        .equation(Equation::new("tau_u_outer_l0", var(TAU_U_OUTER), zero()).when(ZeroDegree))
        .equation(Equation::new(
            "temperature_outer",
            interp(t(), Boundary::Outer),
            zero(),
        ))
        .tau_roles(TauRoleNames {
            velocity: VELOCITY.into(),
            pressure: PRESSURE.into(),
            temperature: TEMPERATURE.into(),
            velocity_tau: BoundaryPair::new(TAU_U_INNER.into(), TAU_U_OUTER.into()),
            temperature_tau: BoundaryPair::new(TAU_T_INNER.into(), TAU_T_OUTER.into()),
        })
        .build()
}
