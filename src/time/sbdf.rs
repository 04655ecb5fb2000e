//! Semi-implicit backward differentiation (SBDF) multistep schemes.
//!
//! For `M dX/dt + L X = F(X)` the k-step scheme reads
//!
//! ```text
//! (a0 M + L) X_{n+1} = Σ_{j=1..k} c_j F_{n+1-j} − Σ_{j=1..k} a_j M X_{n+1-j}
//! ```
//!
//! where the a_j differentiate the interpolating polynomial through
//! X_{n+1}, …, X_{n+1-k} at t_{n+1} and the c_j extrapolate F from
//! t_n, …, t_{n+1-k} to t_{n+1}. Both follow from Lagrange bases on the
//! actual (variable) step history, so the scheme keeps its order when the
//! step size changes.

use std::fmt;
use std::str::FromStr;

/// Non-generic information about a time integrator.
pub trait IntegratorInfo: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &'static str;

    /// Order of accuracy.
    fn order(&self) -> usize;

    /// Past states and right-hand sides the scheme keeps.
    fn history_len(&self) -> usize;
}

/// SBDF scheme selection.
///
/// # Example
///
/// ```
/// use shellconv::time::{IntegratorInfo, Timestepper};
///
/// let ts: Timestepper = "SBDF3".parse().unwrap();
/// assert_eq!(ts.order(), 3);
/// assert_eq!(ts.to_string(), "SBDF3");
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Timestepper {
    Sbdf1,
    #[default]
    Sbdf2,
    Sbdf3,
    Sbdf4,
}

impl Timestepper {
    pub const ALL: [Timestepper; 4] = [
        Timestepper::Sbdf1,
        Timestepper::Sbdf2,
        Timestepper::Sbdf3,
        Timestepper::Sbdf4,
    ];
}

impl IntegratorInfo for Timestepper {
    fn name(&self) -> &'static str {
        match self {
            Timestepper::Sbdf1 => "SBDF1",
            Timestepper::Sbdf2 => "SBDF2",
            Timestepper::Sbdf3 => "SBDF3",
            Timestepper::Sbdf4 => "SBDF4",
        }
    }

    fn order(&self) -> usize {
        match self {
            Timestepper::Sbdf1 => 1,
            Timestepper::Sbdf2 => 2,
            Timestepper::Sbdf3 => 3,
            Timestepper::Sbdf4 => 4,
        }
    }

    fn history_len(&self) -> usize {
        self.order()
    }
}

impl fmt::Display for Timestepper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Timestepper {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Timestepper::ALL
            .into_iter()
            .find(|ts| ts.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| wanted.to_string())
    }
}

/// Weights of one SBDF step.
#[derive(Clone, Debug, PartialEq)]
pub struct StepWeights {
    /// a_0..=a_k, multiplying M X_{n+1-j}
    pub a: Vec<f64>,
    /// c_1..=c_k, multiplying F_{n+1-j} (stored from index 0)
    pub c: Vec<f64>,
}

impl StepWeights {
    /// Steps the weights span.
    pub fn order(&self) -> usize {
        self.c.len()
    }
}

/// SBDF weights for the step history `dts`, newest first:
/// `dts[0] = t_{n+1} − t_n`, `dts[1] = t_n − t_{n−1}`, ….
///
/// The order is `dts.len()`.
///
/// # Panics
///
/// Panics if `dts` is empty.
///
/// # Example
///
/// ```
/// use shellconv::time::sbdf_weights;
///
/// let w = sbdf_weights(&[0.1, 0.1]);
/// assert!((w.a[0] - 15.0).abs() < 1e-12);
/// assert!((w.c[0] - 2.0).abs() < 1e-12);
/// ```
pub fn sbdf_weights(dts: &[f64]) -> StepWeights {
    assert!(!dts.is_empty(), "SBDF needs at least one step");
    let k = dts.len();

    // nodes t_{n+1} = 0, t_n = −dts[0], t_{n−1} = −dts[0] − dts[1], …
    let mut nodes = Vec::with_capacity(k + 1);
    nodes.push(0.0);
    let mut t = 0.0;
    for &dt in dts {
        t -= dt;
        nodes.push(t);
    }

    let a = (0..=k)
        .map(|j| {
            if j == 0 {
                (1..=k).map(|m| 1.0 / (nodes[0] - nodes[m])).sum()
            } else {
                let numerator: f64 = (1..=k)
                    .filter(|&m| m != j)
                    .map(|m| nodes[0] - nodes[m])
                    .product();
                let denominator: f64 = (0..=k)
                    .filter(|&m| m != j)
                    .map(|m| nodes[j] - nodes[m])
                    .product();
                numerator / denominator
            }
        })
        .collect();

    let c = (1..=k)
        .map(|j| {
            (1..=k)
                .filter(|&m| m != j)
                .map(|m| (nodes[0] - nodes[m]) / (nodes[j] - nodes[m]))
                .product()
        })
        .collect();

    StepWeights { a, c }
}
