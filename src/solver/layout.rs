//! Row and column layout of a per-degree subproblem.
//!
//! Unknowns are laid out in declaration order. A variable of rank k with
//! n radial coefficients occupies k·n consecutive slots, component-major.
//! Equation k shares variable k's shape, so rows and columns use the same
//! offsets.
//!
//! The [`Representation::Real`] layout doubles every component block into
//! `[re 0..n, im 0..n]`, which is what a real-valued factorisation of the
//! complex system needs.

use std::ops::Range;

use faer::Mat;
use num_complex::Complex64;

use super::TauError;
use crate::basis::Spin;
use crate::problem::{Problem, TauRoles};
use crate::types::{Boundary, Domain};

/// How complex coefficients map onto matrix rows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Representation {
    /// One row per complex coefficient; real and imaginary parts are solved
    /// as two right-hand sides
    Complex,
    /// Real and imaginary parts in separate rows
    #[default]
    Real,
}

/// Real or imaginary half of a coefficient.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Part {
    Re,
    Im,
}

impl Part {
    fn index(self) -> usize {
        match self {
            Part::Re => 0,
            Part::Im => 1,
        }
    }
}

/// Physical blocks touched by the tau correction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Block {
    Velocity(Spin),
    Pressure,
    Temperature,
}

/// Tau unknowns, one per boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TauVariable {
    Velocity,
    Temperature,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Slot {
    offset: usize,
    ncomp: usize,
    radial: usize,
}

/// Index arithmetic for one subproblem.
#[derive(Clone, Debug, PartialEq)]
pub struct BlockLayout {
    representation: Representation,
    slots: Vec<Slot>,
    complex_size: usize,
    roles: TauRoles,
    tau_start: usize,
}

impl BlockLayout {
    /// Lay out the unknowns of `problem` with `nmax + 1` radial coefficients.
    ///
    /// The four tau variables must be the trailing unknowns.
    pub fn new(
        problem: &Problem,
        nmax: usize,
        representation: Representation,
    ) -> Result<Self, TauError> {
        let mut slots = Vec::with_capacity(problem.variables().len());
        let mut offset = 0;
        for var in problem.variables() {
            let radial = match var.shape.domain {
                Domain::Volume => nmax + 1,
                Domain::Surface(_) => 1,
            };
            let ncomp = var.shape.kind.ncomp();
            slots.push(Slot {
                offset,
                ncomp,
                radial,
            });
            offset += ncomp * radial;
        }

        let roles = *problem.roles();
        let taus = [
            roles.velocity_tau.inner,
            roles.velocity_tau.outer,
            roles.temperature_tau.inner,
            roles.temperature_tau.outer,
        ];
        let first_tau = problem.variables().len() - taus.len();
        if let Some(var) = (first_tau..problem.variables().len()).find(|v| !taus.contains(v)) {
            return Err(TauError::TauNotTrailing {
                name: problem.variables()[var].name.clone(),
            });
        }

        Ok(Self {
            representation,
            tau_start: slots[first_tau].offset,
            slots,
            complex_size: offset,
            roles,
        })
    }

    pub fn representation(&self) -> Representation {
        self.representation
    }

    /// Complex unknowns per mode.
    pub fn complex_size(&self) -> usize {
        self.complex_size
    }

    /// Matrix dimension.
    pub fn size(&self) -> usize {
        match self.representation {
            Representation::Complex => self.complex_size,
            Representation::Real => 2 * self.complex_size,
        }
    }

    /// Parts that own distinct rows.
    pub fn parts(&self) -> &'static [Part] {
        match self.representation {
            Representation::Complex => &[Part::Re],
            Representation::Real => &[Part::Re, Part::Im],
        }
    }

    /// Number of right-hand-side columns per mode.
    pub fn rhs_columns(&self) -> usize {
        match self.representation {
            Representation::Complex => 2,
            Representation::Real => 1,
        }
    }

    /// Rows (or columns) of one component of variable/equation `var`.
    pub fn component_range(&self, var: usize, comp: usize, part: Part) -> Range<usize> {
        let slot = self.slots[var];
        debug_assert!(comp < slot.ncomp);
        let n = slot.radial;
        let start = match self.representation {
            Representation::Complex => slot.offset + comp * n,
            Representation::Real => 2 * slot.offset + comp * 2 * n + part.index() * n,
        };
        start..start + n
    }

    /// Rows of a physical block.
    pub fn rows(&self, block: Block, part: Part) -> Range<usize> {
        match block {
            Block::Velocity(spin) => self.component_range(self.roles.velocity, spin.index(), part),
            Block::Pressure => self.component_range(self.roles.pressure, 0, part),
            Block::Temperature => self.component_range(self.roles.temperature, 0, part),
        }
    }

    /// Column of one component of a tau unknown.
    pub fn tau_column(
        &self,
        tau: TauVariable,
        boundary: Boundary,
        comp: usize,
        part: Part,
    ) -> usize {
        let var = match tau {
            TauVariable::Velocity => *self.roles.velocity_tau.get(boundary),
            TauVariable::Temperature => *self.roles.temperature_tau.get(boundary),
        };
        self.component_range(var, comp, part).start
    }

    /// Trailing columns holding the tau unknowns.
    pub fn tau_columns(&self) -> Range<usize> {
        let start = match self.representation {
            Representation::Complex => self.tau_start,
            Representation::Real => 2 * self.tau_start,
        };
        start..self.size()
    }

    /// Complex coefficients of one mode into right-hand-side columns.
    pub fn pack(&self, x: &[Complex64]) -> Mat<f64> {
        debug_assert_eq!(x.len(), self.complex_size);
        match self.representation {
            Representation::Complex => {
                Mat::from_fn(self.complex_size, 2, |i, j| if j == 0 { x[i].re } else { x[i].im })
            }
            Representation::Real => {
                let mut out = Mat::zeros(self.size(), 1);
                for (var, slot) in self.slots.iter().enumerate() {
                    for comp in 0..slot.ncomp {
                        let src = slot.offset + comp * slot.radial;
                        let re = self.component_range(var, comp, Part::Re);
                        let im = self.component_range(var, comp, Part::Im);
                        for (k, (r, i)) in re.zip(im).enumerate() {
                            out[(r, 0)] = x[src + k].re;
                            out[(i, 0)] = x[src + k].im;
                        }
                    }
                }
                out
            }
        }
    }

    /// Inverse of [`pack`](Self::pack).
    pub fn unpack(&self, m: &Mat<f64>) -> Vec<Complex64> {
        match self.representation {
            Representation::Complex => (0..self.complex_size)
                .map(|i| Complex64::new(m[(i, 0)], m[(i, 1)]))
                .collect(),
            Representation::Real => {
                let mut out = vec![Complex64::new(0.0, 0.0); self.complex_size];
                for (var, slot) in self.slots.iter().enumerate() {
                    for comp in 0..slot.ncomp {
                        let dst = slot.offset + comp * slot.radial;
                        let re = self.component_range(var, comp, Part::Re);
                        let im = self.component_range(var, comp, Part::Im);
                        for (k, (r, i)) in re.zip(im).enumerate() {
                            out[dst + k] = Complex64::new(m[(r, 0)], m[(i, 0)]);
                        }
                    }
                }
                out
            }
        }
    }

    /// Complex offset of one component of variable `var` in a mode vector.
    pub fn complex_offset(&self, var: usize, comp: usize) -> usize {
        let slot = self.slots[var];
        slot.offset + comp * slot.radial
    }

    /// Radial coefficients of variable `var`.
    pub fn radial_size(&self, var: usize) -> usize {
        self.slots[var].radial
    }
}
