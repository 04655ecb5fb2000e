//! State and parameter fields of a problem.

use num_complex::Complex64;

use super::BlockLayout;
use crate::basis::ShellBasis;
use crate::comm::CommError;
use crate::field::Field;
use crate::problem::FieldDecl;
use crate::types::Mode;

/// Named fields in declaration order.
#[derive(Clone, Debug)]
pub struct FieldSet {
    fields: Vec<Field>,
}

impl FieldSet {
    /// Zero fields for the given declarations.
    pub fn zeros(decls: &[FieldDecl], basis: &ShellBasis) -> Self {
        Self {
            fields: decls
                .iter()
                .map(|d| Field::new(d.name.clone(), d.shape.kind, d.shape.domain, basis))
                .collect(),
        }
    }

    /// Wrap existing fields.
    pub fn from_fields(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut [Field] {
        &mut self.fields
    }

    /// Field by name.
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// Mutable field by name.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Field> {
        self.fields.iter_mut().find(|f| f.name() == name)
    }

    /// Field by position.
    pub fn at(&self, index: usize) -> &Field {
        &self.fields[index]
    }

    /// Make every grid current.
    pub fn require_grid(&mut self, basis: &ShellBasis) {
        for field in &mut self.fields {
            field.require_grid(basis);
        }
    }

    /// Make every coefficient set current. Collective.
    pub fn require_coeff(&mut self, basis: &ShellBasis) -> Result<(), CommError> {
        for field in &mut self.fields {
            field.require_coeff(basis)?;
        }
        Ok(())
    }

    /// Round-trip every field through grid space. Collective.
    pub fn enforce_hermitian(&mut self, basis: &ShellBasis) -> Result<(), CommError> {
        for field in &mut self.fields {
            field.enforce_hermitian(basis)?;
        }
        Ok(())
    }

    /// One mode of every field, in subproblem order. Coefficients must be
    /// current.
    pub fn gather_mode(&self, layout: &BlockLayout, mode: Mode) -> Vec<Complex64> {
        let mut x = vec![Complex64::new(0.0, 0.0); layout.complex_size()];
        for (var, field) in self.fields.iter().enumerate() {
            let n = layout.radial_size(var);
            for comp in 0..field.kind().ncomp() {
                let start = layout.complex_offset(var, comp);
                x[start..start + n].copy_from_slice(field.mode_coeffs(mode, comp));
            }
        }
        x
    }

    /// Write one mode of every field from a subproblem vector.
    pub fn scatter_mode(&mut self, layout: &BlockLayout, mode: Mode, x: &[Complex64]) {
        for (var, field) in self.fields.iter_mut().enumerate() {
            let n = layout.radial_size(var);
            for comp in 0..field.kind().ncomp() {
                let start = layout.complex_offset(var, comp);
                field
                    .mode_coeffs_mut(mode, comp)
                    .copy_from_slice(&x[start..start + n]);
            }
        }
    }
}
