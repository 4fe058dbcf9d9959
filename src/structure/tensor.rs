use serde::{Deserialize, Serialize};
use std::fmt::Display;

use super::{index::Index, StructureError};
use crate::utils::join_display;

/// Substring marking an active-space density tensor.
pub const GAMMA: &str = "Gamma";
/// Substring marking a generated intermediate.
pub const INTERMEDIATE: &str = "I";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A named tensor factor: label, slots, numeric prefactor and an optional scalar (`e0`).
///
/// Equality is structural and includes the prefactor and the scalar, this is the
/// equality the factorizer merges on.
pub struct Tensor {
    label: String,
    indices: Vec<Index>,
    factor: f64,
    scalar: Option<String>,
}

impl Tensor {
    pub fn new(label: impl Into<String>, indices: Vec<Index>) -> Result<Self, StructureError> {
        let label = label.into();
        if label.is_empty() {
            return Err(StructureError::EmptyLabel);
        }
        Ok(Tensor {
            label,
            indices,
            factor: 1.0,
            scalar: None,
        })
    }

    /// The `n`-th generated intermediate.
    pub fn intermediate(n: usize, indices: Vec<Index>) -> Self {
        Self::from_parts(format!("{INTERMEDIATE}{n}"), indices)
    }

    /// Caller guarantees a non-empty label.
    pub(crate) fn from_parts(label: impl Into<String>, indices: Vec<Index>) -> Self {
        Tensor {
            label: label.into(),
            indices,
            factor: 1.0,
            scalar: None,
        }
    }

    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = factor;
        self
    }

    pub fn with_scalar(mut self, scalar: impl Into<String>) -> Self {
        self.scalar = Some(scalar.into());
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn indices(&self) -> &[Index] {
        &self.indices
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn set_factor(&mut self, factor: f64) {
        self.factor = factor;
    }

    pub fn scalar(&self) -> Option<&str> {
        self.scalar.as_deref()
    }

    pub fn set_scalar(&mut self, scalar: Option<String>) {
        self.scalar = scalar;
    }

    pub fn rank(&self) -> usize {
        self.indices.len()
    }

    pub fn is_gamma(&self) -> bool {
        self.label.contains(GAMMA)
    }

    pub fn is_intermediate(&self) -> bool {
        self.label.contains(INTERMEDIATE)
    }

    /// Whether `index` occupies one of the slots, compared with [`Index::identical`].
    pub fn has_index(&self, index: &Index) -> bool {
        self.indices.iter().any(|i| i.identical(index))
    }
}

impl Display for Tensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.factor != 1.0 {
            write!(f, "{:.1} ", self.factor)?;
        }
        write!(f, "{}({})", self.label, join_display(&self.indices, ", "))?;
        if let Some(s) = &self.scalar {
            write!(f, " {s}")?;
        }
        Ok(())
    }
}
