//! Named design variables ↔ flat bounded vector
//!
//! Declaration order fixes each variable's offset; offsets partition
//! `[0, n)` without gaps or overlaps. Bounds are exposed for the engine and
//! never applied here.

use fastuav_common::{DesignVariable, NamedValues, SetupError};
use std::collections::HashSet;
use std::ops::Range;

#[derive(Debug, Clone)]
struct Slot {
    name: String,
    range: Range<usize>,
}

/// Bidirectional mapping between named design values and one flat vector
#[derive(Debug, Clone)]
pub struct VariableVectorCodec {
    slots: Vec<Slot>,
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl VariableVectorCodec {
    /// Lay out the variables contiguously in declaration order
    pub fn new(variables: &[DesignVariable]) -> Result<Self, SetupError> {
        if variables.is_empty() {
            return Err(SetupError::NoDesignVariable);
        }

        let mut seen = HashSet::new();
        let mut slots = Vec::with_capacity(variables.len());
        let mut lower = Vec::new();
        let mut upper = Vec::new();

        for var in variables {
            if !seen.insert(var.name.as_str()) {
                return Err(SetupError::DuplicateName(var.name.clone()));
            }
            if var.size() == 0 || var.upper.len() != var.size() {
                return Err(SetupError::DimensionMismatch {
                    name: var.name.clone(),
                    expected: var.size().max(1),
                    actual: var.upper.len(),
                });
            }
            let start = lower.len();
            lower.extend_from_slice(&var.lower);
            upper.extend_from_slice(&var.upper);
            slots.push(Slot {
                name: var.name.clone(),
                range: start..lower.len(),
            });
        }

        Ok(Self {
            slots,
            lower,
            upper,
        })
    }

    /// Length of the flat vector
    pub fn dimension(&self) -> usize {
        self.lower.len()
    }

    /// Offsets of a variable in the flat vector
    pub fn range(&self, name: &str) -> Option<Range<usize>> {
        self.slots
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.range.clone())
    }

    /// Flattened lower bounds
    pub fn lower_bounds(&self) -> &[f64] {
        &self.lower
    }

    /// Flattened upper bounds
    pub fn upper_bounds(&self) -> &[f64] {
        &self.upper
    }

    /// Flatten named values; every declared variable must be present with its size
    pub fn encode(&self, values: &NamedValues) -> Result<Vec<f64>, SetupError> {
        if let Some(unknown) = values.keys().find(|k| self.range(k).is_none()) {
            return Err(SetupError::UnknownVariable(unknown.clone()));
        }

        let mut x = Vec::with_capacity(self.dimension());
        for slot in &self.slots {
            let value = values
                .get(&slot.name)
                .ok_or_else(|| SetupError::MissingVariable(slot.name.clone()))?;
            if value.len() != slot.range.len() {
                return Err(SetupError::DimensionMismatch {
                    name: slot.name.clone(),
                    expected: slot.range.len(),
                    actual: value.len(),
                });
            }
            x.extend_from_slice(value);
        }
        Ok(x)
    }

    /// Split a flat vector back into named values
    pub fn decode(&self, x: &[f64]) -> Result<NamedValues, SetupError> {
        if x.len() != self.dimension() {
            return Err(SetupError::DimensionMismatch {
                name: "design vector".to_string(),
                expected: self.dimension(),
                actual: x.len(),
            });
        }
        Ok(self
            .slots
            .iter()
            .map(|slot| (slot.name.clone(), x[slot.range.clone()].to_vec()))
            .collect())
    }
}
