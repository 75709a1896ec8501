use crate::StrError;
use russell_lab::Vector;
use serde::{Deserialize, Serialize};

/// Holds the prescribed values of the fixed (eliminated) degrees of freedom
///
/// There is one array of values per component of the unknown field (e.g., one per
/// velocity component). The index within each array is the boundary DOF number of
/// that component as defined by the operators. The layout is fixed at allocation;
/// later updates overwrite the values in place.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FixedDofs {
    components: Vec<Vector>,
}

impl FixedDofs {
    /// Allocates a new instance with zero values
    ///
    /// `sizes[d]` is the number of fixed DOFs of component `d`.
    pub fn new(sizes: &[usize]) -> Self {
        FixedDofs {
            components: sizes.iter().map(|n| Vector::new(*n)).collect(),
        }
    }

    /// Allocates a new instance from the values of each component
    pub fn from_components(values: &[&[f64]]) -> Self {
        FixedDofs {
            components: values.iter().map(|v| Vector::from(&v.to_vec())).collect(),
        }
    }

    /// Returns the number of components
    pub fn n_component(&self) -> usize {
        self.components.len()
    }

    /// Returns the values of a component
    pub fn component(&self, d: usize) -> Result<&Vector, StrError> {
        self.components.get(d).ok_or("component index is out of bounds")
    }

    /// Returns a prescribed value
    pub fn value(&self, d: usize, index: usize) -> Result<f64, StrError> {
        let component = self.component(d)?;
        if index >= component.dim() {
            return Err("fixed DOF index is out of bounds");
        }
        Ok(component[index])
    }

    /// Sets a prescribed value
    pub fn set_value(&mut self, d: usize, index: usize, value: f64) -> Result<(), StrError> {
        let component = self.components.get_mut(d).ok_or("component index is out of bounds")?;
        if index >= component.dim() {
            return Err("fixed DOF index is out of bounds");
        }
        component[index] = value;
        Ok(())
    }

    /// Overwrites all values of a component
    pub fn refresh_component(&mut self, d: usize, values: &[f64]) -> Result<(), StrError> {
        let component = self.components.get_mut(d).ok_or("component index is out of bounds")?;
        if values.len() != component.dim() {
            return Err("the number of values must equal the number of fixed DOFs of the component");
        }
        for (i, v) in values.iter().enumerate() {
            component[i] = *v;
        }
        Ok(())
    }

    /// Overwrites all values with the values of another instance with the same layout
    pub fn refresh(&mut self, other: &FixedDofs) -> Result<(), StrError> {
        if !self.same_layout(other) {
            return Err("cannot refresh fixed DOFs with a different layout");
        }
        for (mine, theirs) in self.components.iter_mut().zip(other.components.iter()) {
            for i in 0..mine.dim() {
                mine[i] = theirs[i];
            }
        }
        Ok(())
    }

    /// Returns whether the other instance has the same number of components and sizes
    pub fn same_layout(&self, other: &FixedDofs) -> bool {
        self.components.len() == other.components.len()
            && self
                .components
                .iter()
                .zip(other.components.iter())
                .all(|(a, b)| a.dim() == b.dim())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
