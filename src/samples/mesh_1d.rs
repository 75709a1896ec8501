use crate::base::FixedDofs;
use crate::StrError;
use russell_lab::Vector;
use russell_sparse::{CooMatrix, Sym};

/// Holds the nodes of a one-dimensional mesh of linear (two-node) elements
///
/// The first and last nodes are the boundary nodes; their values are prescribed through
/// the fixed DOFs (component 0 holds `[left, right]`). The interior nodes are the free DOFs.
#[derive(Clone, Debug)]
pub struct Mesh1d {
    coordinates: Vec<f64>,
}

impl Mesh1d {
    /// Allocates a mesh with `nelem` elements of equal length
    pub fn uniform(x_min: f64, x_max: f64, nelem: usize) -> Result<Self, StrError> {
        if nelem < 2 {
            return Err("the number of elements must be at least 2");
        }
        if x_max <= x_min {
            return Err("x_max must be greater than x_min");
        }
        let h = (x_max - x_min) / (nelem as f64);
        let coordinates = (0..(nelem + 1)).map(|i| x_min + (i as f64) * h).collect();
        Ok(Mesh1d { coordinates })
    }

    /// Allocates a mesh from the coordinates of the nodes
    pub fn from_coordinates(coordinates: &[f64]) -> Result<Self, StrError> {
        if coordinates.len() < 3 {
            return Err("the number of nodes must be at least 3");
        }
        let mut mesh = Mesh1d {
            coordinates: vec![0.0; coordinates.len()],
        };
        mesh.set_coordinates(coordinates)?;
        Ok(mesh)
    }

    /// Moves the nodes (the number of nodes must not change)
    pub fn set_coordinates(&mut self, coordinates: &[f64]) -> Result<(), StrError> {
        if coordinates.len() != self.coordinates.len() {
            return Err("the number of nodes must not change");
        }
        if coordinates.windows(2).any(|x| x[1] <= x[0]) {
            return Err("the coordinates must be strictly increasing");
        }
        self.coordinates.copy_from_slice(coordinates);
        Ok(())
    }

    /// Returns the number of nodes
    pub fn npoint(&self) -> usize {
        self.coordinates.len()
    }

    /// Returns the number of elements
    pub fn nelem(&self) -> usize {
        self.coordinates.len() - 1
    }

    /// Returns the number of free DOFs (interior nodes)
    pub fn ndof(&self) -> usize {
        self.coordinates.len() - 2
    }

    /// Returns the coordinates of all nodes
    pub fn coordinates(&self) -> &[f64] {
        &self.coordinates
    }

    /// Returns the coordinates of the interior nodes
    pub fn interior_coordinates(&self) -> Vec<f64> {
        self.coordinates[1..(self.npoint() - 1)].to_vec()
    }

    /// Returns the length of an element
    pub fn element_length(&self, e: usize) -> f64 {
        self.coordinates[e + 1] - self.coordinates[e]
    }

    /// Returns the DOF number of a node or None if the node is a boundary node
    pub fn dof(&self, node: usize) -> Option<usize> {
        if node == 0 || node + 1 >= self.npoint() {
            None
        } else {
            Some(node - 1)
        }
    }

    /// Returns the index of the fixed DOF (in component 0) of a boundary node
    pub(crate) fn fixed_index(&self, node: usize) -> usize {
        if node == 0 {
            0
        } else {
            1
        }
    }

    /// Returns the values at all nodes given the free DOFs and the prescribed values
    pub fn nodal_values(&self, state: &Vector, fixed_dofs: &FixedDofs) -> Result<Vec<f64>, StrError> {
        if state.dim() != self.ndof() {
            return Err("the state vector must have dimension equal to the number of interior nodes");
        }
        let mut values = Vec::with_capacity(self.npoint());
        values.push(fixed_dofs.value(0, 0)?);
        values.extend_from_slice(state.as_data());
        values.push(fixed_dofs.value(0, 1)?);
        Ok(values)
    }

    /// Allocates a matrix for the free DOFs with room for all element entries
    pub(crate) fn alloc_matrix(&self) -> Result<CooMatrix, StrError> {
        CooMatrix::new(self.ndof(), self.ndof(), 4 * self.nelem(), Sym::No)
    }

    /// Adds the entries of an element matrix to the global system
    ///
    /// The columns of the boundary nodes are moved to the right-hand side
    /// (`rhs -= Kₑ·g`) using the nodal values; the rows of the boundary nodes are skipped.
    pub(crate) fn add_element(
        &self,
        e: usize,
        ke: &[[f64; 2]; 2],
        values: &[f64],
        matrix: &mut Option<CooMatrix>,
        rhs: &mut Vector,
    ) -> Result<(), StrError> {
        for r in 0..2 {
            let i = match self.dof(e + r) {
                Some(i) => i,
                None => continue,
            };
            for c in 0..2 {
                match self.dof(e + c) {
                    Some(j) => {
                        if let Some(kk) = matrix.as_mut() {
                            kk.put(i, j, ke[r][c])?;
                        }
                    }
                    None => rhs[i] -= ke[r][c] * values[e + c],
                }
            }
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
